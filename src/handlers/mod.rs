pub mod health;
pub mod session;
pub mod workflow;

pub use health::health_check;
pub use session::{get_qr_code, get_session, set_otp, set_user};
pub use workflow::{activate, disable, enroll, verify};
