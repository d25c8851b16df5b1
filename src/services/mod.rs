pub mod enrollment;
pub mod totp_api;

pub use enrollment::EnrollmentController;
pub use totp_api::TotpApiClient;
