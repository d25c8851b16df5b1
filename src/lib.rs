pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod status;
