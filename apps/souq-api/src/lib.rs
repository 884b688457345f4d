//! # souq-api
//!
//! HTTP surface over the fulfillment engine: order intake, gateway
//! redirects and webhooks, refund decisions and wallet operations.

pub mod config;
pub mod error;
pub mod gateway;
pub mod routes;
pub mod state;

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use gateway::HttpPaymentGateway;
pub use routes::build_app;
pub use state::AppState;
