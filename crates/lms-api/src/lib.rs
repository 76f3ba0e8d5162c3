pub mod auth;
pub mod catalog;
pub mod config;
pub mod enrollment;
pub mod error;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod notify;
pub mod payment;
pub mod policy;
pub mod response;
pub mod review;
pub mod router;
pub mod state;
pub mod tracing;
pub mod user;
pub mod validation;

pub use config::ApiConfig;
pub use state::{ApiState, AuthConfig};
