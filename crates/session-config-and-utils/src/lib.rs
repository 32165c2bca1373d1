//! Core configuration, filesystem paths, and logging for the IAM session client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_IDENTITY_BASE_URL, DEFAULT_LOG_LEVEL, DEFAULT_TOKEN_LIFETIME_MINUTES,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, LogFormat};
pub use paths::Paths;
