use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod lead;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use lead::{Lead, LeadSource, ScrapeSummary};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
