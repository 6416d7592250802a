pub mod app_config;
pub mod brands;
pub mod config;
pub mod products;
pub mod sink;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, ScraperBackend, SiteLayout};
pub use brands::{default_allow_list, load_allow_list_file, AllowListEntry, AllowListFile};
pub use config::{load_app_config, load_app_config_from_env, DEFAULT_USER_AGENT};
pub use products::{ProductRecord, ValidationError, UNKNOWN};
pub use sink::{MemorySink, RecordSink, SinkError, SinkId};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read allow-list file {path}: {source}")]
    BrandsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse allow-list file: {0}")]
    BrandsFileParse(#[from] serde_yaml::Error),

    #[error("allow-list validation failed: {0}")]
    Validation(String),
}
