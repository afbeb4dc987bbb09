pub mod config;
pub mod crypto;
pub mod error;
pub mod policy_catalog;
pub mod stats;
pub mod types;

pub use config::{
    ConfigManager, CorsConfig, DatabaseBackend, DatabaseConfig, LlmConfig, LoggingConfig,
    MigrationConfig, RocksDbConfig, SecretsConfig, ServerConfig, Settings, UploadLimits,
};
pub use crypto::CredentialSealer;
pub use error::*;
pub use policy_catalog::{Assessment, PolicyBreakdown, MANUAL_MIGRATION};
pub use stats::*;
pub use types::*;
