use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use config as cfg;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

const ENV_PREFIX: &str = "APIMIGRATE";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// `*` allows any origin
    #[serde(default = "CorsConfig::default_origins")]
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    fn default_origins() -> Vec<String> {
        vec!["*".to_string()]
    }

    pub fn allows_any(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o.trim() == "*")
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Self::default_origins(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    pub path: String,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "data/migrations.db".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseBackend {
    #[default]
    Memory,
    #[serde(rename = "rocksdb", alias = "rocks_db")]
    RocksDb,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: DatabaseBackend,
    #[serde(default)]
    pub rocksdb: RocksDbConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "disabled"
    #[serde(default = "LlmConfig::default_provider")]
    pub provider: String,
    #[serde(default = "LlmConfig::default_model")]
    pub model: String,
    #[serde(default = "LlmConfig::default_base_url")]
    pub base_url: String,
    #[serde(default = "LlmConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "LlmConfig::default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "LlmConfig::default_temperature")]
    pub temperature: f32,
}

impl LlmConfig {
    fn default_provider() -> String {
        "openai".to_string()
    }

    fn default_model() -> String {
        "gpt-4o".to_string()
    }

    fn default_base_url() -> String {
        "https://api.openai.com/v1".to_string()
    }

    fn default_timeout_secs() -> u64 {
        120
    }

    fn default_max_retries() -> u32 {
        2
    }

    fn default_temperature() -> f32 {
        0.1
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Self::default_provider(),
            model: Self::default_model(),
            base_url: Self::default_base_url(),
            timeout_secs: Self::default_timeout_secs(),
            max_retries: Self::default_max_retries(),
            temperature: Self::default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadLimits {
    #[serde(default = "UploadLimits::default_proxy")]
    pub max_proxy_bytes: usize,
    #[serde(default = "UploadLimits::default_swagger")]
    pub max_swagger_bytes: usize,
    /// Upper bound on the sum of uncompressed entry sizes inside a ZIP bundle.
    #[serde(default = "UploadLimits::default_uncompressed")]
    pub max_bundle_uncompressed_bytes: u64,
}

impl UploadLimits {
    fn default_proxy() -> usize {
        100 * 1024 * 1024
    }

    fn default_swagger() -> usize {
        10 * 1024 * 1024
    }

    fn default_uncompressed() -> u64 {
        512 * 1024 * 1024
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_proxy_bytes: Self::default_proxy(),
            max_swagger_bytes: Self::default_swagger(),
            max_bundle_uncompressed_bytes: Self::default_uncompressed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default = "MigrationConfig::default_validate_source_ms")]
    pub validate_source_ms: u64,
    #[serde(default = "MigrationConfig::default_convert_policies_ms")]
    pub convert_policies_ms: u64,
    #[serde(default = "MigrationConfig::default_validate_bundle_ms")]
    pub validate_bundle_ms: u64,
    #[serde(default = "MigrationConfig::default_deploy_ms")]
    pub deploy_ms: u64,
    /// Organization used in deployment URLs when credentials carry no project
    #[serde(default = "MigrationConfig::default_org")]
    pub default_org: String,
    #[serde(default = "MigrationConfig::default_env")]
    pub default_env: String,
}

impl MigrationConfig {
    fn default_validate_source_ms() -> u64 {
        2_000
    }

    fn default_convert_policies_ms() -> u64 {
        3_000
    }

    fn default_validate_bundle_ms() -> u64 {
        2_000
    }

    fn default_deploy_ms() -> u64 {
        3_000
    }

    fn default_org() -> String {
        "demo-org".to_string()
    }

    fn default_env() -> String {
        "dev".to_string()
    }

    /// All simulated steps complete immediately.
    pub fn instant() -> Self {
        Self {
            validate_source_ms: 0,
            convert_policies_ms: 0,
            validate_bundle_ms: 0,
            deploy_ms: 0,
            ..Self::default()
        }
    }
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            validate_source_ms: Self::default_validate_source_ms(),
            convert_policies_ms: Self::default_convert_policies_ms(),
            validate_bundle_ms: Self::default_validate_bundle_ms(),
            deploy_ms: Self::default_deploy_ms(),
            default_org: Self::default_org(),
            default_env: Self::default_env(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    // Do not serialize secrets; allow deserialization from config/env only.
    #[serde(default, skip_serializing)]
    pub openai_api_key: Option<SecretString>,
    /// Base64 32-byte key for sealing stored Apigee credentials
    #[serde(default, skip_serializing)]
    pub credential_key: Option<SecretString>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "Settings::default_env")]
    pub env: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub uploads: UploadLimits,
    #[serde(default)]
    pub migration: MigrationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: Self::default_env(),
            server: ServerConfig::default(),
            cors: CorsConfig::default(),
            database: DatabaseConfig::default(),
            llm: LlmConfig::default(),
            uploads: UploadLimits::default(),
            migration: MigrationConfig::default(),
            logging: LoggingConfig::default(),
            secrets: SecretsConfig::default(),
        }
    }
}

impl Settings {
    fn default_env() -> String {
        env::var("APP_ENV")
            .ok()
            .or_else(|| env::var("ENVIRONMENT").ok())
            .unwrap_or_else(|| "development".to_string())
    }

    /// Configured key, falling back to the conventional `OPENAI_API_KEY` variable.
    pub fn openai_api_key(&self) -> Option<String> {
        self.secrets
            .openai_api_key
            .as_ref()
            .map(|s| s.expose_secret().to_string())
            .or_else(|| env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn credential_key(&self) -> Option<String> {
        self.secrets
            .credential_key
            .as_ref()
            .map(|s| s.expose_secret().to_string())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.server.host.trim().is_empty(),
            "server.host cannot be empty"
        );
        anyhow::ensure!(self.server.port > 0, "server.port must be > 0");
        anyhow::ensure!(
            self.uploads.max_proxy_bytes > 0 && self.uploads.max_swagger_bytes > 0,
            "upload limits must be > 0"
        );
        anyhow::ensure!(
            (0.0..=2.0).contains(&self.llm.temperature),
            "llm.temperature must be within 0.0..=2.0"
        );
        anyhow::ensure!(
            !self.llm.base_url.trim().is_empty(),
            "llm.base_url cannot be empty"
        );
        if self.database.backend == DatabaseBackend::RocksDb {
            anyhow::ensure!(
                !self.database.rocksdb.path.is_empty(),
                "database.rocksdb.path cannot be empty"
            );
        }
        Ok(())
    }
}

pub struct ConfigManager {
    settings: Arc<RwLock<Settings>>,
    config_dir: PathBuf,
    env: String,
    _watcher: Mutex<Option<RecommendedWatcher>>,
}

impl std::fmt::Debug for ConfigManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigManager")
            .field("config_dir", &self.config_dir)
            .field("env", &self.env)
            .finish()
    }
}

impl ConfigManager {
    pub fn settings(&self) -> &Arc<RwLock<Settings>> {
        &self.settings
    }

    pub async fn snapshot(&self) -> Settings {
        self.settings.read().await.clone()
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Wraps already-built settings (tests, embedding).
    pub fn from_settings(settings: Settings) -> Result<Arc<Self>> {
        settings.validate()?;
        let env = settings.env.clone();
        Ok(Arc::new(Self {
            settings: Arc::new(RwLock::new(settings)),
            config_dir: PathBuf::from("."),
            env,
            _watcher: Mutex::new(None),
        }))
    }

    pub fn load(config_dir: Option<PathBuf>, env_override: Option<String>) -> Result<Arc<Self>> {
        // .env is optional
        let _ = dotenv::dotenv();
        let env_name = env_override.unwrap_or_else(Settings::default_env);
        let config_dir = config_dir.unwrap_or_else(Self::default_config_dir);
        let loaded = Self::load_from_sources(&config_dir, &env_name)?;
        loaded.validate()?;

        Ok(Arc::new(Self {
            settings: Arc::new(RwLock::new(loaded)),
            config_dir,
            env: env_name,
            _watcher: Mutex::new(None),
        }))
    }

    /// Like [`ConfigManager::load`] but reloads settings when files in the
    /// config directory change. Invalid reloads are discarded.
    pub fn new_watching(
        config_dir: Option<PathBuf>,
        env_override: Option<String>,
    ) -> Result<Arc<Self>> {
        let manager = Self::load(config_dir, env_override)?;
        match Self::spawn_watcher(manager.clone()) {
            Ok(w) => *manager._watcher.lock() = Some(w),
            Err(e) => warn!("config hot reload disabled: {:?}", e),
        }
        Ok(manager)
    }

    /// Priority order:
    /// 1. ~/.apimigrate/
    /// 2. ./config/
    /// 3. Current directory
    pub fn default_config_dir() -> PathBuf {
        if let Some(home_dir) = dirs::home_dir() {
            let user_dir = home_dir.join(".apimigrate");
            if user_dir.exists() {
                info!("Using config directory: {:?}", user_dir);
                return user_dir;
            }
        }

        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let project_config = cwd.join("config");
        if project_config.exists() {
            info!("Using config directory: {:?}", project_config);
            return project_config;
        }

        info!("Using config directory: {:?}", cwd);
        cwd
    }

    pub fn load_from_sources(config_dir: &Path, env_name: &str) -> Result<Settings> {
        let settings: Settings = cfg::Config::builder()
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(cfg::File::from(config_dir.join("default.yaml")).required(false))
            .add_source(cfg::File::from(config_dir.join("default.json")).required(false))
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.toml", env_name))).required(false),
            )
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.yaml", env_name))).required(false),
            )
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                cfg::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .set_default("env", env_name)
            .context("seeding environment name")?
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("deserializing configuration")?;
        Ok(settings)
    }

    fn spawn_watcher(this: Arc<Self>) -> Result<RecommendedWatcher> {
        let config_dir = this.config_dir.clone();
        let env_name = this.env.clone();
        let settings = this.settings.clone();
        let watch_dir = this.config_dir.clone();
        let mut watcher = notify::recommended_watcher(move |res| match res {
            Ok(_event) => match Self::load_from_sources(&config_dir, &env_name) {
                Ok(new_settings) => {
                    if let Err(e) = new_settings.validate() {
                        warn!("config validation failed on reload: {:?}", e);
                        return;
                    }
                    *settings.blocking_write() = new_settings;
                    info!("Configuration reloaded from {:?}", config_dir);
                }
                Err(e) => warn!("config reload failed: {:?}", e),
            },
            Err(e) => error!("config watcher error: {:?}", e),
        })?;
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        s.validate().unwrap();
        assert_eq!(s.uploads.max_proxy_bytes, 100 * 1024 * 1024);
        assert_eq!(s.uploads.max_swagger_bytes, 10 * 1024 * 1024);
        assert_eq!(s.llm.model, "gpt-4o");
        assert!(s.cors.allows_any());
    }

    #[test]
    fn files_layer_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.toml"),
            "[server]\nhost = \"127.0.0.1\"\nport = 9000\n[migration]\ndeploy_ms = 5\n",
        )
        .unwrap();
        fs::write(dir.path().join("staging.toml"), "[server]\nport = 9100\n").unwrap();

        let s = ConfigManager::load_from_sources(dir.path(), "staging").unwrap();
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 9100);
        assert_eq!(s.migration.deploy_ms, 5);
        assert_eq!(s.migration.validate_source_ms, 2_000);
        assert_eq!(s.env, "staging");
    }

    #[test]
    fn rocksdb_backend_needs_a_path() {
        let mut s = Settings::default();
        s.database.backend = DatabaseBackend::RocksDb;
        s.database.rocksdb.path = String::new();
        assert!(s.validate().is_err());
    }

    #[test]
    fn explicit_openai_key_wins() {
        let mut s = Settings::default();
        s.secrets.openai_api_key = Some(SecretString::from("sk-test".to_string()));
        assert_eq!(s.openai_api_key().as_deref(), Some("sk-test"));
    }
}
