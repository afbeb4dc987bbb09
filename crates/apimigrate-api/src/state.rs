use crate::metrics;
use anyhow::Context;
use apimigrate_ai::{LLMProviderFactory, MigrationAdvisor};
use apimigrate_core::{ConfigManager, CredentialSealer, Settings, UploadLimits};
use apimigrate_runner::MigrationRunner;
use apimigrate_store::{open_store, Collections};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigManager>,
    pub collections: Collections,
    pub advisor: MigrationAdvisor,
    pub runner: MigrationRunner,
    pub sealer: CredentialSealer,
    pub started_at: Instant,
    /// Request body cap; the per-endpoint limits are enforced below it.
    pub body_limit: usize,
}

impl AppState {
    pub async fn new(config: Arc<ConfigManager>) -> anyhow::Result<Self> {
        let settings = config.snapshot().await;

        let store = open_store(&settings.database).context("opening document store")?;
        let collections = Collections::new(store);

        let provider =
            LLMProviderFactory::from_settings(&settings).context("configuring LLM provider")?;
        let advisor = MigrationAdvisor::new(provider).with_temperature(settings.llm.temperature);
        match advisor.provider_name() {
            Some(name) => info!("AI advisor enabled ({})", name),
            None => info!("AI advisor disabled; heuristics only"),
        }

        let sealer = Self::sealer(&settings)?;

        let runner = MigrationRunner::new(
            collections.clone(),
            advisor.clone(),
            settings.migration.clone(),
        )
        .with_finish_hook(Arc::new(metrics::migration_finished));

        Ok(Self {
            config,
            collections,
            advisor,
            runner,
            sealer,
            started_at: Instant::now(),
            body_limit: Self::body_limit(&settings.uploads),
        })
    }

    fn sealer(settings: &Settings) -> anyhow::Result<CredentialSealer> {
        match settings.credential_key() {
            Some(key) => CredentialSealer::from_base64_key(&key)
                .context("secrets.credential_key is not a usable key"),
            None => {
                warn!("No credential key configured; stored credentials will be unreadable after restart");
                Ok(CredentialSealer::ephemeral()?)
            }
        }
    }

    fn body_limit(limits: &UploadLimits) -> usize {
        // Headroom for multipart framing so oversized files still reach the
        // size check and get its message.
        limits.max_proxy_bytes.max(limits.max_swagger_bytes) + 1024 * 1024
    }

    /// Current limits; follows config reloads.
    pub async fn upload_limits(&self) -> UploadLimits {
        self.config.settings().read().await.uploads.clone()
    }
}
