use crate::llm_provider::*;
use crate::openai_provider::{OpenAIChatConfig, OpenAIChatProvider};
use anyhow::{anyhow, Result};
use apimigrate_core::Settings;
use std::sync::Arc;
use tracing::{info, warn};

/// Factory for creating LLM providers based on configuration
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Provider for the configured `llm.provider`.
    ///
    /// Returns `Ok(None)` when AI is disabled or no API key is present; the
    /// service then runs with heuristic scoring and rule-based conversions.
    pub fn from_settings(settings: &Settings) -> Result<Option<Arc<dyn LLMProvider>>> {
        let provider_name = settings.llm.provider.trim().to_lowercase();

        match provider_name.as_str() {
            "disabled" | "none" => {
                info!("LLM provider disabled by configuration");
                Ok(None)
            }
            "openai" => {
                let Some(api_key) = settings.openai_api_key() else {
                    warn!("OpenAI API key not found - AI features will be limited");
                    return Ok(None);
                };
                let provider = Self::create_openai_provider(settings, api_key)?;
                info!(
                    "Using {} provider with model {}",
                    provider.provider_name(),
                    provider.model_name()
                );
                Ok(Some(provider))
            }
            other => Err(anyhow!(
                "Unsupported LLM provider: {}. Available providers: {}",
                other,
                Self::supported_providers().join(", ")
            )),
        }
    }

    fn create_openai_provider(settings: &Settings, api_key: String) -> Result<Arc<dyn LLMProvider>> {
        let llm = &settings.llm;
        let config = OpenAIChatConfig {
            base_url: llm.base_url.clone(),
            model: llm.model.clone(),
            timeout_secs: llm.timeout_secs,
            max_retries: llm.max_retries,
            organization: std::env::var("OPENAI_ORG_ID").ok(),
            ..OpenAIChatConfig::new(api_key)
        };

        Ok(Arc::new(OpenAIChatProvider::new(config)?))
    }

    pub fn supported_providers() -> Vec<&'static str> {
        vec!["openai", "disabled"]
    }
}
