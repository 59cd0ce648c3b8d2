use anyhow::{anyhow, Result};
use std::sync::Arc;

use crate::client::OpenAiCompatibleClient;
use crate::traits::ModelClient;

/// One configured provider entry: name, optional base URL override and the
/// credential used against it.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: Option<String>,
    pub api_key: String,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: None,
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Maps a provider configuration to a callable model client.
///
/// Known provider names get preset OpenAI-compatible base URLs; anything
/// else must carry an explicit base URL.
pub struct ModelFactory;

impl ModelFactory {
    pub fn preset_base_url(provider_name: &str) -> Option<&'static str> {
        match provider_name {
            "OpenAI" => Some("https://api.openai.com/v1"),
            "DeepSeek" => Some("https://api.deepseek.com/v1"),
            "OpenRouter" => Some("https://openrouter.ai/api/v1"),
            "Google" => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
            _ => None,
        }
    }

    pub fn create(provider: &ProviderConfig, model: &str) -> Result<Arc<dyn ModelClient>> {
        let base_url = provider
            .base_url
            .as_deref()
            .or_else(|| Self::preset_base_url(&provider.name))
            .ok_or_else(|| {
                anyhow!(
                    "Provider {} has no preset base URL and none was configured",
                    provider.name
                )
            })?;

        tracing::info!(provider = %provider.name, model, base_url, "creating model client");

        Ok(Arc::new(OpenAiCompatibleClient::new(
            base_url,
            &provider.api_key,
            model,
        )))
    }
}
