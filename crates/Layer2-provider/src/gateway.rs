//! LLM Gateway - builds the provider named by configuration
//!
//! Agents receive the provider as an injected `Arc<dyn Provider>`; this is
//! the one place that maps `ProviderSettings` onto a concrete client.

use crate::{
    error::ProviderError,
    providers::{anthropic::AnthropicProvider, ollama::OllamaProvider, openai::OpenAiProvider},
    retry::RetryConfig,
    Provider,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use triage_foundation::{ProviderSettings, ProviderType};

pub struct Gateway;

impl Gateway {
    /// Create the configured provider
    pub fn create(settings: &ProviderSettings) -> Result<Arc<dyn Provider>, ProviderError> {
        Self::create_with_retry(settings, RetryConfig::default())
    }

    pub fn create_with_retry(
        settings: &ProviderSettings,
        retry_config: RetryConfig,
    ) -> Result<Arc<dyn Provider>, ProviderError> {
        settings
            .validate()
            .map_err(ProviderError::NotConfigured)?;

        let provider_type = settings.effective_type();
        let model = settings.effective_model();
        let max_tokens = settings.effective_max_tokens();
        let timeout = Duration::from_secs(settings.effective_timeout());

        let provider: Arc<dyn Provider> = match provider_type {
            ProviderType::Anthropic => Arc::new(
                AnthropicProvider::new(
                    settings.api_key.clone().unwrap_or_default(),
                    model,
                    max_tokens,
                )?
                .with_base_url(settings.effective_base_url())
                .with_retry_config(retry_config),
            ),
            ProviderType::Openai | ProviderType::Gemini | ProviderType::Groq => Arc::new(
                OpenAiProvider::new(provider_type, settings.api_key.clone(), model, max_tokens)?
                    .with_base_url(settings.effective_base_url())
                    .with_timeout(timeout)?
                    .with_retry_config(retry_config),
            ),
            ProviderType::Ollama => {
                Arc::new(OllamaProvider::new(settings.effective_base_url(), model)?)
            }
        };

        info!(
            "Using provider {} (model: {}, function calling: {})",
            provider_type,
            provider.model(),
            provider.supports_function_calling()
        );
        Ok(provider)
    }
}
