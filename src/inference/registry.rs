//! Provider lookup by id.
//!
//! The registry is built once at startup from the resolved config and shared
//! by every request. A provider whose credential is missing is simply not
//! registered, so asking for it fails with `ProviderError::Config` before
//! any network traffic.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};

use super::provider::{CompletionProvider, CompletionRequest, ProviderError};
use super::providers::{AnthropicProvider, GeminiProvider, OpenAiProvider};
use super::stream::DeltaStream;
use super::types::InvokeMode;
use crate::ProviderId;
use crate::core::config::ResolvedConfig;

/// Result of [`ProviderRegistry::invoke`].
pub enum Invocation {
    Text(String),
    Stream(DeltaStream),
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderId, Arc<dyn CompletionProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry holding every provider that has an API key configured.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self, ProviderError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::Config(format!("HTTP client setup failed: {e}")))?;

        let mut registry = Self::new();
        for id in ProviderId::ALL {
            let settings = config.provider(id);
            let Some(api_key) = settings.api_key.clone() else {
                info!("{} API key not set; provider disabled", id.label());
                continue;
            };
            let base_url = Some(settings.base_url.clone());

            let provider: Arc<dyn CompletionProvider> = match id {
                ProviderId::Anthropic => Arc::new(
                    AnthropicProvider::new(api_key, base_url)
                        .with_model(settings.model.clone())
                        .with_max_tokens(config.max_tokens)
                        .with_http_client(client.clone()),
                ),
                ProviderId::OpenAi => Arc::new(
                    OpenAiProvider::new(api_key, base_url)
                        .with_model(settings.model.clone())
                        .with_max_tokens(config.max_tokens)
                        .with_http_client(client.clone()),
                ),
                ProviderId::Gemini => Arc::new(
                    GeminiProvider::new(api_key, base_url)
                        .with_model(settings.model.clone())
                        .with_max_tokens(config.max_tokens)
                        .with_http_client(client.clone()),
                ),
            };
            info!("{} provider enabled (model {})", id.label(), settings.model);
            registry.register(provider);
        }
        Ok(registry)
    }

    /// Adds (or replaces) the provider for its id.
    pub fn register(&mut self, provider: Arc<dyn CompletionProvider>) {
        self.providers.insert(provider.id(), provider);
    }

    pub fn with_provider(mut self, provider: Arc<dyn CompletionProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn is_configured(&self, id: ProviderId) -> bool {
        self.providers.contains_key(&id)
    }

    /// Looks up a provider, failing with `ProviderError::Config` if it has no credential.
    pub fn get(&self, id: ProviderId) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
        self.providers
            .get(&id)
            .cloned()
            .ok_or_else(|| ProviderError::Config(format!("{} API key is not configured.", id.label())))
    }

    /// One-shot completion against the given provider.
    pub async fn complete(
        &self,
        id: ProviderId,
        request: CompletionRequest<'_>,
    ) -> Result<String, ProviderError> {
        let provider = self.get(id)?;
        debug!("One-shot completion via {}", id);
        provider.complete(request).await
    }

    /// Starts a streaming completion. Configuration is checked synchronously,
    /// so a missing credential is reported before the stream exists.
    pub fn stream(
        &self,
        id: ProviderId,
        system_prompt: String,
        user_message: String,
    ) -> Result<DeltaStream, ProviderError> {
        let provider = self.get(id)?;
        debug!("Streaming completion via {}", id);
        Ok(DeltaStream::spawn(provider, system_prompt, user_message))
    }

    pub async fn invoke(
        &self,
        id: ProviderId,
        system_prompt: &str,
        user_message: &str,
        mode: InvokeMode,
    ) -> Result<Invocation, ProviderError> {
        match mode {
            InvokeMode::OneShot => {
                let request = CompletionRequest {
                    system_prompt,
                    user_message,
                };
                self.complete(id, request).await.map(Invocation::Text)
            }
            InvokeMode::Streaming => self
                .stream(id, system_prompt.to_string(), user_message.to_string())
                .map(Invocation::Stream),
        }
    }
}
