//! Session client and builder.
//!
//! A [`Tromero`] session owns the per-session mutable state — the model-route
//! cache and the hosted model listing — and hands out the chat and embeddings
//! surfaces. State is scoped to the session struct, not ambient globals; a
//! new session starts with empty caches.

use secrecy::SecretString;
use std::sync::Arc;
use std::time::Duration;

use crate::embeddings::Embeddings;
use crate::error::{Result, TromeroError};
use crate::gateway::InferenceGateway;
use crate::hosted::HostedClient;
use crate::logger::{HttpInteractionSink, InteractionSink};
use crate::registry::RegistryClient;
use crate::router::CompletionRouter;

/// Production base URL of the routing service.
pub const DEFAULT_BASE_URL: &str = "https://midyear-grid-402910.lm.r.appspot.com/tailor/v1";

/// Default base URL of the hosted provider.
pub const DEFAULT_HOSTED_BASE_URL: &str = "https://api.openai.com/v1";

/// Default transport-boundary timeout for every outbound call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// A Tromero client session.
pub struct Tromero {
    chat: CompletionRouter,
    embeddings: Embeddings,
}

impl Tromero {
    /// Create a builder for a session.
    pub fn builder() -> TromeroBuilder {
        TromeroBuilder::new()
    }

    /// The chat completions surface.
    pub fn chat(&self) -> &CompletionRouter {
        &self.chat
    }

    /// The embeddings surface.
    pub fn embeddings(&self) -> &Embeddings {
        &self.embeddings
    }
}

/// Builder for a [`Tromero`] session.
#[derive(Default)]
pub struct TromeroBuilder {
    tromero_key: Option<SecretString>,
    api_key: Option<SecretString>,
    save_data_default: bool,
    location_preference: Option<String>,
    base_url: Option<String>,
    hosted_base_url: Option<String>,
    timeout: Option<Duration>,
    sink: Option<Arc<dyn InteractionSink>>,
}

impl TromeroBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routing-service credential (required). Falls back to the
    /// `TROMERO_API_KEY` environment variable.
    pub fn tromero_key(mut self, key: impl Into<String>) -> Self {
        self.tromero_key = Some(SecretString::from(key.into()));
        self
    }

    /// Hosted-provider credential (optional). Without one, every request is
    /// routed to the custom serving endpoints. Falls back to the
    /// `OPENAI_API_KEY` environment variable.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Session default for persisting interactions (default: false).
    pub const fn save_data_default(mut self, save: bool) -> Self {
        self.save_data_default = save;
        self
    }

    /// Regional routing preference forwarded to the registry.
    pub fn location_preference(mut self, location: impl Into<String>) -> Self {
        self.location_preference = Some(location.into());
        self
    }

    /// Override the routing service base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Override the hosted provider base URL.
    pub fn hosted_base_url(mut self, url: impl Into<String>) -> Self {
        self.hosted_base_url = Some(url.into());
        self
    }

    /// Override the transport-boundary timeout (default: 120s).
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replace the interaction sink (used by tests; defaults to the HTTP
    /// sink posting to `{base}/data`).
    pub fn interaction_sink(mut self, sink: Arc<dyn InteractionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Build the session.
    pub fn build(self) -> Result<Tromero> {
        let tromero_key = self
            .tromero_key
            .or_else(|| env_secret("TROMERO_API_KEY"))
            .ok_or_else(|| {
                TromeroError::Configuration(
                    "a Tromero key is required (builder tromero_key or TROMERO_API_KEY)".into(),
                )
            })?;
        let api_key = self.api_key.or_else(|| env_secret("OPENAI_API_KEY"));

        let http_client = reqwest::Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        let base_url = trim_base(self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL));
        let hosted_base_url = trim_base(
            self.hosted_base_url
                .as_deref()
                .unwrap_or(DEFAULT_HOSTED_BASE_URL),
        );

        let registry = Arc::new(RegistryClient::new(
            http_client.clone(),
            base_url.clone(),
            tromero_key.clone(),
            self.location_preference,
        ));
        let gateway = Arc::new(InferenceGateway::new(
            http_client.clone(),
            tromero_key.clone(),
        ));
        let hosted = api_key.map(|key| {
            Arc::new(HostedClient::new(
                http_client.clone(),
                hosted_base_url,
                key,
            ))
        });
        let sink: Arc<dyn InteractionSink> = self.sink.unwrap_or_else(|| {
            Arc::new(HttpInteractionSink::new(
                http_client,
                format!("{base_url}/data"),
                tromero_key,
            ))
        });

        let chat = CompletionRouter::new(
            hosted,
            gateway.clone(),
            registry.clone(),
            sink,
            self.save_data_default,
        );
        let embeddings = Embeddings::new(registry, gateway);

        Ok(Tromero { chat, embeddings })
    }
}

fn env_secret(name: &str) -> Option<SecretString> {
    std::env::var(name).ok().map(SecretString::from)
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_a_tromero_key() {
        // Guard against the env fallback masking the failure.
        if std::env::var("TROMERO_API_KEY").is_ok() {
            return;
        }
        let err = Tromero::builder().build().unwrap_err();
        assert!(matches!(err, TromeroError::Configuration(_)));
    }

    #[test]
    fn base_urls_are_normalized() {
        assert_eq!(trim_base("http://x/"), "http://x");
        assert_eq!(trim_base("http://x"), "http://x");
    }
}
