//! Hosted provider client.
//!
//! A minimal OpenAI-compatible client covering the two surfaces the router
//! needs: chat completions (plain and streaming) and the model listing used
//! for the hosted-membership check. Everything transport-level (TLS, pooling,
//! timeouts) is delegated to `reqwest`.

use eventsource_stream::Eventsource;
use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::{PoisonError, RwLock};

use crate::error::{Result, TromeroError};
use crate::streaming::ChatCompletionStream;
use crate::types::{ChatCompletion, ChatCompletionChunk, ChatMessage};

/// SSE payload marking the end of a hosted stream.
const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// Client for the hosted provider.
pub struct HostedClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    // Hosted model names, fetched once per session on first successful
    // listing. Written at most once; a racing first write is idempotent.
    models: RwLock<Option<Vec<String>>>,
}

impl HostedClient {
    pub fn new(http_client: reqwest::Client, base_url: String, api_key: SecretString) -> Self {
        Self {
            http_client,
            base_url,
            api_key,
            models: RwLock::new(None),
        }
    }

    /// Whether the hosted provider serves this model, per its model listing.
    ///
    /// The listing is fetched once and cached for the session. A listing
    /// failure is treated as "not hosted" and is not cached, so a later
    /// request may retry the listing.
    pub async fn is_hosted_model(&self, model: &str) -> bool {
        if let Some(models) = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return models.iter().any(|m| m == model);
        }
        match self.list_models().await {
            Ok(models) => {
                let hosted = models.iter().any(|m| m == model);
                // A poisoned lock still holds a valid listing (or None).
                *self.models.write().unwrap_or_else(PoisonError::into_inner) = Some(models);
                hosted
            }
            Err(e) => {
                tracing::warn!(error = %e, "hosted model listing failed; treating model as not hosted");
                false
            }
        }
    }

    /// Fetch the hosted provider's model listing.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .http_client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .send()
            .await
            .map_err(hosted_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TromeroError::Hosted {
                status: Some(status.as_u16()),
                message: format!("model listing returned {status}"),
            });
        }
        let list: ModelList = response
            .json()
            .await
            .map_err(|e| TromeroError::Parse(format!("invalid model listing: {e}")))?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    /// Non-streaming chat completion, parameters passed through verbatim.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &Map<String, Value>,
    ) -> Result<ChatCompletion> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&chat_body(model, messages, params, false))
            .send()
            .await
            .map_err(hosted_error)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TromeroError::Hosted {
                status: Some(status.as_u16()),
                message: format!("chat completion returned {status}: {message}"),
            });
        }
        response
            .json()
            .await
            .map_err(|e| TromeroError::Parse(format!("invalid chat completion: {e}")))
    }

    /// Streaming chat completion over SSE.
    pub async fn chat_stream(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &Map<String, Value>,
    ) -> Result<ChatCompletionStream> {
        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&chat_body(model, messages, params, true))
            .send()
            .await
            .map_err(hosted_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TromeroError::Hosted {
                status: Some(status.as_u16()),
                message: format!("chat completion returned {status}"),
            });
        }

        let mut events = response.bytes_stream().eventsource();
        let out = async_stream::stream! {
            while let Some(item) = events.next().await {
                let event = match item {
                    Ok(event) => event,
                    Err(e) => {
                        yield Err(TromeroError::Stream(format!("SSE stream error: {e}")));
                        return;
                    }
                };
                let data = event.data.trim();
                if data.is_empty() {
                    continue;
                }
                if data == DONE_MARKER {
                    return;
                }
                match serde_json::from_str::<ChatCompletionChunk>(data) {
                    Ok(chunk) => yield Ok(chunk),
                    Err(e) => {
                        yield Err(TromeroError::Parse(format!("invalid stream chunk: {e}")));
                        return;
                    }
                }
            }
        };
        Ok(Box::pin(out))
    }
}

fn chat_body(
    model: &str,
    messages: &[ChatMessage],
    params: &Map<String, Value>,
    stream: bool,
) -> Value {
    let mut body = Map::new();
    body.insert("model".to_string(), json!(model));
    body.insert("messages".to_string(), json!(messages));
    for (key, value) in params {
        body.insert(key.clone(), value.clone());
    }
    if stream {
        body.insert("stream".to_string(), json!(true));
    }
    Value::Object(body)
}

fn hosted_error(e: reqwest::Error) -> TromeroError {
    TromeroError::Hosted {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_body_merges_params_and_omits_stream_when_disabled() {
        let mut params = Map::new();
        params.insert("temperature".to_string(), json!(0.7));
        let body = chat_body("gpt-4", &[ChatMessage::user("Hi")], &params, false);
        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["temperature"], 0.7);
        assert_eq!(body["messages"][0]["content"], "Hi");
        assert!(body.get("stream").is_none());

        let streaming = chat_body("gpt-4", &[], &params, true);
        assert_eq!(streaming["stream"], true);
    }

    #[tokio::test]
    async fn model_cache_survives_a_poisoned_lock() {
        let client = HostedClient::new(
            reqwest::Client::new(),
            "http://unused.invalid".to_string(),
            SecretString::from("test-key"),
        );
        *client.models.write().unwrap() = Some(vec!["gpt-4".to_string()]);

        // Panic while holding the write guard to poison the lock.
        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = client.models.write().unwrap();
            panic!("poisoning the model cache");
        }));
        assert!(poisoned.is_err());

        // The cached listing is still consulted without panicking.
        assert!(client.is_hosted_model("gpt-4").await);
        assert!(!client.is_hosted_model("other").await);
    }
}
