//! Interaction logging.
//!
//! Every completed exchange is persisted through an [`InteractionSink`] for
//! later retraining. Persistence is fire-and-forget: [`spawn_save`] detaches
//! the write onto a background task and deliberately does not await it, so the
//! caller's response is never delayed. Sink failures are logged at `warn`
//! level and swallowed; they never reach the caller and are never retried.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::error::{Result, TromeroError};
use crate::format::tags_to_string;
use crate::types::ChatMessage;

/// A fully-known exchange, created once a response (or a completed stream) is
/// available and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionRecord {
    /// Request messages plus the produced assistant message.
    pub messages: Vec<ChatMessage>,
    pub model: String,
    /// The parameters actually sent to the backend.
    pub parameters: Map<String, Value>,
    /// ISO-8601 creation timestamp.
    pub creation_time: String,
    /// Comma-joined tags.
    pub tags: String,
}

impl InteractionRecord {
    pub fn new(
        messages: Vec<ChatMessage>,
        model: impl Into<String>,
        parameters: Map<String, Value>,
        tags: &[String],
    ) -> Self {
        Self {
            messages,
            model: model.into(),
            parameters,
            creation_time: Utc::now().to_rfc3339(),
            tags: tags_to_string(tags),
        }
    }
}

/// Destination for interaction records.
///
/// The seam exists so the router does not care whether records go over HTTP or
/// into a test capture.
#[async_trait]
pub trait InteractionSink: Send + Sync {
    async fn save(&self, record: InteractionRecord) -> Result<()>;
}

/// Sink that posts records to the routing service's data endpoint.
pub struct HttpInteractionSink {
    http_client: reqwest::Client,
    data_url: String,
    tromero_key: SecretString,
}

impl HttpInteractionSink {
    pub fn new(http_client: reqwest::Client, data_url: String, tromero_key: SecretString) -> Self {
        Self {
            http_client,
            data_url,
            tromero_key,
        }
    }
}

#[async_trait]
impl InteractionSink for HttpInteractionSink {
    async fn save(&self, record: InteractionRecord) -> Result<()> {
        let response = self
            .http_client
            .post(&self.data_url)
            .header("X-API-KEY", self.tromero_key.expose_secret())
            .json(&record)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TromeroError::DataLog {
                status: Some(status.as_u16()),
                message: format!("data endpoint returned {status}"),
            });
        }
        Ok(())
    }
}

/// Detach a record write onto a background task.
///
/// Intentionally not awaited: the spawned task outlives the request that
/// produced the record, and its outcome only surfaces as a warning.
pub fn spawn_save(sink: Arc<dyn InteractionSink>, record: InteractionRecord) {
    tokio::spawn(async move {
        let model = record.model.clone();
        if let Err(e) = sink.save(record).await {
            tracing::warn!(model = %model, error = %e, "failed to save interaction record");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_serializes_with_comma_joined_tags_and_iso_time() {
        let record = InteractionRecord::new(
            vec![ChatMessage::user("Hi"), ChatMessage::assistant("Hello")],
            "my-model",
            Map::new(),
            &["a".to_string(), "b".to_string()],
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["tags"], json!("a,b"));
        assert_eq!(value["model"], json!("my-model"));
        assert_eq!(value["messages"].as_array().unwrap().len(), 2);
        // RFC 3339 timestamps parse back with chrono.
        let ts = value["creation_time"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }
}
