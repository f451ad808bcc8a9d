//! Chat message and completion types.
//!
//! Responses share one hosted-compatible shape regardless of which backend
//! served the request: custom-endpoint payloads are normalized into
//! [`ChatCompletion`] by the router, so callers never branch on provenance.

use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single message in a conversation. Ordering matters; the formatter
/// collapses a leading run of system messages into one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Token usage reported by either backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// One completion choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatMessage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// A non-streaming chat completion response, hosted-compatible shape.
///
/// Zero choices is a valid response; the router returns it as-is and logs
/// nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatCompletion {
    /// Builds the one-choice assistant completion the custom endpoint's raw
    /// `{generated_text, usage}` payload is normalized into.
    pub fn from_generated_text(generated_text: impl Into<String>, usage: Option<Usage>) -> Self {
        Self {
            choices: vec![Choice {
                index: 0,
                message: ChatMessage::assistant(generated_text),
                finish_reason: None,
            }],
            usage,
            ..Self::default()
        }
    }

    /// Content of the first choice, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// Delta carried by one streaming chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<MessageRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// One choice within a streaming chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// A streaming chat completion chunk, hosted-compatible shape.
///
/// Chunks are opaque passthrough units: the stream reassembler forwards them
/// unchanged while accumulating their text deltas for logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    /// Wraps a raw token text into a hosted-compatible delta chunk.
    pub fn from_delta_text(text: impl Into<String>) -> Self {
        Self {
            choices: vec![ChunkChoice {
                index: 0,
                delta: ChunkDelta {
                    role: Some(MessageRole::Assistant),
                    content: Some(text.into()),
                },
                finish_reason: None,
            }],
            ..Self::default()
        }
    }

    /// Text delta of the first choice, if any.
    pub fn delta_text(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.delta.content.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_generated_text_into_one_assistant_choice() {
        let completion = ChatCompletion::from_generated_text(
            "Hello there!",
            Some(Usage {
                prompt_tokens: 3,
                completion_tokens: 4,
                total_tokens: 7,
            }),
        );
        assert_eq!(completion.choices.len(), 1);
        assert_eq!(completion.choices[0].message.role, MessageRole::Assistant);
        assert_eq!(completion.first_text(), Some("Hello there!"));
        assert_eq!(completion.usage.as_ref().unwrap().total_tokens, 7);
    }

    #[test]
    fn chunk_delta_text_reads_first_choice() {
        let chunk = ChatCompletionChunk::from_delta_text("Hel");
        assert_eq!(chunk.delta_text(), Some("Hel"));

        let empty = ChatCompletionChunk::default();
        assert_eq!(empty.delta_text(), None);
    }

    #[test]
    fn deserializes_hosted_response_shape() {
        let json = serde_json::json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1677652288,
            "model": "gpt-4",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21}
        });
        let completion: ChatCompletion = serde_json::from_value(json).unwrap();
        assert_eq!(completion.model.as_deref(), Some("gpt-4"));
        assert_eq!(completion.first_text(), Some("Hi"));
        assert_eq!(completion.choices[0].finish_reason.as_deref(), Some("stop"));
    }
}
