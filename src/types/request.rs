//! Completion request type and builder.

use serde_json::{Map, Value};

use super::chat::ChatMessage;

/// A chat completion request.
///
/// `params` is an open map of generation parameters; the formatter filters it
/// through the recognized allow-list before a custom-endpoint call, while the
/// hosted path passes it through verbatim. The routing-only fields (`tags`,
/// `use_fallback`, `fallback_model`, `save_data`) are never sent to either
/// backend.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Model name; resolved to a backend by the router.
    pub model: String,
    /// Conversation messages, in order.
    pub messages: Vec<ChatMessage>,
    /// Generation parameters (temperature, top_p, ...).
    pub params: Map<String, Value>,
    /// Free-form tags attached to the interaction record.
    pub tags: Vec<String>,
    /// Stream the response.
    pub stream: bool,
    /// Allow one retry against `fallback_model` on custom-endpoint failure.
    pub use_fallback: bool,
    /// Secondary model for the single fallback hop.
    pub fallback_model: Option<String>,
    /// Persist this interaction; falls back to the session default when unset.
    pub save_data: Option<bool>,
}

impl CompletionRequest {
    /// Create a builder for the completion request.
    pub fn builder() -> CompletionRequestBuilder {
        CompletionRequestBuilder::new()
    }
}

/// Completion request builder.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequestBuilder {
    request: CompletionRequest,
}

impl CompletionRequestBuilder {
    pub fn new() -> Self {
        Self {
            request: CompletionRequest {
                use_fallback: true,
                ..CompletionRequest::default()
            },
        }
    }

    /// Set the model name
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.request.model = model.into();
        self
    }

    /// Add a message to the request
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.request.messages.push(message);
        self
    }

    /// Add multiple messages to the request
    pub fn messages(mut self, messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        self.request.messages.extend(messages);
        self
    }

    /// Attach a tag to the interaction record
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.request.tags.push(tag.into());
        self
    }

    /// Attach multiple tags to the interaction record
    pub fn tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.request.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Enable streaming
    pub const fn stream(mut self, stream: bool) -> Self {
        self.request.stream = stream;
        self
    }

    /// Allow the single fallback hop (enabled by default)
    pub const fn use_fallback(mut self, use_fallback: bool) -> Self {
        self.request.use_fallback = use_fallback;
        self
    }

    /// Set the secondary model used for the fallback hop
    pub fn fallback_model(mut self, model: impl Into<String>) -> Self {
        self.request.fallback_model = Some(model.into());
        self
    }

    /// Override the session's save-data default for this request
    pub const fn save_data(mut self, save: bool) -> Self {
        self.request.save_data = Some(save);
        self
    }

    /// Set an arbitrary generation parameter by name
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.request.params.insert(key.into(), value.into());
        self
    }

    // Convenience setters for the common sampling controls

    /// Set the temperature
    pub fn temperature(self, temperature: f64) -> Self {
        self.param("temperature", temperature)
    }

    /// Set the top_p sampling parameter
    pub fn top_p(self, top_p: f64) -> Self {
        self.param("top_p", top_p)
    }

    /// Set the maximum number of tokens to generate
    pub fn max_tokens(self, max_tokens: u32) -> Self {
        self.param("max_tokens", max_tokens)
    }

    /// Set stop sequences
    pub fn stop(self, sequences: Vec<String>) -> Self {
        self.param("stop", sequences)
    }

    /// Set the random seed for reproducibility
    pub fn seed(self, seed: u64) -> Self {
        self.param("seed", seed)
    }

    /// Build the completion request
    pub fn build(self) -> CompletionRequest {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_enable_fallback() {
        let request = CompletionRequest::builder().model("m").build();
        assert!(request.use_fallback);
        assert!(request.fallback_model.is_none());
        assert!(!request.stream);
        assert!(request.save_data.is_none());
    }

    #[test]
    fn typed_setters_fill_the_params_map() {
        let request = CompletionRequest::builder()
            .model("m")
            .temperature(0.5)
            .max_tokens(128)
            .param("repetition_penalty", 1.1)
            .build();
        assert_eq!(request.params["temperature"], 0.5);
        assert_eq!(request.params["max_tokens"], 128);
        assert_eq!(request.params["repetition_penalty"], 1.1);
    }
}
