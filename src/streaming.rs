//! Stream reassembly.
//!
//! Streaming responses are forwarded to the caller chunk-by-chunk while the
//! text deltas are invisibly accumulated into the full assistant message for
//! logging. The end-of-turn sentinel is excluded from accumulation but still
//! yielded to the caller unchanged.

use futures::Stream;
use futures_util::StreamExt;
use serde_json::{Map, Value};
use std::pin::Pin;
use std::sync::Arc;

use crate::error::TromeroError;
use crate::logger::{InteractionRecord, InteractionSink, spawn_save};
use crate::types::{ChatCompletionChunk, ChatMessage};

/// End-of-turn marker emitted by the serving side. Wire-protocol constant;
/// review alongside any serving-side change.
pub const END_OF_TEXT_SENTINEL: &str = "</s>";

/// Chat completion stream - a pinned, boxed stream of hosted-compatible
/// chunks. Both backends produce this type.
pub type ChatCompletionStream =
    Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, TromeroError>> + Send>>;

/// Everything needed to build the interaction record once the stream ends.
pub struct StreamLogContext {
    /// Formatted request messages; the accumulated assistant message is
    /// appended on finalization.
    pub messages: Vec<ChatMessage>,
    pub model: String,
    /// Parameters actually sent to the backend.
    pub parameters: Map<String, Value>,
    pub tags: Vec<String>,
    /// Resolved save-data decision for this request.
    pub save_data: bool,
    pub sink: Arc<dyn InteractionSink>,
}

/// Wrap a stream so that every chunk is forwarded unchanged while its text
/// delta accumulates into the full assistant message.
///
/// Finalization runs exactly once: on natural completion (zero chunks
/// included) or after an in-stream error. It appends the accumulated text as
/// a single assistant message, builds the record, and persists it
/// fire-and-forget when `save_data` is set. An in-stream error is re-yielded
/// to the caller after finalization.
pub fn reassemble(inner: ChatCompletionStream, ctx: StreamLogContext) -> ChatCompletionStream {
    let out = async_stream::stream! {
        let mut inner = inner;
        let mut full_message = String::new();
        let mut pending_error: Option<TromeroError> = None;

        while let Some(item) = inner.next().await {
            match item {
                Ok(chunk) => {
                    if let Some(delta) = chunk.delta_text()
                        && delta != END_OF_TEXT_SENTINEL
                    {
                        full_message.push_str(delta);
                    }
                    yield Ok(chunk);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "error while streaming response");
                    pending_error = Some(e);
                    break;
                }
            }
        }

        let StreamLogContext { mut messages, model, parameters, tags, save_data, sink } = ctx;
        messages.push(ChatMessage::assistant(full_message));
        if save_data {
            let record = InteractionRecord::new(messages, model, parameters, &tags);
            spawn_save(sink, record);
        }

        if let Some(e) = pending_error {
            yield Err(e);
        }
    };
    Box::pin(out)
}
