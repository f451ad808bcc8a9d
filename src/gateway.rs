//! Custom inference gateway.
//!
//! Talks to the serving endpoints the registry resolves fine-tuned models to:
//! `POST {url}/generate`, `POST {url}/generate_stream`, and `POST {url}/embed`.
//! The streaming wire format is parsed only here so a serving-side format
//! change touches one place.

use futures_util::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TromeroError};
use crate::streaming::ChatCompletionStream;
use crate::types::{ChatCompletionChunk, ChatMessage, EmbeddingResponse, Usage};

/// Adapter identifier sent for base models that need no adapter at inference
/// time.
pub const NO_ADAPTER: &str = "NO_ADAPTER";

/// Bytes preceding each streamed payload (the SSE `data:` tag). Wire-protocol
/// constant observed from the serving side; review alongside any change to
/// the stream format.
const SSE_DATA_PREFIX_LEN: usize = 5;

/// Extracts the `"token":{...}` object from a streamed payload. The serving
/// side emits one token object per chunk; a chunk without one ends the
/// stream.
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""token":(\{.*?\})"#).expect("token pattern is valid"));

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    adapter_name: &'a str,
    messages: &'a [ChatMessage],
    parameters: &'a Map<String, Value>,
}

/// Raw non-streaming payload from the serving endpoint, normalized into a
/// hosted-compatible completion by the router.
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub generated_text: String,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct StreamToken {
    text: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Client for the custom serving endpoints.
pub struct InferenceGateway {
    http_client: reqwest::Client,
    tromero_key: SecretString,
}

impl InferenceGateway {
    pub fn new(http_client: reqwest::Client, tromero_key: SecretString) -> Self {
        Self {
            http_client,
            tromero_key,
        }
    }

    /// Non-streaming generation call.
    pub async fn generate(
        &self,
        adapter_name: &str,
        model_url: &str,
        messages: &[ChatMessage],
        parameters: &Map<String, Value>,
    ) -> Result<GenerateResponse> {
        let body = GenerateRequest {
            adapter_name,
            messages,
            parameters,
        };
        let response = self
            .http_client
            .post(format!("{model_url}/generate"))
            .header("X-API-KEY", self.tromero_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(inference_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TromeroError::Inference {
                status: Some(status.as_u16()),
                message: format!("generate returned {status}"),
            });
        }
        response
            .json()
            .await
            .map_err(|e| TromeroError::Parse(format!("invalid generate response: {e}")))
    }

    /// Streaming generation call.
    ///
    /// Errors before the stream object exists (connect failure, non-success
    /// status) surface as `Err` so the router can still take the fallback
    /// hop; errors after that are yielded inside the stream.
    pub async fn generate_stream(
        &self,
        adapter_name: &str,
        model_url: &str,
        messages: &[ChatMessage],
        parameters: &Map<String, Value>,
    ) -> Result<ChatCompletionStream> {
        let body = GenerateRequest {
            adapter_name,
            messages,
            parameters,
        };
        let response = self
            .http_client
            .post(format!("{model_url}/generate_stream"))
            .header("X-API-KEY", self.tromero_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(inference_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TromeroError::Inference {
                status: Some(status.as_u16()),
                message: format!("generate_stream returned {status}"),
            });
        }

        let mut bytes = response.bytes_stream();
        let out = async_stream::stream! {
            while let Some(item) = bytes.next().await {
                let chunk = match item {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        yield Err(TromeroError::Stream(format!("stream transport error: {e}")));
                        return;
                    }
                };
                match parse_stream_chunk(&chunk) {
                    Ok(Some(token_text)) => {
                        yield Ok(ChatCompletionChunk::from_delta_text(token_text));
                    }
                    // No token object in the payload ends the stream.
                    Ok(None) => return,
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        };
        Ok(Box::pin(out))
    }

    /// Embedding call against an embedding-model route.
    pub async fn embed(
        &self,
        model: &str,
        model_url: &str,
        inputs: &[String],
    ) -> Result<EmbeddingResponse> {
        let body = EmbedRequest { inputs };
        let response = self
            .http_client
            .post(format!("{model_url}/embed"))
            .header("X-API-KEY", self.tromero_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(inference_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(TromeroError::Inference {
                status: Some(status.as_u16()),
                message: format!("embed returned {status}"),
            });
        }
        let payload: EmbedResponse = response
            .json()
            .await
            .map_err(|e| TromeroError::Parse(format!("invalid embed response: {e}")))?;
        Ok(EmbeddingResponse::from_vectors(payload.embeddings, model))
    }
}

/// Extract the token text from one streamed payload.
///
/// Returns `Ok(None)` when the payload carries no token object, which the
/// serving side uses to mark the end of the stream.
fn parse_stream_chunk(chunk: &[u8]) -> Result<Option<String>> {
    let text = std::str::from_utf8(chunk)
        .map_err(|e| TromeroError::Stream(format!("non-utf8 stream chunk: {e}")))?;
    let Some(payload) = text.get(SSE_DATA_PREFIX_LEN..) else {
        return Ok(None);
    };
    let Some(captures) = TOKEN_PATTERN.captures(payload) else {
        return Ok(None);
    };
    let token: StreamToken = serde_json::from_str(&captures[1])
        .map_err(|e| TromeroError::Parse(format!("invalid stream token: {e}")))?;
    Ok(Some(token.text))
}

fn inference_error(e: reqwest::Error) -> TromeroError {
    TromeroError::Inference {
        status: e.status().map(|s| s.as_u16()),
        message: e.to_string(),
    }
}
