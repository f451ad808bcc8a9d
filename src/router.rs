//! Completion router.
//!
//! Decides, per request, whether a completion is served by the hosted
//! provider or by a custom fine-tuned model behind the routing service, and
//! owns the single fallback hop. The router composes a hosted client, the
//! inference gateway, the registry, and an interaction sink rather than
//! specializing any provider type.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::Instrument;

use crate::error::{Result, TromeroError};
use crate::format::{ROUTING_FIELDS, format_messages, format_parameters};
use crate::gateway::{InferenceGateway, NO_ADAPTER};
use crate::hosted::HostedClient;
use crate::logger::{InteractionRecord, InteractionSink, spawn_save};
use crate::registry::RegistryClient;
use crate::streaming::{ChatCompletionStream, StreamLogContext, reassemble};
use crate::types::{ChatCompletion, ChatMessage, CompletionRequest};

/// Result of a routed completion, matching the request's `stream` flag.
pub enum Completion {
    Full(ChatCompletion),
    Stream(ChatCompletionStream),
}

impl Completion {
    /// Unwraps a non-streaming completion.
    pub fn into_full(self) -> Option<ChatCompletion> {
        match self {
            Self::Full(response) => Some(response),
            Self::Stream(_) => None,
        }
    }

    /// Unwraps a streaming completion.
    pub fn into_stream(self) -> Option<ChatCompletionStream> {
        match self {
            Self::Full(_) => None,
            Self::Stream(stream) => Some(stream),
        }
    }
}

/// Routes completion requests between the hosted provider and the custom
/// serving endpoints.
pub struct CompletionRouter {
    hosted: Option<Arc<HostedClient>>,
    gateway: Arc<InferenceGateway>,
    registry: Arc<RegistryClient>,
    sink: Arc<dyn InteractionSink>,
    save_data_default: bool,
}

impl CompletionRouter {
    pub fn new(
        hosted: Option<Arc<HostedClient>>,
        gateway: Arc<InferenceGateway>,
        registry: Arc<RegistryClient>,
        sink: Arc<dyn InteractionSink>,
        save_data_default: bool,
    ) -> Self {
        Self {
            hosted,
            gateway,
            registry,
            sink,
            save_data_default,
        }
    }

    /// Create a completion, routed per the request's model.
    ///
    /// On a fallback-eligible failure (custom endpoint or registry) with
    /// `use_fallback` set and a `fallback_model` present, the entire request
    /// is re-dispatched exactly once with the fallback model and
    /// `use_fallback` forced off.
    pub async fn create(&self, request: CompletionRequest) -> Result<Completion> {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("completion", %request_id, model = %request.model);

        let mut request = request;
        async move {
            match self.dispatch(&request).await {
                Ok(completion) => Ok(completion),
                Err(e)
                    if e.is_fallback_eligible()
                        && request.use_fallback
                        && request.fallback_model.is_some() =>
                {
                    let fallback = request.fallback_model.take().unwrap_or_default();
                    tracing::warn!(
                        error = %e,
                        fallback_model = %fallback,
                        "error in making request to model; using fallback model"
                    );
                    request.model = fallback;
                    request.use_fallback = false;
                    self.dispatch(&request).await
                }
                Err(e) => Err(e),
            }
        }
        .instrument(span)
        .await
    }

    /// One routing pass, no fallback handling.
    async fn dispatch(&self, request: &CompletionRequest) -> Result<Completion> {
        let messages = format_messages(&request.messages);
        let save_data = request.save_data.unwrap_or(self.save_data_default);

        if let Some(hosted) = &self.hosted
            && hosted.is_hosted_model(&request.model).await
        {
            return self.dispatch_hosted(hosted, request, messages, save_data).await;
        }
        self.dispatch_custom(request, messages, save_data).await
    }

    async fn dispatch_hosted(
        &self,
        hosted: &HostedClient,
        request: &CompletionRequest,
        messages: Vec<ChatMessage>,
        save_data: bool,
    ) -> Result<Completion> {
        // Everything the caller passed goes through except the routing-only
        // fields, which are already held outside the params map; this strips
        // any that were set by name.
        let params: Map<String, Value> = request
            .params
            .iter()
            .filter(|(key, _)| !ROUTING_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        if request.stream {
            let stream = hosted
                .chat_stream(&request.model, &messages, &params)
                .await?;
            return Ok(Completion::Stream(reassemble(
                stream,
                StreamLogContext {
                    messages,
                    model: request.model.clone(),
                    parameters: params,
                    tags: request.tags.clone(),
                    save_data,
                    sink: self.sink.clone(),
                },
            )));
        }

        let response = hosted.chat(&request.model, &messages, &params).await?;
        self.log_completion(&response, &messages, &request.model, params, &request.tags, save_data);
        Ok(Completion::Full(response))
    }

    async fn dispatch_custom(
        &self,
        request: &CompletionRequest,
        messages: Vec<ChatMessage>,
        save_data: bool,
    ) -> Result<Completion> {
        let route = self.registry.resolve(&request.model).await?;
        let params = format_parameters(&request.params);
        let adapter_name = if route.is_base_model {
            NO_ADAPTER
        } else {
            &request.model
        };

        if request.stream {
            let stream = self
                .gateway
                .generate_stream(adapter_name, &route.url, &messages, &params)
                .await?;
            return Ok(Completion::Stream(reassemble(
                stream,
                StreamLogContext {
                    messages,
                    model: request.model.clone(),
                    parameters: params,
                    tags: request.tags.clone(),
                    save_data,
                    sink: self.sink.clone(),
                },
            )));
        }

        let raw = self
            .gateway
            .generate(adapter_name, &route.url, &messages, &params)
            .await?;
        let response = ChatCompletion::from_generated_text(raw.generated_text, raw.usage);
        self.log_completion(&response, &messages, &request.model, params, &request.tags, save_data);
        Ok(Completion::Full(response))
    }

    /// Emit one interaction record per choice, fire-and-forget. A response
    /// with zero choices is returned as-is and logs nothing.
    ///
    /// `parameters` holds the set actually sent to the selected backend:
    /// routing-stripped for the hosted path, allow-list-filtered for the
    /// custom path.
    fn log_completion(
        &self,
        response: &ChatCompletion,
        messages: &[ChatMessage],
        model: &str,
        parameters: Map<String, Value>,
        tags: &[String],
        save_data: bool,
    ) {
        if !save_data {
            return;
        }
        for choice in &response.choices {
            let mut record_messages = messages.to_vec();
            record_messages.push(choice.message.clone());
            let record =
                InteractionRecord::new(record_messages, model, parameters.clone(), tags);
            spawn_save(self.sink.clone(), record);
        }
    }
}
