//! Embeddings surface.

use std::sync::Arc;

use crate::error::Result;
use crate::gateway::InferenceGateway;
use crate::registry::RegistryClient;
use crate::types::EmbeddingResponse;

/// Embedding requests against embedding-model routes.
pub struct Embeddings {
    registry: Arc<RegistryClient>,
    gateway: Arc<InferenceGateway>,
}

impl Embeddings {
    pub fn new(registry: Arc<RegistryClient>, gateway: Arc<InferenceGateway>) -> Self {
        Self { registry, gateway }
    }

    /// Embed the inputs with the named model.
    ///
    /// The route is resolved first and a non-embedding model fails before any
    /// inference call is attempted.
    pub async fn create(
        &self,
        inputs: impl IntoIterator<Item = impl Into<String>>,
        model: &str,
    ) -> Result<EmbeddingResponse> {
        let route = self.registry.resolve_embedding(model).await?;
        let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
        self.gateway.embed(model, &route.url, &inputs).await
    }
}
