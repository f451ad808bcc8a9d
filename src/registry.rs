//! Model registry client.
//!
//! Resolves a model name to its serving endpoint through the routing service
//! and caches the result for the lifetime of the session. There is no
//! invalidation path: a rotated serving URL requires a new session.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::{Result, TromeroError};

/// A resolved serving route for one model.
#[derive(Debug, Clone)]
pub struct ModelRoute {
    pub model: String,
    /// Base URL of the serving endpoint (`/generate` etc. are appended).
    pub url: String,
    /// Base models are served without an adapter (`NO_ADAPTER`).
    pub is_base_model: bool,
    pub is_embedding_model: bool,
}

#[derive(Debug, Deserialize)]
struct ModelUrlResponse {
    url: String,
    #[serde(default)]
    base_model: bool,
    #[serde(default)]
    embedding_model: bool,
}

/// Client for the routing service's model lookup endpoint.
pub struct RegistryClient {
    http_client: reqwest::Client,
    base_url: String,
    tromero_key: SecretString,
    location_preference: Option<String>,
    // Written at most once per model name, read thereafter; a racing first
    // write stores an identical value.
    routes: RwLock<HashMap<String, ModelRoute>>,
}

impl RegistryClient {
    pub fn new(
        http_client: reqwest::Client,
        base_url: String,
        tromero_key: SecretString,
        location_preference: Option<String>,
    ) -> Self {
        Self {
            http_client,
            base_url,
            tromero_key,
            location_preference,
            routes: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a model name to its serving route, consulting the session
    /// cache first. Lookup failures propagate; callers must not retry beyond
    /// the router's single fallback hop.
    pub async fn resolve(&self, model: &str) -> Result<ModelRoute> {
        if let Some(route) = self.cached(model) {
            return Ok(route);
        }

        let url = format!("{}/model/{}/url", self.base_url, model);
        let mut request = self
            .http_client
            .get(&url)
            .header("X-API-KEY", self.tromero_key.expose_secret());
        if let Some(location) = &self.location_preference {
            request = request.query(&[("location_preference", location)]);
        }

        let response = request.send().await.map_err(|e| TromeroError::Routing {
            model: model.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(TromeroError::Routing {
                model: model.to_string(),
                message: format!("model lookup returned {status}"),
            });
        }
        let payload: ModelUrlResponse =
            response.json().await.map_err(|e| TromeroError::Routing {
                model: model.to_string(),
                message: format!("invalid model lookup response: {e}"),
            })?;

        let route = ModelRoute {
            model: model.to_string(),
            url: payload.url,
            is_base_model: payload.base_model,
            is_embedding_model: payload.embedding_model,
        };
        self.routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model.to_string(), route.clone());
        Ok(route)
    }

    /// Resolve a route for an embedding request, failing fast when the model
    /// is not an embedding model — before any inference call is attempted.
    pub async fn resolve_embedding(&self, model: &str) -> Result<ModelRoute> {
        let route = self.resolve(model).await?;
        if !route.is_embedding_model {
            return Err(TromeroError::NotEmbeddingModel {
                model: model.to_string(),
            });
        }
        Ok(route)
    }

    // The cache only ever holds fully-built routes, so a poisoned lock still
    // yields a usable map.
    fn cached(&self, model: &str) -> Option<ModelRoute> {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(model)
            .cloned()
    }
}
