//! Embedding response types.

use serde::{Deserialize, Serialize};

use super::chat::Usage;

/// One embedding vector with its input index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingData {
    #[serde(default)]
    pub index: u32,
    pub embedding: Vec<f32>,
}

/// Embedding response, hosted-compatible shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    #[serde(default)]
    pub data: Vec<EmbeddingData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl EmbeddingResponse {
    /// Builds the response from the raw vectors returned by the serving
    /// endpoint, assigning input order as the index.
    pub fn from_vectors(vectors: Vec<Vec<f32>>, model: impl Into<String>) -> Self {
        Self {
            data: vectors
                .into_iter()
                .enumerate()
                .map(|(index, embedding)| EmbeddingData {
                    index: index as u32,
                    embedding,
                })
                .collect(),
            model: Some(model.into()),
            usage: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vectors_preserves_input_order() {
        let response =
            EmbeddingResponse::from_vectors(vec![vec![0.1, 0.2], vec![0.3, 0.4]], "embed-model");
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.data[0].index, 0);
        assert_eq!(response.data[1].index, 1);
        assert_eq!(response.data[1].embedding, vec![0.3, 0.4]);
        assert_eq!(response.model.as_deref(), Some("embed-model"));
    }
}
