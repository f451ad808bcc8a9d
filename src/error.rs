//! Error types for the Tromero client.
//!
//! The taxonomy distinguishes where a failure originated because the router's
//! fallback only applies to custom-endpoint failures and registry misses;
//! hosted-provider failures always propagate to the caller.

use thiserror::Error;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, TromeroError>;

/// Errors surfaced by the Tromero client.
#[derive(Error, Debug)]
pub enum TromeroError {
    /// Failure from the hosted provider (HTTP error or error payload).
    #[error("hosted provider error{}: {message}", fmt_status(.status))]
    Hosted {
        /// HTTP status code, when the request got far enough to have one.
        status: Option<u16>,
        message: String,
    },

    /// Failure from a custom inference endpoint (`/generate`, `/generate_stream`, `/embed`).
    #[error("inference endpoint error{}: {message}", fmt_status(.status))]
    Inference {
        /// HTTP status code, when the request got far enough to have one.
        status: Option<u16>,
        message: String,
    },

    /// The routing service could not resolve the model to a serving endpoint.
    #[error("failed to resolve model '{model}': {message}")]
    Routing { model: String, message: String },

    /// An embedding operation was requested on a model that is not an
    /// embedding model. Raised before any inference call is attempted.
    #[error("'{model}' is not an embedding model; provide an embedding model name")]
    NotEmbeddingModel { model: String },

    /// Failure persisting an interaction record. Always swallowed by the
    /// logger after being surfaced as a warning.
    #[error("data endpoint error{}: {message}", fmt_status(.status))]
    DataLog {
        status: Option<u16>,
        message: String,
    },

    /// Error raised while iterating a streaming response.
    #[error("stream error: {0}")]
    Stream(String),

    /// A response body could not be parsed into the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid client configuration (missing credential, bad URL, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Transport-level failure not attributable to a specific remote surface.
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl TromeroError {
    /// Whether the router may retry this failure against the fallback model.
    ///
    /// Only custom-endpoint failures and registry misses qualify; hosted
    /// failures and local validation errors never trigger a fallback hop.
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            Self::Inference { .. } | Self::Routing { .. } | Self::Http(_)
        )
    }

    /// HTTP status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Hosted { status, .. } | Self::Inference { status, .. } => *status,
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (status {code})"),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_eligibility_by_origin() {
        let inference = TromeroError::Inference {
            status: Some(502),
            message: "bad gateway".into(),
        };
        let routing = TromeroError::Routing {
            model: "missing".into(),
            message: "unknown model".into(),
        };
        let hosted = TromeroError::Hosted {
            status: Some(401),
            message: "bad key".into(),
        };

        assert!(inference.is_fallback_eligible());
        assert!(routing.is_fallback_eligible());
        assert!(!hosted.is_fallback_eligible());
        assert!(
            !TromeroError::NotEmbeddingModel {
                model: "m".into()
            }
            .is_fallback_eligible()
        );
    }

    #[test]
    fn status_code_is_preserved_in_display() {
        let err = TromeroError::Inference {
            status: Some(503),
            message: "overloaded".into(),
        };
        assert_eq!(err.status_code(), Some(503));
        assert!(err.to_string().contains("503"));
    }
}
