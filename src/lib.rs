//! Tromero client library
//!
//! A drop-in chat-completion client that transparently routes each request to
//! either a hosted provider or a custom fine-tuned model served by the Tromero
//! routing service, while asynchronously logging every interaction for later
//! retraining.
//!
//! # Example
//!
//! ```rust,no_run
//! use tromero::prelude::*;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Tromero::builder()
//!         .tromero_key("tr-key")
//!         .api_key("sk-key")
//!         .save_data_default(true)
//!         .build()?;
//!
//!     let request = CompletionRequest::builder()
//!         .model("my-finetuned-model")
//!         .message(ChatMessage::user("Hello!"))
//!         .temperature(0.7)
//!         .fallback_model("gpt-4o-mini")
//!         .build();
//!
//!     match client.chat().create(request).await? {
//!         Completion::Full(response) => {
//!             println!("{}", response.first_text().unwrap_or_default());
//!         }
//!         Completion::Stream(_stream) => unreachable!("stream flag not set"),
//!     }
//!     Ok(())
//! }
//! ```
#![deny(unsafe_code)]

pub mod client;
pub mod embeddings;
pub mod error;
pub mod format;
pub mod gateway;
pub mod hosted;
pub mod logger;
pub mod registry;
pub mod router;
pub mod streaming;
pub mod types;

pub use client::{Tromero, TromeroBuilder};
pub use error::{Result, TromeroError};
pub use router::Completion;

/// Convenient re-exports for the common surface of the library.
pub mod prelude {
    pub use crate::client::{Tromero, TromeroBuilder};
    pub use crate::error::{Result, TromeroError};
    pub use crate::router::Completion;
    pub use crate::streaming::ChatCompletionStream;
    pub use crate::types::{
        ChatCompletion, ChatCompletionChunk, ChatMessage, CompletionRequest, EmbeddingResponse,
        MessageRole,
    };
}
