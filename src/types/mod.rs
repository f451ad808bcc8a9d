//! Core data types for requests, responses, and embeddings.

pub mod chat;
pub mod embedding;
pub mod request;

pub use chat::*;
pub use embedding::*;
pub use request::*;
