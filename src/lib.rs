#![deny(missing_docs)]

//! Core library for the jsonrag retrieval utility.

/// Retrieve-then-generate answer pipeline.
pub mod ask;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// JSON-to-text flattening.
pub mod flatten;
/// Answer-generation client abstraction and adapters.
pub mod generation;
/// Document discovery and indexing pipeline.
pub mod indexing;
/// Structured logging and tracing setup.
pub mod logging;
/// Query pipeline, result formatting, and the interactive loop.
pub mod query;
/// Qdrant vector store integration.
pub mod qdrant;
