//! # GradeLit Core
//!
//! Domain types, traits, and error definitions for the GradeLit graded-reading
//! pipeline. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator (catalog, generative text, embeddings, speech
//! synthesis, key-value storage) is defined as a trait here. Implementations
//! live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod catalog;
pub mod chunk;
pub mod error;
pub mod event;
pub mod level;
pub mod provider;
pub mod simplify;
pub mod store;
pub mod timing;

// Re-export key types at crate root for ergonomics
pub use catalog::Catalog;
pub use chunk::{BookId, SourceChunk};
pub use error::{CacheError, CatalogError, Error, NarrationError, ProviderError, Result};
pub use event::{DomainEvent, EventBus, Handoff};
pub use level::{CefrLevel, Era};
pub use provider::{
    EmbeddingProvider, GeneratedText, GenerationPrompt, GenerativeProvider, SpeechOutput,
    SpeechProvider, VoiceParams,
};
pub use simplify::{
    GenerationParams, PromptStrategy, Quality, RuleViolation, SimplificationResult,
};
pub use store::{BlobStore, CacheEntry, CacheKey, CacheStore};
pub use timing::WordTiming;
