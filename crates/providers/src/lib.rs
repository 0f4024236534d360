//! Provider implementations for GradeLit.
//!
//! The generative-text, embedding, and speech-synthesis services are all
//! consumed as black boxes over HTTP. Most hosted backends expose an
//! OpenAI-compatible surface, so one implementation per trait covers them.
//! Speech failover across providers is the narration session's job; it
//! takes an ordered list of these providers and walks it itself.

pub mod embeddings;
pub mod generative;
pub mod speech;

pub use embeddings::OpenAiCompatEmbeddings;
pub use generative::OpenAiCompatGenerator;
pub use speech::HttpSpeechProvider;
