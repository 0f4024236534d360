//! The simplification pipeline.
//!
//! [`SimplificationService`] is the public entry point: it resolves the
//! source chunk, consults the versioned cache, collapses concurrent
//! identical requests into one flight, and drives the retry/fallback
//! controller for misses. The controller never surfaces a quality failure
//! as an error; exhausted attempts serve the original text.

pub mod controller;
pub mod engine;
pub mod routing;
pub mod service;
pub mod single_flight;

pub use controller::RetryController;
pub use engine::SimplificationEngine;
pub use service::SimplificationService;
pub use single_flight::SingleFlight;
