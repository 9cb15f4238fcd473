//! ck-core: shared types, errors, configuration, and job events.
//!
//! This crate is the foundational dependency for all other ck-* crates,
//! providing the error taxonomy, a typed job identifier, media-family
//! classification, application configuration, and the progress event
//! plumbing used by every backend.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, ErrorKind, Result};
pub use events::{JobEvent, JobEventPayload, JobState, ProgressSender, ProgressTracker};
pub use ids::JobId;
pub use media::MediaFamily;
