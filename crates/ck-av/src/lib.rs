//! # ck-av
//!
//! Everything in convertkit that touches the outside world during a job.
//!
//! - **Tool discovery** ([`ToolRegistry`]): locate `ffmpeg` and `ffprobe`.
//! - **Command execution** ([`ToolCommand`]): async process runner with an
//!   optional timeout and streamed stderr.
//! - **Scratch storage** ([`ScratchArea`], [`TempResource`]): one
//!   uniquely-named directory per job, released exactly once.
//! - **Backends** ([`Backend`]): the local-process encoder and the
//!   embedded engine behind one `execute`.

pub mod backend;
pub mod command;
pub mod scratch;
pub mod tools;

pub use backend::{
    Backend, EmbeddedEngineBackend, EngineInstance, EngineLoader, ExecutionOutcome,
    ExecutionRequest, FailureKind, LocalProcessBackend, SharedEngine, UnavailableEngine,
};
pub use command::{CommandError, ToolCommand, ToolOutput};
pub use scratch::{ScratchArea, ScratchStats, TempResource};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
