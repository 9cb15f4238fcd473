//! Execution backends.
//!
//! A [`Backend`] replays a [`CommandPlan`] against a job's staged input and
//! reports an [`ExecutionOutcome`]. The set is closed: an external encoder
//! process ([`LocalProcessBackend`]) and an in-process engine
//! ([`EmbeddedEngineBackend`]). Both finish through [`accept_output`], so
//! whatever either one returns as `Success` has passed the same check.

pub mod embedded;
pub mod local;
pub mod progress;

use std::any::Any;
use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use ck_core::JobId;
use ck_plan::{CommandPlan, OutputFormat};

use crate::scratch::TempResource;

pub use embedded::{EmbeddedEngineBackend, EngineInstance, EngineLoader, SharedEngine, UnavailableEngine};
pub use local::LocalProcessBackend;
pub use progress::FfmpegProgress;

/// Why an execution attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Binary or engine missing.
    Unavailable,
    /// Encoder exited non-zero.
    ExitStatus,
    /// No output, or an empty one.
    MissingOutput,
    /// Output does not carry the expected container signature.
    InvalidOutput,
    Timeout,
    /// The engine returned an error.
    Engine,
    Io,
    Panicked,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unavailable => "unavailable",
            Self::ExitStatus => "exit status",
            Self::MissingOutput => "missing output",
            Self::InvalidOutput => "invalid output",
            Self::Timeout => "timeout",
            Self::Engine => "engine error",
            Self::Io => "i/o error",
            Self::Panicked => "panicked",
        };
        f.write_str(s)
    }
}

/// Result of one backend attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success { output: Bytes, byte_length: u64 },
    Failure { kind: FailureKind, message: String },
}

impl ExecutionOutcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Everything a backend needs for one attempt.
pub struct ExecutionRequest<'a> {
    pub job_id: JobId,
    pub plan: &'a CommandPlan,
    /// Source payload, already written to `scratch.input_path()`.
    pub input: &'a Bytes,
    pub scratch: &'a TempResource,
    /// Receives raw completion fractions.
    pub progress: &'a (dyn Fn(f64) + Send + Sync),
}

impl fmt::Debug for ExecutionRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionRequest")
            .field("job_id", &self.job_id)
            .field("plan", &self.plan.kind())
            .field("input_len", &self.input.len())
            .field("scratch", &self.scratch.id())
            .finish_non_exhaustive()
    }
}

/// The closed set of executors, tried in order by the job controller.
#[derive(Debug)]
pub enum Backend {
    LocalProcess(LocalProcessBackend),
    EmbeddedEngine(EmbeddedEngineBackend),
}

impl Backend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::LocalProcess(_) => "local-process",
            Self::EmbeddedEngine(_) => "embedded-engine",
        }
    }

    /// Run one attempt.
    ///
    /// An `Err` is an unexpected fault inside the backend; callers treat it
    /// exactly like a `Failure` outcome.
    pub async fn execute(&self, request: &ExecutionRequest<'_>) -> ck_core::Result<ExecutionOutcome> {
        match self {
            Self::LocalProcess(b) => b.execute(request).await,
            Self::EmbeddedEngine(b) => b.execute(request).await,
        }
    }
}

impl From<LocalProcessBackend> for Backend {
    fn from(b: LocalProcessBackend) -> Self {
        Self::LocalProcess(b)
    }
}

impl From<EmbeddedEngineBackend> for Backend {
    fn from(b: EmbeddedEngineBackend) -> Self {
        Self::EmbeddedEngine(b)
    }
}

/// The downstream validity check shared by every backend: output must be
/// non-empty and start with the container signature of `format`.
pub fn accept_output(format: OutputFormat, output: Bytes) -> ExecutionOutcome {
    if output.is_empty() {
        return ExecutionOutcome::failure(FailureKind::MissingOutput, "encoder produced an empty output");
    }
    if !format.matches_signature(&output) {
        return ExecutionOutcome::failure(
            FailureKind::InvalidOutput,
            format!("output is not a valid {format} container"),
        );
    }
    let byte_length = output.len() as u64;
    ExecutionOutcome::Success { output, byte_length }
}

/// Best-effort text of a caught panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
