//! Job lifecycle and progress events.
//!
//! The controller publishes [`JobEvent`]s through a [`ProgressSender`].
//! Backends report raw fractions into a [`ProgressTracker`], which clamps
//! them to `[0, 1]` and never lets the published value go backwards.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::ids::JobId;

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Stage of the transcode job state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Validating,
    Preparing,
    ExecutingLocal,
    ExecutingEmbedded,
    Finalizing,
    CleaningUp,
    Done,
    Failed,
}

impl JobState {
    /// Whether no further transitions can follow this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validating => "validating",
            Self::Preparing => "preparing",
            Self::ExecutingLocal => "executing(local)",
            Self::ExecutingEmbedded => "executing(embedded)",
            Self::Finalizing => "finalizing",
            Self::CleaningUp => "cleaning_up",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// JobEvent
// ---------------------------------------------------------------------------

/// Payload describing what happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEventPayload {
    StateChanged { state: JobState },
    Progress { fraction: f64 },
}

/// A timestamped event for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub timestamp: DateTime<Utc>,
    pub payload: JobEventPayload,
}

impl JobEvent {
    pub fn state(job_id: JobId, state: JobState) -> Self {
        Self {
            job_id,
            timestamp: Utc::now(),
            payload: JobEventPayload::StateChanged { state },
        }
    }

    pub fn progress(job_id: JobId, fraction: f64) -> Self {
        Self {
            job_id,
            timestamp: Utc::now(),
            payload: JobEventPayload::Progress { fraction },
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressSender
// ---------------------------------------------------------------------------

/// Sender for job events.
///
/// Wraps a callback; cloning shares the same callback.
#[derive(Clone)]
pub struct ProgressSender {
    callback: Arc<dyn Fn(JobEvent) + Send + Sync>,
}

impl ProgressSender {
    /// Create a new sender from the given callback.
    pub fn new(callback: impl Fn(JobEvent) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// Create a no-op sender that discards all events.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn send(&self, event: JobEvent) {
        (self.callback)(event);
    }
}

impl Default for ProgressSender {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for ProgressSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressSender").finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ProgressTracker
// ---------------------------------------------------------------------------

/// Per-job progress gate shared by every backend attempt of that job.
///
/// Reported fractions are clamped to `[0, 1]`; values at or below the last
/// published fraction are dropped, so a fallback attempt that restarts from
/// zero never makes the caller's progress bar move backwards.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    job_id: JobId,
    last: Arc<Mutex<f64>>,
    sender: ProgressSender,
}

impl ProgressTracker {
    pub fn new(job_id: JobId, sender: ProgressSender) -> Self {
        Self {
            job_id,
            last: Arc::new(Mutex::new(0.0)),
            sender,
        }
    }

    /// Report a raw fraction. Returns the fraction actually published, if any.
    pub fn report(&self, fraction: f64) -> Option<f64> {
        if !fraction.is_finite() {
            return None;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        {
            let mut last = self.last.lock();
            if fraction <= *last {
                return None;
            }
            *last = fraction;
        }
        self.sender.send(JobEvent::progress(self.job_id, fraction));
        Some(fraction)
    }

    /// Mark the job complete.
    pub fn complete(&self) {
        self.report(1.0);
    }

    /// The last published fraction.
    pub fn current(&self) -> f64 {
        *self.last.lock()
    }
}
