//! The transcode job controller.
//!
//! A [`JobController`] drives one [`TranscodeRequest`] through
//! `Validating -> Preparing -> Executing(Local) -> [Executing(Embedded)] ->
//! Finalizing -> CleaningUp -> Done | Failed`, publishing each transition and
//! every progress step as a [`JobEvent`].

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use tracing::Instrument;

use ck_av::backend::panic_message;
use ck_av::{
    Backend, EmbeddedEngineBackend, ExecutionOutcome, ExecutionRequest, LocalProcessBackend,
    ScratchArea, SharedEngine, TempResource,
};
use ck_core::config::{Config, LimitsConfig};
use ck_core::{Error, JobEvent, JobId, JobState, ProgressSender, ProgressTracker, Result};

use crate::packager::{pack, TranscodeResult};
use crate::request::TranscodeRequest;
use crate::validate::{validate, ValidatedJob};

/// Drives requests end to end. Cheap to share; jobs are independent.
#[derive(Debug)]
pub struct JobController {
    scratch: Arc<ScratchArea>,
    backends: Vec<Backend>,
    limits: LimitsConfig,
    observer: ProgressSender,
}

/// Builder for [`JobController`].
#[derive(Debug)]
pub struct JobControllerBuilder {
    scratch: Arc<ScratchArea>,
    backends: Vec<Backend>,
    limits: LimitsConfig,
    observer: ProgressSender,
}

impl JobControllerBuilder {
    /// Append a backend to the try-list.
    pub fn backend(mut self, backend: impl Into<Backend>) -> Self {
        self.backends.push(backend.into());
        self
    }

    pub fn limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    /// Receive every job's state transitions and progress.
    pub fn observer(mut self, observer: ProgressSender) -> Self {
        self.observer = observer;
        self
    }

    pub fn build(self) -> JobController {
        JobController {
            scratch: self.scratch,
            backends: self.backends,
            limits: self.limits,
            observer: self.observer,
        }
    }
}

impl JobController {
    /// Start a controller with no backends.
    pub fn builder(scratch: Arc<ScratchArea>) -> JobControllerBuilder {
        JobControllerBuilder {
            scratch,
            backends: Vec::new(),
            limits: LimitsConfig::default(),
            observer: ProgressSender::noop(),
        }
    }

    /// The default deployment: local process first, then the embedded engine
    /// unless it is disabled.
    pub fn from_config(config: &Config, engine: Arc<SharedEngine>) -> JobControllerBuilder {
        let mut builder = Self::builder(Arc::new(ScratchArea::from_config(&config.scratch)))
            .limits(config.limits.clone())
            .backend(LocalProcessBackend::from_config(config));
        if config.engine.enabled {
            builder = builder.backend(EmbeddedEngineBackend::new(engine));
        }
        builder
    }

    pub fn scratch(&self) -> &Arc<ScratchArea> {
        &self.scratch
    }

    /// Names of the backends in the order they are tried.
    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(Backend::name).collect()
    }

    /// Run one request to completion.
    ///
    /// # Errors
    ///
    /// One of the four taxonomy kinds (see [`ck_core::ErrorKind`]); an
    /// [`Error::Encoding`] carries context from every backend attempt.
    pub async fn run(&self, request: &TranscodeRequest) -> Result<TranscodeResult> {
        let job_id = JobId::new();
        let span = tracing::info_span!("job", job_id = %job_id.short(), operation = %request.operation());
        self.run_job(job_id, request).instrument(span).await
    }

    async fn run_job(&self, job_id: JobId, request: &TranscodeRequest) -> Result<TranscodeResult> {
        let emit = |state: JobState| {
            tracing::debug!("-> {state}");
            self.observer.send(JobEvent::state(job_id, state));
        };

        tracing::info!(
            "Job started: {} ({} bytes, {})",
            request.filename(),
            request.source().len(),
            request.operation()
        );

        emit(JobState::Validating);
        let job = match validate(request, &self.limits) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!("Job rejected: {e}");
                emit(JobState::Failed);
                return Err(e);
            }
        };
        tracing::debug!("Plan: {}", job.plan);

        emit(JobState::Preparing);
        let scratch = match self
            .scratch
            .acquire(job_id, &job.source_extension, job.plan.output_format().extension())
            .await
        {
            Ok(scratch) => scratch,
            Err(e) => {
                tracing::error!("Job failed: {e}");
                emit(JobState::Failed);
                return Err(e);
            }
        };

        let tracker = ProgressTracker::new(job_id, self.observer.clone());
        let result = match scratch.write_input(request.source()).await {
            Ok(()) => self
                .execute(job_id, &job, request.source(), &scratch, &tracker, &emit)
                .await
                .map(|output| {
                    emit(JobState::Finalizing);
                    let packed = pack(
                        output,
                        request.source().len() as u64,
                        request.filename(),
                        job.plan.output_format(),
                    );
                    tracker.complete();
                    packed
                }),
            Err(e) => Err(e),
        };

        emit(JobState::CleaningUp);
        scratch.release();

        match result {
            Ok(result) => {
                tracing::info!(
                    "Job done: {} ({} -> {} bytes)",
                    result.filename,
                    result.original_size,
                    result.output_size
                );
                emit(JobState::Done);
                Ok(result)
            }
            Err(e) => {
                tracing::error!("Job failed: {e}");
                emit(JobState::Failed);
                Err(e)
            }
        }
    }

    /// Try each backend in order until one succeeds.
    ///
    /// A `Failure` outcome, an `Err` and a panic are handled identically.
    async fn execute(
        &self,
        job_id: JobId,
        job: &ValidatedJob,
        input: &Bytes,
        scratch: &TempResource,
        tracker: &ProgressTracker,
        emit: &(impl Fn(JobState) + Sync),
    ) -> Result<Bytes> {
        let progress = |fraction: f64| {
            tracker.report(fraction);
        };
        let request = ExecutionRequest {
            job_id,
            plan: &job.plan,
            input,
            scratch,
            progress: &progress,
        };

        let mut attempts = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            emit(match backend {
                Backend::LocalProcess(_) => JobState::ExecutingLocal,
                Backend::EmbeddedEngine(_) => JobState::ExecutingEmbedded,
            });

            let attempt = AssertUnwindSafe(backend.execute(&request)).catch_unwind().await;
            let failure = match attempt {
                Ok(Ok(ExecutionOutcome::Success { output, byte_length })) => {
                    tracing::debug!("{} produced {byte_length} bytes", backend.name());
                    return Ok(output);
                }
                Ok(Ok(ExecutionOutcome::Failure { kind, message })) => format!("{kind}: {message}"),
                Ok(Err(e)) => format!("error: {e}"),
                Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
            };

            tracing::warn!("{} backend failed: {failure}", backend.name());
            attempts.push(format!("{} {failure}", backend.name()));
        }

        if attempts.is_empty() {
            return Err(Error::encoding("no execution backend is configured"));
        }
        Err(Error::encoding(format!(
            "all backends failed: {}",
            attempts.join("; ")
        )))
    }
}
