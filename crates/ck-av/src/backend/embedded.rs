//! Embedded-engine backend.
//!
//! The engine itself is not part of this crate. It is reached through two
//! traits: an [`EngineLoader`] that produces an [`EngineInstance`] once, and
//! the instance's in-memory filesystem plus `exec`. [`SharedEngine`] holds
//! the single loaded instance for the whole process.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tokio::sync::OnceCell;

use super::{accept_output, panic_message, ExecutionOutcome, ExecutionRequest, FailureKind};

/// A loaded engine: a private in-memory filesystem and an entry point that
/// accepts the same argument list as the external binary.
#[async_trait]
pub trait EngineInstance: Send + Sync {
    async fn write_file(&self, name: &str, data: Bytes) -> ck_core::Result<()>;

    /// Run one encode. `progress` receives raw completion fractions.
    async fn exec(&self, args: &[String], progress: &(dyn Fn(f64) + Send + Sync)) -> ck_core::Result<()>;

    /// Read a file back; a missing file is an error.
    async fn read_file(&self, name: &str) -> ck_core::Result<Bytes>;

    async fn delete_file(&self, name: &str) -> ck_core::Result<()>;
}

/// Produces the engine instance on first use.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    async fn load(&self) -> ck_core::Result<Arc<dyn EngineInstance>>;
}

/// Loader used when no engine is linked into the deployment.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableEngine;

#[async_trait]
impl EngineLoader for UnavailableEngine {
    async fn load(&self) -> ck_core::Result<Arc<dyn EngineInstance>> {
        Err(ck_core::Error::tool("engine", "no embedded engine is available in this build"))
    }
}

/// The process-wide engine, loaded lazily behind an initialization barrier.
///
/// The first caller runs the loader while concurrent callers wait on the
/// same cell. A loaded instance is never replaced; a failed load leaves the
/// cell empty so a later job tries again.
pub struct SharedEngine {
    loader: Box<dyn EngineLoader>,
    instance: OnceCell<Arc<dyn EngineInstance>>,
    load_attempts: AtomicUsize,
}

impl SharedEngine {
    pub fn new(loader: impl EngineLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            instance: OnceCell::new(),
            load_attempts: AtomicUsize::new(0),
        }
    }

    /// A shared engine whose every load fails.
    pub fn unavailable() -> Self {
        Self::new(UnavailableEngine)
    }

    /// Get the loaded instance, loading it first if needed.
    pub async fn get(&self) -> ck_core::Result<Arc<dyn EngineInstance>> {
        let instance = self
            .instance
            .get_or_try_init(|| async {
                let attempt = self.load_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::info!("Loading embedded engine (attempt {attempt})");
                let instance = self.loader.load().await?;
                tracing::info!("Embedded engine loaded and cached for reuse");
                Ok::<_, ck_core::Error>(instance)
            })
            .await?;
        Ok(Arc::clone(instance))
    }

    pub fn is_loaded(&self) -> bool {
        self.instance.initialized()
    }

    /// How many times the loader has been invoked.
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for SharedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedEngine")
            .field("loaded", &self.is_loaded())
            .field("load_attempts", &self.load_attempts())
            .finish_non_exhaustive()
    }
}

/// Replays plans against the [`SharedEngine`].
#[derive(Debug, Clone)]
pub struct EmbeddedEngineBackend {
    engine: Arc<SharedEngine>,
}

impl EmbeddedEngineBackend {
    pub fn new(engine: Arc<SharedEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<SharedEngine> {
        &self.engine
    }

    pub async fn execute(&self, request: &ExecutionRequest<'_>) -> ck_core::Result<ExecutionOutcome> {
        let engine = match self.engine.get().await {
            Ok(engine) => engine,
            Err(e) => return Ok(ExecutionOutcome::failure(FailureKind::Unavailable, e.to_string())),
        };

        // Buffer names are scoped by the scratch id, unique per job.
        let scratch_id = request.scratch.id();
        let input_name = format!("{scratch_id}-{}", request.scratch.input_file_name());
        let output_name = format!("{scratch_id}-{}", request.scratch.output_file_name());
        let args = request.plan.to_args(&input_name, &output_name);

        tracing::debug!(job_id = %request.job_id, "Embedded encode: {}", args.join(" "));

        let attempt = AssertUnwindSafe(async {
            engine.write_file(&input_name, request.input.clone()).await?;
            engine.exec(&args, request.progress).await?;
            Ok::<_, ck_core::Error>(engine.read_file(&output_name).await?)
        })
        .catch_unwind()
        .await;

        for name in [&input_name, &output_name] {
            if let Err(e) = engine.delete_file(name).await {
                tracing::debug!("Engine buffer {name} not deleted: {e}");
            }
        }

        Ok(match attempt {
            Ok(Ok(output)) => accept_output(request.plan.output_format(), output),
            Ok(Err(e)) => ExecutionOutcome::failure(FailureKind::Engine, e.to_string()),
            Err(panic) => ExecutionOutcome::failure(
                FailureKind::Panicked,
                format!("engine panicked: {}", panic_message(panic.as_ref())),
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::ScratchArea;
    use assert_matches::assert_matches;
    use ck_core::JobId;
    use ck_plan::{build, CommandPlan, OperationKind, OptionsBag};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Clone, Copy, PartialEq)]
    enum Script {
        CopyInput,
        Fail,
        Panic,
    }

    /// In-memory engine that "encodes" by copying the input buffer.
    struct FakeEngine {
        files: Mutex<HashMap<String, Bytes>>,
        script: Script,
    }

    #[async_trait]
    impl EngineInstance for FakeEngine {
        async fn write_file(&self, name: &str, data: Bytes) -> ck_core::Result<()> {
            self.files.lock().insert(name.to_string(), data);
            Ok(())
        }

        async fn exec(&self, args: &[String], progress: &(dyn Fn(f64) + Send + Sync)) -> ck_core::Result<()> {
            match self.script {
                Script::Fail => return Err(ck_core::Error::tool("engine", "conversion failed")),
                Script::Panic => panic!("engine aborted"),
                Script::CopyInput => {}
            }
            let input = &args[1];
            let output = args.last().cloned().unwrap_or_default();
            let data = self.files.lock().get(input).cloned().unwrap_or_default();
            progress(0.5);
            self.files.lock().insert(output, data);
            progress(1.0);
            Ok(())
        }

        async fn read_file(&self, name: &str) -> ck_core::Result<Bytes> {
            self.files
                .lock()
                .get(name)
                .cloned()
                .ok_or_else(|| ck_core::Error::tool("engine", format!("{name}: no such file")))
        }

        async fn delete_file(&self, name: &str) -> ck_core::Result<()> {
            self.files.lock().remove(name);
            Ok(())
        }
    }

    struct FakeLoader {
        engine: Arc<FakeEngine>,
        failures_left: Mutex<usize>,
    }

    impl FakeLoader {
        fn new(script: Script) -> (Self, Arc<FakeEngine>) {
            let engine = Arc::new(FakeEngine {
                files: Mutex::new(HashMap::new()),
                script,
            });
            let loader = Self {
                engine: Arc::clone(&engine),
                failures_left: Mutex::new(0),
            };
            (loader, engine)
        }
    }

    #[async_trait]
    impl EngineLoader for FakeLoader {
        async fn load(&self) -> ck_core::Result<Arc<dyn EngineInstance>> {
            tokio::task::yield_now().await;
            {
                let mut left = self.failures_left.lock();
                if *left > 0 {
                    *left -= 1;
                    return Err(ck_core::Error::tool("engine", "wasm fetch failed"));
                }
            }
            Ok(self.engine.clone() as Arc<dyn EngineInstance>)
        }
    }

    async fn run(backend: &EmbeddedEngineBackend, plan: &CommandPlan, input: &'static [u8]) -> (ExecutionOutcome, Vec<f64>) {
        let tmp = tempfile::tempdir().unwrap();
        let area = ScratchArea::new(tmp.path());
        let scratch = area.acquire(JobId::new(), "gif", plan.output_format().extension()).await.unwrap();
        let input = Bytes::from_static(input);
        let seen = Mutex::new(Vec::new());
        let progress = |f: f64| seen.lock().push(f);
        let request = ExecutionRequest {
            job_id: JobId::new(),
            plan,
            input: &input,
            scratch: &scratch,
            progress: &progress,
        };
        let outcome = backend.execute(&request).await.unwrap();
        let fractions = seen.lock().clone();
        (outcome, fractions)
    }

    fn gif_plan() -> CommandPlan {
        build(OperationKind::ImageSequenceToGif, &OptionsBag::new()).unwrap()
    }

    #[tokio::test]
    async fn success_round_trips_and_cleans_buffers() {
        let (loader, engine) = FakeLoader::new(Script::CopyInput);
        let backend = EmbeddedEngineBackend::new(Arc::new(SharedEngine::new(loader)));

        let (outcome, fractions) = run(&backend, &gif_plan(), b"GIF89a-frames").await;
        assert_matches!(outcome, ExecutionOutcome::Success { byte_length: 13, .. });
        assert_eq!(fractions, vec![0.5, 1.0]);
        assert!(engine.files.lock().is_empty());
    }

    #[tokio::test]
    async fn engine_error_is_failure_and_cleans_buffers() {
        let (loader, engine) = FakeLoader::new(Script::Fail);
        let backend = EmbeddedEngineBackend::new(Arc::new(SharedEngine::new(loader)));

        let (outcome, _) = run(&backend, &gif_plan(), b"GIF89a").await;
        assert_matches!(outcome, ExecutionOutcome::Failure { kind: FailureKind::Engine, .. });
        assert!(engine.files.lock().is_empty());
    }

    #[tokio::test]
    async fn engine_panic_is_caught_and_cleans_buffers() {
        let (loader, engine) = FakeLoader::new(Script::Panic);
        let backend = EmbeddedEngineBackend::new(Arc::new(SharedEngine::new(loader)));

        let (outcome, _) = run(&backend, &gif_plan(), b"GIF89a").await;
        assert_matches!(
            outcome,
            ExecutionOutcome::Failure { kind: FailureKind::Panicked, ref message } if message.contains("engine aborted")
        );
        assert!(engine.files.lock().is_empty());
    }

    #[tokio::test]
    async fn wrong_container_is_invalid_output() {
        let (loader, _engine) = FakeLoader::new(Script::CopyInput);
        let backend = EmbeddedEngineBackend::new(Arc::new(SharedEngine::new(loader)));

        let (outcome, _) = run(&backend, &gif_plan(), b"\x89PNG\r\n\x1a\n").await;
        assert_matches!(outcome, ExecutionOutcome::Failure { kind: FailureKind::InvalidOutput, .. });
    }

    #[tokio::test]
    async fn unavailable_engine() {
        let backend = EmbeddedEngineBackend::new(Arc::new(SharedEngine::unavailable()));
        let (outcome, _) = run(&backend, &gif_plan(), b"GIF89a").await;
        assert_matches!(outcome, ExecutionOutcome::Failure { kind: FailureKind::Unavailable, .. });
        assert!(!backend.engine().is_loaded());
    }

    #[tokio::test]
    async fn concurrent_first_use_loads_once() {
        let (loader, _engine) = FakeLoader::new(Script::CopyInput);
        let shared = Arc::new(SharedEngine::new(loader));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move { shared.get().await.map(|_| ()) })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(shared.load_attempts(), 1);
        assert!(shared.is_loaded());
    }

    #[tokio::test]
    async fn failed_load_is_retried_later() {
        let (loader, _engine) = FakeLoader::new(Script::CopyInput);
        *loader.failures_left.lock() = 1;
        let shared = SharedEngine::new(loader);

        assert!(shared.get().await.is_err());
        assert!(!shared.is_loaded());
        assert!(shared.get().await.is_ok());
        assert_eq!(shared.load_attempts(), 2);
    }
}
