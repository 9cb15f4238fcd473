//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which owns a temporary scratch root and builds
//! [`JobController`]s against it, plus [`FakeEngine`] (an in-memory stand-in
//! for the embedded engine) and, on unix, [`fake_ffmpeg`] for scripting the
//! local backend.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use ck_av::tools::FFMPEG;
use ck_av::{
    EmbeddedEngineBackend, EngineInstance, EngineLoader, LocalProcessBackend, ScratchArea,
    SharedEngine, ToolRegistry,
};
use ck_core::{JobEvent, JobEventPayload, JobState, ProgressSender};
use convertkit::{JobController, JobControllerBuilder};

/// A minimal valid GIF header; passes the gif container check.
pub const GIF_BYTES: &[u8] = b"GIF89a\x01\x00\x01\x00\x00\x00\x00;";

/// How the fake engine behaves on `exec`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineScript {
    /// Copy the input buffer to the output buffer, reporting 0.25 then 1.0.
    CopyInput,
    /// Copy the input buffer without reporting any progress.
    CopySilently,
    Fail,
    Panic,
}

/// In-memory engine that "encodes" by copying the input buffer.
pub struct FakeEngine {
    script: EngineScript,
    files: Mutex<HashMap<String, Bytes>>,
    written: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn new(script: EngineScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            files: Mutex::new(HashMap::new()),
            written: Mutex::new(Vec::new()),
        })
    }

    /// Every buffer name ever written, in order.
    pub fn written(&self) -> Vec<String> {
        self.written.lock().clone()
    }

    /// Buffers still present in the engine filesystem.
    pub fn live_files(&self) -> usize {
        self.files.lock().len()
    }
}

#[async_trait]
impl EngineInstance for FakeEngine {
    async fn write_file(&self, name: &str, data: Bytes) -> ck_core::Result<()> {
        self.written.lock().push(name.to_string());
        self.files.lock().insert(name.to_string(), data);
        Ok(())
    }

    async fn exec(&self, args: &[String], progress: &(dyn Fn(f64) + Send + Sync)) -> ck_core::Result<()> {
        match self.script {
            EngineScript::Fail => return Err(ck_core::Error::tool("engine", "conversion failed")),
            EngineScript::Panic => panic!("engine aborted"),
            EngineScript::CopyInput | EngineScript::CopySilently => {}
        }
        let report = self.script == EngineScript::CopyInput;
        let input = args
            .iter()
            .position(|a| a == "-i")
            .and_then(|i| args.get(i + 1))
            .cloned()
            .unwrap_or_default();
        let output = args.last().cloned().unwrap_or_default();
        let data = self.files.lock().get(&input).cloned().unwrap_or_default();
        if report {
            progress(0.25);
        }
        tokio::task::yield_now().await;
        self.files.lock().insert(output, data);
        if report {
            progress(1.0);
        }
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

/// Hands out one [`FakeEngine`], or panics when asked to.
pub struct FakeLoader {
    engine: Option<Arc<FakeEngine>>,
}

impl FakeLoader {
    pub fn returning(engine: Arc<FakeEngine>) -> Self {
        Self { engine: Some(engine) }
    }

    pub fn panicking() -> Self {
        Self { engine: None }
    }
}

#[async_trait]
impl EngineLoader for FakeLoader {
    async fn load(&self) -> ck_core::Result<Arc<dyn EngineInstance>> {
        tokio::task::yield_now().await;
        match &self.engine {
            Some(engine) => Ok(engine.clone() as Arc<dyn EngineInstance>),
            None => panic!("engine module failed to instantiate"),
        }
    }
}

/// Records every event a controller publishes.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<JobEvent>>>,
}

impl EventLog {
    pub fn sender(&self) -> ProgressSender {
        let sink = Arc::clone(&self.events);
        ProgressSender::new(move |e| sink.lock().push(e))
    }

    pub fn states(&self) -> Vec<JobState> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e.payload {
                JobEventPayload::StateChanged { state } => Some(state),
                JobEventPayload::Progress { .. } => None,
            })
            .collect()
    }

    /// Every payload, in publication order.
    pub fn payloads(&self) -> Vec<JobEventPayload> {
        self.events.lock().iter().map(|e| e.payload.clone()).collect()
    }

    pub fn progress(&self) -> Vec<f64> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e.payload {
                JobEventPayload::Progress { fraction } => Some(fraction),
                JobEventPayload::StateChanged { .. } => None,
            })
            .collect()
    }
}

/// A temporary scratch root plus an event log.
pub struct TestHarness {
    pub dir: tempfile::TempDir,
    pub scratch: Arc<ScratchArea>,
    pub events: EventLog,
}

impl TestHarness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let scratch = Arc::new(ScratchArea::new(dir.path().join("scratch")));
        Self {
            dir,
            scratch,
            events: EventLog::default(),
        }
    }

    /// A controller builder with no backends, wired to this harness.
    pub fn builder(&self) -> JobControllerBuilder {
        JobController::builder(Arc::clone(&self.scratch)).observer(self.events.sender())
    }

    /// Local backend whose ffmpeg cannot be found.
    pub fn missing_local(&self) -> LocalProcessBackend {
        LocalProcessBackend::new(Arc::new(ToolRegistry::default()), None)
    }

    /// Local backend running `ffmpeg` at `path`.
    pub fn local_at(&self, path: impl Into<PathBuf>) -> LocalProcessBackend {
        LocalProcessBackend::new(Arc::new(ToolRegistry::default().with_tool(FFMPEG, path)), None)
    }

    pub fn embedded(&self, loader: FakeLoader) -> EmbeddedEngineBackend {
        EmbeddedEngineBackend::new(Arc::new(SharedEngine::new(loader)))
    }

    /// Entries left under the scratch root.
    pub fn scratch_entries(&self) -> usize {
        match std::fs::read_dir(self.scratch.root()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

/// Write an executable shell script standing in for ffmpeg.
#[cfg(unix)]
pub fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-ffmpeg");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Script body that copies the `-i` input to the last argument, with
/// progress markers up to half way.
pub const COPY_INPUT: &str = r#"
in=""; prev=""
for a in "$@"; do [ "$prev" = "-i" ] && in="$a"; prev="$a"; done
eval "out=\${$#}"
echo "  Duration: 00:00:04.00, start: 0.000000" >&2
echo "out_time_us=2000000" >&2
cp "$in" "$out"
echo "progress=end" >&2
"#;

/// Script body that reports 60% progress and then fails.
pub const FAIL_AFTER_PROGRESS: &str = r#"
echo "  Duration: 00:00:10.00, start: 0.000000" >&2
echo "out_time_us=6000000" >&2
echo "progress=continue" >&2
echo "Conversion failed!" >&2
exit 1
"#;
