//! Per-job scratch storage.
//!
//! A [`ScratchArea`] owns the shared scratch root. Every job gets its own
//! uniquely named subdirectory as a [`TempResource`], which holds the staged
//! input and receives the encoder output. The directory is removed exactly
//! once: by an explicit [`TempResource::release`] or, failing that, on drop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tempfile::TempDir;

use ck_core::JobId;

/// Longest file extension carried into a scratch file name.
const MAX_EXTENSION_LEN: usize = 8;

/// Acquire/release counters shared by a [`ScratchArea`] and its resources.
#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Snapshot of the scratch counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScratchStats {
    pub acquired: u64,
    pub released: u64,
}

impl ScratchStats {
    /// Resources acquired but not yet released.
    pub fn outstanding(&self) -> u64 {
        self.acquired.saturating_sub(self.released)
    }
}

/// The shared scratch root.
#[derive(Debug)]
pub struct ScratchArea {
    root: PathBuf,
    sequence: AtomicU64,
    counters: Arc<Counters>,
}

impl ScratchArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sequence: AtomicU64::new(0),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn from_config(config: &ck_core::config::ScratchConfig) -> Self {
        Self::new(config.root.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stats(&self) -> ScratchStats {
        ScratchStats {
            acquired: self.counters.acquired.load(Ordering::SeqCst),
            released: self.counters.released.load(Ordering::SeqCst),
        }
    }

    /// Create a fresh scratch directory for `job_id`.
    ///
    /// The root is created if missing. The directory name combines the job
    /// id, the wall clock in milliseconds, a process-wide sequence number and
    /// a random suffix; creation is exclusive, so two jobs never share one.
    /// Filesystem calls run off the async worker threads.
    ///
    /// # Errors
    ///
    /// [`ck_core::Error::Resource`] if the root or the directory cannot be
    /// created.
    pub async fn acquire(
        &self,
        job_id: JobId,
        input_extension: &str,
        output_extension: &str,
    ) -> ck_core::Result<TempResource> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            ck_core::Error::resource(self.root.display(), format!("failed to create scratch root: {e}"))
        })?;

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let millis = chrono::Utc::now().timestamp_millis();
        let prefix = format!("{job_id}-{millis}-{seq}-");

        let root = self.root.clone();
        let dir_prefix = prefix.clone();
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(&dir_prefix)
                .rand_bytes(6)
                .tempdir_in(&root)
        })
        .await
        .map_err(|e| {
            ck_core::Error::resource(self.root.display(), format!("scratch directory task failed: {e}"))
        })?
        .map_err(|e| {
            ck_core::Error::resource(
                self.root.display(),
                format!("failed to create scratch directory: {e}"),
            )
        })?;

        let path = dir.path().to_path_buf();
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| prefix.trim_end_matches('-').to_string());

        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(job_id = %job_id, "Acquired scratch {}", path.display());

        Ok(TempResource {
            id,
            input_path: path.join(format!("input.{}", sanitize_extension(input_extension))),
            output_path: path.join(format!("output.{}", sanitize_extension(output_extension))),
            path,
            dir: Mutex::new(Some(dir)),
            counters: Arc::clone(&self.counters),
        })
    }
}

/// Lowercase alphanumeric extension, or `bin` when nothing usable remains.
fn sanitize_extension(ext: &str) -> String {
    let ext: String = ext
        .trim_start_matches('.')
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_EXTENSION_LEN)
        .collect::<String>()
        .to_ascii_lowercase();
    if ext.is_empty() {
        "bin".to_string()
    } else {
        ext
    }
}

/// One job's scratch directory.
#[derive(Debug)]
pub struct TempResource {
    id: String,
    path: PathBuf,
    input_path: PathBuf,
    output_path: PathBuf,
    dir: Mutex<Option<TempDir>>,
    counters: Arc<Counters>,
}

impl TempResource {
    /// Unique scratch identifier (the directory name).
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// File name of the staged input, e.g. `input.mov`.
    pub fn input_file_name(&self) -> String {
        file_name(&self.input_path)
    }

    /// File name the output is expected under, e.g. `output.mp4`.
    pub fn output_file_name(&self) -> String {
        file_name(&self.output_path)
    }

    pub fn is_released(&self) -> bool {
        self.dir.lock().is_none()
    }

    /// Write the source payload; the write has completed when this returns.
    pub async fn write_input(&self, data: &[u8]) -> ck_core::Result<()> {
        tokio::fs::write(&self.input_path, data).await.map_err(|e| {
            ck_core::Error::resource(self.input_path.display(), format!("failed to write input: {e}"))
        })
    }

    /// Remove the scratch directory.
    ///
    /// Idempotent. Works whether or not any output was produced. Removal
    /// failures are logged and swallowed.
    pub fn release(&self) {
        let Some(dir) = self.dir.lock().take() else {
            return;
        };
        self.counters.released.fetch_add(1, Ordering::SeqCst);

        match dir.close() {
            Ok(()) => tracing::debug!("Released scratch {}", self.path.display()),
            Err(e) => tracing::warn!("Failed to remove scratch {}: {e}", self.path.display()),
        }
    }
}

impl Drop for TempResource {
    fn drop(&mut self) {
        self.release();
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
