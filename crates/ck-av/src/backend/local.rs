//! Local-process backend: replays the plan through the external `ffmpeg`
//! binary against the job's scratch directory.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::progress::FfmpegProgress;
use super::{accept_output, ExecutionOutcome, ExecutionRequest, FailureKind};
use crate::command::{CommandError, ToolCommand};
use crate::tools::{ToolRegistry, FFMPEG};

/// Flags placed before the plan: quiet banner, no stdin, overwrite, and
/// machine-readable progress blocks on stderr.
const PREFIX_ARGS: &[&str] = &["-hide_banner", "-nostdin", "-y", "-progress", "pipe:2", "-nostats"];

#[derive(Debug, Clone)]
pub struct LocalProcessBackend {
    tools: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl LocalProcessBackend {
    pub fn new(tools: Arc<ToolRegistry>, timeout: Option<Duration>) -> Self {
        Self { tools, timeout }
    }

    /// Discover `ffmpeg` and take the timeout from configuration.
    pub fn from_config(config: &ck_core::config::Config) -> Self {
        Self::new(
            Arc::new(ToolRegistry::discover(&config.tools)),
            config.local.timeout(),
        )
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The full argument list for one run.
    pub fn command_args(&self, request: &ExecutionRequest<'_>) -> Vec<String> {
        let mut args: Vec<String> = PREFIX_ARGS.iter().map(|s| s.to_string()).collect();
        args.extend(request.plan.to_args(
            &path_arg(request.scratch.input_path()),
            &path_arg(request.scratch.output_path()),
        ));
        args
    }

    pub async fn execute(&self, request: &ExecutionRequest<'_>) -> ck_core::Result<ExecutionOutcome> {
        let ffmpeg = match self.tools.require(FFMPEG) {
            Ok(tool) => tool,
            Err(e) => return Ok(ExecutionOutcome::failure(FailureKind::Unavailable, e.to_string())),
        };

        let mut cmd = ToolCommand::new(ffmpeg.path.clone());
        cmd.timeout(self.timeout).args(self.command_args(request));

        tracing::debug!(job_id = %request.job_id, "Local encode: {} {}", ffmpeg.path.display(), cmd.get_args().join(" "));

        let mut parser = FfmpegProgress::new(request.plan.trim());
        let result = cmd
            .execute_with_stderr_callback(|line| {
                if let Some(fraction) = parser.feed(line) {
                    (request.progress)(fraction);
                }
            })
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) => return Ok(classify(e)),
        };

        if output.stderr_lines > 0 && !parser.saw_markers() {
            tracing::warn!(
                job_id = %request.job_id,
                "ffmpeg wrote {} diagnostic lines without progress markers",
                output.stderr_lines
            );
        }

        let out_path = request.scratch.output_path();
        match tokio::fs::read(out_path).await {
            Ok(bytes) => Ok(accept_output(request.plan.output_format(), Bytes::from(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ExecutionOutcome::failure(
                FailureKind::MissingOutput,
                format!("ffmpeg exited 0 but wrote no {}", out_path.display()),
            )),
            Err(e) => Err(ck_core::Error::resource(
                out_path.display(),
                format!("failed to read output: {e}"),
            )),
        }
    }
}

fn classify(e: CommandError) -> ExecutionOutcome {
    let kind = match &e {
        e if e.is_not_found() => FailureKind::Unavailable,
        CommandError::Timeout { .. } => FailureKind::Timeout,
        CommandError::Exit { .. } => FailureKind::ExitStatus,
        CommandError::Spawn { .. } | CommandError::Io { .. } => FailureKind::Io,
    };
    ExecutionOutcome::failure(kind, e.to_string())
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
