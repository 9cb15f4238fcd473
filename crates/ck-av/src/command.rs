//! Builder for running an external tool with a bounded wait and streamed
//! diagnostics.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Number of trailing stderr lines kept for error messages.
const STDERR_TAIL_LINES: usize = 20;

/// Output captured from a finished tool run.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    /// The last lines of standard error (lossy UTF-8).
    pub stderr_tail: String,
    /// Total number of stderr lines seen.
    pub stderr_lines: usize,
}

/// Why a tool run did not complete successfully.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{tool}: failed to spawn: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool}: exited with {status}: {stderr_tail}")]
    Exit {
        tool: String,
        status: ExitStatus,
        stderr_tail: String,
    },

    #[error("{tool}: timed out after {timeout:?}")]
    Timeout { tool: String, timeout: Duration },

    #[error("{tool}: I/O error waiting for process: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl CommandError {
    /// Whether the binary itself could not be found.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Spawn { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl From<CommandError> for ck_core::Error {
    fn from(e: CommandError) -> Self {
        let tool = match &e {
            CommandError::Spawn { tool, .. }
            | CommandError::Exit { tool, .. }
            | CommandError::Timeout { tool, .. }
            | CommandError::Io { tool, .. } => tool.clone(),
        };
        ck_core::Error::tool(tool, e.to_string())
    }
}

/// A builder for one external tool invocation.
///
/// Stdin and stdout are closed; stderr is read line by line and handed to the
/// caller as it arrives. The child is killed if the wait is abandoned.
///
/// ```no_run
/// use ck_av::ToolCommand;
/// use std::path::PathBuf;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), ck_av::command::CommandError> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .args(["-hide_banner", "-i", "in.wav", "out.mp3"])
///     .timeout(Some(Duration::from_secs(60)))
///     .execute_with_stderr_callback(|line| println!("{line}"))
///     .await?;
/// assert!(output.status.success());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time; `None` waits indefinitely.
    pub fn timeout(&mut self, d: Option<Duration>) -> &mut Self {
        self.timeout = d;
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Run the tool to completion.
    ///
    /// # Errors
    ///
    /// [`CommandError::Exit`] for a non-zero exit status, and the other
    /// variants for spawn failures, timeouts and wait errors.
    pub async fn execute(&self) -> Result<ToolOutput, CommandError> {
        self.execute_with_stderr_callback(|_| {}).await
    }

    /// Run the tool, calling `on_line` for every stderr line as it arrives.
    pub async fn execute_with_stderr_callback(
        &self,
        mut on_line: impl FnMut(&str) + Send,
    ) -> Result<ToolOutput, CommandError> {
        let tool = self.program_name();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        let stderr = child.stderr.take();

        let run = async {
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut count = 0usize;

            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr);
                let mut buf = Vec::new();
                loop {
                    buf.clear();
                    if reader.read_until(b'\n', &mut buf).await? == 0 {
                        break;
                    }
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    on_line(line);
                    count += 1;
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line.to_string());
                }
            }

            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, tail, count))
        };

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(r) => r,
                Err(_elapsed) => {
                    // Dropping the child kills it; make that explicit.
                    let _ = child.start_kill();
                    return Err(CommandError::Timeout {
                        tool,
                        timeout: limit,
                    });
                }
            },
            None => run.await,
        };

        let (status, tail, count) = result.map_err(|source| CommandError::Io {
            tool: tool.clone(),
            source,
        })?;

        let stderr_tail = Vec::from(tail).join("\n");
        if !status.success() {
            return Err(CommandError::Exit {
                tool,
                status,
                stderr_tail: stderr_tail.trim().to_string(),
            });
        }

        Ok(ToolOutput {
            status,
            stderr_tail,
            stderr_lines: count,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sh(script: &str) -> ToolCommand {
        let mut cmd = ToolCommand::new(PathBuf::from("sh"));
        cmd.args(["-c", script]);
        cmd
    }

    #[tokio::test]
    async fn streams_stderr_lines() {
        let mut seen = Vec::new();
        let out = sh("echo one >&2; echo two >&2")
            .execute_with_stderr_callback(|l| seen.push(l.to_string()))
            .await
            .unwrap();
        assert!(out.status.success());
        assert_eq!(seen, vec!["one", "two"]);
        assert_eq!(out.stderr_lines, 2);
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_with_tail() {
        let err = sh("echo boom >&2; exit 3").execute().await.unwrap_err();
        assert_matches!(&err, CommandError::Exit { stderr_tail, .. } if stderr_tail == "boom");
    }

    #[tokio::test]
    async fn missing_binary_is_not_found() {
        let err = ToolCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"))
            .execute()
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(ck_core::Error::from(err).kind(), ck_core::ErrorKind::Encoding);
    }

    #[tokio::test]
    async fn timeout_fires() {
        let err = sh("sleep 10")
            .timeout(Some(Duration::from_millis(100)))
            .execute()
            .await
            .unwrap_err();
        assert_matches!(err, CommandError::Timeout { .. });
        assert!(err.to_string().contains("timed out"));
    }
}
