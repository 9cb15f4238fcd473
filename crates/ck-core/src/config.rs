//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized from JSON. Every section
//! defaults sensibly so a completely empty `{}` file is valid. The only
//! environment-driven settings are the scratch root and the external binary
//! location (see [`Config::apply_env`]).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;
use crate::media::MediaFamily;
use crate::Error;

/// Environment variable overriding [`ScratchConfig::root`].
pub const ENV_SCRATCH_ROOT: &str = "CONVERTKIT_SCRATCH_ROOT";

/// Environment variable overriding [`ToolsConfig::ffmpeg_path`].
pub const ENV_FFMPEG: &str = "CONVERTKIT_FFMPEG";

const MIB: u64 = 1024 * 1024;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scratch: ScratchConfig,
    pub tools: ToolsConfig,
    pub limits: LimitsConfig,
    pub local: LocalBackendConfig,
    pub engine: EngineConfig,
}

impl Config {
    /// Deserialize a `Config` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Configuration(format!("config parse error: {e}")))
    }

    /// Load configuration from a file path, falling back to defaults if the
    /// path is `None` or the file does not exist.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents).unwrap_or_else(|e| {
                tracing::warn!("Failed to parse config file {}: {e}", path.display());
                Self::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}; using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read config file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Apply the deployment overrides read from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var_os(ENV_SCRATCH_ROOT).map(PathBuf::from),
            std::env::var_os(ENV_FFMPEG).map(PathBuf::from),
        );
    }

    fn apply_overrides(&mut self, scratch_root: Option<PathBuf>, ffmpeg: Option<PathBuf>) {
        if let Some(root) = scratch_root.filter(|p| !p.as_os_str().is_empty()) {
            self.scratch.root = root;
        }
        if let Some(path) = ffmpeg.filter(|p| !p.as_os_str().is_empty()) {
            self.tools.ffmpeg_path = Some(path);
        }
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.scratch.root.as_os_str().is_empty() {
            warnings.push("scratch.root is empty; the current directory will be used".into());
        } else if self.scratch.root.is_relative() {
            warnings.push(format!(
                "scratch.root '{}' is relative; prefer an absolute path",
                self.scratch.root.display()
            ));
        }

        if let Some(ref p) = self.tools.ffmpeg_path {
            if !p.exists() {
                warnings.push(format!(
                    "tools.ffmpeg_path '{}' does not exist; PATH lookup will be used",
                    p.display()
                ));
            }
        }

        for family in [
            MediaFamily::Video,
            MediaFamily::Audio,
            MediaFamily::Image,
            MediaFamily::Animation,
        ] {
            if self.limits.max_bytes(family) == 0 {
                warnings.push(format!("limits for {family} are 0; every {family} job will be rejected"));
            }
        }

        if self.local.timeout_secs == Some(0) {
            warnings.push("local.timeout_secs is 0; every local job will time out".into());
        }

        if !self.engine.enabled && self.local.timeout_secs.is_none() {
            warnings.push(
                "embedded engine is disabled and local backend has no timeout; a stuck encoder blocks its job forever"
                    .into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Shared scratch area settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScratchConfig {
    /// Directory under which every job gets its own subdirectory.
    pub root: PathBuf,
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            root: std::env::temp_dir().join("convertkit"),
        }
    }
}

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Payload size ceilings per media family, in bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub video_max_bytes: u64,
    pub audio_max_bytes: u64,
    pub image_max_bytes: u64,
    pub animation_max_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            video_max_bytes: 512 * MIB,
            audio_max_bytes: 100 * MIB,
            image_max_bytes: 50 * MIB,
            animation_max_bytes: 200 * MIB,
        }
    }
}

impl LimitsConfig {
    /// The size ceiling for a media family.
    pub fn max_bytes(&self, family: MediaFamily) -> u64 {
        match family {
            MediaFamily::Video => self.video_max_bytes,
            MediaFamily::Audio => self.audio_max_bytes,
            MediaFamily::Image => self.image_max_bytes,
            MediaFamily::Animation => self.animation_max_bytes,
        }
    }
}

/// Local-process backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalBackendConfig {
    /// Upper bound on one encoder run. `None` waits forever.
    #[serde(default = "default_local_timeout")]
    pub timeout_secs: Option<u64>,
}

fn default_local_timeout() -> Option<u64> {
    Some(1800)
}

impl Default for LocalBackendConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_local_timeout(),
        }
    }
}

impl LocalBackendConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Embedded-engine backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// When false the controller only tries the local backend.
    pub enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
