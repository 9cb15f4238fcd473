//! Turning a successful execution into the caller-facing result.

use bytes::Bytes;
use serde::Serialize;

use ck_plan::OutputFormat;

use crate::request::base_name;

/// Stem used when the request's filename has none.
const FALLBACK_STEM: &str = "output";

/// The converted file and its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscodeResult {
    #[serde(skip)]
    pub bytes: Bytes,
    pub mime_type: String,
    pub filename: String,
    pub original_size: u64,
    pub output_size: u64,
}

impl TranscodeResult {
    /// `output_size / original_size`; `0.0` for an empty original.
    pub fn compression_ratio(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        self.output_size as f64 / self.original_size as f64
    }

    /// Size change relative to the original, negative when smaller.
    pub fn size_change_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (self.output_size as f64 - self.original_size as f64) / self.original_size as f64 * 100.0
    }
}

/// Wrap `output` with its content type and a download filename derived from
/// `requested_filename`.
pub fn pack(output: Bytes, original_size: u64, requested_filename: &str, format: OutputFormat) -> TranscodeResult {
    let output_size = output.len() as u64;
    TranscodeResult {
        bytes: output,
        mime_type: format.mime_type().to_string(),
        filename: output_filename(requested_filename, format),
        original_size,
        output_size,
    }
}

/// Base name of `requested` with its extension replaced by the target one.
pub fn output_filename(requested: &str, format: OutputFormat) -> String {
    let base = base_name(requested);
    let stem = match base.rfind('.') {
        Some(dot) => &base[..dot],
        None => base,
    };
    let stem = stem.trim();
    let stem = if stem.is_empty() || stem == "." || stem == ".." {
        FALLBACK_STEM
    } else {
        stem
    };
    format!("{stem}.{}", format.extension())
}
