//! The inbound request value.

use std::fmt;
use std::path::Path;

use bytes::Bytes;

use ck_plan::OptionsBag;

/// One conversion request exactly as the caller sent it.
///
/// Every field is untrusted; the job controller re-validates all of them.
#[derive(Clone)]
pub struct TranscodeRequest {
    source: Bytes,
    filename: String,
    mime_type: String,
    operation: String,
    options: OptionsBag,
}

impl TranscodeRequest {
    pub fn new(
        source: impl Into<Bytes>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        operation: impl Into<String>,
        options: OptionsBag,
    ) -> Self {
        Self {
            source: source.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            operation: operation.into(),
            options,
        }
    }

    pub fn source(&self) -> &Bytes {
        &self.source
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn options(&self) -> &OptionsBag {
        &self.options
    }

    /// Lowercase extension of the filename's last path component, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(base_name(&self.filename))
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

impl fmt::Debug for TranscodeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscodeRequest")
            .field("source_len", &self.source.len())
            .field("filename", &self.filename)
            .field("mime_type", &self.mime_type)
            .field("operation", &self.operation)
            .field("options", &self.options)
            .finish()
    }
}

/// The last path component of `name`, treating both `/` and `\` as
/// separators.
pub(crate) fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}
