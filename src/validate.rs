//! Request validation: everything checked before any scratch storage is
//! touched.

use ck_core::config::LimitsConfig;
use ck_core::{Error, Result};
use ck_plan::{CommandPlan, OperationKind};

use crate::request::TranscodeRequest;

/// A request that passed validation, with its compiled plan.
#[derive(Debug, Clone)]
pub struct ValidatedJob {
    pub kind: OperationKind,
    pub plan: CommandPlan,
    /// Lowercase source extension, already checked against `kind`.
    pub source_extension: String,
}

/// Check the request against its operation kind and size ceiling, then
/// compile its options into a [`CommandPlan`].
///
/// # Errors
///
/// - [`Error::Configuration`] for an unknown operation kind.
/// - [`Error::Validation`] for an empty or oversized payload, a source
///   extension or MIME type the kind does not accept, or bad options.
pub fn validate(request: &TranscodeRequest, limits: &LimitsConfig) -> Result<ValidatedJob> {
    let kind: OperationKind = request.operation().parse()?;

    if request.source().is_empty() {
        return Err(Error::validation("source file is empty"));
    }

    let source_extension = request.extension().unwrap_or_default();
    if !kind.accepts_extension(&source_extension) {
        return Err(Error::validation(format!(
            "{kind} does not accept .{} files (supported: {})",
            truncate(&source_extension),
            kind.source_extensions().join(", ")
        )));
    }

    if !kind.accepts_mime(request.mime_type()) {
        return Err(Error::validation(format!(
            "{kind} does not accept content type {}",
            truncate(request.mime_type())
        )));
    }

    let size = request.source().len() as u64;
    let ceiling = limits.max_bytes(kind.family());
    if size > ceiling {
        return Err(Error::validation(format!(
            "source is {size} bytes; {kind} accepts at most {ceiling} bytes"
        )));
    }

    let plan = ck_plan::build(kind, request.options())?;

    Ok(ValidatedJob {
        kind,
        plan,
        source_extension,
    })
}

fn truncate(s: &str) -> String {
    s.chars().take(32).collect()
}
