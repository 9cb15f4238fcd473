//! [`CommandPlan`]: the ordered, immutable sequence of encoder directives.
//!
//! Directives are grouped into [`Section`]s whose order is fixed:
//! input reference, codec selection, quality/rate controls, filter graph,
//! muxing/output reference. [`PlanBuilder`] refuses to go back to an earlier
//! section, so a plan can never be assembled out of order. The input and
//! output references stay symbolic until a backend serializes the plan with
//! [`CommandPlan::to_args`].

use std::fmt;

use crate::format::OutputFormat;
use crate::kind::OperationKind;
use crate::options::TimeRange;

/// Precedence group of a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Input,
    Codec,
    Rate,
    Filter,
    Output,
}

/// A single flag (and optional value) within a plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Directive {
    /// `-i <input>`; the reference is filled in by the backend.
    Input,
    /// A bare flag such as `-an`.
    Flag(&'static str),
    /// A flag followed by one value.
    Arg(&'static str, String),
    /// The output reference; always the final argument.
    Output,
}

impl Directive {
    /// The flag name, `None` for the input/output references.
    pub fn flag(&self) -> Option<&'static str> {
        match self {
            Self::Flag(f) | Self::Arg(f, _) => Some(*f),
            Self::Input | Self::Output => None,
        }
    }
}

/// Direction of a quality scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityScale {
    /// CRF, `-q:a` for MP3, `-q:v` for JPEG/MPEG-4.
    LowerIsBetter,
    /// Vorbis `-q:a`, WebP `-quality`, GIF palette size.
    HigherIsBetter,
}

/// A quality-control value together with the direction of its scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityValue {
    pub value: u32,
    pub scale: QualityScale,
}

impl QualityValue {
    pub const fn lower_is_better(value: u32) -> Self {
        Self {
            value,
            scale: QualityScale::LowerIsBetter,
        }
    }

    pub const fn higher_is_better(value: u32) -> Self {
        Self {
            value,
            scale: QualityScale::HigherIsBetter,
        }
    }

    /// Whether `self` encodes strictly better quality than `other`.
    ///
    /// Values on different scales are never comparable.
    pub fn is_better_than(&self, other: &QualityValue) -> bool {
        if self.scale != other.scale {
            return false;
        }
        match self.scale {
            QualityScale::LowerIsBetter => self.value < other.value,
            QualityScale::HigherIsBetter => self.value > other.value,
        }
    }
}

/// One directive tagged with its section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub section: Section,
    pub directive: Directive,
}

/// The ordered, validated sequence of encoder directives for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandPlan {
    kind: OperationKind,
    entries: Vec<PlanEntry>,
    output: OutputFormat,
    quality: Option<QualityValue>,
    trim: Option<TimeRange>,
}

impl CommandPlan {
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output
    }

    /// The quality-control value embedded in the plan, if the operation has
    /// one.
    pub fn quality(&self) -> Option<QualityValue> {
        self.quality
    }

    /// The requested time range, if any.
    pub fn trim(&self) -> Option<TimeRange> {
        self.trim
    }

    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.entries.iter().map(|e| &e.directive)
    }

    /// Whether any directive uses `flag`.
    pub fn has_flag(&self, flag: &str) -> bool {
        self.directives().any(|d| d.flag() == Some(flag))
    }

    /// The value of the first directive using `flag`.
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        self.directives().find_map(|d| match d {
            Directive::Arg(f, v) if *f == flag => Some(v.as_str()),
            _ => None,
        })
    }

    /// Serialize to a flat argument list, substituting the input and output
    /// references.
    pub fn to_args(&self, input: &str, output: &str) -> Vec<String> {
        let mut args = Vec::with_capacity(self.entries.len() * 2);
        for entry in &self.entries {
            match &entry.directive {
                Directive::Input => {
                    args.push("-i".to_string());
                    args.push(input.to_string());
                }
                Directive::Flag(f) => args.push((*f).to_string()),
                Directive::Arg(f, v) => {
                    args.push((*f).to_string());
                    args.push(v.clone());
                }
                Directive::Output => args.push(output.to_string()),
            }
        }
        args
    }
}

impl fmt::Display for CommandPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ext = self.output.extension();
        let args = self.to_args("{input}", &format!("{{output}}.{ext}"));
        write!(f, "{}: {}", self.kind, args.join(" "))
    }
}

// ---------------------------------------------------------------------------
// PlanBuilder
// ---------------------------------------------------------------------------

/// Assembles a [`CommandPlan`] while enforcing section order.
///
/// Ordering violations are builder defects and surface as
/// [`ck_core::Error::Configuration`].
#[derive(Debug)]
pub struct PlanBuilder {
    kind: OperationKind,
    output: OutputFormat,
    entries: Vec<PlanEntry>,
    quality: Option<QualityValue>,
    trim: Option<TimeRange>,
}

impl PlanBuilder {
    /// Start a plan; the input reference is always the first directive.
    pub fn new(kind: OperationKind, output: OutputFormat) -> Self {
        Self {
            kind,
            output,
            entries: vec![PlanEntry {
                section: Section::Input,
                directive: Directive::Input,
            }],
            quality: None,
            trim: None,
        }
    }

    pub fn push(&mut self, section: Section, directive: Directive) -> ck_core::Result<&mut Self> {
        if matches!(directive, Directive::Input | Directive::Output) {
            return Err(ck_core::Error::configuration(format!(
                "{}: input/output references are placed by the builder",
                self.kind
            )));
        }
        if let Some(last) = self.entries.last() {
            if section < last.section {
                return Err(ck_core::Error::configuration(format!(
                    "{}: directive {:?} in section {:?} after section {:?}",
                    self.kind, directive, section, last.section
                )));
            }
        }
        self.entries.push(PlanEntry { section, directive });
        Ok(self)
    }

    pub fn flag(&mut self, section: Section, flag: &'static str) -> ck_core::Result<&mut Self> {
        self.push(section, Directive::Flag(flag))
    }

    pub fn arg(
        &mut self,
        section: Section,
        flag: &'static str,
        value: impl Into<String>,
    ) -> ck_core::Result<&mut Self> {
        self.push(section, Directive::Arg(flag, value.into()))
    }

    /// Record the quality value that was emitted.
    pub fn quality(&mut self, quality: QualityValue) -> &mut Self {
        self.quality = Some(quality);
        self
    }

    /// Emit `-ss`/`-to` right after the input reference.
    pub fn trim(&mut self, range: Option<TimeRange>) -> ck_core::Result<&mut Self> {
        if let Some(range) = range {
            if let Some(start) = range.start_ms() {
                self.arg(Section::Input, "-ss", format_seconds(start))?;
            }
            if let Some(end) = range.end_ms() {
                self.arg(Section::Input, "-to", format_seconds(end))?;
            }
            self.trim = Some(range);
        }
        Ok(self)
    }

    /// Emit one filter-graph directive joining every non-empty filter with a
    /// comma; nothing is emitted when there are no filters.
    pub fn filters(
        &mut self,
        flag: &'static str,
        filters: Vec<String>,
    ) -> ck_core::Result<&mut Self> {
        let filters: Vec<String> = filters.into_iter().filter(|f| !f.is_empty()).collect();
        if filters.is_empty() {
            return Ok(self);
        }
        self.arg(Section::Filter, flag, filters.join(","))
    }

    /// Close the plan with the muxer and output reference.
    pub fn finish(mut self) -> ck_core::Result<CommandPlan> {
        let muxer = self.output.muxer();
        self.arg(Section::Output, "-f", muxer)?;
        self.entries.push(PlanEntry {
            section: Section::Output,
            directive: Directive::Output,
        });
        Ok(CommandPlan {
            kind: self.kind,
            entries: self.entries,
            output: self.output,
            quality: self.quality,
            trim: self.trim,
        })
    }
}

/// Seconds with millisecond precision, e.g. `12.500`.
pub(crate) fn format_seconds(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}
