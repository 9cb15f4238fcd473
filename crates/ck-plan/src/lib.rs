//! # ck-plan
//!
//! Pure translation of an operation kind and an untrusted options bag into a
//! [`CommandPlan`]: the ordered encoder directives a backend replays.
//!
//! Nothing in this crate performs I/O. Every option value is looked up in a
//! closed domain ([`domain`]) and either mapped to a directive or rejected.
//!
//! ## Quick start
//!
//! ```
//! use ck_plan::{build, OperationKind, OptionsBag};
//!
//! let options = OptionsBag::new()
//!     .with("quality", "low")
//!     .with("resolution", "360p");
//! let plan = build(OperationKind::CompressVideo, &options).unwrap();
//! assert_eq!(plan.value_of("-crf"), Some("32"));
//! let args = plan.to_args("input.mov", "output.mp4");
//! assert_eq!(args.last().map(String::as_str), Some("output.mp4"));
//! ```

pub mod builder;
pub mod domain;
pub mod format;
pub mod kind;
pub mod options;
pub mod plan;

pub use builder::{build, option_domains};
pub use format::OutputFormat;
pub use kind::OperationKind;
pub use options::{OptionsBag, TimeRange};
pub use plan::{CommandPlan, Directive, PlanEntry, QualityScale, QualityValue, Section};
