//! convertkit - transcode orchestration core
//!
//! Takes an uploaded media payload plus an operation kind and options, and
//! turns it into a converted file by driving an external encoder, falling
//! back to an embedded engine when the local one is unusable.
//!
//! The pieces live in the workspace crates:
//! - `ck-core`: errors, configuration, job events
//! - `ck-plan`: options to [`ck_plan::CommandPlan`] translation
//! - `ck-av`: scratch storage, tool discovery and the execution backends
//!
//! This crate ties them together in [`JobController`].

pub mod job;
pub mod packager;
pub mod request;
pub mod validate;

pub use job::{JobController, JobControllerBuilder};
pub use packager::{output_filename, pack, TranscodeResult};
pub use request::TranscodeRequest;
pub use validate::{validate, ValidatedJob};
