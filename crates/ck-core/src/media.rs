//! Media-family classification shared by the planner and the controller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad family of the source media an operation consumes.
///
/// Size ceilings and accepted MIME prefixes are keyed by family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFamily {
    Video,
    Audio,
    Image,
    /// Frame sequences turned into an animated GIF.
    Animation,
}

impl fmt::Display for MediaFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Image => write!(f, "image"),
            Self::Animation => write!(f, "animation"),
        }
    }
}
