//! Operation kinds and the source formats each one accepts.

use std::fmt;
use std::str::FromStr;

use ck_core::MediaFamily;

use crate::domain::echo;

/// MIME types that say nothing about the payload and are therefore accepted
/// for every operation; the file extension decides.
const GENERIC_MIME_TYPES: &[&str] = &["", "application/octet-stream", "binary/octet-stream"];

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "webm", "mkv", "avi", "wmv", "flv", "mpeg", "mpg", "3gp", "ts"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "ogg", "oga", "opus", "flac", "wma", "aiff", "aif"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "gif", "tif", "tiff"];
const ANIMATION_EXTENSIONS: &[&str] = &["mp4", "m4v", "mov", "webm", "mkv", "avi", "gif", "webp", "apng"];

/// The operation a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    CompressVideo,
    ConvertVideo,
    CompressAudio,
    ConvertAudio,
    ImageSequenceToGif,
    RasterConvert,
}

impl OperationKind {
    pub const ALL: &'static [OperationKind] = &[
        Self::CompressVideo,
        Self::ConvertVideo,
        Self::CompressAudio,
        Self::ConvertAudio,
        Self::ImageSequenceToGif,
        Self::RasterConvert,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CompressVideo => "compress-video",
            Self::ConvertVideo => "convert-video",
            Self::CompressAudio => "compress-audio",
            Self::ConvertAudio => "convert-audio",
            Self::ImageSequenceToGif => "image-sequence-to-gif",
            Self::RasterConvert => "raster-convert",
        }
    }

    /// The media family used for size ceilings.
    pub fn family(self) -> MediaFamily {
        match self {
            Self::CompressVideo | Self::ConvertVideo => MediaFamily::Video,
            Self::CompressAudio | Self::ConvertAudio => MediaFamily::Audio,
            Self::ImageSequenceToGif => MediaFamily::Animation,
            Self::RasterConvert => MediaFamily::Image,
        }
    }

    /// File extensions (lowercase, no dot) accepted as source.
    ///
    /// Audio conversion also accepts video containers so a soundtrack can be
    /// extracted.
    pub fn source_extensions(self) -> Vec<&'static str> {
        match self {
            Self::CompressVideo | Self::ConvertVideo => VIDEO_EXTENSIONS.to_vec(),
            Self::CompressAudio => AUDIO_EXTENSIONS.to_vec(),
            Self::ConvertAudio => AUDIO_EXTENSIONS
                .iter()
                .chain(VIDEO_EXTENSIONS)
                .copied()
                .collect(),
            Self::ImageSequenceToGif => ANIMATION_EXTENSIONS.to_vec(),
            Self::RasterConvert => IMAGE_EXTENSIONS.to_vec(),
        }
    }

    /// MIME type prefixes accepted as the declared source type.
    pub fn source_mime_prefixes(self) -> &'static [&'static str] {
        match self {
            Self::CompressVideo | Self::ConvertVideo => &["video/"],
            Self::CompressAudio => &["audio/"],
            Self::ConvertAudio => &["audio/", "video/"],
            Self::ImageSequenceToGif => &["video/", "image/gif", "image/webp", "image/apng"],
            Self::RasterConvert => &["image/"],
        }
    }

    /// Whether `extension` (any case, with or without a leading dot) is an
    /// accepted source extension.
    pub fn accepts_extension(self, extension: &str) -> bool {
        let ext = extension.trim_start_matches('.').to_ascii_lowercase();
        self.source_extensions().iter().any(|e| *e == ext)
    }

    /// Whether the declared MIME type is compatible with this operation.
    pub fn accepts_mime(self, mime: &str) -> bool {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        GENERIC_MIME_TYPES.contains(&essence.as_str())
            || self
                .source_mime_prefixes()
                .iter()
                .any(|p| essence.starts_with(p))
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = ck_core::Error;

    /// Unknown kinds are a [`ck_core::Error::Configuration`]: the caller
    /// reached an operation this deployment does not provide.
    fn from_str(s: &str) -> ck_core::Result<Self> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                ck_core::Error::configuration(format!("unknown operation kind {}", echo(s)))
            })
    }
}
