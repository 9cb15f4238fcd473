//! Output formats: file extension, MIME type, muxer name and container
//! signature.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every container/image format a plan can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Mp4,
    Webm,
    Mov,
    Mkv,
    Avi,
    Mp3,
    Wav,
    M4a,
    Ogg,
    Opus,
    Flac,
    Gif,
    Png,
    Jpg,
    Webp,
    Bmp,
}

impl OutputFormat {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Mov => "mov",
            Self::Mkv => "mkv",
            Self::Avi => "avi",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::M4a => "m4a",
            Self::Ogg => "ogg",
            Self::Opus => "opus",
            Self::Flac => "flac",
            Self::Gif => "gif",
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Mp4 => "video/mp4",
            Self::Webm => "video/webm",
            Self::Mov => "video/quicktime",
            Self::Mkv => "video/x-matroska",
            Self::Avi => "video/x-msvideo",
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::M4a => "audio/mp4",
            Self::Ogg => "audio/ogg",
            Self::Opus => "audio/opus",
            Self::Flac => "audio/flac",
            Self::Gif => "image/gif",
            Self::Png => "image/png",
            Self::Jpg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
        }
    }

    /// Muxer name passed with `-f`.
    pub fn muxer(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Mov => "mov",
            Self::Mkv => "matroska",
            Self::Avi => "avi",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::M4a => "ipod",
            Self::Ogg => "ogg",
            Self::Opus => "opus",
            Self::Flac => "flac",
            Self::Gif => "gif",
            Self::Png | Self::Jpg | Self::Bmp => "image2",
            Self::Webp => "webp",
        }
    }

    /// Whether `bytes` is non-empty and starts with this format's container
    /// signature.
    pub fn matches_signature(self, bytes: &[u8]) -> bool {
        let riff = |tag: &[u8; 4]| bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == tag;
        let box_at_4 = |tags: &[&[u8; 4]]| bytes.len() >= 8 && tags.iter().any(|t| &bytes[4..8] == *t);

        match self {
            Self::Mp4 | Self::M4a => box_at_4(&[b"ftyp"]),
            Self::Mov => box_at_4(&[b"ftyp", b"moov", b"wide", b"free", b"mdat"]),
            Self::Webm | Self::Mkv => bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]),
            Self::Avi => riff(b"AVI "),
            Self::Wav => riff(b"WAVE"),
            Self::Webp => riff(b"WEBP"),
            Self::Mp3 => {
                bytes.starts_with(b"ID3")
                    || (bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
            }
            Self::Ogg | Self::Opus => bytes.starts_with(b"OggS"),
            Self::Flac => bytes.starts_with(b"fLaC"),
            Self::Gif => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
            Self::Png => bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
            Self::Jpg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            Self::Bmp => bytes.starts_with(b"BM"),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_never_matches() {
        for f in [OutputFormat::Mp4, OutputFormat::Gif, OutputFormat::Mp3, OutputFormat::Png] {
            assert!(!f.matches_signature(&[]));
        }
    }

    #[test]
    fn iso_bmff_signature() {
        let mp4 = b"\x00\x00\x00\x20ftypisom\x00\x00\x02\x00";
        assert!(OutputFormat::Mp4.matches_signature(mp4));
        assert!(OutputFormat::M4a.matches_signature(mp4));
        assert!(OutputFormat::Mov.matches_signature(mp4));
        assert!(!OutputFormat::Webm.matches_signature(mp4));
    }

    #[test]
    fn riff_family_is_distinguished() {
        let wav = b"RIFF\x24\x00\x00\x00WAVEfmt ";
        assert!(OutputFormat::Wav.matches_signature(wav));
        assert!(!OutputFormat::Webp.matches_signature(wav));
        assert!(!OutputFormat::Avi.matches_signature(wav));
    }

    #[test]
    fn mp3_accepts_id3_and_frame_sync() {
        assert!(OutputFormat::Mp3.matches_signature(b"ID3\x04\x00"));
        assert!(OutputFormat::Mp3.matches_signature(&[0xFF, 0xFB, 0x90, 0x64]));
        assert!(!OutputFormat::Mp3.matches_signature(&[0xFF, 0x00]));
    }

    #[test]
    fn image_signatures() {
        assert!(OutputFormat::Gif.matches_signature(b"GIF89a\x01\x00"));
        assert!(OutputFormat::Png.matches_signature(b"\x89PNG\r\n\x1a\n\x00"));
        assert!(OutputFormat::Jpg.matches_signature(&[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(OutputFormat::Bmp.matches_signature(b"BM\x00\x00"));
        assert!(!OutputFormat::Png.matches_signature(b"GIF89a"));
    }

    #[test]
    fn matroska_family() {
        let ebml = [0x1A, 0x45, 0xDF, 0xA3, 0x01];
        assert!(OutputFormat::Mkv.matches_signature(&ebml));
        assert!(OutputFormat::Webm.matches_signature(&ebml));
    }

    #[test]
    fn mime_and_extension() {
        assert_eq!(OutputFormat::Mov.mime_type(), "video/quicktime");
        assert_eq!(OutputFormat::M4a.extension(), "m4a");
        assert_eq!(OutputFormat::Mkv.muxer(), "matroska");
        assert_eq!(OutputFormat::Jpg.to_string(), "jpg");
    }
}
