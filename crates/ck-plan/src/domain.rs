//! Enumerated option domains.
//!
//! Every option a caller may send is parsed into one of these enums before it
//! can reach a directive. Parsing is a lookup against the fixed value list;
//! anything else is a [`ck_core::Error::Validation`].

use std::fmt;
use std::str::FromStr;

/// Longest slice of a rejected value echoed back in an error message.
const MAX_ECHO: usize = 32;

/// Quote a rejected caller value for an error message without letting it
/// grow the message unboundedly.
pub(crate) fn echo(value: &str) -> String {
    let mut cut: String = value.chars().take(MAX_ECHO).collect();
    if value.chars().count() > MAX_ECHO {
        cut.push('…');
    }
    format!("{cut:?}")
}

/// Generate a closed option domain.
///
/// The macro produces an enum with:
/// - `ALL` listing every variant in declaration order
/// - `as_str()` returning the wire value
/// - `Display` and `FromStr` (ASCII case-insensitive, surrounding whitespace
///   ignored) over the wire values
macro_rules! option_domain {
    ($($(#[doc = $doc:expr])* $name:ident ($label:literal) {
        $($variant:ident => $value:literal),+ $(,)?
    })+) => {
        $(
            $(#[doc = $doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub enum $name {
                $($variant),+
            }

            impl $name {
                /// Every value of this domain, in declaration order.
                pub const ALL: &'static [$name] = &[$($name::$variant),+];

                /// Option name used in error messages.
                pub const LABEL: &'static str = $label;

                /// The wire value of this variant.
                #[must_use]
                pub fn as_str(self) -> &'static str {
                    match self {
                        $($name::$variant => $value),+
                    }
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }

            impl FromStr for $name {
                type Err = ck_core::Error;

                fn from_str(s: &str) -> ck_core::Result<Self> {
                    let wanted = s.trim();
                    Self::ALL
                        .iter()
                        .copied()
                        .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                        .ok_or_else(|| {
                            let allowed: Vec<&str> = Self::ALL.iter().map(|v| v.as_str()).collect();
                            ck_core::Error::validation(format!(
                                "invalid {} {}: expected one of {}",
                                $label,
                                echo(s),
                                allowed.join(", ")
                            ))
                        })
                }
            }
        )+
    };
}

option_domain! {
    /// Quality tier, ordered best first.
    Quality ("quality") {
        High => "high",
        Medium => "medium",
        Low => "low",
    }

    /// Target video resolution.
    Resolution ("resolution") {
        Original => "original",
        P2160 => "2160p",
        P1440 => "1440p",
        P1080 => "1080p",
        P720 => "720p",
        P480 => "480p",
        P360 => "360p",
        P240 => "240p",
    }

    /// Target video frame rate.
    VideoFps ("fps") {
        Original => "original",
        F60 => "60",
        F30 => "30",
        F24 => "24",
        F15 => "15",
    }

    /// Video bitrate cap.
    VideoBitrate ("bitrate") {
        Auto => "auto",
        M8 => "8M",
        M5 => "5M",
        M2_5 => "2.5M",
        M1 => "1M",
        K500 => "500k",
    }

    /// Video codec for compress-video.
    VideoCodec ("codec") {
        H264 => "h264",
        H265 => "h265",
        Vp9 => "vp9",
    }

    /// Target container for convert-video.
    VideoFormat ("format") {
        Mp4 => "mp4",
        Webm => "webm",
        Mov => "mov",
        Mkv => "mkv",
        Avi => "avi",
    }

    /// Target audio format.
    AudioFormat ("format") {
        Mp3 => "mp3",
        Wav => "wav",
        Aac => "aac",
        Ogg => "ogg",
        Opus => "opus",
        Flac => "flac",
    }

    /// Audio bitrate.
    AudioBitrate ("bitrate") {
        Auto => "auto",
        K320 => "320k",
        K256 => "256k",
        K192 => "192k",
        K160 => "160k",
        K128 => "128k",
        K96 => "96k",
        K64 => "64k",
    }

    /// Audio rate-control mode.
    EncodingMode ("mode") {
        Constant => "cbr",
        Variable => "vbr",
        Average => "abr",
    }

    /// Output channel layout.
    Channels ("channels") {
        Original => "original",
        Mono => "mono",
        Stereo => "stereo",
    }

    /// Output sample rate.
    SampleRate ("sample_rate") {
        Original => "original",
        Hz22050 => "22050",
        Hz44100 => "44100",
        Hz48000 => "48000",
    }

    /// Boolean flag.
    Toggle ("normalize") {
        On => "true",
        Off => "false",
    }

    /// GIF frame rate.
    GifFps ("fps") {
        Original => "original",
        F5 => "5",
        F10 => "10",
        F12 => "12",
        F15 => "15",
        F20 => "20",
        F25 => "25",
    }

    /// GIF output width; height follows the aspect ratio.
    GifWidth ("width") {
        Original => "original",
        W240 => "240",
        W320 => "320",
        W480 => "480",
        W640 => "640",
        W800 => "800",
    }

    /// GIF looping behaviour.
    GifLoop ("loop") {
        Infinite => "infinite",
        Once => "once",
    }

    /// Target raster image format.
    ImageFormat ("format") {
        Png => "png",
        Jpg => "jpg",
        Webp => "webp",
        Bmp => "bmp",
    }

    /// Raster output width; height follows the aspect ratio.
    ImageWidth ("width") {
        Original => "original",
        W320 => "320",
        W640 => "640",
        W1024 => "1024",
        W1280 => "1280",
        W1920 => "1920",
        W2560 => "2560",
    }
}

impl Resolution {
    /// Target frame size, `None` for `original`.
    pub fn dimensions(self) -> Option<(u32, u32)> {
        match self {
            Self::Original => None,
            Self::P2160 => Some((3840, 2160)),
            Self::P1440 => Some((2560, 1440)),
            Self::P1080 => Some((1920, 1080)),
            Self::P720 => Some((1280, 720)),
            Self::P480 => Some((854, 480)),
            Self::P360 => Some((640, 360)),
            Self::P240 => Some((426, 240)),
        }
    }
}

impl VideoFps {
    pub fn value(self) -> Option<u32> {
        match self {
            Self::Original => None,
            Self::F60 => Some(60),
            Self::F30 => Some(30),
            Self::F24 => Some(24),
            Self::F15 => Some(15),
        }
    }
}

impl VideoBitrate {
    /// Bitrate cap in kbit/s, `None` for `auto`.
    pub fn kbps(self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::M8 => Some(8000),
            Self::M5 => Some(5000),
            Self::M2_5 => Some(2500),
            Self::M1 => Some(1000),
            Self::K500 => Some(500),
        }
    }
}

impl AudioFormat {
    /// Lossless formats carry no rate controls.
    pub fn is_lossless(self) -> bool {
        matches!(self, Self::Wav | Self::Flac)
    }
}

impl AudioBitrate {
    pub fn kbps(self) -> Option<u32> {
        match self {
            Self::Auto => None,
            Self::K320 => Some(320),
            Self::K256 => Some(256),
            Self::K192 => Some(192),
            Self::K160 => Some(160),
            Self::K128 => Some(128),
            Self::K96 => Some(96),
            Self::K64 => Some(64),
        }
    }
}

impl Channels {
    pub fn count(self) -> Option<u32> {
        match self {
            Self::Original => None,
            Self::Mono => Some(1),
            Self::Stereo => Some(2),
        }
    }
}

impl SampleRate {
    pub fn hz(self) -> Option<u32> {
        match self {
            Self::Original => None,
            Self::Hz22050 => Some(22050),
            Self::Hz44100 => Some(44100),
            Self::Hz48000 => Some(48000),
        }
    }
}

impl Toggle {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl GifFps {
    pub fn value(self) -> Option<u32> {
        match self {
            Self::Original => None,
            Self::F5 => Some(5),
            Self::F10 => Some(10),
            Self::F12 => Some(12),
            Self::F15 => Some(15),
            Self::F20 => Some(20),
            Self::F25 => Some(25),
        }
    }
}

impl GifWidth {
    pub fn value(self) -> Option<u32> {
        match self {
            Self::Original => None,
            Self::W240 => Some(240),
            Self::W320 => Some(320),
            Self::W480 => Some(480),
            Self::W640 => Some(640),
            Self::W800 => Some(800),
        }
    }
}

impl GifLoop {
    /// Value for the gif muxer's `-loop`; `None` keeps its default of
    /// looping forever. The muxer counts repeats, so a single play is `-1`.
    pub fn muxer_value(self) -> Option<i32> {
        match self {
            Self::Infinite => None,
            Self::Once => Some(-1),
        }
    }
}

impl ImageWidth {
    pub fn value(self) -> Option<u32> {
        match self {
            Self::Original => None,
            Self::W320 => Some(320),
            Self::W640 => Some(640),
            Self::W1024 => Some(1024),
            Self::W1280 => Some(1280),
            Self::W1920 => Some(1920),
            Self::W2560 => Some(2560),
        }
    }
}
