//! Table-driven construction of a [`CommandPlan`] from an operation kind and
//! its options.
//!
//! [`build`] is pure: the same kind and options always yield the same plan.
//! Each operation reads its keys through an [`OptionReader`], so an
//! out-of-domain value or an unknown key fails here, before any I/O.

use crate::domain::{
    AudioBitrate, AudioFormat, Channels, EncodingMode, GifFps, GifLoop, GifWidth, ImageFormat,
    ImageWidth, Quality, Resolution, SampleRate, Toggle, VideoBitrate, VideoCodec, VideoFormat,
    VideoFps,
};
use crate::format::OutputFormat;
use crate::kind::OperationKind;
use crate::options::{OptionReader, OptionsBag};
use crate::plan::{CommandPlan, PlanBuilder, QualityValue, Section};

/// Loudness target used by `normalize=true` (EBU R128, streaming level).
const LOUDNORM: &str = "loudnorm=I=-16:TP=-1.5:LRA=11";

/// Compile `options` into the directive sequence for `kind`.
///
/// # Errors
///
/// - [`ck_core::Error::Validation`] for a value outside its domain, an
///   unknown key, or an inconsistent combination.
/// - [`ck_core::Error::Configuration`] if a planner emits directives out of
///   section order.
pub fn build(kind: OperationKind, options: &OptionsBag) -> ck_core::Result<CommandPlan> {
    let mut reader = OptionReader::new(kind, options);
    let plan = match kind {
        OperationKind::CompressVideo => compress_video(&mut reader)?,
        OperationKind::ConvertVideo => convert_video(&mut reader)?,
        OperationKind::CompressAudio => audio(&mut reader, AudioProfile::COMPRESS)?,
        OperationKind::ConvertAudio => audio(&mut reader, AudioProfile::CONVERT)?,
        OperationKind::ImageSequenceToGif => gif(&mut reader)?,
        OperationKind::RasterConvert => raster(&mut reader)?,
    };
    reader.finish()?;

    tracing::debug!("Built plan: {}", plan);
    Ok(plan)
}

/// The option keys `kind` reads, in reading order, each with its allowed
/// values. `start` and `end` take a timestamp and list no values.
pub fn option_domains(kind: OperationKind) -> Vec<(&'static str, Vec<String>)> {
    fn values<T: std::fmt::Display>(all: &[T]) -> Vec<String> {
        all.iter().map(ToString::to_string).collect()
    }

    let mut domains = match kind {
        OperationKind::CompressVideo => vec![
            ("quality", values(Quality::ALL)),
            ("resolution", values(Resolution::ALL)),
            ("fps", values(VideoFps::ALL)),
            ("bitrate", values(VideoBitrate::ALL)),
            ("codec", values(VideoCodec::ALL)),
        ],
        OperationKind::ConvertVideo => vec![
            ("format", values(VideoFormat::ALL)),
            ("quality", values(Quality::ALL)),
            ("resolution", values(Resolution::ALL)),
            ("fps", values(VideoFps::ALL)),
        ],
        OperationKind::CompressAudio | OperationKind::ConvertAudio => vec![
            ("format", values(AudioFormat::ALL)),
            ("bitrate", values(AudioBitrate::ALL)),
            ("mode", values(EncodingMode::ALL)),
            ("quality", values(Quality::ALL)),
            ("channels", values(Channels::ALL)),
            ("sample_rate", values(SampleRate::ALL)),
        ],
        OperationKind::ImageSequenceToGif => vec![
            ("fps", values(GifFps::ALL)),
            ("width", values(GifWidth::ALL)),
            ("quality", values(Quality::ALL)),
            ("loop", values(GifLoop::ALL)),
        ],
        OperationKind::RasterConvert => vec![
            ("format", values(ImageFormat::ALL)),
            ("quality", values(Quality::ALL)),
            ("width", values(ImageWidth::ALL)),
        ],
    };

    if kind == OperationKind::ConvertAudio {
        domains.push(("normalize", values(Toggle::ALL)));
    }
    if matches!(
        kind,
        OperationKind::ConvertVideo | OperationKind::ConvertAudio | OperationKind::ImageSequenceToGif
    ) {
        domains.push(("start", Vec::new()));
        domains.push(("end", Vec::new()));
    }
    domains
}

/// Pick the value for a quality tier from a `[high, medium, low]` row.
fn tier(quality: Quality, row: [u32; 3]) -> u32 {
    match quality {
        Quality::High => row[0],
        Quality::Medium => row[1],
        Quality::Low => row[2],
    }
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

/// Software video encoders and their CRF rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VideoEncoder {
    X264,
    X265,
    Vp9,
    Mpeg4,
}

impl VideoEncoder {
    fn name(self) -> &'static str {
        match self {
            Self::X264 => "libx264",
            Self::X265 => "libx265",
            Self::Vp9 => "libvpx-vp9",
            Self::Mpeg4 => "mpeg4",
        }
    }

    /// The audio encoder that pairs with this video encoder's container.
    fn audio_pair(self) -> &'static str {
        match self {
            Self::X264 | Self::X265 => "aac",
            Self::Vp9 => "libopus",
            Self::Mpeg4 => "libmp3lame",
        }
    }

    /// Quality flag and value. All four scales are lower-is-better.
    fn quality(self, quality: Quality) -> (&'static str, QualityValue) {
        match self {
            Self::X264 => ("-crf", QualityValue::lower_is_better(tier(quality, [20, 26, 32]))),
            Self::X265 => ("-crf", QualityValue::lower_is_better(tier(quality, [24, 28, 34]))),
            Self::Vp9 => ("-crf", QualityValue::lower_is_better(tier(quality, [28, 34, 40]))),
            Self::Mpeg4 => ("-q:v", QualityValue::lower_is_better(tier(quality, [3, 6, 10]))),
        }
    }
}

/// Emit codec selection and encoder tuning flags.
fn video_codecs(b: &mut PlanBuilder, encoder: VideoEncoder) -> ck_core::Result<()> {
    b.arg(Section::Codec, "-c:v", encoder.name())?;
    match encoder {
        VideoEncoder::X264 => {
            b.arg(Section::Codec, "-preset", "medium")?;
            b.arg(Section::Codec, "-pix_fmt", "yuv420p")?;
        }
        // Apple players only recognise HEVC in MP4 under this tag.
        VideoEncoder::X265 => {
            b.arg(Section::Codec, "-tag:v", "hvc1")?;
        }
        VideoEncoder::Vp9 => {
            b.arg(Section::Codec, "-row-mt", "1")?;
        }
        VideoEncoder::Mpeg4 => {}
    }
    b.arg(Section::Codec, "-c:a", encoder.audio_pair())?;
    Ok(())
}

fn video_quality(b: &mut PlanBuilder, encoder: VideoEncoder, quality: Quality) -> ck_core::Result<()> {
    let (flag, value) = encoder.quality(quality);
    b.arg(Section::Rate, flag, value.value.to_string())?;
    b.quality(value);
    Ok(())
}

/// Scale and frame-rate filters; `original` contributes nothing.
fn video_filters(resolution: Resolution, fps: VideoFps) -> Vec<String> {
    let mut filters = Vec::new();
    if let Some((w, h)) = resolution.dimensions() {
        filters.push(format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease:force_divisible_by=2"
        ));
    }
    if let Some(fps) = fps.value() {
        filters.push(format!("fps={fps}"));
    }
    filters
}

/// Container-level output flags, then the muxer and output reference.
fn finish_container(mut b: PlanBuilder, output: OutputFormat) -> ck_core::Result<CommandPlan> {
    if matches!(output, OutputFormat::Mp4 | OutputFormat::Mov | OutputFormat::M4a) {
        b.arg(Section::Output, "-movflags", "+faststart")?;
    }
    b.finish()
}

fn compress_video(r: &mut OptionReader<'_>) -> ck_core::Result<CommandPlan> {
    let quality = r.get("quality", Quality::Medium)?;
    let resolution = r.get("resolution", Resolution::Original)?;
    let fps = r.get("fps", VideoFps::Original)?;
    let bitrate = r.get("bitrate", VideoBitrate::Auto)?;
    let codec = r.get("codec", VideoCodec::H264)?;

    let (encoder, output) = match codec {
        VideoCodec::H264 => (VideoEncoder::X264, OutputFormat::Mp4),
        VideoCodec::H265 => (VideoEncoder::X265, OutputFormat::Mp4),
        VideoCodec::Vp9 => (VideoEncoder::Vp9, OutputFormat::Webm),
    };

    let mut b = PlanBuilder::new(OperationKind::CompressVideo, output);
    video_codecs(&mut b, encoder)?;
    video_quality(&mut b, encoder, quality)?;
    if let Some(kbps) = bitrate.kbps() {
        match encoder {
            // libvpx treats -b:v as the ceiling in constrained-quality mode.
            VideoEncoder::Vp9 => {
                b.arg(Section::Rate, "-b:v", format!("{kbps}k"))?;
            }
            _ => {
                b.arg(Section::Rate, "-maxrate", format!("{kbps}k"))?;
                b.arg(Section::Rate, "-bufsize", format!("{}k", kbps * 2))?;
            }
        }
    }
    b.filters("-vf", video_filters(resolution, fps))?;
    finish_container(b, output)
}

fn convert_video(r: &mut OptionReader<'_>) -> ck_core::Result<CommandPlan> {
    let format = r.get("format", VideoFormat::Mp4)?;
    let quality = r.get("quality", Quality::Medium)?;
    let resolution = r.get("resolution", Resolution::Original)?;
    let fps = r.get("fps", VideoFps::Original)?;
    let range = r.time_range()?;

    let (encoder, output) = match format {
        VideoFormat::Mp4 => (VideoEncoder::X264, OutputFormat::Mp4),
        VideoFormat::Mov => (VideoEncoder::X264, OutputFormat::Mov),
        VideoFormat::Mkv => (VideoEncoder::X264, OutputFormat::Mkv),
        VideoFormat::Webm => (VideoEncoder::Vp9, OutputFormat::Webm),
        VideoFormat::Avi => (VideoEncoder::Mpeg4, OutputFormat::Avi),
    };

    let mut b = PlanBuilder::new(OperationKind::ConvertVideo, output);
    b.trim(range)?;
    video_codecs(&mut b, encoder)?;
    video_quality(&mut b, encoder, quality)?;
    b.filters("-vf", video_filters(resolution, fps))?;
    finish_container(b, output)
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// What distinguishes compress-audio from convert-audio.
#[derive(Debug, Clone, Copy)]
struct AudioProfile {
    kind: OperationKind,
    /// Bitrate used by `cbr`/`abr` when the caller leaves it at `auto`.
    fallback_bitrate: Option<AudioBitrate>,
    allows_lossless: bool,
    /// Whether `normalize`, `start` and `end` are accepted.
    extended: bool,
}

impl AudioProfile {
    const COMPRESS: Self = Self {
        kind: OperationKind::CompressAudio,
        fallback_bitrate: Some(AudioBitrate::K128),
        allows_lossless: false,
        extended: false,
    };

    const CONVERT: Self = Self {
        kind: OperationKind::ConvertAudio,
        fallback_bitrate: None,
        allows_lossless: true,
        extended: true,
    };
}

fn audio_target(format: AudioFormat) -> (&'static str, OutputFormat) {
    match format {
        AudioFormat::Mp3 => ("libmp3lame", OutputFormat::Mp3),
        AudioFormat::Aac => ("aac", OutputFormat::M4a),
        AudioFormat::Ogg => ("libvorbis", OutputFormat::Ogg),
        AudioFormat::Opus => ("libopus", OutputFormat::Opus),
        AudioFormat::Wav => ("pcm_s16le", OutputFormat::Wav),
        AudioFormat::Flac => ("flac", OutputFormat::Flac),
    }
}

fn audio(r: &mut OptionReader<'_>, profile: AudioProfile) -> ck_core::Result<CommandPlan> {
    let format = r.get("format", AudioFormat::Mp3)?;
    let bitrate = r.get("bitrate", AudioBitrate::Auto)?;
    let mode = r.get("mode", EncodingMode::Constant)?;
    let quality = r.get("quality", Quality::Medium)?;
    let channels = r.get("channels", Channels::Original)?;
    let sample_rate = r.get("sample_rate", SampleRate::Original)?;
    let (normalize, range) = if profile.extended {
        (r.get("normalize", Toggle::Off)?, r.time_range()?)
    } else {
        (Toggle::Off, None)
    };

    if format.is_lossless() {
        if !profile.allows_lossless {
            return Err(ck_core::Error::validation(format!(
                "{} cannot produce lossless {format}; use convert-audio",
                profile.kind
            )));
        }
        if bitrate != AudioBitrate::Auto {
            return Err(ck_core::Error::validation(format!(
                "bitrate {bitrate} is not applicable to lossless {format}"
            )));
        }
    }

    let (encoder, output) = audio_target(format);
    let mut b = PlanBuilder::new(profile.kind, output);
    b.trim(range)?;
    b.flag(Section::Codec, "-vn")?;
    b.arg(Section::Codec, "-c:a", encoder)?;

    if !format.is_lossless() {
        audio_rate(&mut b, profile, format, mode, bitrate, quality)?;
    }

    if let Some(count) = channels.count() {
        b.arg(Section::Rate, "-ac", count.to_string())?;
    }
    if let Some(hz) = sample_rate.hz() {
        b.arg(Section::Rate, "-ar", hz.to_string())?;
    }

    let filters = if normalize.is_on() {
        vec![LOUDNORM.to_string()]
    } else {
        Vec::new()
    };
    b.filters("-af", filters)?;
    finish_container(b, output)
}

/// Exactly one rate-control branch fires per build.
fn audio_rate(
    b: &mut PlanBuilder,
    profile: AudioProfile,
    format: AudioFormat,
    mode: EncodingMode,
    bitrate: AudioBitrate,
    quality: Quality,
) -> ck_core::Result<()> {
    let explicit = bitrate.kbps();
    let target = explicit.or_else(|| profile.fallback_bitrate.and_then(AudioBitrate::kbps));

    match mode {
        EncodingMode::Constant => {
            if let Some(kbps) = target {
                b.arg(Section::Rate, "-b:a", format!("{kbps}k"))?;
                match format {
                    AudioFormat::Opus => {
                        b.arg(Section::Rate, "-vbr", "off")?;
                    }
                    AudioFormat::Ogg => {
                        b.arg(Section::Rate, "-minrate", format!("{kbps}k"))?;
                        b.arg(Section::Rate, "-maxrate", format!("{kbps}k"))?;
                    }
                    _ => {}
                }
            }
        }
        EncodingMode::Variable => match format {
            AudioFormat::Aac => {
                return Err(ck_core::Error::validation(
                    "mode vbr is not supported for aac; use cbr or abr",
                ));
            }
            AudioFormat::Mp3 | AudioFormat::Ogg => {
                if let Some(kbps) = explicit {
                    return Err(ck_core::Error::validation(format!(
                        "mode vbr for {format} is quality-driven; bitrate must be auto, got {kbps}k"
                    )));
                }
                let value = if format == AudioFormat::Mp3 {
                    QualityValue::lower_is_better(tier(quality, [2, 4, 6]))
                } else {
                    QualityValue::higher_is_better(tier(quality, [8, 5, 3]))
                };
                b.arg(Section::Rate, "-q:a", value.value.to_string())?;
                b.quality(value);
            }
            AudioFormat::Opus => {
                if let Some(kbps) = explicit {
                    b.arg(Section::Rate, "-b:a", format!("{kbps}k"))?;
                }
                b.arg(Section::Rate, "-vbr", "on")?;
            }
            AudioFormat::Wav | AudioFormat::Flac => {}
        },
        EncodingMode::Average => {
            let kbps = explicit.ok_or_else(|| {
                ck_core::Error::validation("mode abr requires an explicit bitrate")
            })?;
            b.arg(Section::Rate, "-b:a", format!("{kbps}k"))?;
            match format {
                AudioFormat::Mp3 => {
                    b.arg(Section::Rate, "-abr", "1")?;
                }
                AudioFormat::Opus => {
                    b.arg(Section::Rate, "-vbr", "constrained")?;
                }
                _ => {}
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GIF
// ---------------------------------------------------------------------------

fn gif(r: &mut OptionReader<'_>) -> ck_core::Result<CommandPlan> {
    let fps = r.get("fps", GifFps::F10)?;
    let width = r.get("width", GifWidth::W480)?;
    let quality = r.get("quality", Quality::Medium)?;
    let looping = r.get("loop", GifLoop::Infinite)?;
    let range = r.time_range()?;

    let colors = QualityValue::higher_is_better(tier(quality, [256, 128, 64]));
    let dither = match quality {
        Quality::High => "sierra2_4a",
        Quality::Medium => "bayer:bayer_scale=3",
        Quality::Low => "bayer:bayer_scale=5",
    };

    let mut chain = Vec::new();
    if let Some(fps) = fps.value() {
        chain.push(format!("fps={fps}"));
    }
    if let Some(w) = width.value() {
        chain.push(format!("scale={w}:-1:flags=lanczos"));
    }
    chain.push("split[s0][s1]".to_string());
    let graph = format!(
        "{};[s0]palettegen=max_colors={}[p];[s1][p]paletteuse=dither={dither}",
        chain.join(","),
        colors.value
    );

    let mut b = PlanBuilder::new(OperationKind::ImageSequenceToGif, OutputFormat::Gif);
    b.trim(range)?;
    b.flag(Section::Codec, "-an")?;
    b.quality(colors);
    b.filters("-vf", vec![graph])?;
    if let Some(value) = looping.muxer_value() {
        b.arg(Section::Output, "-loop", value.to_string())?;
    }
    b.finish()
}

// ---------------------------------------------------------------------------
// Raster
// ---------------------------------------------------------------------------

fn raster(r: &mut OptionReader<'_>) -> ck_core::Result<CommandPlan> {
    let format = r.get("format", ImageFormat::Png)?;
    let quality = r.get("quality", Quality::Medium)?;
    let width = r.get("width", ImageWidth::Original)?;

    let (encoder, output) = match format {
        ImageFormat::Png => ("png", OutputFormat::Png),
        ImageFormat::Jpg => ("mjpeg", OutputFormat::Jpg),
        ImageFormat::Webp => ("libwebp", OutputFormat::Webp),
        ImageFormat::Bmp => ("bmp", OutputFormat::Bmp),
    };

    let mut b = PlanBuilder::new(OperationKind::RasterConvert, output);
    b.arg(Section::Codec, "-c:v", encoder)?;
    match format {
        ImageFormat::Jpg => {
            let value = QualityValue::lower_is_better(tier(quality, [2, 5, 10]));
            b.arg(Section::Rate, "-q:v", value.value.to_string())?;
            b.quality(value);
        }
        ImageFormat::Webp => {
            let value = QualityValue::higher_is_better(tier(quality, [90, 75, 50]));
            b.arg(Section::Rate, "-quality", value.value.to_string())?;
            b.quality(value);
        }
        // Lossless; the tier has nothing to control.
        ImageFormat::Png | ImageFormat::Bmp => {}
    }
    let filters = width
        .value()
        .map(|w| vec![format!("scale={w}:-1")])
        .unwrap_or_default();
    b.filters("-vf", filters)?;
    b.arg(Section::Output, "-frames:v", "1")?;
    if output.muxer() == "image2" {
        b.arg(Section::Output, "-update", "1")?;
    }
    b.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use ck_core::{Error, ErrorKind};

    fn bag(pairs: &[(&str, &str)]) -> OptionsBag {
        pairs.iter().copied().collect()
    }

    fn plan(kind: OperationKind, pairs: &[(&str, &str)]) -> CommandPlan {
        build(kind, &bag(pairs)).unwrap()
    }

    fn err_kind(kind: OperationKind, pairs: &[(&str, &str)]) -> ErrorKind {
        build(kind, &bag(pairs)).unwrap_err().kind()
    }

    #[test]
    fn listed_domains_are_the_keys_each_kind_reads() {
        for &kind in OperationKind::ALL {
            for (key, values) in option_domains(kind) {
                let value = values.first().map(String::as_str).unwrap_or("0");
                if let Err(e) = build(kind, &bag(&[(key, value)])) {
                    assert!(!e.to_string().contains("unknown option"), "{kind} {key}: {e}");
                }
            }
            let err = build(kind, &bag(&[("volume", "11")])).unwrap_err();
            assert!(err.to_string().contains("unknown option"));
        }
    }

    #[test]
    fn compress_video_low_360p_scenario() {
        let p = plan(
            OperationKind::CompressVideo,
            &[
                ("quality", "low"),
                ("resolution", "360p"),
                ("fps", "original"),
                ("bitrate", "auto"),
            ],
        );
        assert_eq!(p.value_of("-crf"), Some("32"));
        let vf = p.value_of("-vf").unwrap();
        assert!(vf.starts_with("scale=640:360"), "{vf}");
        assert!(!vf.contains("fps="), "{vf}");
        assert!(!p.has_flag("-r"));
        assert!(!p.has_flag("-maxrate"));
        assert!(!p.has_flag("-b:v"));
        assert_eq!(p.output_format(), OutputFormat::Mp4);
    }

    #[test]
    fn same_inputs_same_plan() {
        for kind in OperationKind::ALL {
            let a = plan(*kind, &[]);
            let b = plan(*kind, &[]);
            assert_eq!(a, b);
            assert_eq!(a.to_args("in", "out"), b.to_args("in", "out"));
        }
    }

    #[test]
    fn defaults_emit_no_optional_directives() {
        let p = plan(OperationKind::CompressVideo, &[]);
        assert!(!p.has_flag("-vf"));
        assert!(!p.has_flag("-maxrate"));

        let p = plan(OperationKind::ConvertAudio, &[]);
        for flag in ["-b:a", "-ac", "-ar", "-af", "-ss", "-to"] {
            assert!(!p.has_flag(flag), "unexpected {flag}");
        }

        let p = plan(OperationKind::RasterConvert, &[]);
        assert!(!p.has_flag("-vf"));

        let p = plan(OperationKind::ImageSequenceToGif, &[("fps", "original"), ("width", "original")]);
        let vf = p.value_of("-vf").unwrap();
        assert!(vf.starts_with("split[s0][s1];"), "{vf}");
        assert!(!p.has_flag("-loop"));
    }

    #[test]
    fn quality_is_monotonic_for_every_scale() {
        let cases: &[(OperationKind, &[(&str, &str)])] = &[
            (OperationKind::CompressVideo, &[]),
            (OperationKind::CompressVideo, &[("codec", "h265")]),
            (OperationKind::CompressVideo, &[("codec", "vp9")]),
            (OperationKind::ConvertVideo, &[("format", "avi")]),
            (OperationKind::CompressAudio, &[("mode", "vbr"), ("bitrate", "auto")]),
            (OperationKind::ConvertAudio, &[("format", "ogg"), ("mode", "vbr")]),
            (OperationKind::ImageSequenceToGif, &[]),
            (OperationKind::RasterConvert, &[("format", "jpg")]),
            (OperationKind::RasterConvert, &[("format", "webp")]),
        ];

        for (kind, extra) in cases {
            let tiers: Vec<QualityValue> = Quality::ALL
                .iter()
                .map(|q| {
                    let mut pairs = extra.to_vec();
                    pairs.push(("quality", q.as_str()));
                    plan(*kind, &pairs).quality().unwrap()
                })
                .collect();
            assert!(tiers[0].is_better_than(&tiers[1]), "{kind} {extra:?}: {tiers:?}");
            assert!(tiers[1].is_better_than(&tiers[2]), "{kind} {extra:?}: {tiers:?}");
        }
    }

    #[test]
    fn filters_share_one_directive() {
        let p = plan(
            OperationKind::CompressVideo,
            &[("resolution", "720p"), ("fps", "30")],
        );
        assert_eq!(p.directives().filter(|d| d.flag() == Some("-vf")).count(), 1);
        assert_eq!(
            p.value_of("-vf"),
            Some("scale=1280:720:force_original_aspect_ratio=decrease:force_divisible_by=2,fps=30")
        );
    }

    #[test]
    fn bitrate_cap() {
        let p = plan(OperationKind::CompressVideo, &[("bitrate", "2.5M")]);
        assert_eq!(p.value_of("-maxrate"), Some("2500k"));
        assert_eq!(p.value_of("-bufsize"), Some("5000k"));

        let p = plan(OperationKind::CompressVideo, &[("bitrate", "1M"), ("codec", "vp9")]);
        assert_eq!(p.value_of("-b:v"), Some("1000k"));
        assert_eq!(p.output_format(), OutputFormat::Webm);
    }

    #[test]
    fn trim_follows_input_reference() {
        let p = plan(
            OperationKind::ConvertVideo,
            &[("start", "1.5"), ("end", "00:00:10")],
        );
        let args = p.to_args("in.mov", "out.mp4");
        assert_eq!(&args[..6], &["-i", "in.mov", "-ss", "1.500", "-to", "10.000"]);
        assert!(p.trim().is_some());
    }

    #[test]
    fn inverted_range_is_rejected() {
        assert_eq!(
            err_kind(OperationKind::ConvertVideo, &[("start", "10"), ("end", "5")]),
            ErrorKind::Validation
        );
    }

    #[test]
    fn zero_end_without_start_is_rejected() {
        for kind in [
            OperationKind::ConvertVideo,
            OperationKind::ConvertAudio,
            OperationKind::ImageSequenceToGif,
        ] {
            let err = build(kind, &bag(&[("end", "0")])).unwrap_err();
            assert_matches!(err, Error::Validation(ref m) if m.contains("must be after start"));
        }
        assert!(build(OperationKind::ConvertVideo, &bag(&[("end", "0.001")])).is_ok());
    }

    #[test]
    fn out_of_domain_and_unknown_keys_are_validation_errors() {
        assert_eq!(
            err_kind(OperationKind::CompressVideo, &[("fps", "29.97")]),
            ErrorKind::Validation
        );
        assert_eq!(
            err_kind(OperationKind::CompressVideo, &[("preset", "ultrafast")]),
            ErrorKind::Validation
        );
        // Trim keys belong to convert-audio only.
        assert_eq!(
            err_kind(OperationKind::CompressAudio, &[("start", "1")]),
            ErrorKind::Validation
        );
        assert_matches!(
            build(OperationKind::RasterConvert, &bag(&[("format", "tiff")])),
            Err(Error::Validation(_))
        );
    }

    #[test]
    fn abr_requires_bitrate() {
        assert_eq!(
            err_kind(OperationKind::ConvertAudio, &[("mode", "abr")]),
            ErrorKind::Validation
        );
        let p = plan(
            OperationKind::ConvertAudio,
            &[("mode", "abr"), ("bitrate", "192k")],
        );
        assert_eq!(p.value_of("-b:a"), Some("192k"));
        assert_eq!(p.value_of("-abr"), Some("1"));
    }

    #[test]
    fn vbr_rejected_for_aac() {
        assert_eq!(
            err_kind(OperationKind::CompressAudio, &[("format", "aac"), ("mode", "vbr")]),
            ErrorKind::Validation
        );
    }

    #[test]
    fn vbr_mp3_rejects_explicit_bitrate() {
        assert_eq!(
            err_kind(OperationKind::ConvertAudio, &[("mode", "vbr"), ("bitrate", "320k")]),
            ErrorKind::Validation
        );
    }

    #[test]
    fn encoding_modes_are_exclusive() {
        let cbr = plan(OperationKind::CompressAudio, &[]);
        assert_eq!(cbr.value_of("-b:a"), Some("128k"));
        assert!(!cbr.has_flag("-q:a"));

        let vbr = plan(OperationKind::CompressAudio, &[("mode", "vbr")]);
        assert!(vbr.has_flag("-q:a"));
        assert!(!vbr.has_flag("-b:a"));
    }

    #[test]
    fn lossless_formats() {
        let p = plan(OperationKind::ConvertAudio, &[("format", "flac"), ("mode", "vbr")]);
        assert!(!p.has_flag("-b:a"));
        assert!(!p.has_flag("-q:a"));
        assert_eq!(p.output_format(), OutputFormat::Flac);

        assert_eq!(
            err_kind(OperationKind::ConvertAudio, &[("format", "wav"), ("bitrate", "128k")]),
            ErrorKind::Validation
        );
        assert_eq!(
            err_kind(OperationKind::CompressAudio, &[("format", "wav")]),
            ErrorKind::Validation
        );
    }

    #[test]
    fn aac_lands_in_m4a() {
        let p = plan(OperationKind::CompressAudio, &[("format", "aac")]);
        assert_eq!(p.output_format(), OutputFormat::M4a);
        assert_eq!(p.value_of("-f"), Some("ipod"));
        assert_eq!(p.value_of("-movflags"), Some("+faststart"));
    }

    #[test]
    fn normalize_and_channels() {
        let p = plan(
            OperationKind::ConvertAudio,
            &[("normalize", "true"), ("channels", "mono"), ("sample_rate", "44100")],
        );
        assert_eq!(p.value_of("-af"), Some(LOUDNORM));
        assert_eq!(p.value_of("-ac"), Some("1"));
        assert_eq!(p.value_of("-ar"), Some("44100"));
    }

    #[test]
    fn gif_palette_graph() {
        let p = plan(
            OperationKind::ImageSequenceToGif,
            &[("quality", "high"), ("loop", "once")],
        );
        assert_eq!(
            p.value_of("-vf"),
            Some(
                "fps=10,scale=480:-1:flags=lanczos,split[s0][s1];\
                 [s0]palettegen=max_colors=256[p];[s1][p]paletteuse=dither=sierra2_4a"
            )
        );
        assert_eq!(p.value_of("-loop"), Some("-1"));
        assert!(p.has_flag("-an"));
    }

    #[test]
    fn gif_loop_once_plays_a_single_time() {
        assert_eq!(GifLoop::Once.muxer_value(), Some(-1));
        assert_eq!(GifLoop::Infinite.muxer_value(), None);
        assert!(!plan(OperationKind::ImageSequenceToGif, &[]).has_flag("-loop"));
        assert_eq!(err_kind(OperationKind::ImageSequenceToGif, &[("loop", "none")]), ErrorKind::Validation);
    }

    #[test]
    fn raster_single_frame() {
        let p = plan(OperationKind::RasterConvert, &[("format", "jpg"), ("width", "640")]);
        assert_eq!(p.value_of("-c:v"), Some("mjpeg"));
        assert_eq!(p.value_of("-vf"), Some("scale=640:-1"));
        assert_eq!(p.value_of("-frames:v"), Some("1"));
        assert_eq!(p.value_of("-update"), Some("1"));

        let webp = plan(OperationKind::RasterConvert, &[("format", "webp")]);
        assert!(!webp.has_flag("-update"));
        assert_eq!(webp.value_of("-f"), Some("webp"));
    }

    #[test]
    fn output_reference_is_last() {
        for kind in OperationKind::ALL {
            let args = plan(*kind, &[]).to_args("IN", "OUT");
            assert_eq!(args.first().map(String::as_str), Some("-i"));
            assert_eq!(args.last().map(String::as_str), Some("OUT"));
        }
    }
}
