//! Parser for ffmpeg's diagnostic stream when run with `-progress pipe:2`.

use ck_plan::TimeRange;

/// Folds stderr lines into completion fractions.
///
/// The total length is the input duration announced on stderr
/// (`Duration: HH:MM:SS.ss`), narrowed by the plan's time range when one was
/// requested. A fraction is produced each time a `progress=` line closes a
/// block.
#[derive(Debug, Clone)]
pub struct FfmpegProgress {
    range: Option<TimeRange>,
    source_ms: Option<u64>,
    out_time_us: Option<u64>,
    markers: usize,
}

impl FfmpegProgress {
    pub fn new(range: Option<TimeRange>) -> Self {
        Self {
            range,
            source_ms: None,
            out_time_us: None,
            markers: 0,
        }
    }

    /// Whether any `progress=` marker has been seen.
    pub fn saw_markers(&self) -> bool {
        self.markers > 0
    }

    fn total_ms(&self) -> Option<u64> {
        match self.range {
            Some(range) => range.clip_ms(self.source_ms),
            None => self.source_ms,
        }
    }

    /// Feed one stderr line. Returns a fraction when a progress block closes
    /// and the total length is known (or the encoder reports the end).
    pub fn feed(&mut self, line: &str) -> Option<f64> {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix("Duration:") {
            // Only the first input's duration counts.
            if self.source_ms.is_none() {
                self.source_ms = rest.split(',').next().and_then(parse_clock_ms);
            }
            return None;
        }

        if let Some(val) = line.strip_prefix("out_time_us=") {
            // "N/A" and negative values appear before the first frame.
            if let Ok(us) = val.trim().parse::<u64>() {
                self.out_time_us = Some(us);
            }
            return None;
        }

        let state = line.strip_prefix("progress=")?;
        self.markers += 1;
        if state.trim() == "end" {
            return Some(1.0);
        }

        let total_ms = self.total_ms().filter(|t| *t > 0)?;
        let done_ms = self.out_time_us? / 1000;
        Some((done_ms as f64 / total_ms as f64).clamp(0.0, 1.0))
    }
}

/// Parse `HH:MM:SS.ss` into milliseconds.
fn parse_clock_ms(raw: &str) -> Option<u64> {
    let mut parts = raw.trim().split(':');
    let h: u64 = parts.next()?.parse().ok()?;
    let m: u64 = parts.next()?.parse().ok()?;
    let s: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !s.is_finite() || s < 0.0 {
        return None;
    }
    Some(h * 3_600_000 + m * 60_000 + (s * 1000.0).round() as u64)
}
