//! Source descriptors and probe metadata.
//!
//! A job references one or two local media files. Each carries its own crop
//! and timing controls; probe metadata is captured once per source and never
//! mutated afterwards.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which slot a source occupies in the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    Primary,
    Secondary,
    /// The worker's own rendered output, probed during verification. Never
    /// present in a job request.
    Rendered,
}

impl SourceRole {
    /// Stable label used in logs and source-level error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceRole::Primary => "primary",
            SourceRole::Secondary => "secondary",
            SourceRole::Rendered => "rendered",
        }
    }
}

impl std::fmt::Display for SourceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vertical slot a source's panel occupies in stacked layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StackPosition {
    #[default]
    Top,
    Bottom,
}

/// One validated source attached to a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Slot this source fills.
    pub role: SourceRole,

    /// Local filesystem path (already downloaded by the acquisition service).
    pub local_path: PathBuf,

    /// Crop position as a percentage of usable horizontal travel [0, 100].
    pub crop_position: f64,

    /// Crop width as a percentage of the source width, for panel crops.
    pub crop_width_percent: f64,

    /// Start offset relative to the other source, in seconds.
    pub time_offset_secs: f64,

    /// Where this source's panel lands in stacked layouts.
    pub position: StackPosition,
}

/// Classification of the container-reported duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DurationAnomaly {
    /// Duration present and plausible.
    #[default]
    Plausible,
    /// Container reports no duration at all.
    Missing,
    /// Duration is zero.
    Zero,
    /// Duration exceeds 24 hours.
    Implausible,
}

/// Immutable snapshot of one probed source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Container duration in seconds, when present and parseable.
    pub duration_secs: Option<f64>,

    /// Declared frame rate (may be a detection artifact, see `fps_suspect`).
    pub fps: f64,

    /// Declared rate is implausibly high (>= 500 fps) and must not be
    /// trusted for output timing.
    pub fps_suspect: bool,

    /// Average and declared rates disagree: the stream is effectively VFR.
    pub variable_frame_rate: bool,

    /// Video frame width in pixels.
    pub width: u32,

    /// Video frame height in pixels.
    pub height: u32,

    /// Pixel format reported by the probe (e.g., "yuv420p").
    pub pixel_format: String,

    /// Whether the container carries at least one audio stream.
    pub has_audio: bool,

    /// Duration anomaly classification.
    pub duration_anomaly: DurationAnomaly,
}

impl ProbeResult {
    /// Whether the container metadata warrants a stream-copy remux before
    /// any further processing.
    pub fn needs_remux(&self) -> bool {
        self.duration_anomaly != DurationAnomaly::Plausible
    }

    /// Whether the declared timing cannot be trusted and a constant output
    /// rate must be forced at render time.
    pub fn needs_cfr(&self) -> bool {
        self.fps_suspect || self.variable_frame_rate
    }
}

/// A source with its timing corrections resolved, ready for graph building.
///
/// Produced by the normalizer; `path` may point at a remuxed temp file in
/// the job scratch directory rather than the original source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedSource {
    /// Slot this source fills.
    pub role: SourceRole,

    /// File the renderer should read.
    pub path: PathBuf,

    /// Probe of `path` (re-probed after a remux).
    pub probe: ProbeResult,

    /// Regenerate missing presentation timestamps from decode timestamps
    /// when demuxing this input.
    pub regen_pts: bool,

    /// The declared rate is untrustworthy; the renderer must force a
    /// constant output frame rate instead.
    pub force_cfr: bool,

    /// Rescale every video presentation timestamp by this factor before
    /// any other filtering. Audio is never rescaled to match.
    pub video_pts_scale: Option<f64>,

    /// Whether a metadata-repair remux was applied.
    pub remuxed: bool,
}

impl NormalizedSource {
    /// Duration this source will span once corrections are applied.
    pub fn expected_duration_secs(&self) -> Option<f64> {
        let span = self.probe.duration_secs?;
        Some(match self.video_pts_scale {
            Some(scale) => span * scale,
            None => span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(fps: f64, suspect: bool, vfr: bool, anomaly: DurationAnomaly) -> ProbeResult {
        ProbeResult {
            duration_secs: Some(12.0),
            fps,
            fps_suspect: suspect,
            variable_frame_rate: vfr,
            width: 1920,
            height: 1080,
            pixel_format: "yuv420p".to_string(),
            has_audio: true,
            duration_anomaly: anomaly,
        }
    }

    #[test]
    fn test_clean_probe_needs_nothing() {
        let p = probe(30.0, false, false, DurationAnomaly::Plausible);
        assert!(!p.needs_remux());
        assert!(!p.needs_cfr());
    }

    #[test]
    fn test_suspect_rate_forces_cfr() {
        let p = probe(1000.0, true, false, DurationAnomaly::Plausible);
        assert!(p.needs_cfr());
        assert!(!p.needs_remux());
    }

    #[test]
    fn test_duration_anomaly_wants_remux() {
        for anomaly in [
            DurationAnomaly::Missing,
            DurationAnomaly::Zero,
            DurationAnomaly::Implausible,
        ] {
            assert!(probe(30.0, false, false, anomaly).needs_remux());
        }
    }

    #[test]
    fn test_role_labels() {
        assert_eq!(SourceRole::Primary.as_str(), "primary");
        assert_eq!(SourceRole::Secondary.to_string(), "secondary");
        assert_eq!(SourceRole::Rendered.as_str(), "rendered");
    }
}
