//! Job records: the validated unit of work and its terminal result.
//!
//! A `Job` is created exactly once, by request validation, with every
//! default already resolved. The orchestrator is the only component that
//! mutates it (status transitions); everything downstream reads it.

use serde::{Deserialize, Serialize};

use crate::source::{SourceRole, SourceSpec};

/// How the output frame is composed from the source(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReframeMode {
    /// One crop window slid across the frame to follow the action.
    AutoCenter,
    /// Two panels stacked vertically, from one source or two.
    SplitScreen,
    /// Three panels, stacked or in a grid.
    ThreePerson,
}

/// Layout for `three_person` jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThreePersonLayout {
    /// Three full-width panels stacked vertically.
    #[default]
    Stack,
    /// One full-width panel on top, two side by side below.
    Grid,
}

/// Caption rendering style, or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionStyle {
    #[default]
    None,
    /// Plain white text, bottom-centered.
    Clean,
    /// Large bold text with outline, word-grouped.
    Bold,
    /// Highlighted karaoke-style lines.
    Highlight,
}

impl CaptionStyle {
    pub fn is_none(&self) -> bool {
        matches!(self, CaptionStyle::None)
    }
}

/// Relative audio levels for the mix, as percentages [0, 100].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioMix {
    pub primary_volume: f64,
    pub secondary_volume: f64,
}

impl Default for AudioMix {
    fn default() -> Self {
        Self {
            primary_volume: 100.0,
            secondary_volume: 0.0,
        }
    }
}

/// Target output dimensions and frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for OutputSpec {
    fn default() -> Self {
        // Vertical 9:16 at 30 fps, the platform's publishing format.
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
        }
    }
}

/// One rendered participant region, resolved at validation.
///
/// Every mode reduces to a list of these; downstream crop math iterates
/// panels and never branches on the mode again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PanelSpec {
    /// Index into `Job::sources`.
    pub source_index: usize,

    /// Crop position as a percentage of usable horizontal travel [0, 100].
    pub crop_position: f64,

    /// Crop width as a percentage of the source width. `None` means the
    /// crop width is derived from the panel's aspect ratio (full-height
    /// crop), as in `auto_center`.
    pub crop_width_percent: Option<f64>,
}

/// Coarse externally visible job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// Which encoder backend produced the published output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingPath {
    Hardware,
    Software,
}

impl EncodingPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingPath::Hardware => "hardware",
            EncodingPath::Software => "software",
        }
    }
}

/// One validated rendering request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier (UUID).
    pub id: String,

    /// Creation timestamp (ISO 8601).
    pub created_at: String,

    /// Coarse status, mutated only by the orchestrator.
    pub status: JobStatus,

    /// Frame composition mode.
    pub reframe_mode: ReframeMode,

    /// Validated sources, primary first. Length 1 or 2.
    pub sources: Vec<SourceSpec>,

    /// Resolved panel plan, one entry per rendered region.
    pub panels: Vec<PanelSpec>,

    /// Layout for `three_person` jobs.
    pub three_person_layout: ThreePersonLayout,

    /// Audio mix levels.
    pub audio_mix: AudioMix,

    /// Caption style, or none.
    pub caption_style: CaptionStyle,

    /// Output dimensions and frame rate.
    pub output: OutputSpec,

    /// Nominal capture speed of a legacy source (e.g., 2.0 for 2x).
    /// `None` for modern clients; honored only when the worker's
    /// legacy-rescale toggle is on.
    pub capture_speed_scale: Option<f64>,

    /// Real-world duration the legacy source was meant to span, in seconds.
    pub intended_duration_secs: Option<f64>,
}

impl Job {
    /// The primary source. Validation guarantees at least one source.
    pub fn primary(&self) -> &SourceSpec {
        &self.sources[0]
    }

    /// The secondary source, if the job has one.
    pub fn secondary(&self) -> Option<&SourceSpec> {
        self.sources.get(1)
    }

    /// Find a source by role.
    pub fn source(&self, role: SourceRole) -> Option<&SourceSpec> {
        self.sources.iter().find(|s| s.role == role)
    }
}

/// Terminal record reported back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    /// Identifier of the job this result belongs to.
    pub job_id: String,

    /// Terminal status (`succeeded` or `failed`).
    pub status: JobStatus,

    /// Published output locator, present only on success.
    pub output_path: Option<String>,

    /// Encoder backend that produced the output, when encoding ran.
    pub encoding_path_used: Option<EncodingPath>,

    /// Whether a caption track was burned into the output.
    pub captions_applied: bool,

    /// Human-readable failure reason, present only on failure.
    pub failure_reason: Option<String>,

    /// Wall-clock time the job started (ISO 8601).
    pub started_at: String,

    /// Wall-clock seconds from acceptance to terminal status.
    pub elapsed_secs: f64,
}

impl JobResult {
    /// Build a success record.
    pub fn succeeded(
        job_id: impl Into<String>,
        output_path: impl Into<String>,
        encoding_path: EncodingPath,
        captions_applied: bool,
        started_at: impl Into<String>,
        elapsed_secs: f64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Succeeded,
            output_path: Some(output_path.into()),
            encoding_path_used: Some(encoding_path),
            captions_applied,
            failure_reason: None,
            started_at: started_at.into(),
            elapsed_secs,
        }
    }

    /// Build a failure record.
    pub fn failed(
        job_id: impl Into<String>,
        reason: impl Into<String>,
        encoding_path: Option<EncodingPath>,
        started_at: impl Into<String>,
        elapsed_secs: f64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Failed,
            output_path: None,
            encoding_path_used: encoding_path,
            captions_applied: false,
            failure_reason: Some(reason.into()),
            started_at: started_at.into(),
            elapsed_secs,
        }
    }
}

/// Generate a simple UUID v4 without external dependency.
pub(crate) fn uuid_v4() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!(
        "{:08x}-{:04x}-4{:03x}-{:04x}-{:012x}",
        (seed & 0xFFFFFFFF) as u32,
        ((seed >> 32) & 0xFFFF) as u16,
        ((seed >> 48) & 0x0FFF) as u16,
        (((seed >> 60) & 0x3F) | 0x80) as u16 | (((seed >> 66) & 0x3FF) as u16) << 6,
        (seed >> 76) & 0xFFFFFFFFFFFF,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_path_serializes_lowercase() {
        let json = serde_json::to_string(&EncodingPath::Software).unwrap();
        assert_eq!(json, "\"software\"");
    }

    #[test]
    fn test_audio_mix_defaults_to_primary_only() {
        let mix = AudioMix::default();
        assert!((mix.primary_volume - 100.0).abs() < 1e-9);
        assert!((mix.secondary_volume - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_output_spec_default_is_vertical() {
        let spec = OutputSpec::default();
        assert_eq!((spec.width, spec.height, spec.fps), (1080, 1920, 30));
    }

    #[test]
    fn test_result_success_shape() {
        let result = JobResult::succeeded(
            "job-1",
            "output/job-1.mp4",
            EncodingPath::Software,
            true,
            "2024-01-01T00:00:00Z",
            4.2,
        );
        assert_eq!(result.status, JobStatus::Succeeded);
        assert_eq!(result.output_path.as_deref(), Some("output/job-1.mp4"));
        assert!(result.failure_reason.is_none());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["encoding_path_used"], "software");
        assert_eq!(json["captions_applied"], true);
    }

    #[test]
    fn test_result_failure_has_no_output() {
        let result = JobResult::failed(
            "job-2",
            "Timed out during encoding after 600s",
            None,
            "2024-01-01T00:00:00Z",
            600.1,
        );
        assert!(result.output_path.is_none());
        assert!(result
            .failure_reason
            .as_deref()
            .unwrap()
            .contains("Timed out"));
    }

    #[test]
    fn test_uuid_shape() {
        let id = uuid_v4();
        assert_eq!(id.len(), 36);
        assert_eq!(id.chars().filter(|c| *c == '-').count(), 4);
    }
}
