//! Wire-format job requests and their validation into `Job`.
//!
//! Requests arrive as JSON from the upstream request service. Every knob is
//! optional on the wire; validation reports *all* problems in one pass and
//! resolves every default exactly here. Nothing downstream of `validate`
//! ever supplies a fallback value.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::job::{
    uuid_v4, AudioMix, CaptionStyle, Job, JobStatus, OutputSpec, PanelSpec, ReframeMode,
    ThreePersonLayout,
};
use crate::source::{SourceRole, SourceSpec, StackPosition};

/// Default crop positions for the two panels of a single-source split.
pub const DEFAULT_SPLIT_POSITIONS: [f64; 2] = [17.0, 83.0];

/// Default crop positions for the three panels of a single-source three-person cut.
pub const DEFAULT_THREE_POSITIONS: [f64; 3] = [12.0, 50.0, 88.0];

/// Default crop width for panel crops, as a percentage of source width.
pub const DEFAULT_CROP_WIDTH_PERCENT: f64 = 50.0;

/// Default crop position when a source does not specify one.
pub const DEFAULT_CROP_POSITION: f64 = 50.0;

/// Narrowest allowed panel crop, as a percentage of source width.
const MIN_CROP_WIDTH_PERCENT: f64 = 10.0;

/// A job request as received from the upstream collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobRequest {
    /// Frame composition mode. Required.
    pub reframe_mode: Option<ReframeMode>,

    /// Primary source. Required.
    pub primary_source: Option<SourceRequest>,

    /// Secondary source for two-source modes.
    pub secondary_source: Option<SourceRequest>,

    /// Crop positions for panels derived from a single source
    /// (`split_screen` needs 2, `three_person` needs 3; with two sources,
    /// `three_person` reads the primary's 2 panel positions from here).
    pub panel_positions: Option<Vec<f64>>,

    /// Audio mix levels. Defaults to primary-only.
    pub audio_mix: AudioMix,

    /// Caption style. Defaults to none.
    pub caption_style: CaptionStyle,

    /// Layout for `three_person` jobs.
    pub three_person_layout: ThreePersonLayout,

    /// Output dimensions and frame rate. Defaults to 1080x1920 at 30 fps.
    pub output_spec: Option<OutputSpecRequest>,

    /// Nominal capture speed of a legacy client (e.g., 2.0). Absent or 1.0
    /// means a modern 1x capture.
    pub capture_speed_scale: Option<f64>,

    /// Real-world duration a legacy source was meant to span, in seconds.
    pub intended_duration_seconds: Option<f64>,
}

/// One source entry on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceRequest {
    /// Local filesystem path. Required.
    pub local_path: Option<String>,

    /// Crop position as a percentage of usable horizontal travel [0, 100].
    pub crop_position: Option<f64>,

    /// Crop width as a percentage of source width.
    pub crop_width_percent: Option<f64>,

    /// Start offset relative to the other source, in seconds.
    pub time_offset_seconds: Option<f64>,

    /// Panel slot in stacked layouts.
    pub position: Option<StackPosition>,
}

/// Output spec on the wire; fps is optional.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OutputSpecRequest {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub fps: Option<u32>,
}

/// Errors that can occur when working with job requests.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid request: {}", problems.join("; "))]
    ValidationError { problems: Vec<String> },
}

impl JobRequest {
    /// Read and parse a request file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RequestError> {
        let path = path.as_ref().to_path_buf();
        let json = std::fs::read_to_string(&path).map_err(|e| RequestError::IoError {
            path: path.clone(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| RequestError::ParseError { path, source: e })
    }

    /// Validate the request and resolve every default, producing a `Job`.
    ///
    /// All problems are collected and reported together, not one at a time.
    pub fn validate(self) -> Result<Job, RequestError> {
        let mut problems = vec![];

        let mode = match self.reframe_mode {
            Some(m) => m,
            None => {
                problems.push("reframe_mode is required".to_string());
                ReframeMode::AutoCenter
            }
        };

        let mut sources = vec![];
        match &self.primary_source {
            Some(req) => {
                if let Some(spec) =
                    resolve_source(req, SourceRole::Primary, StackPosition::Top, &mut problems)
                {
                    sources.push(spec);
                }
            }
            None => problems.push("primary_source is required".to_string()),
        }

        if let Some(req) = &self.secondary_source {
            if mode == ReframeMode::AutoCenter {
                problems.push("auto_center uses a single source; remove secondary_source".to_string());
            } else {
                let default_position = match sources.first().map(|s| s.position) {
                    Some(StackPosition::Top) => StackPosition::Bottom,
                    Some(StackPosition::Bottom) => StackPosition::Top,
                    None => StackPosition::Bottom,
                };
                if let Some(mut spec) =
                    resolve_source(req, SourceRole::Secondary, default_position, &mut problems)
                {
                    // Two sources cannot share a slot; the primary's choice wins.
                    if let Some(primary) = sources.first() {
                        if spec.position == primary.position {
                            spec.position = default_position;
                        }
                    }
                    sources.push(spec);
                }
            }
        }

        let panels = resolve_panels(mode, &sources, self.panel_positions.as_deref(), &mut problems);

        let audio_mix = AudioMix {
            primary_volume: self.audio_mix.primary_volume.clamp(0.0, 100.0),
            secondary_volume: self.audio_mix.secondary_volume.clamp(0.0, 100.0),
        };

        let output = resolve_output(self.output_spec);

        let capture_speed_scale = match self.capture_speed_scale {
            Some(s) if s <= 0.0 => {
                problems.push(format!("capture_speed_scale must be positive, got {s}"));
                None
            }
            // 1x is a modern capture; treat as unset.
            Some(s) if (s - 1.0).abs() < 1e-9 => None,
            other => other,
        };

        if !problems.is_empty() {
            return Err(RequestError::ValidationError { problems });
        }

        Ok(Job {
            id: uuid_v4(),
            created_at: chrono::Utc::now().to_rfc3339(),
            status: JobStatus::Pending,
            reframe_mode: mode,
            sources,
            panels,
            three_person_layout: self.three_person_layout,
            audio_mix,
            caption_style: self.caption_style,
            output,
            capture_speed_scale,
            intended_duration_secs: self.intended_duration_seconds,
        })
    }
}

fn resolve_source(
    req: &SourceRequest,
    role: SourceRole,
    default_position: StackPosition,
    problems: &mut Vec<String>,
) -> Option<SourceSpec> {
    let path = match req.local_path.as_deref() {
        Some(p) if !p.trim().is_empty() => PathBuf::from(p),
        _ => {
            problems.push(format!("{role}_source.local_path is required"));
            return None;
        }
    };

    let offset = req.time_offset_seconds.unwrap_or(0.0);
    if offset < 0.0 {
        problems.push(format!(
            "{role}_source.time_offset_seconds must be >= 0, got {offset}"
        ));
    }

    Some(SourceSpec {
        role,
        local_path: path,
        crop_position: req
            .crop_position
            .unwrap_or(DEFAULT_CROP_POSITION)
            .clamp(0.0, 100.0),
        crop_width_percent: req
            .crop_width_percent
            .unwrap_or(DEFAULT_CROP_WIDTH_PERCENT)
            .clamp(MIN_CROP_WIDTH_PERCENT, 100.0),
        time_offset_secs: offset.max(0.0),
        position: req.position.unwrap_or(default_position),
    })
}

/// Resolve the panel plan for the mode and source count.
///
/// Panels come back in render order (top of the stack first).
fn resolve_panels(
    mode: ReframeMode,
    sources: &[SourceSpec],
    panel_positions: Option<&[f64]>,
    problems: &mut Vec<String>,
) -> Vec<PanelSpec> {
    if sources.is_empty() {
        return vec![];
    }

    let clamped = |p: f64| p.clamp(0.0, 100.0);
    let panel = |source_index: usize, position: f64, width: Option<f64>| PanelSpec {
        source_index,
        crop_position: clamped(position),
        crop_width_percent: width,
    };
    let source_panel = |idx: usize, position: f64| {
        panel(idx, position, Some(sources[idx].crop_width_percent))
    };

    match (mode, sources.len()) {
        (ReframeMode::AutoCenter, _) => {
            // Full-height crop; width comes from the output aspect.
            vec![panel(0, sources[0].crop_position, None)]
        }
        (ReframeMode::SplitScreen, 1) => {
            let positions = expect_positions(panel_positions, &DEFAULT_SPLIT_POSITIONS, "split_screen", 2, problems);
            positions.iter().map(|&p| source_panel(0, p)).collect()
        }
        (ReframeMode::SplitScreen, _) => {
            let (top, bottom) = stacked_order(sources);
            vec![
                source_panel(top, sources[top].crop_position),
                source_panel(bottom, sources[bottom].crop_position),
            ]
        }
        (ReframeMode::ThreePerson, 1) => {
            let positions = expect_positions(panel_positions, &DEFAULT_THREE_POSITIONS, "three_person", 3, problems);
            positions.iter().map(|&p| source_panel(0, p)).collect()
        }
        (ReframeMode::ThreePerson, _) => {
            // The primary is the wide shot and contributes two panels.
            let positions =
                expect_positions(panel_positions, &DEFAULT_SPLIT_POSITIONS, "three_person", 2, problems);
            let mut panels: Vec<PanelSpec> =
                positions.iter().map(|&p| source_panel(0, p)).collect();
            let secondary = source_panel(1, sources[1].crop_position);
            if sources[1].position == StackPosition::Top {
                panels.insert(0, secondary);
            } else {
                panels.push(secondary);
            }
            panels
        }
    }
}

fn expect_positions(
    provided: Option<&[f64]>,
    defaults: &[f64],
    mode: &str,
    expected: usize,
    problems: &mut Vec<String>,
) -> Vec<f64> {
    match provided {
        Some(positions) if positions.len() == expected => positions.to_vec(),
        Some(positions) => {
            problems.push(format!(
                "panel_positions for {mode} with this source count needs {expected} entries, got {}",
                positions.len()
            ));
            defaults[..expected].to_vec()
        }
        None => defaults[..expected].to_vec(),
    }
}

/// Index of the top and bottom source for a two-source stack.
fn stacked_order(sources: &[SourceSpec]) -> (usize, usize) {
    if sources[1].position == StackPosition::Top {
        (1, 0)
    } else {
        (0, 1)
    }
}

fn resolve_output(spec: Option<OutputSpecRequest>) -> OutputSpec {
    let defaults = OutputSpec::default();
    match spec {
        Some(req) => OutputSpec {
            // Encoders want even dimensions; round down rather than reject.
            width: (req.width.max(2)) & !1,
            height: (req.height.max(2)) & !1,
            fps: req.fps.unwrap_or(defaults.fps).clamp(1, 120),
        },
        None => defaults,
    }
}
