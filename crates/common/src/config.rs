//! Worker configuration.
//!
//! One `WorkerConfig` record is loaded from the environment at startup and
//! passed down; no component reads environment variables on its own. Every
//! default lives here and nowhere else.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Honor the legacy `capture_speed_scale` flag on jobs from old capture
    /// clients (video-only PTS rescaling). Off by default.
    pub legacy_pts_rescale: bool,

    /// Credential for the transcription collaborator. Captions are disabled
    /// when absent.
    pub transcription_key: Option<String>,

    /// Command invoked for transcription (receives the credential via its
    /// environment).
    pub transcribe_command: String,

    /// Hardware encoder preference.
    pub hardware: HardwarePreference,

    /// Job wall-clock budget in seconds.
    pub job_timeout_secs: u64,

    /// Root directory for per-job scratch directories.
    pub scratch_dir: PathBuf,

    /// Directory finished outputs are published into.
    pub output_dir: PathBuf,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Whether to use the hardware encoding path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HardwarePreference {
    /// Probe `ffmpeg -encoders` and use hardware when present.
    #[default]
    Auto,
    /// Assume hardware is present; fail into software fallback if not.
    On,
    /// Software only.
    Off,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reelcut=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            legacy_pts_rescale: false,
            transcription_key: None,
            transcribe_command: "transcribe".to_string(),
            hardware: HardwarePreference::Auto,
            job_timeout_secs: 600,
            scratch_dir: std::env::temp_dir(),
            output_dir: PathBuf::from("output"),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl WorkerConfig {
    /// Load config from the environment, falling back to defaults for
    /// anything unset. Invalid values are logged and replaced by the
    /// default rather than aborting startup.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            legacy_pts_rescale: env_bool("REELCUT_LEGACY_PTS_RESCALE", defaults.legacy_pts_rescale),
            transcription_key: env_nonempty("REELCUT_TRANSCRIBE_KEY"),
            transcribe_command: env_nonempty("REELCUT_TRANSCRIBE_CMD")
                .unwrap_or(defaults.transcribe_command),
            hardware: env_hardware("REELCUT_HWACCEL", defaults.hardware),
            job_timeout_secs: env_u64("REELCUT_TIMEOUT_SECS", defaults.job_timeout_secs),
            scratch_dir: env_nonempty("REELCUT_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.scratch_dir),
            output_dir: env_nonempty("REELCUT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            logging: LoggingConfig {
                level: env_nonempty("REELCUT_LOG").unwrap_or(defaults.logging.level),
                json: env_bool("REELCUT_LOG_JSON", defaults.logging.json),
            },
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match env_nonempty(key) {
        Some(v) => parse_bool(&v).unwrap_or_else(|| {
            tracing::warn!("Ignoring invalid boolean {}={:?}", key, v);
            default
        }),
        None => default,
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env_nonempty(key) {
        Some(v) => match v.parse() {
            Ok(n) => n,
            Err(_) => {
                tracing::warn!("Ignoring invalid integer {}={:?}", key, v);
                default
            }
        },
        None => default,
    }
}

fn parse_hardware(value: &str) -> Option<HardwarePreference> {
    match value {
        "auto" => Some(HardwarePreference::Auto),
        "on" | "hardware" => Some(HardwarePreference::On),
        "off" | "software" => Some(HardwarePreference::Off),
        _ => None,
    }
}

fn env_hardware(key: &str, default: HardwarePreference) -> HardwarePreference {
    match env_nonempty(key) {
        Some(v) => parse_hardware(&v).unwrap_or_else(|| {
            tracing::warn!("Ignoring invalid hardware preference {}={:?}", key, v);
            default
        }),
        None => default,
    }
}
