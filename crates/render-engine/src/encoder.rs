//! Encoder backend selection and codec arguments.
//!
//! Two backends: NVENC hardware encoding when the local ffmpeg build has
//! it, libx264 software encoding otherwise. Detection is one cheap
//! `ffmpeg -encoders` run; the orchestrator handles the runtime fallback
//! when a detected encoder still fails (driver present, no usable device).

use tokio::process::Command;

use reelcut_common::HardwarePreference;
use reelcut_job_model::{EncodingPath, OutputSpec};

/// Encoder name looked for in the ffmpeg encoder listing.
const HW_ENCODER: &str = "h264_nvenc";

/// A resolved encoder backend and its codec arguments.
#[derive(Debug, Clone)]
pub struct EncodingPlan {
    pub path: EncodingPath,
    codec_args: Vec<String>,
}

impl EncodingPlan {
    /// Codec arguments for one backend at the given output spec.
    pub fn for_path(path: EncodingPath, output: &OutputSpec) -> Self {
        let mut args: Vec<String> = match path {
            EncodingPath::Hardware => [
                "-c:v",
                HW_ENCODER,
                "-preset",
                "p4",
                "-rc",
                "vbr",
                "-cq",
                "23",
                "-b:v",
                "0",
                // B-frames stutter on some NVENC generations with stacked
                // filter outputs; a GOP of one second keeps seeking snappy.
                "-bf",
                "0",
                "-g",
                &output.fps.to_string(),
                // Named profile strings break against some NVENC builds;
                // auto is the portable choice.
                "-profile:v",
                "auto",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            EncodingPath::Software => [
                "-c:v", "libx264", "-preset", "veryfast", "-crf", "23", "-profile:v", "high",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        };

        for arg in [
            "-pix_fmt",
            "yuv420p",
            "-c:a",
            "aac",
            "-b:a",
            "192k",
            "-ar",
            "48000",
            "-movflags",
            "+faststart",
        ] {
            args.push(arg.to_string());
        }

        Self {
            path,
            codec_args: args,
        }
    }

    pub fn codec_args(&self) -> &[String] {
        &self.codec_args
    }
}

/// Pick the encoding path for a hardware preference.
///
/// `On`/`Off` are taken at face value; only `Auto` probes the ffmpeg build.
pub async fn select_encoding_path(preference: HardwarePreference) -> EncodingPath {
    match preference {
        HardwarePreference::Off => EncodingPath::Software,
        HardwarePreference::On => EncodingPath::Hardware,
        HardwarePreference::Auto => {
            if hardware_encoder_available().await {
                tracing::info!(encoder = HW_ENCODER, "Hardware encoder detected");
                EncodingPath::Hardware
            } else {
                tracing::info!("No hardware encoder, using libx264");
                EncodingPath::Software
            }
        }
    }
}

/// Whether the local ffmpeg build lists the NVENC H.264 encoder.
pub async fn hardware_encoder_available() -> bool {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(out) if out.status.success() => {
            listing_has_encoder(&String::from_utf8_lossy(&out.stdout))
        }
        _ => false,
    }
}

fn listing_has_encoder(listing: &str) -> bool {
    listing
        .lines()
        .any(|line| line.split_whitespace().any(|word| word == HW_ENCODER))
}
