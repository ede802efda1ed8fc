//! Media inspection via ffprobe.
//!
//! Probing is read-only: one ffprobe invocation per source, parsed from its
//! JSON output into a [`ProbeResult`]. Browser captures routinely declare
//! nonsense here (1000 fps WebM streams, missing container durations), so
//! the probe's job is as much flagging lies as reporting facts.

use std::path::Path;

use serde::Deserialize;
use tokio::process::Command;

use reelcut_common::{ReelcutError, ReelcutResult};
use reelcut_job_model::{DurationAnomaly, ProbeResult, SourceRole};

/// Declared rates at or above this are detection artifacts, not real rates.
const SUSPECT_FPS: f64 = 500.0;

/// Durations beyond this are treated as broken metadata (24 hours).
const MAX_PLAUSIBLE_DURATION_SECS: f64 = 24.0 * 3600.0;

/// Relative disagreement between declared and average rate that marks a
/// stream as effectively variable-rate.
const VFR_TOLERANCE: f64 = 0.01;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Inspect a local media file.
///
/// Fatal for the given source when the file is unreadable, has no video
/// stream, or ffprobe output cannot be parsed.
pub async fn probe(path: &Path, role: SourceRole) -> ReelcutResult<ProbeResult> {
    if !path.exists() {
        return Err(ReelcutError::source_unreadable(
            role.as_str(),
            format!("file not found: {}", path.display()),
        ));
    }

    let output = Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_streams", "-show_format"])
        .arg(path)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            ReelcutError::source_unreadable(role.as_str(), format!("failed to run ffprobe: {e}"))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ReelcutError::source_unreadable(
            role.as_str(),
            format!(
                "ffprobe exited with {}: {}",
                output.status,
                stderr.trim().lines().last().unwrap_or("<no stderr>")
            ),
        ));
    }

    let result = parse_probe_output(&output.stdout, role)?;
    tracing::debug!(
        source = role.as_str(),
        width = result.width,
        height = result.height,
        fps = result.fps,
        duration_secs = ?result.duration_secs,
        fps_suspect = result.fps_suspect,
        vfr = result.variable_frame_rate,
        anomaly = ?result.duration_anomaly,
        "Probed source"
    );
    Ok(result)
}

/// Parse raw ffprobe JSON into a [`ProbeResult`].
fn parse_probe_output(stdout: &[u8], role: SourceRole) -> ReelcutResult<ProbeResult> {
    let parsed: FfprobeOutput = serde_json::from_slice(stdout).map_err(|e| {
        ReelcutError::source_unreadable(role.as_str(), format!("unparsable ffprobe output: {e}"))
    })?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| ReelcutError::source_unreadable(role.as_str(), "no video stream"))?;
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(ReelcutError::source_unreadable(
                role.as_str(),
                "video stream reports no dimensions",
            ))
        }
    };

    let declared_fps = video.r_frame_rate.as_deref().and_then(parse_fps);
    let average_fps = video.avg_frame_rate.as_deref().and_then(parse_fps);
    let fps = declared_fps.or(average_fps).unwrap_or(0.0);
    let fps_suspect = fps <= 0.0 || fps >= SUSPECT_FPS;
    let variable_frame_rate = is_variable_rate(declared_fps, average_fps);

    // Container duration, falling back to the video stream's own.
    let duration_secs = parsed
        .format
        .and_then(|f| f.duration)
        .or_else(|| video.duration.clone())
        .and_then(|s| s.parse::<f64>().ok());
    let duration_anomaly = classify_duration(duration_secs);

    Ok(ProbeResult {
        duration_secs,
        fps,
        fps_suspect,
        variable_frame_rate,
        width,
        height,
        pixel_format: video.pix_fmt.clone().unwrap_or_else(|| "unknown".to_string()),
        has_audio,
        duration_anomaly,
    })
}

/// ffprobe reports frame rates as fractions ("30000/1001") or decimals.
fn parse_fps(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den == 0.0 {
            return None;
        }
        Some(num / den)
    } else {
        s.parse().ok()
    }
}

fn is_variable_rate(declared: Option<f64>, average: Option<f64>) -> bool {
    match (declared, average) {
        (Some(d), Some(a)) if d > 0.0 && a > 0.0 => ((d - a) / d).abs() > VFR_TOLERANCE,
        // An average the demuxer could not even compute is itself a VFR tell.
        (Some(_), None) | (Some(_), Some(_)) => true,
        _ => false,
    }
}

fn classify_duration(duration_secs: Option<f64>) -> DurationAnomaly {
    match duration_secs {
        None => DurationAnomaly::Missing,
        Some(d) if d <= 0.0 => DurationAnomaly::Zero,
        Some(d) if d > MAX_PLAUSIBLE_DURATION_SECS => DurationAnomaly::Implausible,
        Some(_) => DurationAnomaly::Plausible,
    }
}

/// Whether a binary is reachable on PATH.
pub fn command_exists(binary: &str) -> bool {
    std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_json(r_rate: &str, avg_rate: &str, duration: Option<&str>) -> Vec<u8> {
        let duration_field = duration
            .map(|d| format!(r#","duration": "{d}""#))
            .unwrap_or_default();
        format!(
            r#"{{
                "streams": [
                    {{
                        "codec_type": "video",
                        "width": 1920,
                        "height": 1080,
                        "pix_fmt": "yuv420p",
                        "r_frame_rate": "{r_rate}",
                        "avg_frame_rate": "{avg_rate}"
                    }},
                    {{ "codec_type": "audio", "codec_name": "opus" }}
                ],
                "format": {{ "filename": "a.webm"{duration_field} }}
            }}"#
        )
        .into_bytes()
    }

    #[test]
    fn test_parse_fps_handles_fractions() {
        assert!((parse_fps("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_fps("25").unwrap() - 25.0).abs() < 1e-9);
        assert!((parse_fps("29.97").unwrap() - 29.97).abs() < 1e-9);
        assert!(parse_fps("30/0").is_none());
        assert!(parse_fps("garbage").is_none());
    }

    #[test]
    fn test_clean_probe() {
        let result =
            parse_probe_output(&probe_json("30/1", "30/1", Some("12.5")), SourceRole::Primary)
                .unwrap();
        assert_eq!((result.width, result.height), (1920, 1080));
        assert!((result.fps - 30.0).abs() < 1e-9);
        assert!(!result.fps_suspect);
        assert!(!result.variable_frame_rate);
        assert!(result.has_audio);
        assert_eq!(result.duration_anomaly, DurationAnomaly::Plausible);
    }

    #[test]
    fn test_thousand_fps_artifact_is_flagged() {
        let result =
            parse_probe_output(&probe_json("1000/1", "1000/1", Some("8.0")), SourceRole::Primary)
                .unwrap();
        assert!(result.fps_suspect);
    }

    #[test]
    fn test_rate_disagreement_marks_vfr() {
        let result =
            parse_probe_output(&probe_json("30/1", "24/1", Some("8.0")), SourceRole::Primary)
                .unwrap();
        assert!(result.variable_frame_rate);

        // NTSC-style fractions within tolerance are not VFR.
        let result = parse_probe_output(
            &probe_json("30000/1001", "30000/1001", Some("8.0")),
            SourceRole::Primary,
        )
        .unwrap();
        assert!(!result.variable_frame_rate);
    }

    #[test]
    fn test_duration_classification() {
        assert_eq!(classify_duration(None), DurationAnomaly::Missing);
        assert_eq!(classify_duration(Some(0.0)), DurationAnomaly::Zero);
        assert_eq!(classify_duration(Some(90000.0)), DurationAnomaly::Implausible);
        assert_eq!(classify_duration(Some(42.0)), DurationAnomaly::Plausible);
    }

    #[test]
    fn test_missing_duration_is_an_anomaly_not_an_error() {
        let result =
            parse_probe_output(&probe_json("30/1", "30/1", None), SourceRole::Primary).unwrap();
        assert!(result.duration_secs.is_none());
        assert_eq!(result.duration_anomaly, DurationAnomaly::Missing);
        assert!(result.needs_remux());
    }

    #[test]
    fn test_no_video_stream_is_fatal_and_names_the_source() {
        let json = br#"{ "streams": [ { "codec_type": "audio" } ], "format": {} }"#;
        let err = parse_probe_output(json, SourceRole::Secondary).unwrap_err();
        assert!(err.to_string().contains("secondary"));
        assert!(err.to_string().contains("no video stream"));
    }
}
