//! Timestamp normalization for browser-captured sources.
//!
//! Two independent defects have to be corrected before any filtering runs,
//! or every downstream crop/stack computation operates on wrong timing:
//!
//! 1. **Broken container metadata** (missing/zero/implausible duration):
//!    repaired by a stream-copy remux into the job scratch directory.
//!    Repair failure is logged and the original file kept — non-fatal.
//! 2. **Captured-at-Nx-speed legacy sources**: video presentation
//!    timestamps are rescaled by `intended duration / captured span`.
//!    Audio is captured at true 1x and must never get a tempo filter;
//!    a missing intended duration makes the factor incomputable — fatal.
//!
//! Untrustworthy frame rates (suspect or variable) additionally force a
//! constant output rate at render time.

use std::path::Path;

use tokio::process::Command;

use reelcut_common::{ReelcutError, ReelcutResult, WorkerConfig};
use reelcut_job_model::{Job, NormalizedSource, ProbeResult, SourceSpec};

use crate::probe::probe;

/// Computed scale factors further than this from the client's nominal
/// speed flag are logged; the computed value still wins.
const NOMINAL_SCALE_TOLERANCE: f64 = 0.25;

/// Normalize one probed source.
///
/// `scratch` is the job's scratch directory; any repaired file lands there.
pub async fn normalize(
    source: &SourceSpec,
    probe_result: ProbeResult,
    job: &Job,
    config: &WorkerConfig,
    scratch: &Path,
) -> ReelcutResult<NormalizedSource> {
    let role = source.role;
    let mut path = source.local_path.clone();
    let mut current_probe = probe_result;
    let mut remuxed = false;

    if current_probe.needs_remux() {
        tracing::info!(
            source = role.as_str(),
            anomaly = ?current_probe.duration_anomaly,
            "Container metadata anomaly, remuxing with stream copy"
        );
        let target = scratch.join(format!("{role}_remux.mp4"));
        match remux(&path, &target).await {
            Ok(()) => match probe(&target, role).await {
                Ok(reprobed) => {
                    path = target;
                    current_probe = reprobed;
                    remuxed = true;
                }
                Err(e) => {
                    tracing::warn!(
                        source = role.as_str(),
                        error = %e,
                        "Remuxed file unreadable, continuing with original"
                    );
                }
            },
            Err(e) => {
                tracing::warn!(
                    source = role.as_str(),
                    error = %e,
                    "Metadata remux failed, continuing with original"
                );
            }
        }
    }

    let video_pts_scale = if config.legacy_pts_rescale && job.capture_speed_scale.is_some() {
        Some(legacy_pts_scale(job, &current_probe, role)?)
    } else {
        if job.capture_speed_scale.is_some() {
            tracing::warn!(
                source = role.as_str(),
                "Job carries capture_speed_scale but legacy PTS rescaling is disabled"
            );
        }
        None
    };

    let force_cfr = current_probe.needs_cfr() || video_pts_scale.is_some();
    // Suspect or regenerated timing also means the demuxer should rebuild
    // missing PTS from DTS rather than trust what the capture API wrote.
    let regen_pts = current_probe.needs_cfr() || remuxed;

    tracing::debug!(
        source = role.as_str(),
        path = %path.display(),
        remuxed,
        force_cfr,
        regen_pts,
        pts_scale = ?video_pts_scale,
        "Source normalized"
    );

    Ok(NormalizedSource {
        role,
        path,
        probe: current_probe,
        regen_pts,
        force_cfr,
        video_pts_scale,
        remuxed,
    })
}

/// Scale factor for a legacy captured-at-Nx-speed source.
fn legacy_pts_scale(
    job: &Job,
    probe_result: &ProbeResult,
    role: reelcut_job_model::SourceRole,
) -> ReelcutResult<f64> {
    let intended = job.intended_duration_secs.ok_or_else(|| {
        ReelcutError::metadata_anomaly(
            role.as_str(),
            "cannot compute PTS scale factor: intended duration missing",
        )
    })?;
    let span = probe_result.duration_secs.filter(|d| *d > 0.0).ok_or_else(|| {
        ReelcutError::metadata_anomaly(
            role.as_str(),
            "cannot compute PTS scale factor: captured timestamp span unknown",
        )
    })?;

    let scale = pts_scale(intended, span).ok_or_else(|| {
        ReelcutError::metadata_anomaly(
            role.as_str(),
            format!("degenerate PTS scale from intended={intended}s span={span}s"),
        )
    })?;

    if let Some(nominal) = job.capture_speed_scale {
        if (scale - nominal).abs() / nominal > NOMINAL_SCALE_TOLERANCE {
            tracing::warn!(
                source = role.as_str(),
                computed = scale,
                nominal,
                "Computed PTS scale deviates from the client's nominal speed flag"
            );
        }
    }

    tracing::info!(
        source = role.as_str(),
        intended_secs = intended,
        span_secs = span,
        scale,
        "Rescaling video presentation timestamps (audio untouched)"
    );
    Ok(scale)
}

/// scale = intended real-world duration / captured timestamp span.
pub fn pts_scale(intended_secs: f64, captured_span_secs: f64) -> Option<f64> {
    if intended_secs <= 0.0 || captured_span_secs <= 0.0 {
        return None;
    }
    Some(intended_secs / captured_span_secs)
}

/// Stream-copy remux to repair container metadata. No re-encode.
async fn remux(src: &Path, dst: &Path) -> ReelcutResult<()> {
    let output = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error", "-fflags", "+genpts", "-i"])
        .arg(src)
        .args(["-c", "copy", "-movflags", "+faststart"])
        .arg(dst)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| ReelcutError::metadata_anomaly("remux", format!("failed to run ffmpeg: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ReelcutError::metadata_anomaly(
            "remux",
            format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr.trim().lines().last().unwrap_or("<no stderr>")
            ),
        ));
    }
    Ok(())
}
