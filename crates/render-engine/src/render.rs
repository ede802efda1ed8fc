//! The ffmpeg invocation: argument assembly and process supervision.
//!
//! An [`EncodeInvocation`] is the fully resolved argument list for one
//! encode, built from the normalized sources, the validated filter graph,
//! and the encoding plan. [`FfmpegRunner`] executes it: progress telemetry
//! is read from stdout (`-progress pipe:1`), stderr is drained concurrently
//! so a chatty encoder cannot deadlock on a full pipe, and the whole run is
//! bounded by the job deadline.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use reelcut_common::{Deadline, ReelcutError, ReelcutResult};
use reelcut_filter_graph::FilterGraph;
use reelcut_job_model::{EncodingPath, Job, NormalizedSource};

use crate::encoder::EncodingPlan;

/// Lines of stderr kept for the failure report.
const STDERR_TAIL_LINES: usize = 20;

/// Seconds without progress advancement before a stall warning.
const STALL_WARN_SECS: u64 = 10;

/// One fully resolved encode command.
#[derive(Debug, Clone)]
pub struct EncodeInvocation {
    /// Complete ffmpeg argument list, output path last.
    pub args: Vec<String>,

    /// Where the encoded file lands (inside the job scratch directory).
    pub output_path: PathBuf,

    /// Backend this invocation uses.
    pub encoding_path: EncodingPath,

    /// Duration the output should span, when computable.
    pub expected_duration_secs: Option<f64>,
}

impl EncodeInvocation {
    /// Assemble the argument list for a job.
    ///
    /// `sources` is parallel to `job.sources`; the graph was built over the
    /// same inputs in the same order.
    pub fn build(
        job: &Job,
        sources: &[NormalizedSource],
        graph: &FilterGraph,
        plan: &EncodingPlan,
        output_path: &Path,
    ) -> ReelcutResult<Self> {
        let mut args: Vec<String> = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostats",
            "-progress",
            "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        for source in sources {
            if source.regen_pts {
                args.push("-fflags".to_string());
                args.push("+genpts".to_string());
            }
            args.push("-i".to_string());
            args.push(source.path.display().to_string());
        }

        args.push("-filter_complex".to_string());
        args.push(graph.to_filter_complex());

        args.push("-map".to_string());
        args.push(format!("[{}]", graph.terminal_video_pad()?));
        if let Some(audio) = graph.terminal_audio_pad() {
            args.push("-map".to_string());
            args.push(format!("[{audio}]"));
        }

        args.push("-r".to_string());
        args.push(job.output.fps.to_string());
        if sources.iter().any(|s| s.force_cfr) {
            args.push("-fps_mode".to_string());
            args.push("cfr".to_string());
        }

        args.extend(plan.codec_args().iter().cloned());

        // The primary source bounds the output; stacked secondaries may
        // run longer and must not extend it.
        let expected_duration_secs = sources.first().and_then(|s| s.expected_duration_secs());
        if let Some(duration) = expected_duration_secs {
            args.push("-t".to_string());
            args.push(format!("{duration:.6}"));
        }

        args.push(output_path.display().to_string());

        Ok(Self {
            args,
            output_path: output_path.to_path_buf(),
            encoding_path: plan.path,
            expected_duration_secs,
        })
    }
}

/// Seam for executing an encode invocation.
pub trait EncodeRunner {
    fn run(
        &self,
        invocation: &EncodeInvocation,
        deadline: &Deadline,
    ) -> impl std::future::Future<Output = ReelcutResult<()>> + Send;
}

/// Production runner: spawns ffmpeg and supervises it.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner;

impl EncodeRunner for FfmpegRunner {
    async fn run(&self, invocation: &EncodeInvocation, deadline: &Deadline) -> ReelcutResult<()> {
        let Some(remaining) = deadline.remaining() else {
            return Err(ReelcutError::timeout("encoding", deadline.budget_secs()));
        };

        tracing::debug!(args = ?invocation.args, "Running ffmpeg");
        let mut child = Command::new("ffmpeg")
            .args(&invocation.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ReelcutError::encoder(format!("failed to start ffmpeg: {e}"), None, None))?;

        tracing::info!(
            pid = child.id(),
            backend = invocation.encoding_path.as_str(),
            budget_secs = remaining.as_secs(),
            "ffmpeg started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelcutError::encoder("failed to capture ffmpeg stdout", None, None))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelcutError::encoder("failed to capture ffmpeg stderr", None, None))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut buffer = String::new();
            match stderr.read_to_string(&mut buffer).await {
                Ok(_) => buffer,
                Err(e) => format!("<failed to read ffmpeg stderr: {e}>"),
            }
        });

        let timeout = tokio::time::sleep(remaining);
        tokio::pin!(timeout);

        let mut lines = BufReader::new(stdout).lines();
        let mut progress = ProgressState::default();
        let mut last_advance = std::time::Instant::now();

        loop {
            tokio::select! {
                () = &mut timeout => {
                    let _ = child.kill().await;
                    tracing::error!(
                        out_time_secs = progress.out_time_secs,
                        "Killing ffmpeg: job deadline exceeded"
                    );
                    return Err(ReelcutError::timeout("encoding", deadline.budget_secs()));
                }
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if progress.observe(line.trim()) {
                                last_advance = std::time::Instant::now();
                            } else if last_advance.elapsed().as_secs() >= STALL_WARN_SECS {
                                tracing::warn!(
                                    out_time_secs = progress.out_time_secs,
                                    "No ffmpeg progress advancement for {STALL_WARN_SECS}s"
                                );
                                last_advance = std::time::Instant::now();
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = child.kill().await;
                            return Err(ReelcutError::encoder(
                                format!("failed reading ffmpeg progress: {e}"),
                                None,
                                None,
                            ));
                        }
                    }
                }
            }
        }

        // stdout closed; the process is exiting. Bound the final wait too.
        let wait_budget = deadline
            .remaining()
            .unwrap_or(std::time::Duration::from_secs(1));
        let status = match tokio::time::timeout(wait_budget, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(ReelcutError::encoder(
                    format!("failed to wait on ffmpeg: {e}"),
                    None,
                    None,
                ));
            }
            Err(_) => {
                let _ = child.kill().await;
                return Err(ReelcutError::timeout("encoding", deadline.budget_secs()));
            }
        };

        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(ReelcutError::encoder(
                format!("ffmpeg exited with {status}"),
                Some(stderr_tail(&stderr_output)),
                status.code(),
            ));
        }

        tracing::info!(
            frames = progress.frames,
            out_time_secs = progress.out_time_secs,
            speed = %progress.speed,
            "ffmpeg finished"
        );
        Ok(())
    }
}

/// Last lines of an ffmpeg stderr dump, where the actual error lives.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Accumulated `-progress pipe:1` key/value telemetry.
#[derive(Debug, Default)]
struct ProgressState {
    frames: u64,
    out_time_secs: f64,
    speed: String,
}

impl ProgressState {
    /// Feed one progress line. Returns whether output time advanced.
    fn observe(&mut self, line: &str) -> bool {
        let Some((key, value)) = line.split_once('=') else {
            return false;
        };
        match key {
            "frame" => {
                self.frames = value.trim().parse().unwrap_or(self.frames);
                false
            }
            "out_time_us" => {
                let previous = self.out_time_secs;
                if let Ok(us) = value.trim().parse::<i64>() {
                    self.out_time_secs = us.max(0) as f64 / 1_000_000.0;
                }
                self.out_time_secs > previous + 0.001
            }
            "speed" => {
                self.speed = value.trim().to_string();
                false
            }
            "progress" => {
                tracing::debug!(
                    frames = self.frames,
                    out_time_secs = self.out_time_secs,
                    speed = %self.speed,
                    "Encode progress"
                );
                false
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelcut_filter_graph::build;
    use reelcut_job_model::{
        AudioMix, CaptionStyle, DurationAnomaly, Job, JobStatus, OutputSpec, PanelSpec,
        ProbeResult, ReframeMode, SourceRole, SourceSpec, StackPosition, ThreePersonLayout,
    };

    fn probe(duration: f64) -> ProbeResult {
        ProbeResult {
            duration_secs: Some(duration),
            fps: 30.0,
            fps_suspect: false,
            variable_frame_rate: false,
            width: 1920,
            height: 1080,
            pixel_format: "yuv420p".to_string(),
            has_audio: true,
            duration_anomaly: DurationAnomaly::Plausible,
        }
    }

    fn normalized(path: &str, duration: f64) -> NormalizedSource {
        NormalizedSource {
            role: SourceRole::Primary,
            path: PathBuf::from(path),
            probe: probe(duration),
            regen_pts: false,
            force_cfr: false,
            video_pts_scale: None,
            remuxed: false,
        }
    }

    fn auto_center_job() -> Job {
        Job {
            id: "job-1".to_string(),
            created_at: "2024-01-01T00:00:00Z".to_string(),
            status: JobStatus::Pending,
            reframe_mode: ReframeMode::AutoCenter,
            sources: vec![SourceSpec {
                role: SourceRole::Primary,
                local_path: PathBuf::from("/in/primary.mp4"),
                crop_position: 50.0,
                crop_width_percent: 50.0,
                time_offset_secs: 0.0,
                position: StackPosition::Top,
            }],
            panels: vec![PanelSpec {
                source_index: 0,
                crop_position: 50.0,
                crop_width_percent: None,
            }],
            three_person_layout: ThreePersonLayout::Stack,
            audio_mix: AudioMix::default(),
            caption_style: CaptionStyle::None,
            output: OutputSpec::default(),
            capture_speed_scale: None,
            intended_duration_secs: None,
        }
    }

    fn invocation_for(sources: Vec<NormalizedSource>) -> EncodeInvocation {
        let job = auto_center_job();
        let graph = build(&job, &sources, None).unwrap();
        let plan = EncodingPlan::for_path(EncodingPath::Software, &job.output);
        EncodeInvocation::build(&job, &sources, &graph, &plan, Path::new("/tmp/out.mp4")).unwrap()
    }

    #[test]
    fn test_invocation_shape() {
        let invocation = invocation_for(vec![normalized("/in/primary.mp4", 12.0)]);
        let args = &invocation.args;

        assert_eq!(args[0], "-y");
        assert!(args.windows(2).any(|w| w == ["-progress", "pipe:1"]));
        assert!(args.windows(2).any(|w| w == ["-i", "/in/primary.mp4"]));
        assert!(args.iter().any(|a| a == "-filter_complex"));
        assert!(args.windows(2).any(|w| w == ["-map", "[vout]"]));
        assert!(args.windows(2).any(|w| w == ["-map", "[aout]"]));
        assert!(args.windows(2).any(|w| w == ["-r", "30"]));
        assert!(args.windows(2).any(|w| w == ["-t", "12.000000"]));
        assert_eq!(args.last().unwrap(), "/tmp/out.mp4");
        // Clean sources get no CFR forcing and no PTS regeneration.
        assert!(!args.iter().any(|a| a == "-fps_mode"));
        assert!(!args.iter().any(|a| a == "+genpts"));
    }

    #[test]
    fn test_timing_repairs_show_up_in_args() {
        let mut source = normalized("/in/primary.mp4", 12.0);
        source.regen_pts = true;
        source.force_cfr = true;
        let invocation = invocation_for(vec![source]);
        let args = &invocation.args;

        // genpts must precede the input it applies to.
        let genpts = args.iter().position(|a| a == "+genpts").unwrap();
        let input = args.iter().position(|a| a == "/in/primary.mp4").unwrap();
        assert!(genpts < input);
        assert!(args.windows(2).any(|w| w == ["-fps_mode", "cfr"]));
    }

    #[test]
    fn test_rescaled_duration_bounds_output() {
        let mut source = normalized("/in/primary.mp4", 15.0);
        source.video_pts_scale = Some(2.0);
        let invocation = invocation_for(vec![source]);
        assert!((invocation.expected_duration_secs.unwrap() - 30.0).abs() < 1e-9);
        assert!(invocation
            .args
            .windows(2)
            .any(|w| w == ["-t", "30.000000"]));
    }

    #[test]
    fn test_progress_state_parses_telemetry() {
        let mut state = ProgressState::default();
        assert!(!state.observe("frame=42"));
        assert!(state.observe("out_time_us=1500000"));
        assert!(!state.observe("speed=2.1x"));
        assert!(!state.observe("progress=continue"));
        assert_eq!(state.frames, 42);
        assert!((state.out_time_secs - 1.5).abs() < 1e-9);
        assert_eq!(state.speed, "2.1x");

        // Repeated telemetry with no advancement is not progress.
        assert!(!state.observe("out_time_us=1500000"));
        // Garbage lines are ignored.
        assert!(!state.observe("not telemetry"));
        assert!(!state.observe("out_time_us=bogus"));
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let long: String = (0..50)
            .map(|i| format!("line {i}\n"))
            .collect();
        let tail = stderr_tail(&long);
        assert!(tail.starts_with("line 30"));
        assert!(tail.ends_with("line 49"));
        assert_eq!(stderr_tail("only line"), "only line");
    }
}
