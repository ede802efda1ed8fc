//! End-to-end pipeline tests with the external tools mocked out.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use reelcut_captions::{CaptionCue, Transcriber};
use reelcut_common::{Deadline, HardwarePreference, ReelcutError, ReelcutResult, WorkerConfig};
use reelcut_job_model::{
    AudioMix, CaptionStyle, DurationAnomaly, EncodingPath, Job, JobStatus, OutputSpec, PanelSpec,
    ProbeResult, ReframeMode, SourceRole, SourceSpec, StackPosition, ThreePersonLayout,
};
use reelcut_render_engine::{
    EncodeInvocation, EncodeRunner, LocalDirStore, Orchestrator, SourceProber,
};

struct StaticProber {
    result: ProbeResult,
}

impl SourceProber for StaticProber {
    async fn probe(&self, _path: &Path, _role: SourceRole) -> ReelcutResult<ProbeResult> {
        Ok(self.result.clone())
    }
}

/// Writes a dummy output file and records every invocation. Fails when the
/// requested backend matches `fail_on`.
#[derive(Default, Clone)]
struct RecordingRunner {
    invocations: Arc<Mutex<Vec<EncodeInvocation>>>,
    fail_on: Option<EncodingPath>,
}

impl EncodeRunner for RecordingRunner {
    async fn run(&self, invocation: &EncodeInvocation, _deadline: &Deadline) -> ReelcutResult<()> {
        self.invocations.lock().unwrap().push(invocation.clone());
        if self.fail_on == Some(invocation.encoding_path) {
            return Err(ReelcutError::encoder(
                "ffmpeg exited with exit status: 1",
                Some("No capable devices found".to_string()),
                Some(1),
            ));
        }
        tokio::fs::write(&invocation.output_path, b"encoded").await?;
        Ok(())
    }
}

struct StaticTranscriber;

impl Transcriber for StaticTranscriber {
    async fn transcribe(&self, _audio_path: &Path) -> ReelcutResult<Vec<CaptionCue>> {
        Ok(vec![CaptionCue {
            start_ms: 0,
            end_ms: 1800,
            text: "hello world".to_string(),
            style_tag: None,
        }])
    }
}

fn plausible_probe() -> ProbeResult {
    ProbeResult {
        duration_secs: Some(12.0),
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

fn source(role: SourceRole, position: StackPosition) -> SourceSpec {
    SourceSpec {
        role,
        local_path: PathBuf::from(format!("/in/{}.mp4", role.as_str())),
        crop_position: 50.0,
        crop_width_percent: 50.0,
        time_offset_secs: 0.0,
        position,
    }
}

fn auto_center_job(caption_style: CaptionStyle) -> Job {
    Job {
        id: "job-test".to_string(),
        created_at: "2024-01-01T00:00:00Z".to_string(),
        status: JobStatus::Pending,
        reframe_mode: ReframeMode::AutoCenter,
        sources: vec![source(SourceRole::Primary, StackPosition::Top)],
        panels: vec![PanelSpec {
            source_index: 0,
            crop_position: 50.0,
            crop_width_percent: None,
        }],
        three_person_layout: ThreePersonLayout::Stack,
        audio_mix: AudioMix::default(),
        caption_style,
        output: OutputSpec::default(),
        capture_speed_scale: None,
        intended_duration_secs: None,
    }
}

fn config(scratch: &Path, hardware: HardwarePreference, timeout_secs: u64) -> WorkerConfig {
    WorkerConfig {
        hardware,
        job_timeout_secs: timeout_secs,
        scratch_dir: scratch.to_path_buf(),
        output_dir: scratch.join("out"),
        ..WorkerConfig::default()
    }
}

#[tokio::test]
async fn test_job_runs_to_published_output() {
    let scratch = tempfile::tempdir().unwrap();
    let cfg = config(scratch.path(), HardwarePreference::Off, 600);
    let store = LocalDirStore::new(&cfg.output_dir);
    let orchestrator = Orchestrator::new(
        cfg.clone(),
        StaticProber {
            result: plausible_probe(),
        },
        RecordingRunner::default(),
        Some(StaticTranscriber),
        store,
    );

    let result = orchestrator
        .run_job(auto_center_job(CaptionStyle::Bold))
        .await;

    assert_eq!(result.status, JobStatus::Succeeded);
    assert_eq!(result.encoding_path_used, Some(EncodingPath::Software));
    assert!(result.captions_applied);
    assert!(result.failure_reason.is_none());
    assert!(result.elapsed_secs >= 0.0);

    let output = PathBuf::from(result.output_path.unwrap());
    assert_eq!(output, cfg.output_dir.join("job-test.mp4"));
    assert!(output.exists());
}

#[tokio::test]
async fn test_invocation_carries_graph_and_captions() {
    let scratch = tempfile::tempdir().unwrap();
    let cfg = config(scratch.path(), HardwarePreference::Off, 600);
    let runner = RecordingRunner::default();
    let recorded = runner.invocations.clone();
    let orchestrator = Orchestrator::new(
        cfg.clone(),
        StaticProber {
            result: plausible_probe(),
        },
        runner,
        Some(StaticTranscriber),
        LocalDirStore::new(&cfg.output_dir),
    );

    // Split-screen from two sources exercises the stacked composition.
    let mut job = auto_center_job(CaptionStyle::Clean);
    job.reframe_mode = ReframeMode::SplitScreen;
    job.sources
        .push(source(SourceRole::Secondary, StackPosition::Bottom));
    job.panels = vec![
        PanelSpec {
            source_index: 0,
            crop_position: 50.0,
            crop_width_percent: Some(50.0),
        },
        PanelSpec {
            source_index: 1,
            crop_position: 50.0,
            crop_width_percent: Some(50.0),
        },
    ];

    let result = orchestrator.run_job(job).await;
    assert_eq!(result.status, JobStatus::Succeeded);
    assert!(result.captions_applied);

    let invocations = recorded.lock().unwrap();
    assert_eq!(invocations.len(), 1);
    let args = &invocations[0].args;

    let filter_idx = args.iter().position(|a| a == "-filter_complex").unwrap();
    let filter = &args[filter_idx + 1];
    assert!(filter.contains("vstack=inputs=2"));
    assert!(filter.contains("amix=inputs=2:duration=first:normalize=0"));
    assert!(filter.contains("subtitles="));
    // Captions ride the terminal video pad, so the map targets it.
    assert!(args.windows(2).any(|w| w == ["-map", "[vcap]"]));
    assert!(args.windows(2).any(|w| w == ["-map", "[aout]"]));
}

#[tokio::test]
async fn test_hardware_failure_falls_back_to_software() {
    let scratch = tempfile::tempdir().unwrap();
    let cfg = config(scratch.path(), HardwarePreference::On, 600);
    let orchestrator = Orchestrator::new(
        cfg.clone(),
        StaticProber {
            result: plausible_probe(),
        },
        RecordingRunner {
            fail_on: Some(EncodingPath::Hardware),
            ..RecordingRunner::default()
        },
        None::<StaticTranscriber>,
        LocalDirStore::new(&cfg.output_dir),
    );

    let result = orchestrator
        .run_job(auto_center_job(CaptionStyle::None))
        .await;

    assert_eq!(result.status, JobStatus::Succeeded);
    assert_eq!(result.encoding_path_used, Some(EncodingPath::Software));
    assert!(!result.captions_applied);
}

#[tokio::test]
async fn test_software_failure_is_terminal() {
    let scratch = tempfile::tempdir().unwrap();
    let cfg = config(scratch.path(), HardwarePreference::Off, 600);
    let orchestrator = Orchestrator::new(
        cfg.clone(),
        StaticProber {
            result: plausible_probe(),
        },
        RecordingRunner {
            fail_on: Some(EncodingPath::Software),
            ..RecordingRunner::default()
        },
        None::<StaticTranscriber>,
        LocalDirStore::new(&cfg.output_dir),
    );

    let result = orchestrator
        .run_job(auto_center_job(CaptionStyle::None))
        .await;

    assert_eq!(result.status, JobStatus::Failed);
    assert!(result.output_path.is_none());
    assert!(result
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("Encoder failure"));
}

#[tokio::test]
async fn test_exhausted_budget_times_out_before_work_starts() {
    let scratch = tempfile::tempdir().unwrap();
    let cfg = config(scratch.path(), HardwarePreference::Off, 0);
    let orchestrator = Orchestrator::new(
        cfg.clone(),
        StaticProber {
            result: plausible_probe(),
        },
        RecordingRunner::default(),
        None::<StaticTranscriber>,
        LocalDirStore::new(&cfg.output_dir),
    );

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let result = orchestrator
        .run_job(auto_center_job(CaptionStyle::None))
        .await;

    assert_eq!(result.status, JobStatus::Failed);
    assert!(result
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("Timed out during probing"));
}

#[tokio::test]
async fn test_hung_probe_is_cut_off_by_the_job_deadline() {
    struct StallingProber;
    impl SourceProber for StallingProber {
        async fn probe(&self, _path: &Path, _role: SourceRole) -> ReelcutResult<ProbeResult> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            unreachable!("the deadline must cancel the probe first")
        }
    }

    let scratch = tempfile::tempdir().unwrap();
    let cfg = config(scratch.path(), HardwarePreference::Off, 1);
    let orchestrator = Orchestrator::new(
        cfg.clone(),
        StallingProber,
        RecordingRunner::default(),
        None::<StaticTranscriber>,
        LocalDirStore::new(&cfg.output_dir),
    );

    let result = orchestrator
        .run_job(auto_center_job(CaptionStyle::None))
        .await;

    assert_eq!(result.status, JobStatus::Failed);
    assert!(result
        .failure_reason
        .as_deref()
        .unwrap()
        .contains("Timed out during probing"));
}

#[tokio::test]
async fn test_verification_probe_carries_the_rendered_role() {
    #[derive(Default, Clone)]
    struct RoleRecordingProber {
        roles: Arc<Mutex<Vec<SourceRole>>>,
    }
    impl SourceProber for RoleRecordingProber {
        async fn probe(&self, _path: &Path, role: SourceRole) -> ReelcutResult<ProbeResult> {
            self.roles.lock().unwrap().push(role);
            Ok(plausible_probe())
        }
    }

    let scratch = tempfile::tempdir().unwrap();
    let cfg = config(scratch.path(), HardwarePreference::Off, 600);
    let prober = RoleRecordingProber::default();
    let roles = prober.roles.clone();
    let orchestrator = Orchestrator::new(
        cfg.clone(),
        prober,
        RecordingRunner::default(),
        None::<StaticTranscriber>,
        LocalDirStore::new(&cfg.output_dir),
    );

    let result = orchestrator
        .run_job(auto_center_job(CaptionStyle::None))
        .await;

    assert_eq!(result.status, JobStatus::Succeeded);
    // One probe per input source, then the rendered-output verification.
    assert_eq!(
        *roles.lock().unwrap(),
        vec![SourceRole::Primary, SourceRole::Rendered]
    );
}

#[tokio::test]
async fn test_captions_degrade_without_a_transcriber() {
    let scratch = tempfile::tempdir().unwrap();
    let cfg = config(scratch.path(), HardwarePreference::Off, 600);
    let orchestrator = Orchestrator::new(
        cfg.clone(),
        StaticProber {
            result: plausible_probe(),
        },
        RecordingRunner::default(),
        None::<StaticTranscriber>,
        LocalDirStore::new(&cfg.output_dir),
    );

    let result = orchestrator
        .run_job(auto_center_job(CaptionStyle::Bold))
        .await;

    assert_eq!(result.status, JobStatus::Succeeded);
    assert!(!result.captions_applied);
    assert!(result.output_path.is_some());
}

#[tokio::test]
async fn test_caption_failure_never_fails_the_job() {
    struct BrokenTranscriber;
    impl Transcriber for BrokenTranscriber {
        async fn transcribe(&self, _audio_path: &Path) -> ReelcutResult<Vec<CaptionCue>> {
            Err(ReelcutError::transcription_unavailable("service down"))
        }
    }

    let scratch = tempfile::tempdir().unwrap();
    let cfg = config(scratch.path(), HardwarePreference::Off, 600);
    let orchestrator = Orchestrator::new(
        cfg.clone(),
        StaticProber {
            result: plausible_probe(),
        },
        RecordingRunner::default(),
        Some(BrokenTranscriber),
        LocalDirStore::new(&cfg.output_dir),
    );

    let result = orchestrator
        .run_job(auto_center_job(CaptionStyle::Bold))
        .await;

    assert_eq!(result.status, JobStatus::Succeeded);
    assert!(!result.captions_applied);
}
