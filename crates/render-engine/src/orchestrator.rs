//! Job orchestration.
//!
//! The orchestrator owns a job from acceptance to terminal result: probe
//! every source, normalize timestamps, generate captions (best effort),
//! build and validate the filter graph, encode with a single hardware to
//! software fallback, verify the rendered file, and publish it. Every
//! stage runs under one shared wall-clock deadline; an error anywhere
//! produces a failed [`JobResult`] with the stage's diagnostic, never a
//! panic or a partial output under the final name.

use std::path::{Path, PathBuf};

use reelcut_captions::{generate, Transcriber};
use reelcut_common::{Deadline, JobClock, ReelcutError, ReelcutResult, WorkerConfig};
use reelcut_filter_graph::build;
use reelcut_job_model::{
    EncodingPath, Job, JobResult, JobStatus, NormalizedSource, ProbeResult, SourceRole,
};
use reelcut_media_probe::normalize;

use crate::encoder::{select_encoding_path, EncodingPlan};
use crate::publish::OutputStore;
use crate::render::{EncodeInvocation, EncodeRunner};

/// Tolerated deviation between the published duration and the expected
/// duration before a verification warning.
const DURATION_TOLERANCE_SECS: f64 = 0.75;

/// Seam for source inspection.
pub trait SourceProber {
    fn probe(
        &self,
        path: &Path,
        role: SourceRole,
    ) -> impl std::future::Future<Output = ReelcutResult<ProbeResult>> + Send;
}

/// Production prober: one ffprobe pass per file.
#[derive(Debug, Clone, Default)]
pub struct FfprobeProber;

impl SourceProber for FfprobeProber {
    async fn probe(&self, path: &Path, role: SourceRole) -> ReelcutResult<ProbeResult> {
        reelcut_media_probe::probe(path, role).await
    }
}

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobStage {
    Probing,
    Normalizing,
    BuildingGraph,
    Encoding,
    Publishing,
}

impl JobStage {
    fn as_str(&self) -> &'static str {
        match self {
            JobStage::Probing => "probing",
            JobStage::Normalizing => "normalizing",
            JobStage::BuildingGraph => "building_graph",
            JobStage::Encoding => "encoding",
            JobStage::Publishing => "publishing",
        }
    }

    fn step(&self) -> usize {
        match self {
            JobStage::Probing => 1,
            JobStage::Normalizing => 2,
            JobStage::BuildingGraph => 3,
            JobStage::Encoding => 4,
            JobStage::Publishing => 5,
        }
    }
}

struct PipelineOutcome {
    locator: String,
    encoding_path: EncodingPath,
    captions_applied: bool,
}

/// Drives jobs through the pipeline.
pub struct Orchestrator<P, R, T, S> {
    config: WorkerConfig,
    prober: P,
    runner: R,
    transcriber: Option<T>,
    store: S,
}

impl<P, R, T, S> Orchestrator<P, R, T, S>
where
    P: SourceProber,
    R: EncodeRunner,
    T: Transcriber,
    S: OutputStore,
{
    pub fn new(
        config: WorkerConfig,
        prober: P,
        runner: R,
        transcriber: Option<T>,
        store: S,
    ) -> Self {
        Self {
            config,
            prober,
            runner,
            transcriber,
            store,
        }
    }

    /// Run one job to its terminal result. Never returns an error: every
    /// failure becomes a failed result with a diagnostic.
    pub async fn run_job(&self, mut job: Job) -> JobResult {
        let clock = JobClock::start();
        let deadline = Deadline::new(self.config.job_timeout_secs);
        job.status = JobStatus::Running;

        tracing::info!(
            job = %job.id,
            mode = ?job.reframe_mode,
            sources = job.sources.len(),
            panels = job.panels.len(),
            budget_secs = deadline.budget_secs(),
            "Job accepted"
        );

        match self.pipeline(&job, &deadline).await {
            Ok(outcome) => {
                tracing::info!(
                    job = %job.id,
                    output = %outcome.locator,
                    backend = outcome.encoding_path.as_str(),
                    elapsed_secs = clock.elapsed_secs(),
                    "Job succeeded"
                );
                JobResult::succeeded(
                    &job.id,
                    outcome.locator,
                    outcome.encoding_path,
                    outcome.captions_applied,
                    clock.epoch_wall(),
                    clock.elapsed_secs(),
                )
            }
            Err(e) => {
                tracing::error!(
                    job = %job.id,
                    error = %e,
                    elapsed_secs = clock.elapsed_secs(),
                    "Job failed"
                );
                JobResult::failed(&job.id, e.to_string(), None, clock.epoch_wall(), clock.elapsed_secs())
            }
        }
    }

    async fn pipeline(&self, job: &Job, deadline: &Deadline) -> ReelcutResult<PipelineOutcome> {
        let scratch = self.create_scratch(job)?;
        let scratch_path = scratch.path().to_path_buf();

        self.enter(JobStage::Probing, job, deadline)?;
        let mut probes = Vec::with_capacity(job.sources.len());
        for source in &job.sources {
            let probe = self
                .bounded(
                    JobStage::Probing,
                    deadline,
                    self.prober.probe(&source.local_path, source.role),
                )
                .await?;
            tracing::info!(
                job = %job.id,
                source = source.role.as_str(),
                width = probe.width,
                height = probe.height,
                fps = probe.fps,
                duration_secs = ?probe.duration_secs,
                has_audio = probe.has_audio,
                "Source probed"
            );
            probes.push(probe);
        }

        self.enter(JobStage::Normalizing, job, deadline)?;
        let mut sources: Vec<NormalizedSource> = Vec::with_capacity(job.sources.len());
        for (source, probe) in job.sources.iter().zip(probes) {
            let normalized = self
                .bounded(
                    JobStage::Normalizing,
                    deadline,
                    normalize(source, probe, job, &self.config, &scratch_path),
                )
                .await?;
            sources.push(normalized);
        }

        let caption_file = self.generate_captions(job, &sources, &scratch_path, deadline).await;

        self.enter(JobStage::BuildingGraph, job, deadline)?;
        let graph = build(job, &sources, caption_file.as_deref())?;

        self.enter(JobStage::Encoding, job, deadline)?;
        let rendered = scratch_path.join("render.mp4");
        let encoding_path = self
            .encode(job, &sources, &graph, &rendered, deadline)
            .await?;
        self.verify_output(job, &sources, &rendered).await;

        self.enter(JobStage::Publishing, job, deadline)?;
        let locator = self.store.publish(&job.id, &rendered).await?;

        Ok(PipelineOutcome {
            locator,
            encoding_path,
            captions_applied: caption_file.is_some(),
        })
    }

    /// Best-effort caption generation; any degradation returns `None`.
    async fn generate_captions(
        &self,
        job: &Job,
        sources: &[NormalizedSource],
        scratch: &Path,
        deadline: &Deadline,
    ) -> Option<PathBuf> {
        if job.caption_style.is_none() {
            return None;
        }
        let Some(remaining) = deadline.remaining() else {
            tracing::warn!(job = %job.id, "Skipping captions: job deadline exceeded");
            return None;
        };
        let primary = sources.first()?;
        if !primary.probe.has_audio {
            tracing::warn!(
                job = %job.id,
                "Captions requested but the primary source has no audio"
            );
            return None;
        }

        let generated = tokio::time::timeout(
            remaining,
            generate(self.transcriber.as_ref(), &primary.path, job.caption_style),
        )
        .await;
        let track = match generated {
            Ok(track) => track?,
            Err(_) => {
                tracing::warn!(job = %job.id, "Skipping captions: transcription hit the job deadline");
                return None;
            }
        };
        let path = scratch.join("captions.ass");
        match track.write_ass(&path, job.output.width, job.output.height) {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(job = %job.id, error = %e, "Failed to write caption track");
                None
            }
        }
    }

    /// Encode with at most one hardware-to-software fallback retry. An
    /// attempt that exits cleanly but leaves no usable file counts as an
    /// encoder failure and falls back the same way.
    async fn encode(
        &self,
        job: &Job,
        sources: &[NormalizedSource],
        graph: &reelcut_filter_graph::FilterGraph,
        rendered: &Path,
        deadline: &Deadline,
    ) -> ReelcutResult<EncodingPath> {
        let path = select_encoding_path(self.config.hardware).await;

        match self.attempt(job, sources, graph, rendered, path, deadline).await {
            Ok(()) => Ok(path),
            Err(ReelcutError::EncoderFailure {
                message,
                stderr_tail,
                exit_code,
            }) if path == EncodingPath::Hardware => {
                tracing::warn!(
                    job = %job.id,
                    error = %message,
                    exit_code = ?exit_code,
                    stderr_tail = ?stderr_tail,
                    "Hardware encode failed, retrying with libx264"
                );
                self.attempt(job, sources, graph, rendered, EncodingPath::Software, deadline)
                    .await?;
                Ok(EncodingPath::Software)
            }
            Err(e) => Err(e),
        }
    }

    async fn attempt(
        &self,
        job: &Job,
        sources: &[NormalizedSource],
        graph: &reelcut_filter_graph::FilterGraph,
        rendered: &Path,
        path: EncodingPath,
        deadline: &Deadline,
    ) -> ReelcutResult<()> {
        let plan = EncodingPlan::for_path(path, &job.output);
        let invocation = EncodeInvocation::build(job, sources, graph, &plan, rendered)?;
        self.runner.run(&invocation, deadline).await?;

        let metadata = std::fs::metadata(rendered).map_err(|e| {
            ReelcutError::encoder(
                format!("encoder produced no output at {}: {e}", rendered.display()),
                None,
                None,
            )
        })?;
        if metadata.len() == 0 {
            return Err(ReelcutError::encoder(
                "encoder produced an empty output file",
                None,
                None,
            ));
        }
        tracing::debug!(job = %job.id, bytes = metadata.len(), "Rendered output verified");
        Ok(())
    }

    /// Compare the rendered duration against the expected duration. A
    /// mismatch is logged, never fatal: trimmed trailing audio priming or a
    /// slightly short last GOP are normal.
    async fn verify_output(&self, job: &Job, sources: &[NormalizedSource], rendered: &Path) {
        let expected = sources.first().and_then(|s| s.expected_duration_secs());
        match (expected, self.prober.probe(rendered, SourceRole::Rendered).await) {
            (Some(expected), Ok(probe)) => {
                if let Some(actual) = probe.duration_secs {
                    if (actual - expected).abs() > DURATION_TOLERANCE_SECS {
                        tracing::warn!(
                            job = %job.id,
                            expected_secs = expected,
                            actual_secs = actual,
                            "Rendered duration deviates from the expected duration"
                        );
                    }
                }
            }
            (_, Err(e)) => {
                tracing::warn!(job = %job.id, error = %e, "Could not verify rendered output");
            }
            _ => {}
        }
    }

    fn create_scratch(&self, job: &Job) -> ReelcutResult<tempfile::TempDir> {
        std::fs::create_dir_all(&self.config.scratch_dir)?;
        tempfile::Builder::new()
            .prefix(&format!("reelcut-{}.", job.id))
            .tempdir_in(&self.config.scratch_dir)
            .map_err(|e| {
                ReelcutError::config(format!(
                    "cannot create scratch directory under {}: {e}",
                    self.config.scratch_dir.display()
                ))
            })
    }

    /// Await one piece of external work under the remaining deadline. The
    /// spawned tools run with `kill_on_drop`, so dropping the future on
    /// timeout also terminates the child process.
    async fn bounded<U>(
        &self,
        stage: JobStage,
        deadline: &Deadline,
        work: impl std::future::Future<Output = ReelcutResult<U>>,
    ) -> ReelcutResult<U> {
        let Some(remaining) = deadline.remaining() else {
            return Err(ReelcutError::timeout(stage.as_str(), deadline.budget_secs()));
        };
        match tokio::time::timeout(remaining, work).await {
            Ok(result) => result,
            Err(_) => Err(ReelcutError::timeout(stage.as_str(), deadline.budget_secs())),
        }
    }

    fn enter(&self, stage: JobStage, job: &Job, deadline: &Deadline) -> ReelcutResult<()> {
        if deadline.expired() {
            return Err(ReelcutError::timeout(stage.as_str(), deadline.budget_secs()));
        }
        tracing::info!(
            job = %job.id,
            step = stage.step(),
            stage = stage.as_str(),
            "Stage started"
        );
        Ok(())
    }
}
