//! Run one rendering job from a request file.

use std::path::PathBuf;

use reelcut_captions::ToolTranscriber;
use reelcut_common::WorkerConfig;
use reelcut_job_model::{JobRequest, JobStatus};
use reelcut_render_engine::{FfmpegRunner, FfprobeProber, LocalDirStore, Orchestrator};

pub async fn run(
    request_path: PathBuf,
    result_path: Option<PathBuf>,
    config: WorkerConfig,
) -> anyhow::Result<()> {
    let request = JobRequest::load(&request_path)?;
    let job = request.validate()?;
    tracing::info!(
        request = %request_path.display(),
        job = %job.id,
        "Request validated"
    );

    let transcriber = ToolTranscriber::from_config(&config);
    let store = LocalDirStore::new(&config.output_dir);
    let orchestrator = Orchestrator::new(config, FfprobeProber, FfmpegRunner, transcriber, store);

    let result = orchestrator.run_job(job).await;
    let rendered = serde_json::to_string_pretty(&result)?;
    println!("{rendered}");
    if let Some(path) = result_path {
        std::fs::write(&path, &rendered)?;
        tracing::info!(result = %path.display(), "Result written");
    }

    // The exit code mirrors the terminal status for shell callers.
    if result.status == JobStatus::Failed {
        std::process::exit(1);
    }
    Ok(())
}
