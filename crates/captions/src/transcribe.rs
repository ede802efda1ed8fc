//! The transcription collaborator seam.
//!
//! Transcription is an external black box: a CLI tool that receives an
//! audio/media path, authenticates with a credential from worker config,
//! and prints timed JSON cues on stdout. The [`Transcriber`] trait is the
//! seam the orchestrator (and tests) program against; [`ToolTranscriber`]
//! is the production implementation.

use std::path::Path;

use serde::Deserialize;
use tokio::process::Command;

use reelcut_common::{ReelcutError, ReelcutResult, WorkerConfig};
use reelcut_job_model::CaptionStyle;

use crate::track::{CaptionCue, CaptionTrack};

/// Environment variable the credential travels to the child process in.
const CREDENTIAL_ENV: &str = "REELCUT_TRANSCRIBE_KEY";

/// A speech-to-text collaborator producing timed cues.
pub trait Transcriber {
    fn transcribe(
        &self,
        audio_path: &Path,
    ) -> impl std::future::Future<Output = ReelcutResult<Vec<CaptionCue>>> + Send;
}

/// Production transcriber: spawns the configured external tool.
#[derive(Debug, Clone)]
pub struct ToolTranscriber {
    command: String,
    credential: String,
}

/// Wire shape of one cue on the tool's stdout.
#[derive(Debug, Deserialize)]
struct WireCue {
    start_ms: u64,
    end_ms: u64,
    text: String,
    #[serde(default)]
    style_tag: Option<String>,
}

impl ToolTranscriber {
    /// Build from worker config. Returns `None` (with a specific
    /// diagnostic) when the credential is absent — captions are then
    /// disabled for the lifetime of the worker.
    pub fn from_config(config: &WorkerConfig) -> Option<Self> {
        match &config.transcription_key {
            Some(key) => Some(Self {
                command: config.transcribe_command.clone(),
                credential: key.clone(),
            }),
            None => {
                tracing::warn!(
                    "Transcription disabled: {CREDENTIAL_ENV} is not set; \
                     jobs will render without captions"
                );
                None
            }
        }
    }
}

impl Transcriber for ToolTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> ReelcutResult<Vec<CaptionCue>> {
        tracing::info!(
            command = %self.command,
            audio = %audio_path.display(),
            "Requesting transcription"
        );

        let output = Command::new(&self.command)
            .arg(audio_path)
            .env(CREDENTIAL_ENV, &self.credential)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ReelcutError::transcription_unavailable(format!(
                    "failed to run transcription tool '{}': {e}",
                    self.command
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ReelcutError::transcription_unavailable(format!(
                "transcription tool exited with {}: {}",
                output.status,
                stderr.trim().lines().last().unwrap_or("<no stderr>")
            )));
        }

        let cues: Vec<WireCue> = serde_json::from_slice(&output.stdout).map_err(|e| {
            ReelcutError::transcription_unavailable(format!(
                "unparsable transcription output: {e}"
            ))
        })?;

        Ok(cues
            .into_iter()
            .map(|cue| CaptionCue {
                start_ms: cue.start_ms,
                end_ms: cue.end_ms,
                text: cue.text,
                style_tag: cue.style_tag,
            })
            .collect())
    }
}

/// Generate a caption track for a source's audio.
///
/// Best effort: `None` when the transcriber is disabled, fails, or hears
/// nothing. Every degradation logs a specific diagnostic; none of them
/// fails the job.
pub async fn generate<T: Transcriber>(
    transcriber: Option<&T>,
    audio_path: &Path,
    style: CaptionStyle,
) -> Option<CaptionTrack> {
    if style.is_none() {
        return None;
    }
    let transcriber = match transcriber {
        Some(t) => t,
        None => {
            tracing::warn!(
                "Captions requested but transcription is disabled ({CREDENTIAL_ENV} missing)"
            );
            return None;
        }
    };

    match transcriber.transcribe(audio_path).await {
        Ok(cues) => {
            let track = CaptionTrack::new(style, cues);
            if track.is_empty() {
                tracing::warn!("Transcription produced no usable cues, skipping captions");
                None
            } else {
                tracing::info!(cues = track.cues.len(), "Caption track generated");
                Some(track)
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "Transcription failed, continuing without captions");
            None
        }
    }
}
