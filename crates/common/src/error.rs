//! Error types shared across reelcut crates.
//!
//! The variants mirror the pipeline's failure taxonomy: source-level errors
//! carry the role of the source that caused them ("primary"/"secondary"),
//! job-level errors do not. Recoverability is decided by the orchestrator,
//! not here — `EncoderFailure` is the only variant it retries.

/// Top-level error type for reelcut operations.
#[derive(Debug, thiserror::Error)]
pub enum ReelcutError {
    #[error("Source unreadable ({role}): {message}")]
    SourceUnreadable { role: String, message: String },

    #[error("Metadata anomaly ({role}): {message}")]
    MetadataAnomaly { role: String, message: String },

    #[error("Graph construction error: {message}")]
    GraphConstruction { message: String },

    #[error("Encoder failure: {message}")]
    EncoderFailure {
        message: String,
        /// Last lines of the encode tool's stderr, when captured.
        stderr_tail: Option<String>,
        /// Process exit code, when the tool exited at all.
        exit_code: Option<i32>,
    },

    #[error("Transcription unavailable: {message}")]
    TranscriptionUnavailable { message: String },

    #[error("Timed out during {stage} after {budget_secs}s")]
    Timeout { stage: String, budget_secs: u64 },

    #[error("Invalid job request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Publish error: {message}")]
    Publish { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ReelcutError.
pub type ReelcutResult<T> = Result<T, ReelcutError>;

impl ReelcutError {
    pub fn source_unreadable(role: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SourceUnreadable {
            role: role.into(),
            message: msg.into(),
        }
    }

    pub fn metadata_anomaly(role: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::MetadataAnomaly {
            role: role.into(),
            message: msg.into(),
        }
    }

    pub fn graph(msg: impl Into<String>) -> Self {
        Self::GraphConstruction {
            message: msg.into(),
        }
    }

    pub fn encoder(
        msg: impl Into<String>,
        stderr_tail: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::EncoderFailure {
            message: msg.into(),
            stderr_tail,
            exit_code,
        }
    }

    pub fn transcription_unavailable(msg: impl Into<String>) -> Self {
        Self::TranscriptionUnavailable {
            message: msg.into(),
        }
    }

    pub fn timeout(stage: impl Into<String>, budget_secs: u64) -> Self {
        Self::Timeout {
            stage: stage.into(),
            budget_secs,
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_errors_carry_role() {
        let err = ReelcutError::source_unreadable("secondary", "no video stream");
        assert_eq!(
            err.to_string(),
            "Source unreadable (secondary): no video stream"
        );
    }

    #[test]
    fn test_encoder_failure_keeps_tool_detail() {
        let err = ReelcutError::encoder(
            "ffmpeg exited with status 1",
            Some("No capable devices found".to_string()),
            Some(1),
        );
        match err {
            ReelcutError::EncoderFailure {
                stderr_tail,
                exit_code,
                ..
            } => {
                assert_eq!(exit_code, Some(1));
                assert!(stderr_tail.unwrap().contains("No capable devices"));
            }
            _ => panic!("expected EncoderFailure"),
        }
    }

    #[test]
    fn test_timeout_display_names_stage() {
        let err = ReelcutError::timeout("encoding", 600);
        assert_eq!(err.to_string(), "Timed out during encoding after 600s");
    }
}
