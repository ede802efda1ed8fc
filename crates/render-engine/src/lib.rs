//! Reelcut Render Engine
//!
//! The back half of the pipeline: picking an encoder backend, turning a
//! validated filter graph into one ffmpeg invocation, driving the process
//! under the job deadline, and publishing the verified output. The
//! orchestrator module ties the whole pipeline together and owns the job
//! state machine.
//!
//! External processes sit behind seams ([`EncodeRunner`], [`SourceProber`],
//! [`OutputStore`]) so the pipeline is testable without ffmpeg installed.

pub mod encoder;
pub mod orchestrator;
pub mod publish;
pub mod render;

pub use encoder::{hardware_encoder_available, select_encoding_path, EncodingPlan};
pub use orchestrator::{FfprobeProber, Orchestrator, SourceProber};
pub use publish::{LocalDirStore, OutputStore};
pub use render::{EncodeInvocation, EncodeRunner, FfmpegRunner};
