//! Reelcut Captions
//!
//! Best-effort caption generation: an external speech-to-text collaborator
//! (behind the [`Transcriber`] trait) produces timed cues, which are
//! normalized into a [`CaptionTrack`] and serialized as a styled ASS file
//! for the `subtitles=` filter stage. A missing credential or transcription
//! failure degrades to "no captions" with a logged diagnostic; it never
//! fails a job.

pub mod track;
pub mod transcribe;

pub use track::{CaptionCue, CaptionTrack};
pub use transcribe::{generate, ToolTranscriber, Transcriber};
