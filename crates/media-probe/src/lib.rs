//! Reelcut Media Probe
//!
//! Source inspection and timestamp normalization:
//! - `probe`: one read-only ffprobe pass per source, with plausibility
//!   flags for the lies browser captures tell (1000 fps declarations,
//!   missing container durations)
//! - `normalize`: metadata-repair remux, legacy PTS rescaling, and the
//!   decision to force a constant output rate
//!
//! Everything downstream consumes [`reelcut_job_model::NormalizedSource`];
//! nothing after this crate looks at raw source metadata again.

pub mod normalize;
pub mod probe;

pub use normalize::{normalize, pts_scale};
pub use probe::{command_exists, probe};
