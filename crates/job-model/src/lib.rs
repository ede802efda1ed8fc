//! Reelcut Job Model
//!
//! Pure data types for the rendering pipeline:
//! - Wire-format job requests and single-pass validation
//! - The validated `Job` record with its resolved panel plan
//! - Source descriptors and probe metadata
//! - Terminal job results
//!
//! This crate performs no I/O beyond reading a request file and has no
//! knowledge of FFmpeg; every default the pipeline relies on is resolved
//! here, once, at validation time.

pub mod job;
pub mod request;
pub mod source;

pub use job::*;
pub use request::*;
pub use source::*;
