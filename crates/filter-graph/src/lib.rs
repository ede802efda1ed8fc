//! Reelcut Filter Graph
//!
//! Turns a validated job plus its normalized sources into an explicit,
//! labeled media-processing graph:
//! - `crop`: the one generic per-panel crop computation every mode uses
//! - `graph`: ordered stages with named input/output pads, structurally
//!   validated, rendered to an FFmpeg `-filter_complex` string only at
//!   invocation time
//! - `builder`: mode-specific assembly (auto-center, split-screen,
//!   three-person), audio mixing, and the caption overlay as the terminal
//!   video stage
//!
//! Nothing in this crate runs a process; it is pure graph construction.

pub mod builder;
pub mod crop;
pub mod graph;

pub use builder::build;
pub use crop::{panel_crop, CropWindow};
pub use graph::{FilterGraph, FilterStage, MediaKind, Pad};
