//! Analysis logic for replayed traces
//!
//! Pure aggregation over contexts, kept apart from the CLI and the exporter.

pub mod cost_analyzer;

pub use cost_analyzer::{path_names, ContextHotspot, CostStats};
