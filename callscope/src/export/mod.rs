//! Report export
//!
//! Writes every interned context with its accumulated cost as one JSON
//! document, for scripting and diffing between runs.

pub mod context_report;

pub use context_report::{ContextEntry, ContextExporter, ContextReport, InstrEntry};
