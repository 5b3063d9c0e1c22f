//! Structured error types for callscope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Only recoverable conditions live here: broken engine invariants panic.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Malformed trace op on line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Return without matching call on line {line}")]
    UnbalancedReturn { line: usize },

    #[error("Instruction 0x{addr:x} on line {line} has size {size}, previously {recorded}")]
    InstrSizeMismatch { line: usize, addr: u64, size: u32, recorded: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum InstrMapError {
    #[error("Failed to read instruction map {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum SymbolizationError {
    #[error("Failed to read binary {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Binary {path} has no .text section")]
    MissingText { path: PathBuf },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
