//! Domain model for callscope
//!
//! Sequence-number ids for objects, files, functions and contexts (all
//! plain `u32` newtypes, so a function id can never index the context
//! arena), the section kinds a basic block can live in, and the error
//! enums returned at I/O boundaries.

pub mod errors;
pub mod types;

pub use types::{CxtId, FileId, FnId, ObjId, SectionKind};

pub use errors::{ExportError, InstrMapError, SymbolizationError, TraceError};
