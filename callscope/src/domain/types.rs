//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers prevent common bugs like indexing the context arena
//! with a function sequence number, and make signatures more expressive.
//!
//! Object, file and function ids *are* their sequence numbers (1-based, in
//! creation order within their namespace). Context ids are 0-based and equal
//! to the context's creation number.

use serde::Serialize;
use std::fmt;

/// Function identity (sequence number, starts at 1)
///
/// Two `FnId`s are equal iff they name the same interned function record.
/// The raw value is what the context hasher folds in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FnId(pub u32);

impl FnId {
    /// Sequence number of the function (also its active-count slot)
    #[must_use]
    pub fn number(self) -> usize {
        self.0 as usize
    }

    /// Index into the function arena
    pub(crate) fn index(self) -> usize {
        debug_assert!(self.0 > 0, "FnId 0 is reserved for the stack sentinel");
        self.0 as usize - 1
    }
}

impl fmt::Display for FnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{}", self.0)
    }
}

/// Source file identity (sequence number, starts at 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileId(pub u32);

impl FileId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file#{}", self.0)
    }
}

/// Binary object (module) identity (sequence number, starts at 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjId(pub u32);

impl ObjId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Context identity
///
/// Index into the context arena; equal to the context's creation number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CxtId(pub u32);

impl CxtId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CxtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cxt#{}", self.0)
    }
}

/// Kind of section a basic block was found in
///
/// Only used to annotate blocks for which no function name is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SectionKind {
    #[default]
    Text,
    Data,
    Bss,
    Got,
    Plt,
    Other,
}

impl SectionKind {
    /// Suffix appended to address-derived function names
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            SectionKind::Data => " [Data]",
            SectionKind::Bss => " [BSS]",
            SectionKind::Got => " [GOT]",
            SectionKind::Plt => " [PLT]",
            SectionKind::Text | SectionKind::Other => "",
        }
    }
}
