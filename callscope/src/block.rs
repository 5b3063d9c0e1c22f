//! Basic blocks as seen by the engine

use crate::domain::{FnId, SectionKind};

/// A straight-line code block of the profiled program
///
/// The function, line and entry flag are filled in once by
/// [`Session::function_for_block`](crate::session::Session::function_for_block).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicBlock {
    addr: u64,
    section: SectionKind,
    pub(crate) offset: u64,
    pub(crate) function: Option<FnId>,
    pub(crate) line: u32,
    pub(crate) is_entry: bool,
}

impl BasicBlock {
    #[must_use]
    pub fn new(addr: u64) -> Self {
        Self::in_section(addr, SectionKind::Text)
    }

    #[must_use]
    pub fn in_section(addr: u64, section: SectionKind) -> Self {
        Self { addr, section, offset: addr, function: None, line: 0, is_entry: false }
    }

    /// Runtime address of the first instruction
    #[must_use]
    pub fn addr(&self) -> u64 {
        self.addr
    }

    #[must_use]
    pub fn section(&self) -> SectionKind {
        self.section
    }

    /// Address relative to the containing object's link base
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub fn function(&self) -> Option<FnId> {
        self.function
    }

    /// Source line of the block (0 if unknown)
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// True if the block starts at a function entry
    #[must_use]
    pub fn is_entry(&self) -> bool {
        self.is_entry
    }
}
