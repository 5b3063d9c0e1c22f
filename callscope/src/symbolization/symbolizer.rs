use addr2line::Context;
use anyhow::{Context as _, Result};
use gimli::{EndianRcSlice, RunTimeEndian};
use object::{Object, ObjectSection, ObjectSymbol, SymbolKind};
use rustc_demangle::demangle;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// Name reported for frames DWARF has no function for
pub const UNKNOWN_FUNCTION: &str = "<unknown>";

/// Symbolizer for resolving link-time addresses to functions and source locations
///
/// DWARF is consulted first; the ELF symbol table backs it up for code
/// compiled without debug info. Resolved addresses are cached.
pub struct Symbolizer {
    ctx: Context<EndianRcSlice<RunTimeEndian>>,
    /// Text symbols sorted by address
    symbols: Vec<Symbol>,
    /// Cache of resolved frames by address
    cache: RefCell<HashMap<u64, ResolvedFrame>>,
}

/// One entry of the ELF symbol table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: u64,
    pub size: u64,
}

impl Symbol {
    fn covers(&self, addr: u64) -> bool {
        addr == self.address || (addr > self.address && addr - self.address < self.size)
    }
}

impl Symbolizer {
    /// Create a new symbolizer for the given binary
    ///
    /// # Errors
    /// Returns an error if the binary file cannot be read or parsed, or if DWARF debug info is missing
    pub fn new<P: AsRef<Path>>(binary_path: P) -> Result<Self> {
        let binary_data = fs::read(binary_path.as_ref()).context("Failed to read binary file")?;
        let obj_file = object::File::parse(&*binary_data).context("Failed to parse object file")?;
        Self::from_object(&obj_file)
    }

    /// Build a symbolizer from an already parsed object file
    ///
    /// # Errors
    /// Returns an error if the DWARF sections cannot be loaded
    pub fn from_object(obj_file: &object::File<'_>) -> Result<Self> {
        let endian =
            if obj_file.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section =
            |id: gimli::SectionId| -> Result<EndianRcSlice<RunTimeEndian>, gimli::Error> {
                let data = obj_file
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[][..]));
                Ok(EndianRcSlice::new(Rc::from(&*data), endian))
            };

        let dwarf = gimli::Dwarf::load(&load_section)?;
        let ctx = Context::from_dwarf(dwarf).context("Failed to load DWARF debug information")?;

        let mut symbols: Vec<Symbol> = obj_file
            .symbols()
            .filter(|sym| sym.kind() == SymbolKind::Text && sym.address() != 0)
            .filter_map(|sym| {
                let name = sym.name().ok().filter(|n| !n.is_empty())?;
                Some(Symbol { name: name.to_string(), address: sym.address(), size: sym.size() })
            })
            .collect();
        symbols.sort_unstable_by_key(|sym| sym.address);

        Ok(Self { ctx, symbols, cache: RefCell::new(HashMap::new()) })
    }

    /// Resolve a link-time address to source location information
    ///
    /// Uses a cache to avoid re-resolving the same address multiple times.
    pub fn resolve(&self, addr: u64) -> ResolvedFrame {
        if let Some(cached) = self.cache.borrow().get(&addr) {
            return cached.clone();
        }

        let mut result = Vec::new();

        if let Ok(mut frame_iter) = self.ctx.find_frames(addr).skip_all_loads() {
            while let Ok(Some(frame)) = frame_iter.next() {
                let function = frame
                    .function
                    .and_then(|f| f.demangle().ok().map(|s| s.to_string()))
                    .unwrap_or_else(|| UNKNOWN_FUNCTION.to_string());

                let location = frame.location.map(|loc| SourceLocation {
                    file: loc.file.map(std::string::ToString::to_string),
                    line: loc.line,
                    column: loc.column,
                });

                result.push(InlinedFrame { function, location });
            }
        }

        let resolved = ResolvedFrame { addr, frames: result };
        self.cache.borrow_mut().insert(addr, resolved.clone());
        resolved
    }

    /// Name of the (outermost, non-inlined) function containing `addr`
    #[must_use]
    pub fn function_name(&self, addr: u64) -> Option<String> {
        let resolved = self.resolve(addr);
        resolved
            .frames
            .last()
            .map(|frame| frame.function.clone())
            .filter(|name| name != UNKNOWN_FUNCTION)
            .or_else(|| self.symbol_at(addr).map(|sym| Self::demangle_symbol(&sym.name)))
    }

    /// Innermost source location of `addr`
    #[must_use]
    pub fn location(&self, addr: u64) -> Option<SourceLocation> {
        self.resolve(addr).frames.into_iter().find_map(|frame| frame.location)
    }

    /// Symbol table entry covering `addr`
    #[must_use]
    pub fn symbol_at(&self, addr: u64) -> Option<&Symbol> {
        let idx = self.symbols.partition_point(|sym| sym.address <= addr);
        self.symbols[..idx].iter().rev().find(|sym| sym.covers(addr))
    }

    /// Name of the function starting exactly at `addr`, if any
    #[must_use]
    pub fn entry_name(&self, addr: u64) -> Option<String> {
        self.symbol_at(addr)
            .filter(|sym| sym.address == addr)
            .map(|sym| Self::demangle_symbol(&sym.name))
    }

    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Demangle a Rust symbol name
    #[must_use]
    pub fn demangle_symbol(symbol: &str) -> String {
        format!("{:#}", demangle(symbol))
    }
}

/// A resolved address (may contain multiple inlined frames, innermost first)
#[derive(Debug, Clone)]
pub struct ResolvedFrame {
    pub addr: u64,
    pub frames: Vec<InlinedFrame>,
}

/// An inlined frame within a resolved frame
#[derive(Debug, Clone)]
pub struct InlinedFrame {
    pub function: String,
    pub location: Option<SourceLocation>,
}

/// Source code location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_covers_sized_range() {
        let sym = Symbol { name: "f".into(), address: 0x100, size: 0x10 };
        assert!(sym.covers(0x100));
        assert!(sym.covers(0x10f));
        assert!(!sym.covers(0x110));
        assert!(!sym.covers(0xff));
    }

    #[test]
    fn test_zero_sized_symbol_covers_only_its_address() {
        let sym = Symbol { name: "_start".into(), address: 0x200, size: 0 };
        assert!(sym.covers(0x200));
        assert!(!sym.covers(0x201));
    }

    #[test]
    fn test_demangle_symbol_strips_hash() {
        let name = Symbolizer::demangle_symbol("_ZN4core3ptr13drop_in_place17h0123456789abcdefE");
        assert_eq!(name, "core::ptr::drop_in_place");
        assert_eq!(Symbolizer::demangle_symbol("malloc"), "malloc");
    }

    #[test]
    fn test_new_rejects_missing_file() {
        assert!(Symbolizer::new("/nonexistent/binary").is_err());
    }
}
