//! Debug-information providers
//!
//! The engine never reads binaries itself: everything it learns about an
//! address goes through [`DebugInfoSource`]. [`DwarfSource`] answers from one
//! ELF file, [`NullSource`] knows nothing (every block becomes `???`).

use anyhow::{Context as _, Result};
use log::{debug, info};
use object::{Object, ObjectKind, ObjectSection, ObjectSegment};
use std::fs;
use std::path::Path;

use super::memory_maps::MemoryRange;
use super::module::ModuleInfo;
use super::symbolizer::Symbolizer;
use crate::domain::SymbolizationError;

/// Source position of an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// Directory part, empty when unknown
    pub dir: String,
    pub file: String,
    pub line: u32,
}

impl SourceLine {
    /// Split a path as reported by the line table into directory and file
    #[must_use]
    pub fn from_path(path: &str, line: u32) -> Self {
        match path.rsplit_once('/') {
            Some((dir, file)) => Self { dir: dir.to_string(), file: file.to_string(), line },
            None => Self { dir: String::new(), file: path.to_string(), line },
        }
    }
}

/// Query interface for debug information about runtime addresses
pub trait DebugInfoSource {
    /// Module whose text segment contains `addr`
    fn module_at(&self, addr: u64) -> Option<ModuleInfo>;

    fn file_line(&self, addr: u64) -> Option<SourceLine>;

    fn function_name(&self, addr: u64) -> Option<String>;

    /// Function name, but only if `addr` is that function's first instruction
    fn function_entry_name(&self, _addr: u64) -> Option<String> {
        None
    }

    /// Raw bytes of `module`'s text segment
    fn text_bytes(&self, _module: &ModuleInfo) -> Option<&[u8]> {
        None
    }
}

/// Source without any debug information
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSource;

impl DebugInfoSource for NullSource {
    fn module_at(&self, _addr: u64) -> Option<ModuleInfo> {
        None
    }

    fn file_line(&self, _addr: u64) -> Option<SourceLine> {
        None
    }

    fn function_name(&self, _addr: u64) -> Option<String> {
        None
    }
}

/// DWARF and symbol-table backed source for a single ELF object
pub struct DwarfSource {
    symbolizer: Symbolizer,
    module: ModuleInfo,
    text: Vec<u8>,
    /// Link-time address of `.text`
    text_link_addr: u64,
    /// Lowest segment address (load base of a PIE)
    link_base: u64,
    relocatable: bool,
}

impl DwarfSource {
    /// Load an ELF object, assuming it runs at its link-time addresses.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, has no `.text`
    /// section, or carries unreadable DWARF
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|source| SymbolizationError::Read { path: path.to_path_buf(), source })?;
        let obj_file = object::File::parse(&*data)
            .with_context(|| format!("Failed to parse object file {}", path.display()))?;

        let text_section = obj_file
            .section_by_name(".text")
            .ok_or_else(|| SymbolizationError::MissingText { path: path.to_path_buf() })?;
        let text = text_section.data().context("Failed to read .text section")?.to_vec();
        let text_link_addr = text_section.address();

        let link_base = obj_file.segments().map(|seg| seg.address()).min().unwrap_or(0);
        let relocatable = obj_file.kind() == ObjectKind::Dynamic;

        let symbolizer = Symbolizer::from_object(&obj_file)?;
        let module = ModuleInfo {
            name: path.to_string_lossy().into_owned(),
            text_avma: text_link_addr,
            text_size: text_section.size(),
            text_bias: 0,
        };

        debug!(
            "Loaded {}: .text at 0x{:x} ({} bytes), {} symbols, relocatable={relocatable}",
            module.name,
            module.text_avma,
            module.text_size,
            symbolizer.symbols().len()
        );

        Ok(Self { symbolizer, module, text, text_link_addr, link_base, relocatable })
    }

    /// Move a position-independent object to where it was actually loaded.
    ///
    /// Objects linked at fixed addresses are left untouched.
    #[allow(clippy::cast_possible_wrap)]
    pub fn rebase(&mut self, load: MemoryRange) {
        if !self.relocatable {
            return;
        }
        let bias = load.start.wrapping_sub(self.link_base) as i64;
        self.module.text_bias = bias;
        self.module.text_avma = self.text_link_addr.wrapping_add(bias as u64);
        info!("Rebased {} by 0x{:x}", self.module.name, bias);
    }

    #[must_use]
    pub fn module(&self) -> &ModuleInfo {
        &self.module
    }

    #[must_use]
    pub fn symbolizer(&self) -> &Symbolizer {
        &self.symbolizer
    }

    fn link_address(&self, addr: u64) -> Option<u64> {
        self.module.contains(addr).then(|| self.module.to_link_address(addr))
    }
}

impl DebugInfoSource for DwarfSource {
    fn module_at(&self, addr: u64) -> Option<ModuleInfo> {
        self.module.contains(addr).then(|| self.module.clone())
    }

    fn file_line(&self, addr: u64) -> Option<SourceLine> {
        let location = self.symbolizer.location(self.link_address(addr)?)?;
        let file = location.file?;
        Some(SourceLine::from_path(&file, location.line.unwrap_or(0)))
    }

    fn function_name(&self, addr: u64) -> Option<String> {
        self.symbolizer.function_name(self.link_address(addr)?)
    }

    fn function_entry_name(&self, addr: u64) -> Option<String> {
        self.symbolizer.entry_name(self.link_address(addr)?)
    }

    fn text_bytes(&self, module: &ModuleInfo) -> Option<&[u8]> {
        (module.name == self.module.name).then_some(self.text.as_slice())
    }
}
