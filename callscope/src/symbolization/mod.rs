//! # Symbol Resolution
//!
//! Turns runtime addresses of basic blocks into the names the identity
//! tables are keyed by: module, directory, file, function and line.
//!
//! ## Address Translation
//!
//! Debug info is written against link-time addresses, while blocks are
//! observed at runtime addresses. The difference is the module's bias:
//!
//! ```text
//! runtime address = link address + text_bias
//!
//! /proc/<pid>/maps:  55d0a4a00000-55d0a4a06000 ... /usr/bin/app
//!                    └── load base of a PIE, so text_bias = 0x55d0a4a00000
//! ```
//!
//! Fixed-address executables have a bias of 0.
//!
//! ## Module Structure
//!
//! - **`source`**: the [`DebugInfoSource`] trait the engine queries, with a
//!   DWARF-backed and an empty implementation
//! - **`debug_info`**: lookups with `???` sentinels and miss statistics
//! - **`symbolizer`**: DWARF (`addr2line`) plus ELF symbol table resolution
//! - **`memory_maps`**: `/proc/<pid>/maps` parsing
//! - **`module`**: loaded-module descriptors
//! - **`trampoline`**: byte-pattern search for `_dl_runtime_resolve`
//!
//! ## Limitations
//!
//! - One ELF object per [`DwarfSource`]; addresses in other modules are
//!   anonymous
//! - Requires debug symbols for file/line (`debug = true`); function names
//!   fall back to the symbol table

pub mod debug_info;
pub mod memory_maps;
pub mod module;
pub mod source;
pub mod symbolizer;
pub mod trampoline;

pub use debug_info::{get_debug_info, DebugInfo, DebugStats, UNKNOWN};
pub use memory_maps::{parse_memory_maps, MemoryRange};
pub use module::ModuleInfo;
pub use source::{DebugInfoSource, DwarfSource, NullSource, SourceLine};
pub use symbolizer::Symbolizer;
pub use trampoline::{search_runtime_resolve, CodePattern};
