//! Debug-info lookup with sentinel values
//!
//! Missing debug information is normal (stripped libraries, JIT code), so a
//! lookup never fails: unknown names become [`UNKNOWN`], unknown lines 0,
//! and [`DebugStats`] records which of the four cases occurred.

use log::trace;
use serde::Serialize;

use super::module::ModuleInfo;
use super::source::DebugInfoSource;

/// Placeholder for an unknown file or function name
pub const UNKNOWN: &str = "???";

/// Everything known about one address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugInfo {
    pub dir: String,
    pub file: String,
    pub function: String,
    pub line: u32,
    /// Containing module, `None` for anonymous code
    pub module: Option<ModuleInfo>,
    /// False only when neither a file/line nor a function name was found
    pub found: bool,
}

/// How much debug info lookups found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DebugStats {
    /// File/line and function name
    pub full: u64,
    pub file_line_only: u64,
    pub fn_name_only: u64,
    pub none: u64,
}

impl DebugStats {
    #[must_use]
    pub fn total(&self) -> u64 {
        self.full + self.file_line_only + self.fn_name_only + self.none
    }
}

/// Look up `addr`, substituting sentinels for whatever is missing.
pub fn get_debug_info(source: &dyn DebugInfoSource, addr: u64, stats: &mut DebugStats) -> DebugInfo {
    let module = source.module_at(addr);
    let file_line = source.file_line(addr);
    let function = source.function_name(addr);

    let found = file_line.is_some() || function.is_some();
    match (&file_line, &function) {
        (Some(_), Some(_)) => stats.full += 1,
        (Some(_), None) => stats.file_line_only += 1,
        (None, Some(_)) => stats.fn_name_only += 1,
        (None, None) => stats.none += 1,
    }

    let (dir, file, line) = match file_line {
        Some(fl) => (fl.dir, fl.file, fl.line),
        None => (String::new(), UNKNOWN.to_string(), 0),
    };
    let function = function.unwrap_or_else(|| UNKNOWN.to_string());

    trace!(
        "get_debug_info(0x{addr:x}): module '{}', fn {function}",
        module.as_ref().map_or("(None)", |m| m.name.as_str())
    );

    DebugInfo { dir, file, function, line, module, found }
}
