//! Engine statistics

use serde::Serialize;
use std::fmt;

use crate::symbolization::DebugStats;

/// Counters collected over a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Statistics {
    pub distinct_objects: usize,
    pub distinct_files: usize,
    pub distinct_functions: usize,
    pub distinct_contexts: usize,
    pub context_table_size: usize,
    /// Context lookups that missed the front cache
    pub cxt_lru_misses: u64,
    pub context_resizes: u64,
    pub fn_stack_resizes: u64,
    pub fn_array_resizes: u64,
    pub debug: DebugStats,
}

impl Statistics {
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn load_factor(&self) -> f64 {
        if self.context_table_size == 0 {
            0.0
        } else {
            self.distinct_contexts as f64 / self.context_table_size as f64
        }
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "distinct: {} objects, {} files, {} functions, {} contexts",
            self.distinct_objects,
            self.distinct_files,
            self.distinct_functions,
            self.distinct_contexts
        )?;
        writeln!(
            f,
            "context table: {} buckets (load {:.2}), {} resizes, {} front-cache misses",
            self.context_table_size,
            self.load_factor(),
            self.context_resizes,
            self.cxt_lru_misses
        )?;
        writeln!(
            f,
            "resizes: fn stack {}, fn array {}",
            self.fn_stack_resizes, self.fn_array_resizes
        )?;
        write!(
            f,
            "debug info: {} full, {} file/line only, {} fn name only, {} none",
            self.debug.full, self.debug.file_line_only, self.debug.fn_name_only, self.debug.none
        )
    }
}
