//! Engine configuration

use crate::context::{N_CXT_INITIAL_ENTRIES, N_FNSTACK_INITIAL_ENTRIES, N_INITIAL_FN_ARRAY_SIZE};

/// Tunables of a [`Session`](crate::session::Session)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of innermost functions folded into a context
    pub max_depth: usize,
    /// Consult the per-function front cache before hashing
    pub front_cache: bool,
    pub fn_stack_capacity: usize,
    pub context_table_size: usize,
    pub active_counts_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: 1,
            front_cache: true,
            fn_stack_capacity: N_FNSTACK_INITIAL_ENTRIES,
            context_table_size: N_CXT_INITIAL_ENTRIES,
            active_counts_size: N_INITIAL_FN_ARRAY_SIZE,
        }
    }
}

impl EngineConfig {
    /// Default configuration with a different tracked depth.
    #[must_use]
    pub fn with_depth(max_depth: usize) -> Self {
        Self { max_depth, ..Self::default() }
    }
}
