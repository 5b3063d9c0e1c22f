//! # Calling-Context Engine
//!
//! The three per-thread and shared structures behind context resolution:
//!
//! - [`FnStack`]: the current call path, slot 0 being the sentinel
//! - [`ActiveCounts`]: live frames per function (recursion depth)
//! - [`ContextTable`]: hash-consed store of depth-truncated call paths
//!
//! The stack and active counts are grouped per thread of the profiled program
//! into a [`Universe`](crate::session::Universe); the context table is shared
//! by every universe of a session.

pub mod active;
pub mod fn_stack;
pub mod table;

pub use active::{ActiveCounts, N_INITIAL_FN_ARRAY_SIZE};
pub use fn_stack::{FnStack, N_FNSTACK_INITIAL_ENTRIES};
pub use table::{path_hash, Context, ContextTable, TableStats, N_CXT_INITIAL_ENTRIES};
