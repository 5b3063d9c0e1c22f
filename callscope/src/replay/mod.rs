//! # Trace Replay
//!
//! Feeds recorded call/return events through a [`Session`](crate::session::Session)
//! and charges costs to the resulting contexts.
//!
//! ```text
//!  trace.jsonl ──▶ parse_line ──▶ Replayer::apply
//!                                   │
//!                                   ├─ call / call_addr / signal ─▶ Session::push
//!                                   ├─ return ────────────────────▶ Session::restore
//!                                   ├─ thread ────────────────────▶ Session::swap_universe
//!                                   └─ cost / instr ──────────────▶ CostStats, InstrTable
//! ```
//!
//! Each thread of the profiled program keeps its own universe and its own
//! stack of saved caller states; parked threads are resumed exactly where
//! they left off.

pub mod replayer;
pub mod trace;

pub use replayer::{ReplaySummary, Replayer, INITIAL_THREAD};
pub use trace::{parse_line, parse_trace, TraceLine, TraceOp};
