//! # callscope - Calling-Context Interning Engine
//!
//! callscope turns the call stack of a profiled program into a canonical,
//! deduplicated [`Context`](context::Context) per call path (hash-consing), so
//! a profiler can key its cost counters by call path instead of by function.
//! Context lookups happen on every function entry, so the common case (the
//! same function entered from the same context as last time) is answered by
//! a single validated cache check.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │            Profiler front end / recorded trace (replay)         │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ call / return / thread switch
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Session                                │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │   Universe   │──▶│   Context    │◀──│ Front cache  │         │
//! │  │ (fn stack +  │   │    Table     │   │ (per fn)     │         │
//! │  │ active cnts) │   └──────────────┘   └──────────────┘         │
//! │  └──────────────┘           ▲                                   │
//! │                             │ pure contexts                     │
//! │  ┌──────────────┐   ┌──────────────┐                            │
//! │  │ Symbolizer   │──▶│  Identity    │                            │
//! │  │ (DWARF)      │   │  Tables      │                            │
//! │  └──────────────┘   └──────────────┘                            │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         ▼
//!          ┌──────────────┐   ┌──────────────┐
//!          │   Analysis   │   │    Export    │
//!          │ (cost/cxt)   │   │ (JSON report)│
//!          └──────────────┘   └──────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Engine
//!
//! - [`session`]: push/restore protocol, universes, block-to-function attachment
//! - [`context`]: function stack, active counts and the context hash table
//! - [`identity`]: object, file and function interning
//! - [`classification`]: allocator flags fixed at first sight
//! - [`config`]: engine tunables
//!
//! ### Debug Information
//!
//! - [`symbolization`]: debug-info sources, DWARF symbolizer, `/proc` maps,
//!   dynamic-linker trampoline detection
//! - [`instrs`]: per-instruction side-table and mapping-file loader
//! - [`block`]: basic blocks as attached to functions
//!
//! ### Driver
//!
//! - [`replay`]: JSON Lines trace format and the replay loop
//! - [`analysis`]: cost aggregation per context
//! - [`export`]: JSON context report
//! - [`cli`]: command-line arguments
//!
//! ## Typical Usage
//!
//! ```
//! use callscope::session::Session;
//!
//! let mut session = Session::default();
//! let obj = session.intern_object(None);
//! let file = session.intern_file(obj, "", "main.c");
//! let main = session.intern_function(file, "main");
//! let foo = session.intern_function(file, "foo");
//!
//! let outer = session.push(Some(main));
//! let inner = session.push(Some(foo));
//! let foo_cxt = session.current_context().unwrap();
//! assert_eq!(session.context(foo_cxt).path(), &[foo]);
//!
//! session.restore(inner);
//! session.restore(outer);
//! assert_eq!(session.current_context(), None);
//! ```
//!
//! ## Key Concepts
//!
//! - **Context**: the innermost `max_depth` functions of a call path
//! - **Front cache**: each function remembers the last context it resolved to
//! - **Active count**: live frames of a function; above one means recursion
//! - **Universe**: function stack, active counts and current context of one thread

pub mod analysis;
pub mod block;
pub mod classification;
pub mod cli;
pub mod config;
pub mod context;
pub mod domain;
pub mod export;
pub mod identity;
pub mod instrs;
pub mod replay;
pub mod session;
pub mod stats;
pub mod symbolization;
