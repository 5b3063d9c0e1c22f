//! Cost aggregation per calling context.
//!
//! Costs are keyed by [`CxtId`], so with a tracked depth of 1 they add up
//! per function and with deeper contexts per call path.
//!
//! # Architecture
//!
//! - **`CostStats`** - aggregation as trace events stream in
//! - **`CostStats::to_hotspots()`** - ranked view with percentages
//!
//! ## Data Flow
//!
//! ```text
//! trace op
//!     │
//!     ├──► Session::push()              ← context of the new frame
//!     │
//!     └──► CostStats::record_call()     ← per-context call count
//!          CostStats::record_cost()     ← per-context cost
//! ```

// Percentage calculations intentionally convert u64 to f64
#![allow(clippy::cast_precision_loss)]

use serde::Serialize;
use std::collections::HashMap;

use crate::domain::CxtId;
use crate::session::Session;

// =============================================================================
// CONTEXT HOTSPOT (OUTPUT TYPE)
// =============================================================================

/// A context with its aggregated cost.
///
/// ```text
/// HOTSPOTS
/// ─────────────────────────────────
///   bar <- foo        62.5%  (5 calls)
///   foo               25.0%  (1 call)
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ContextHotspot {
    pub context: CxtId,

    /// Function names of the context, innermost first.
    pub path: Vec<String>,

    /// Number of pushes that resolved to this context.
    pub calls: u64,

    pub cost: u64,

    /// Share of the total cost (0.0 - 100.0).
    pub percentage: f64,
}

impl ContextHotspot {
    /// Path joined for display (`bar <- foo <- main`)
    #[must_use]
    pub fn label(&self) -> String {
        self.path.join(" <- ")
    }
}

// =============================================================================
// COST STATS (AGGREGATOR)
// =============================================================================

#[derive(Debug, Default)]
pub struct CostStats {
    contexts: HashMap<CxtId, ContextCost>,

    /// Denominator for percentages.
    total_cost: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct ContextCost {
    calls: u64,
    cost: u64,
}

impl CostStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one entry into `context`.
    pub fn record_call(&mut self, context: CxtId) {
        let entry = self.contexts.entry(context).or_default();
        entry.calls = entry.calls.saturating_add(1);
    }

    /// Charge `amount` to `context`. Totals saturate at `u64::MAX`.
    pub fn record_cost(&mut self, context: CxtId, amount: u64) {
        let entry = self.contexts.entry(context).or_default();
        entry.cost = entry.cost.saturating_add(amount);
        self.total_cost = self.total_cost.saturating_add(amount);
    }

    #[must_use]
    pub fn total_cost(&self) -> u64 {
        self.total_cost
    }

    #[must_use]
    pub fn cost_of(&self, context: CxtId) -> u64 {
        self.contexts.get(&context).map_or(0, |c| c.cost)
    }

    #[must_use]
    pub fn calls_of(&self, context: CxtId) -> u64 {
        self.contexts.get(&context).map_or(0, |c| c.calls)
    }

    /// Ranked contexts, most expensive first (ties by context number).
    #[must_use]
    pub fn to_hotspots(&self, session: &Session) -> Vec<ContextHotspot> {
        let mut hotspots: Vec<ContextHotspot> = self
            .contexts
            .iter()
            .map(|(&context, stats)| {
                let percentage = if self.total_cost > 0 {
                    (stats.cost as f64 / self.total_cost as f64) * 100.0
                } else {
                    0.0
                };

                ContextHotspot {
                    context,
                    path: path_names(session, context),
                    calls: stats.calls,
                    cost: stats.cost,
                    percentage,
                }
            })
            .collect();

        hotspots.sort_unstable_by_key(|h| (std::cmp::Reverse(h.cost), h.context));
        hotspots
    }
}

/// Function names of `context`, innermost first.
#[must_use]
pub fn path_names(session: &Session, context: CxtId) -> Vec<String> {
    session
        .context(context)
        .path()
        .iter()
        .map(|&f| session.identity().function(f).name().to_string())
        .collect()
}
