use log::{debug, info, trace};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::trace::{parse_line, TraceLine, TraceOp};
use crate::analysis::CostStats;
use crate::block::BasicBlock;
use crate::domain::{CxtId, FnId, TraceError};
use crate::instrs::InstrTable;
use crate::session::{SavedContext, Session, Universe};
use crate::symbolization::{DebugInfoSource, ModuleInfo};

/// Thread the trace starts in
pub const INITIAL_THREAD: u32 = 1;

/// Parked state of a thread that is not currently running
struct ThreadState {
    universe: Universe,
    frames: Vec<SavedContext>,
}

/// Counters of one replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub ops: usize,
    pub calls: u64,
    pub threads: usize,
    /// Cost seen while no function was on the stack
    pub unattributed_cost: u64,
}

/// Drives a [`Session`] from trace operations
pub struct Replayer {
    session: Session,
    source: Box<dyn DebugInfoSource>,
    costs: CostStats,
    instrs: InstrTable,
    /// Blocks by address, so each is attached to a function once
    blocks: HashMap<u64, BasicBlock>,
    current_thread: u32,
    /// Saved caller states of the running thread, innermost last
    frames: Vec<SavedContext>,
    parked: HashMap<u32, ThreadState>,
    summary: ReplaySummary,
}

impl Replayer {
    #[must_use]
    pub fn new(session: Session, source: Box<dyn DebugInfoSource>) -> Self {
        Self {
            session,
            source,
            costs: CostStats::new(),
            instrs: InstrTable::new(),
            blocks: HashMap::new(),
            current_thread: INITIAL_THREAD,
            frames: Vec::new(),
            parked: HashMap::new(),
            summary: ReplaySummary { threads: 1, ..ReplaySummary::default() },
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn costs(&self) -> &CostStats {
        &self.costs
    }

    #[must_use]
    pub fn instrs(&self) -> &InstrTable {
        &self.instrs
    }

    /// Mutable side-table, e.g. to preload instruction names
    pub fn instrs_mut(&mut self) -> &mut InstrTable {
        &mut self.instrs
    }

    #[must_use]
    pub fn summary(&self) -> ReplaySummary {
        self.summary
    }

    #[must_use]
    pub fn current_thread(&self) -> u32 {
        self.current_thread
    }

    /// Call depth of the running thread
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Replay a trace file line by line.
    ///
    /// # Errors
    /// Returns an error on I/O failure, a malformed line or an unbalanced return
    pub fn replay_file<P: AsRef<Path>>(&mut self, path: P) -> Result<ReplaySummary, TraceError> {
        let file = File::open(path.as_ref())?;
        self.replay_reader(BufReader::new(file))
    }

    /// Replay every line of `reader`.
    ///
    /// # Errors
    /// Returns an error on I/O failure, a malformed line or an unbalanced return
    pub fn replay_reader<R: BufRead>(&mut self, reader: R) -> Result<ReplaySummary, TraceError> {
        for (idx, text) in reader.lines().enumerate() {
            let line = idx + 1;
            if let Some(op) = parse_line(&text?, line)? {
                self.apply(&TraceLine { line, op })?;
            }
        }

        info!(
            "Replayed {} ops ({} calls) across {} threads",
            self.summary.ops, self.summary.calls, self.summary.threads
        );
        Ok(self.summary)
    }

    /// Apply a single operation.
    ///
    /// # Errors
    /// Returns [`TraceError::UnbalancedReturn`] for a return with no open frame
    /// and [`TraceError::InstrSizeMismatch`] when an instruction changes size
    pub fn apply(&mut self, line: &TraceLine) -> Result<(), TraceError> {
        trace!("line {}: {:?}", line.line, line.op);
        self.summary.ops += 1;

        match &line.op {
            TraceOp::Call { object, dir, file, function } => {
                let module = object.as_ref().map(|name| ModuleInfo {
                    name: name.clone(),
                    text_avma: 0,
                    text_size: 0,
                    text_bias: 0,
                });
                let obj = self.session.intern_object(module.as_ref());
                let file = self.session.intern_file(obj, dir, file);
                let f = self.session.intern_function(file, function);
                self.enter(Some(f));
            }
            TraceOp::CallAddr { addr } => {
                let block = self.blocks.entry(*addr).or_insert_with(|| BasicBlock::new(*addr));
                let f = self.session.function_for_block(block, self.source.as_ref());
                self.enter(Some(f));
            }
            TraceOp::Return => {
                let saved =
                    self.frames.pop().ok_or(TraceError::UnbalancedReturn { line: line.line })?;
                self.session.restore(saved);
            }
            TraceOp::Signal => self.enter(None),
            TraceOp::Thread { id } => self.switch_thread(*id),
            TraceOp::Cost { amount } => self.charge(*amount),
            TraceOp::Instr { addr, size, cost } => {
                self.instrs.try_get_instr(*addr, *size).map_err(|recorded| {
                    TraceError::InstrSizeMismatch { line: line.line, addr: *addr, size: *size, recorded }
                })?;
                self.charge(*cost);
            }
        }
        Ok(())
    }

    /// Resolve source positions of every recorded instruction.
    pub fn describe_instrs(&mut self) {
        let addrs: Vec<u64> = self.instrs.sorted().iter().map(|instr| instr.addr()).collect();
        for addr in addrs {
            self.instrs.description(addr, self.source.as_ref());
        }
    }

    /// Context the running thread is in
    #[must_use]
    pub fn current_context(&self) -> Option<CxtId> {
        self.session.current_context()
    }

    fn enter(&mut self, f: Option<FnId>) {
        let saved = self.session.push(f);
        self.frames.push(saved);

        if f.is_some() {
            self.summary.calls += 1;
            if let Some(cxt) = self.session.current_context() {
                self.costs.record_call(cxt);
            }
        }
    }

    fn charge(&mut self, amount: u64) {
        if amount == 0 {
            return;
        }
        match self.session.current_context() {
            Some(cxt) => self.costs.record_cost(cxt, amount),
            None => {
                self.summary.unattributed_cost = self.summary.unattributed_cost.saturating_add(amount);
            }
        }
    }

    fn switch_thread(&mut self, id: u32) {
        if id == self.current_thread {
            return;
        }

        let incoming = self.parked.remove(&id).unwrap_or_else(|| {
            self.summary.threads += 1;
            ThreadState { universe: self.session.new_universe(), frames: Vec::new() }
        });

        let universe = self.session.swap_universe(incoming.universe);
        let frames = std::mem::replace(&mut self.frames, incoming.frames);
        self.parked.insert(self.current_thread, ThreadState { universe, frames });

        debug!("Switch thread {} => {id}", self.current_thread);
        self.current_thread = id;
    }
}
