//! # Session
//!
//! One profiling run: the identity tables and the context table shared by all
//! threads, plus the [`Universe`] of the thread currently being executed.
//!
//! ## Push/Pop Protocol
//!
//! ```text
//!   push(f) ─────────────▶ SavedContext { context, depth }   (caller's state)
//!      │
//!      ├─ f is None or already on top: nothing else
//!      │
//!      └─ grow stack if full ─ active[f] += 1 ─ stack[++top] = f ─ resolve
//!
//!   restore(saved) ─ drop slots above saved.depth (active[g] -= 1 each)
//!                  ─ current = saved.context
//! ```
//!
//! Thread switches hand whole universes in and out by value with
//! [`Session::swap_universe`].

use log::{debug, trace};

use crate::block::BasicBlock;
use crate::classification::classify_function;
use crate::config::EngineConfig;
use crate::context::{ActiveCounts, Context, ContextTable, FnStack};
use crate::domain::{CxtId, FileId, FnId, ObjId};
use crate::identity::IdentityTables;
use crate::stats::Statistics;
use crate::symbolization::{
    get_debug_info, search_runtime_resolve, DebugInfoSource, DebugStats, MemoryRange, ModuleInfo,
    UNKNOWN,
};

/// Name given to every block inside the detected linker trampoline
pub const RUNTIME_RESOLVE_NAME: &str = "_dl_runtime_resolve";

/// Caller state handed out by [`Session::push`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedContext {
    context: Option<CxtId>,
    depth: usize,
}

impl SavedContext {
    #[must_use]
    pub fn context(&self) -> Option<CxtId> {
        self.context
    }

    /// Function-stack depth at the time of the push
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Per-thread execution state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    fn_stack: FnStack,
    active: ActiveCounts,
    current: Option<CxtId>,
}

impl Universe {
    #[must_use]
    pub fn fn_stack(&self) -> &FnStack {
        &self.fn_stack
    }

    #[must_use]
    pub fn active(&self) -> &ActiveCounts {
        &self.active
    }

    /// Context of the innermost frame, `None` with an empty stack
    #[must_use]
    pub fn current(&self) -> Option<CxtId> {
        self.current
    }
}

pub struct Session {
    config: EngineConfig,
    identity: IdentityTables,
    contexts: ContextTable,
    universe: Universe,
    /// Address range of `_dl_runtime_resolve`, once found
    trampoline: Option<MemoryRange>,
    debug_stats: DebugStats,
    fn_stack_resizes: u64,
    fn_array_resizes: u64,
}

impl Session {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let identity = IdentityTables::new();
        let contexts =
            ContextTable::new(config.context_table_size, config.max_depth, config.front_cache);
        let universe = fresh_universe(&config, 0);
        Self {
            config,
            identity,
            contexts,
            universe,
            trampoline: None,
            debug_stats: DebugStats::default(),
            fn_stack_resizes: 0,
            fn_array_resizes: 0,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn identity(&self) -> &IdentityTables {
        &self.identity
    }

    #[must_use]
    pub fn contexts(&self) -> &ContextTable {
        &self.contexts
    }

    #[must_use]
    pub fn context(&self, id: CxtId) -> &Context {
        self.contexts.context(id)
    }

    #[must_use]
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    #[must_use]
    pub fn current_context(&self) -> Option<CxtId> {
        self.universe.current
    }

    #[must_use]
    pub fn trampoline(&self) -> Option<MemoryRange> {
        self.trampoline
    }

    /// Use a trampoline range found by other means.
    pub fn set_trampoline(&mut self, range: MemoryRange) {
        self.trampoline = Some(range);
    }

    // =========================================================================
    // INTERNING
    // =========================================================================

    pub fn intern_object(&mut self, module: Option<&ModuleInfo>) -> ObjId {
        self.identity.intern_object(module)
    }

    pub fn intern_file(&mut self, object: ObjId, dir: &str, file: &str) -> FileId {
        self.identity.intern_file(object, dir, file)
    }

    /// Intern a function; on first sight its pure context and allocator
    /// flags are fixed.
    pub fn intern_function(&mut self, file: FileId, name: &str) -> FnId {
        let (id, created) = self.identity.intern_function_entry(file, name);
        if !created {
            return id;
        }

        if self.universe.active.ensure(id.number()) {
            self.fn_array_resizes += 1;
        }

        let pure_path = [None, Some(id)];
        let pure = resolve_in(&mut self.contexts, &mut self.identity, &pure_path);
        self.identity.function_mut(id).freeze_first_sight(pure, classify_function(name));
        id
    }

    // =========================================================================
    // CONTEXT RESOLUTION
    // =========================================================================

    /// Canonical context of an arbitrary path (sentinel first, top last).
    pub fn resolve_path(&mut self, path: &[Option<FnId>]) -> Option<CxtId> {
        resolve_in(&mut self.contexts, &mut self.identity, path)
    }

    /// Canonical context of the current function stack.
    pub fn resolve_current(&mut self) -> Option<CxtId> {
        resolve_in(&mut self.contexts, &mut self.identity, self.universe.fn_stack.as_path())
    }

    /// Enter `f` (or a signal-handler marker when `None`).
    ///
    /// Returns the caller's context and depth for a later [`restore`](Self::restore).
    pub fn push(&mut self, f: Option<FnId>) -> SavedContext {
        let saved = SavedContext {
            context: self.universe.current,
            depth: self.universe.fn_stack.depth(),
        };

        let Some(f) = f else {
            return saved;
        };
        if self.universe.fn_stack.top() == Some(f) {
            return saved;
        }

        if self.universe.fn_stack.push(f) {
            self.fn_stack_resizes += 1;
        }
        if self.universe.active.ensure(f.number()) {
            self.fn_array_resizes += 1;
        }
        self.universe.active.acquire(f.number());

        self.universe.current =
            resolve_in(&mut self.contexts, &mut self.identity, self.universe.fn_stack.as_path());
        trace!("push {f}: depth {} -> {:?}", self.universe.fn_stack.depth(), self.universe.current);
        saved
    }

    /// Return to the state captured by `saved`.
    ///
    /// # Panics
    /// Panics if the stack is already shallower than `saved`.
    pub fn restore(&mut self, saved: SavedContext) {
        let Universe { fn_stack, active, current } = &mut self.universe;
        fn_stack.truncate(saved.depth, |f| active.release(f.number()));
        *current = saved.context;
        trace!("restore: depth {} -> {:?}", saved.depth, saved.context);
    }

    /// Live frames of `f` in the current universe
    #[must_use]
    pub fn active_count(&self, f: FnId) -> u32 {
        self.universe.active.get(f.number())
    }

    /// Mutable active count of `f`, growing the array if needed.
    pub fn active_count_mut(&mut self, f: FnId) -> &mut u32 {
        if self.universe.active.ensure(f.number()) {
            self.fn_array_resizes += 1;
        }
        self.universe.active.slot_mut(f.number())
    }

    // =========================================================================
    // UNIVERSES
    // =========================================================================

    /// Empty universe sized for every function interned so far.
    #[must_use]
    pub fn new_universe(&self) -> Universe {
        fresh_universe(&self.config, self.identity.distinct_functions())
    }

    /// Install `universe`, returning the one that was current.
    pub fn swap_universe(&mut self, mut universe: Universe) -> Universe {
        if universe.active.ensure(self.identity.distinct_functions()) {
            self.fn_array_resizes += 1;
        }
        std::mem::replace(&mut self.universe, universe)
    }

    /// Copy of the current universe.
    #[must_use]
    pub fn snapshot_universe(&self) -> Universe {
        self.universe.clone()
    }

    // =========================================================================
    // BASIC BLOCKS
    // =========================================================================

    /// Attach a function to `block` from debug information.
    ///
    /// Idempotent: a block keeps the function it was first given.
    pub fn function_for_block(
        &mut self,
        block: &mut BasicBlock,
        source: &dyn DebugInfoSource,
    ) -> FnId {
        if let Some(f) = block.function {
            return f;
        }

        let addr = block.addr();
        let info = get_debug_info(source, addr, &mut self.debug_stats);
        block.offset = info.module.as_ref().map_or(addr, |m| m.to_link_address(addr));

        let mut name = if info.function == UNKNOWN {
            format!("{:#016x}{}", block.offset, block.section().suffix())
        } else if let Some(entry) = source.function_entry_name(addr) {
            block.is_entry = true;
            entry
        } else {
            info.function
        };

        if self.trampoline.is_some_and(|range| range.contains(addr)) {
            name = RUNTIME_RESOLVE_NAME.to_string();
        }

        let object = self.attach_object(info.module.as_ref(), source);
        let file = self.identity.intern_file(object, &info.dir, &info.file);
        let f = self.intern_function(file, &name);

        block.function = Some(f);
        block.line = info.line;

        debug!(
            "function_for_block(0x{addr:x}): {name} (in {}:{})",
            self.identity.file(file).name(),
            info.line
        );
        f
    }

    /// Intern the block's object, scanning objects that are new (or just got
    /// their text addresses) for the trampoline until it has been found.
    fn attach_object(&mut self, module: Option<&ModuleInfo>, source: &dyn DebugInfoSource) -> ObjId {
        let (id, fresh) = self.identity.intern_object_entry(module);
        if fresh && self.trampoline.is_none() {
            if let Some(m) = module {
                if let Some(text) = source.text_bytes(m) {
                    self.trampoline = search_runtime_resolve(m, text);
                }
            }
        }
        id
    }

    #[must_use]
    pub fn statistics(&self) -> Statistics {
        let table = self.contexts.stats();
        Statistics {
            distinct_objects: self.identity.distinct_objects(),
            distinct_files: self.identity.distinct_files(),
            distinct_functions: self.identity.distinct_functions(),
            distinct_contexts: self.contexts.len(),
            context_table_size: self.contexts.size(),
            cxt_lru_misses: table.lru_misses,
            context_resizes: table.resizes,
            fn_stack_resizes: self.fn_stack_resizes,
            fn_array_resizes: self.fn_array_resizes,
            debug: self.debug_stats,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn fresh_universe(config: &EngineConfig, distinct_functions: usize) -> Universe {
    Universe {
        fn_stack: FnStack::with_capacity(config.fn_stack_capacity),
        active: ActiveCounts::with_size(config.active_counts_size.max(distinct_functions + 1)),
        current: None,
    }
}

/// Resolve `path` through the front cache of its top function.
fn resolve_in(
    contexts: &mut ContextTable,
    identity: &mut IdentityTables,
    path: &[Option<FnId>],
) -> Option<CxtId> {
    let top = path.last().copied().flatten()?;
    contexts.resolve(path, identity.function_mut(top).front_cache_mut())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SectionKind;
    use crate::symbolization::{NullSource, SourceLine};

    fn session_with(names: &[&str]) -> (Session, Vec<FnId>) {
        let mut session = Session::default();
        let obj = session.intern_object(None);
        let file = session.intern_file(obj, "", "main.c");
        let ids = names.iter().map(|n| session.intern_function(file, n)).collect();
        (session, ids)
    }

    #[test]
    fn test_pure_context_set_at_first_sight() {
        let (mut session, ids) = session_with(&["main"]);
        let pure = session.identity().function(ids[0]).pure_context().unwrap();
        assert_eq!(session.context(pure).path(), &[ids[0]]);
        // The pure context is what a depth-1 push resolves to
        session.push(Some(ids[0]));
        assert_eq!(session.current_context(), Some(pure));
    }

    #[test]
    fn test_allocator_flags() {
        let (session, ids) = session_with(&["malloc", "realloc", "free", "main"]);
        let f = |i: usize| session.identity().function(ids[i]);
        assert!(f(0).is_malloc());
        assert!(f(1).is_realloc());
        assert!(f(2).is_free());
        assert!(!f(3).class().is_allocator());
    }

    #[test]
    fn test_push_restore_round_trip() {
        let (mut session, ids) = session_with(&["main", "foo"]);

        let s0 = session.push(Some(ids[0]));
        assert_eq!(s0.context(), None);
        assert_eq!(s0.depth(), 0);
        let main_cxt = session.current_context();

        let s1 = session.push(Some(ids[1]));
        assert_eq!(s1.context(), main_cxt);
        assert_eq!(session.active_count(ids[1]), 1);

        session.restore(s1);
        assert_eq!(session.current_context(), main_cxt);
        assert_eq!(session.active_count(ids[1]), 0);
        assert_eq!(session.universe().fn_stack().depth(), 1);

        session.restore(s0);
        assert_eq!(session.current_context(), None);
        assert_eq!(session.active_count(ids[0]), 0);
    }

    #[test]
    fn test_push_same_top_and_marker_only_save() {
        let (mut session, ids) = session_with(&["main"]);
        session.push(Some(ids[0]));
        let cxt = session.current_context();

        let again = session.push(Some(ids[0]));
        assert_eq!(again.depth(), 1);
        assert_eq!(session.universe().fn_stack().depth(), 1);
        assert_eq!(session.active_count(ids[0]), 1);

        let marker = session.push(None);
        assert_eq!(marker.context(), cxt);
        assert_eq!(session.universe().fn_stack().depth(), 1);

        session.restore(marker);
        assert_eq!(session.current_context(), cxt);
    }

    #[test]
    fn test_recursion_counts() {
        let (mut session, ids) = session_with(&["f", "g"]);
        let (f, g) = (ids[0], ids[1]);

        session.push(Some(f));
        let sg = session.push(Some(g));
        let sf = session.push(Some(f));
        assert_eq!(session.active_count(f), 2);
        assert_eq!(session.active_count(g), 1);

        session.restore(sf);
        assert_eq!(session.active_count(f), 1);
        session.restore(sg);
        assert_eq!(session.active_count(g), 0);
    }

    #[test]
    #[should_panic(expected = "above current top")]
    fn test_restore_deeper_than_stack_panics() {
        let (mut session, ids) = session_with(&["main", "foo"]);
        session.push(Some(ids[0]));
        let deep = session.push(Some(ids[1]));
        let outer = session.push(Some(ids[0]));
        session.restore(deep);
        session.restore(outer);
    }

    #[test]
    fn test_active_count_mut_grows_lazily() {
        let mut session = Session::new(EngineConfig { active_counts_size: 4, ..EngineConfig::default() });
        *session.active_count_mut(FnId(40)) += 3;
        assert_eq!(session.active_count(FnId(40)), 3);
        assert!(session.universe().active().size() > 40);
        assert_eq!(session.statistics().fn_array_resizes, 1);
    }

    #[test]
    fn test_swap_universe_isolates_threads() {
        let (mut session, ids) = session_with(&["main", "worker"]);
        session.push(Some(ids[0]));
        let main_cxt = session.current_context();

        let fresh = session.new_universe();
        let thread1 = session.swap_universe(fresh);
        assert_eq!(session.current_context(), None);
        assert_eq!(session.active_count(ids[0]), 0);

        session.push(Some(ids[1]));
        let thread2 = session.swap_universe(thread1);
        assert_eq!(session.current_context(), main_cxt);
        assert_eq!(thread2.fn_stack().top(), Some(ids[1]));
        assert_eq!(thread2.active().get(ids[1].number()), 1);
    }

    #[test]
    fn test_swap_grows_undersized_universe() {
        let mut session = Session::new(EngineConfig { active_counts_size: 2, ..EngineConfig::default() });
        let old = session.new_universe();
        let obj = session.intern_object(None);
        let file = session.intern_file(obj, "", "gen.c");
        for i in 0..5 {
            session.intern_function(file, &format!("f{i}"));
        }
        session.swap_universe(old);
        assert!(session.universe().active().size() > 5);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let (mut session, ids) = session_with(&["main"]);
        let before = session.snapshot_universe();
        session.push(Some(ids[0]));
        assert_eq!(before.current(), None);
        assert_ne!(session.snapshot_universe(), before);
    }

    struct Named;

    impl DebugInfoSource for Named {
        fn module_at(&self, _addr: u64) -> Option<ModuleInfo> {
            Some(ModuleInfo {
                name: "/usr/bin/app".into(),
                text_avma: 0x1000,
                text_size: 0x1000,
                text_bias: 0,
            })
        }

        fn file_line(&self, addr: u64) -> Option<SourceLine> {
            Some(SourceLine::from_path("/src/app.c", u32::try_from(addr & 0xff).unwrap()))
        }

        fn function_name(&self, addr: u64) -> Option<String> {
            Some(if addr < 0x1800 { "main".into() } else { "helper".into() })
        }

        fn function_entry_name(&self, addr: u64) -> Option<String> {
            (addr == 0x1000).then(|| "main".into())
        }
    }

    #[test]
    fn test_function_for_block_is_idempotent() {
        let mut session = Session::default();
        let mut entry = BasicBlock::new(0x1000);
        let mut inner = BasicBlock::new(0x1010);

        let f = session.function_for_block(&mut entry, &Named);
        assert!(entry.is_entry());
        assert_eq!(session.function_for_block(&mut inner, &Named), f);
        assert!(!inner.is_entry());
        assert_eq!(inner.line(), 0x10);

        // A second lookup does not consult debug info again
        assert_eq!(session.function_for_block(&mut entry, &Named), f);
        assert_eq!(session.statistics().debug.full, 2);

        let rec = session.identity().function(f);
        assert_eq!(rec.name(), "main");
        assert_eq!(session.identity().file(rec.file()).name(), "/src/app.c");
        assert_eq!(session.identity().object_of(f).name(), "/usr/bin/app");
    }

    #[test]
    fn test_unknown_blocks_named_by_offset() {
        let mut session = Session::default();
        let mut text = BasicBlock::new(0x4005d0);
        let mut plt = BasicBlock::in_section(0x400420, SectionKind::Plt);

        let f1 = session.function_for_block(&mut text, &NullSource);
        let f2 = session.function_for_block(&mut plt, &NullSource);

        assert_eq!(session.identity().function(f1).name(), "0x000000004005d0");
        assert_eq!(session.identity().function(f2).name(), "0x00000000400420 [PLT]");
        assert_eq!(session.identity().object_of(f1).name(), UNKNOWN);
        assert_eq!(session.statistics().debug.none, 2);
    }

    #[test]
    fn test_trampoline_blocks_are_renamed() {
        let mut session = Session::default();
        session.set_trampoline(MemoryRange::from_len(0x1900, 0x20));

        let mut block = BasicBlock::new(0x1908);
        let f = session.function_for_block(&mut block, &Named);
        assert_eq!(session.identity().function(f).name(), RUNTIME_RESOLVE_NAME);

        let mut after = BasicBlock::new(0x1920);
        let g = session.function_for_block(&mut after, &Named);
        assert_eq!(session.identity().function(g).name(), "helper");
    }
}
