//! Context hash table (hash-consing store for call paths)
//!
//! Every distinct call path, truncated to the tracked depth, maps to exactly
//! one [`Context`]. Contexts live in an arena and are addressed by [`CxtId`];
//! collision chains are kept as index links next to the arena, so a resize
//! only relinks ids and never moves or rebuilds a context.
//!
//! ## Resolution
//!
//! ```text
//! path (sentinel .. top)
//!     │
//!     ├─ hash top-down over ≤ depth entries, stop at the sentinel
//!     │
//!     ├─ front cache of the top function ── hit ──▶ Context
//!     │
//!     ├─ bucket = hash % size, walk chain ── hit ──▶ Context (cache refreshed)
//!     │
//!     └─ insert new Context (resize first if load would exceed 0.8)
//! ```

use log::{debug, trace};

use crate::domain::{CxtId, FnId};

/// Initial bucket count of the context table
pub const N_CXT_INITIAL_ENTRIES: usize = 2537;

/// Canonical record of one (depth-truncated) call path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    number: u32,
    hash: u64,
    path: Box<[FnId]>,
}

impl Context {
    /// Creation number (0-based)
    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    #[must_use]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Functions of the path, top first
    #[must_use]
    pub fn path(&self) -> &[FnId] {
        &self.path
    }

    /// Innermost function of the path
    #[must_use]
    pub fn top(&self) -> FnId {
        self.path[0]
    }
}

/// Counters owned by the table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableStats {
    /// Lookups that missed the front cache
    pub lru_misses: u64,
    pub resizes: u64,
}

#[derive(Debug)]
pub struct ContextTable {
    contexts: Vec<Context>,
    /// Chain link of each context, parallel to `contexts`
    next: Vec<Option<CxtId>>,
    buckets: Vec<Option<CxtId>>,
    max_depth: usize,
    front_cache: bool,
    stats: TableStats,
}

impl ContextTable {
    /// # Panics
    /// Panics if `size` or `max_depth` is zero.
    #[must_use]
    pub fn new(size: usize, max_depth: usize, front_cache: bool) -> Self {
        assert!(size > 0, "context table needs at least one bucket");
        assert!(max_depth > 0, "tracked context depth must be at least 1");
        Self {
            contexts: Vec::new(),
            next: Vec::new(),
            buckets: vec![None; size],
            max_depth,
            front_cache,
            stats: TableStats::default(),
        }
    }

    /// Resolve `path` (sentinel first, top last) to its canonical context.
    ///
    /// `cache` is the front-cache slot of the top function. It is only
    /// trusted after a full hash and path comparison, and is refreshed
    /// whenever the slow path runs.
    ///
    /// Returns `None` when the path has no current function.
    pub fn resolve(&mut self, path: &[Option<FnId>], cache: &mut Option<CxtId>) -> Option<CxtId> {
        path.last().copied().flatten()?;
        let hash = path_hash(path, self.max_depth);

        if self.front_cache {
            if let Some(id) = *cache {
                if self.matches(id, hash, path) {
                    trace!("resolve: front cache hit {id}");
                    return Some(id);
                }
            }
        }

        self.stats.lru_misses += 1;

        let id = match self.lookup(hash, path) {
            Some(id) => id,
            None => self.insert(hash, path),
        };
        *cache = Some(id);
        trace!("resolve: {id} (hash {hash:#x})");
        Some(id)
    }

    /// Look up `path` without creating a context or touching any cache.
    #[must_use]
    pub fn find(&self, path: &[Option<FnId>]) -> Option<CxtId> {
        path.last().copied().flatten()?;
        self.lookup(path_hash(path, self.max_depth), path)
    }

    #[must_use]
    pub fn context(&self, id: CxtId) -> &Context {
        &self.contexts[id.index()]
    }

    /// All contexts in creation order
    pub fn iter(&self) -> impl Iterator<Item = (CxtId, &Context)> {
        self.contexts.iter().map(|cxt| (CxtId(cxt.number), cxt))
    }

    /// Number of distinct contexts
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Current bucket count
    #[must_use]
    pub fn size(&self) -> usize {
        self.buckets.len()
    }

    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn load_factor(&self) -> f64 {
        self.contexts.len() as f64 / self.buckets.len() as f64
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    #[must_use]
    pub fn stats(&self) -> TableStats {
        self.stats
    }

    fn bucket(&self, hash: u64) -> usize {
        bucket_index(hash, self.buckets.len())
    }

    fn lookup(&self, hash: u64, path: &[Option<FnId>]) -> Option<CxtId> {
        let mut cur = self.buckets[self.bucket(hash)];
        while let Some(id) = cur {
            if self.matches(id, hash, path) {
                return Some(id);
            }
            cur = self.next[id.index()];
        }
        None
    }

    fn matches(&self, id: CxtId, hash: u64, path: &[Option<FnId>]) -> bool {
        let cxt = &self.contexts[id.index()];
        cxt.hash == hash && tracked(path, self.max_depth).eq(cxt.path.iter().copied())
    }

    fn insert(&mut self, hash: u64, path: &[Option<FnId>]) -> CxtId {
        // Keep the fill degree at or below 80% including the new entry
        if 10 * (self.contexts.len() + 1) > 8 * self.buckets.len() {
            self.resize();
        }

        let number = u32::try_from(self.contexts.len())
            .unwrap_or_else(|_| panic!("context counter overflow"));
        let id = CxtId(number);
        let idx = self.bucket(hash);

        self.contexts.push(Context { number, hash, path: tracked(path, self.max_depth).collect() });
        self.next.push(self.buckets[idx]);
        self.buckets[idx] = Some(id);

        trace!("new context {id}: {:?}", self.contexts[id.index()].path);
        id
    }

    fn resize(&mut self) {
        let new_size = 2 * self.buckets.len() + 3;
        let mut new_buckets: Vec<Option<CxtId>> = vec![None; new_size];
        let (mut conflicts1, mut conflicts2) = (0u32, 0u32);

        for head in &self.buckets {
            let mut cur = *head;
            while let Some(id) = cur {
                cur = self.next[id.index()];

                let new_idx = bucket_index(self.contexts[id.index()].hash, new_size);
                self.next[id.index()] = new_buckets[new_idx];
                new_buckets[new_idx] = Some(id);

                if let Some(following) = self.next[id.index()] {
                    conflicts1 += 1;
                    if self.next[following.index()].is_some() {
                        conflicts2 += 1;
                    }
                }
            }
        }

        debug!(
            "Resize Context Hash: {} => {new_size} (entries {}, conflicts {conflicts1}/{conflicts2})",
            self.buckets.len(),
            self.contexts.len()
        );

        self.buckets = new_buckets;
        self.stats.resizes += 1;
    }
}

/// Functions folded into a context: top-down, at most `depth`, stopping at the sentinel
fn tracked(path: &[Option<FnId>], depth: usize) -> impl Iterator<Item = FnId> + '_ {
    path.iter().rev().take(depth).map_while(|slot| *slot)
}

/// Hash of the tracked part of `path`
#[must_use]
pub fn path_hash(path: &[Option<FnId>], depth: usize) -> u64 {
    tracked(path, depth).fold(0u64, |hash, f| {
        (hash << 7).wrapping_add(hash >> 25).wrapping_add(u64::from(f.0))
    })
}

#[allow(clippy::cast_possible_truncation)]
fn bucket_index(hash: u64, size: usize) -> usize {
    (hash % size as u64) as usize
}
