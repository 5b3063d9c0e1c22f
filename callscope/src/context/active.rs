//! Active-count array
//!
//! Maps a function's sequence number to the number of live stack frames
//! currently executing it. A count above one means the function is
//! recursing, which is what lets costs be separated per recursion level.

use log::debug;

/// Initial slot count of a fresh active-count array
pub const N_INITIAL_FN_ARRAY_SIZE: usize = 10071;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCounts {
    counts: Vec<u32>,
}

impl ActiveCounts {
    /// Create an array able to index every function interned so far.
    #[must_use]
    pub fn new(distinct_functions: usize) -> Self {
        Self::with_size(N_INITIAL_FN_ARRAY_SIZE.max(distinct_functions + 1))
    }

    /// # Panics
    /// Panics if `size` is zero.
    #[must_use]
    pub fn with_size(size: usize) -> Self {
        assert!(size > 0, "active-count array cannot be empty");
        Self { counts: vec![0; size] }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.counts.len()
    }

    /// Current count for sequence number `n` (0 if never touched)
    #[must_use]
    pub fn get(&self, n: usize) -> u32 {
        self.counts.get(n).copied().unwrap_or(0)
    }

    /// Make index `n` valid, doubling with zero fill as needed.
    ///
    /// Returns true if the array was grown.
    pub fn ensure(&mut self, n: usize) -> bool {
        if n < self.counts.len() {
            return false;
        }
        let mut new_size = self.counts.len();
        while new_size <= n {
            new_size *= 2;
        }
        debug!("Resize fn_active_array: {} => {new_size}", self.counts.len());
        self.counts.resize(new_size, 0);
        true
    }

    /// Mutable counter for `n`; the index must already be valid.
    ///
    /// # Panics
    /// Panics if `n` is out of bounds (call [`ensure`](Self::ensure) first).
    pub fn slot_mut(&mut self, n: usize) -> &mut u32 {
        assert!(n < self.counts.len(), "active count {n} out of bounds ({})", self.counts.len());
        &mut self.counts[n]
    }

    /// One more live frame of `n`.
    pub(crate) fn acquire(&mut self, n: usize) {
        *self.slot_mut(n) += 1;
    }

    /// One live frame of `n` fewer.
    pub(crate) fn release(&mut self, n: usize) {
        let count = self.slot_mut(n);
        assert!(*count > 0, "active count of function {n} would drop below zero");
        *count -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_sized_past_known_functions() {
        assert_eq!(ActiveCounts::new(0).size(), N_INITIAL_FN_ARRAY_SIZE);
        assert_eq!(ActiveCounts::new(20_000).size(), 20_001);
    }

    #[test]
    fn test_ensure_doubles_and_zero_fills() {
        let mut counts = ActiveCounts::with_size(4);
        counts.acquire(3);

        assert!(!counts.ensure(3));
        assert!(counts.ensure(9)); // 4 -> 8 -> 16
        assert_eq!(counts.size(), 16);
        assert_eq!(counts.get(3), 1);
        assert!((4..16).all(|n| counts.get(n) == 0));
    }

    #[test]
    fn test_get_out_of_bounds_reads_zero() {
        let counts = ActiveCounts::with_size(2);
        assert_eq!(counts.get(100), 0);
    }

    #[test]
    #[should_panic(expected = "below zero")]
    fn test_release_underflow_panics() {
        let mut counts = ActiveCounts::with_size(2);
        counts.release(1);
    }
}
