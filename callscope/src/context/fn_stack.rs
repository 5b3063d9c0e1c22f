//! Growable function stack
//!
//! Slot 0 always holds the sentinel (`None`); `top` indexes the most
//! recently entered function. The backing array doubles when the next push
//! would run past its end and never shrinks.

use log::debug;

use crate::domain::FnId;

/// Initial slot count of a fresh function stack
pub const N_FNSTACK_INITIAL_ENTRIES: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnStack {
    slots: Vec<Option<FnId>>,
    top: usize,
}

impl FnStack {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(N_FNSTACK_INITIAL_ENTRIES)
    }

    /// Create a stack with `capacity` slots, sentinel included.
    ///
    /// # Panics
    /// Panics if `capacity` is zero (there must be room for the sentinel).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "function stack needs room for the sentinel");
        Self { slots: vec![None; capacity], top: 0 }
    }

    /// Number of slots currently allocated
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index of the top slot (0 = only the sentinel)
    #[must_use]
    pub fn depth(&self) -> usize {
        self.top
    }

    /// Function on top of the stack, `None` at the sentinel
    #[must_use]
    pub fn top(&self) -> Option<FnId> {
        self.slots[self.top]
    }

    /// Live slots from the sentinel up to and including the top
    #[must_use]
    pub fn as_path(&self) -> &[Option<FnId>] {
        &self.slots[..=self.top]
    }

    /// Live functions, bottom first
    pub fn entries(&self) -> impl Iterator<Item = FnId> + '_ {
        self.slots[1..=self.top].iter().filter_map(|slot| *slot)
    }

    /// Push `f`, growing first if the top slot is the last one.
    ///
    /// Returns true if the backing array was grown.
    pub(crate) fn push(&mut self, f: FnId) -> bool {
        let grew = self.top == self.slots.len() - 1;
        if grew {
            self.grow(f);
        }
        self.top += 1;
        self.slots[self.top] = Some(f);
        grew
    }

    /// Drop every slot above `depth`, handing each removed function to `on_removed`.
    ///
    /// # Panics
    /// Panics if `depth` is above the current top.
    pub(crate) fn truncate(&mut self, depth: usize, mut on_removed: impl FnMut(FnId)) {
        assert!(depth <= self.top, "cannot restore depth {depth} above current top {}", self.top);
        for slot in self.slots[depth + 1..=self.top].iter_mut().rev() {
            if let Some(f) = slot.take() {
                on_removed(f);
            }
        }
        self.top = depth;
    }

    fn grow(&mut self, pushing: FnId) {
        let new_size = self.slots.len() * 2;
        debug!("Resize Context Stack: {} => {new_size} (pushing {pushing})", self.slots.len());
        self.slots.resize(new_size, None);
    }
}

impl Default for FnStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stack_has_only_sentinel() {
        let stack = FnStack::new();
        assert_eq!(stack.capacity(), N_FNSTACK_INITIAL_ENTRIES);
        assert_eq!(stack.depth(), 0);
        assert_eq!(stack.top(), None);
        assert_eq!(stack.as_path(), &[None]);
    }

    #[test]
    fn test_growth_preserves_order_and_position() {
        let k = 4;
        let mut stack = FnStack::with_capacity(k);
        let pushed: Vec<FnId> = (1..=2 * k as u32 + 1).map(FnId).collect();

        let mut grows = 0;
        for &f in &pushed {
            if stack.push(f) {
                grows += 1;
            }
        }

        assert_eq!(grows, 2); // 4 -> 8 -> 16
        assert_eq!(stack.capacity(), 16);
        assert_eq!(stack.depth(), pushed.len());
        assert_eq!(stack.entries().collect::<Vec<_>>(), pushed);
        for (i, f) in pushed.iter().enumerate() {
            assert_eq!(stack.as_path()[i + 1], Some(*f));
        }
    }

    #[test]
    fn test_truncate_reports_removed_top_down() {
        let mut stack = FnStack::with_capacity(8);
        for n in 1..=4 {
            stack.push(FnId(n));
        }

        let mut removed = Vec::new();
        stack.truncate(1, |f| removed.push(f));

        assert_eq!(removed, vec![FnId(4), FnId(3), FnId(2)]);
        assert_eq!(stack.top(), Some(FnId(1)));
        // Cleared slots do not leak back in after a later push
        stack.push(FnId(9));
        assert_eq!(stack.as_path(), &[None, Some(FnId(1)), Some(FnId(9))]);
    }

    #[test]
    #[should_panic(expected = "above current top")]
    fn test_truncate_above_top_panics() {
        let mut stack = FnStack::with_capacity(4);
        stack.push(FnId(1));
        stack.truncate(2, |_| {});
    }
}
