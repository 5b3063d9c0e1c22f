//! Function classification for allocator tracking.
//!
//! Every interned function is classified exactly once, the first time it is
//! seen. The result is frozen on the function record: later renames or
//! re-resolution never change it.
//!
//! # Classification Strategy
//!
//! Only exact name matches count. `malloc`, `realloc` and `free` are the
//! allocator entry points cost models care about; wrappers such as
//! `__libc_malloc` or `je_malloc` are deliberately not matched because
//! they call into (or are called from) one of the exact names.

/// Allocator role of a function, fixed at first sight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FunctionClass {
    pub is_malloc: bool,
    pub is_realloc: bool,
    pub is_free: bool,
}

impl FunctionClass {
    /// Returns true if the function is any of the tracked allocator calls.
    #[must_use]
    pub fn is_allocator(&self) -> bool {
        self.is_malloc || self.is_realloc || self.is_free
    }
}

// =============================================================================
// CLASSIFICATION TABLE
// =============================================================================

const MALLOC_NAME: &str = "malloc";
const REALLOC_NAME: &str = "realloc";
const FREE_NAME: &str = "free";

/// Classify a function by its exact (undecorated) name.
///
/// # Examples
///
/// ```
/// use callscope::classification::classify_function;
///
/// assert!(classify_function("malloc").is_malloc);
/// assert!(!classify_function("je_malloc").is_allocator());
/// ```
#[must_use]
pub fn classify_function(name: &str) -> FunctionClass {
    FunctionClass {
        is_malloc: name == MALLOC_NAME,
        is_realloc: name == REALLOC_NAME,
        is_free: name == FREE_NAME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_allocator_names() {
        assert_eq!(
            classify_function("malloc"),
            FunctionClass { is_malloc: true, is_realloc: false, is_free: false }
        );
        assert!(classify_function("realloc").is_realloc);
        assert!(classify_function("free").is_free);
    }

    #[test]
    fn test_wrappers_are_not_allocators() {
        for name in ["__libc_malloc", "malloc_trim", "freeaddrinfo", "xrealloc", "Malloc"] {
            assert!(!classify_function(name).is_allocator(), "{name} must not be classified");
        }
    }

    #[test]
    fn test_plain_function_is_unclassified() {
        assert_eq!(classify_function("main"), FunctionClass::default());
    }
}
