//! Loaded-module descriptor

use serde::Serialize;

/// Where one binary object's text segment lives in the profiled address space
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    /// Path of the object as loaded (e.g. `/usr/lib/libc.so.6`)
    pub name: String,
    /// Runtime start address of `.text`
    pub text_avma: u64,
    pub text_size: u64,
    /// Runtime address minus link-time address
    pub text_bias: i64,
}

impl ModuleInfo {
    /// Check if a runtime address falls inside the text segment
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.text_avma && addr - self.text_avma < self.text_size
    }

    /// Offset of `addr` from the start of the text segment
    #[must_use]
    pub fn offset_of(&self, addr: u64) -> u64 {
        addr.wrapping_sub(self.text_avma)
    }

    /// Translate a runtime address into the address the debug info uses
    #[allow(clippy::cast_sign_loss)]
    #[must_use]
    pub fn to_link_address(&self, addr: u64) -> u64 {
        addr.wrapping_sub(self.text_bias as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn libfoo() -> ModuleInfo {
        ModuleInfo {
            name: "/usr/lib/libfoo.so".to_string(),
            text_avma: 0x7f00_0000_1000,
            text_size: 0x800,
            text_bias: 0x7f00_0000_0000,
        }
    }

    #[test]
    fn test_contains_is_half_open() {
        let m = libfoo();
        assert!(m.contains(0x7f00_0000_1000));
        assert!(m.contains(0x7f00_0000_17ff));
        assert!(!m.contains(0x7f00_0000_1800));
        assert!(!m.contains(0x7f00_0000_0fff));
    }

    #[test]
    fn test_link_address_removes_bias() {
        let m = libfoo();
        assert_eq!(m.to_link_address(0x7f00_0000_1234), 0x1234);
        assert_eq!(m.offset_of(0x7f00_0000_1234), 0x234);
    }

    #[test]
    fn test_negative_bias() {
        let m = ModuleInfo { name: "a".into(), text_avma: 0x1000, text_size: 0x10, text_bias: -0x1000 };
        assert_eq!(m.to_link_address(0x1004), 0x2004);
    }
}
