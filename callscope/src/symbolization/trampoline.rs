//! Dynamic-linker trampoline detection
//!
//! `_dl_runtime_resolve` in `ld.so` ends by jumping into the function it just
//! resolved. Seen as a call, that jump makes the trampoline show up inside
//! every lazily bound call chain, so blocks inside it get the trampoline's
//! name even when `ld.so` is stripped. The routine is hand-written assembler,
//! so it is found by byte pattern.
//!
//! A pattern is compared chunk by chunk; the gaps between chunks hold
//! relocated addresses that differ between builds.
//!
//! ```text
//! code:    50 51 52 8b 54 24 10 8b 44 24 0c e8 | 70 01 00 00 | 5a 59 87 04 24 c2 08 00
//! chunks:  [0 .. 12)                           |   skipped   | [16 .. 24)
//! ```

use log::{debug, info};

use super::memory_maps::MemoryRange;
use super::module::ModuleInfo;

/// Byte signature of a trampoline variant
#[derive(Debug, Clone, Copy)]
pub struct CodePattern {
    pub name: &'static str,
    pub code: &'static [u8],
    /// `(start, len)` slices of `code` that must match exactly
    pub chunks: &'static [(usize, usize)],
}

impl CodePattern {
    /// Total length of the matched code
    #[must_use]
    pub fn len(&self) -> usize {
        self.code.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    fn matches_at(&self, text: &[u8], offset: usize) -> bool {
        self.chunks.iter().all(|&(start, len)| {
            text[offset + start..offset + start + len] == self.code[start..start + len]
        })
    }
}

pub const X86_DEFAULT: CodePattern = CodePattern {
    name: "x86-def",
    code: &[
        0x50, 0x51, 0x52, 0x8b, 0x54, 0x24, 0x10, 0x8b, // 0
        0x44, 0x24, 0x0c, 0xe8, 0x70, 0x01, 0x00, 0x00, // 8
        0x5a, 0x59, 0x87, 0x04, 0x24, 0xc2, 0x08, 0x00, // 16
    ],
    chunks: &[(0, 12), (16, 8)],
};

/// glibc 2.8 variant
pub const X86_GLIBC_28: CodePattern = CodePattern {
    name: "x86-glibc2.8",
    code: &[
        0x50, 0x51, 0x52, 0x8b, 0x54, 0x24, 0x10, 0x8b, // 0
        0x44, 0x24, 0x0c, 0xe8, 0x70, 0x01, 0x00, 0x00, // 8
        0x5a, 0x8b, 0x0c, 0x24, 0x89, 0x04, 0x24, 0x8b, // 16
        0x44, 0x24, 0x04, 0xc2, 0x0c, 0x00, // 24
    ],
    chunks: &[(0, 12), (16, 14)],
};

pub const PPC32_DEFAULT: CodePattern = CodePattern {
    name: "ppc32-def",
    code: &[
        0x94, 0x21, 0xff, 0xc0, 0x90, 0x01, 0x00, 0x0c, // 0
        0x90, 0x61, 0x00, 0x10, 0x90, 0x81, 0x00, 0x14, // 8
        0x7d, 0x83, 0x63, 0x78, 0x90, 0xa1, 0x00, 0x18, // 16
        0x7d, 0x64, 0x5b, 0x78, 0x90, 0xc1, 0x00, 0x1c, // 24
        0x7c, 0x08, 0x02, 0xa6, 0x90, 0xe1, 0x00, 0x20, // 32
        0x90, 0x01, 0x00, 0x30, 0x91, 0x01, 0x00, 0x24, // 40
        0x7c, 0x00, 0x00, 0x26, 0x91, 0x21, 0x00, 0x28, // 48
        0x91, 0x41, 0x00, 0x2c, 0x90, 0x01, 0x00, 0x08, // 56
        0x48, 0x00, 0x02, 0x91, 0x7c, 0x69, 0x03, 0xa6, // 64: bl <fixup>
        0x80, 0x01, 0x00, 0x30, 0x81, 0x41, 0x00, 0x2c, // 72
        0x81, 0x21, 0x00, 0x28, 0x7c, 0x08, 0x03, 0xa6, // 80
        0x81, 0x01, 0x00, 0x24, 0x80, 0x01, 0x00, 0x08, // 88
        0x80, 0xe1, 0x00, 0x20, 0x80, 0xc1, 0x00, 0x1c, // 96
        0x7c, 0x0f, 0xf1, 0x20, 0x80, 0xa1, 0x00, 0x18, // 104
        0x80, 0x81, 0x00, 0x14, 0x80, 0x61, 0x00, 0x10, // 112
        0x80, 0x01, 0x00, 0x0c, 0x38, 0x21, 0x00, 0x40, // 120
        0x4e, 0x80, 0x04, 0x20, // 128
    ],
    chunks: &[(0, 65), (68, 64)],
};

pub const AMD64_DEFAULT: CodePattern = CodePattern {
    name: "amd64-def",
    code: &[
        0x48, 0x83, 0xec, 0x38, 0x48, 0x89, 0x04, 0x24, // 0
        0x48, 0x89, 0x4c, 0x24, 0x08, 0x48, 0x89, 0x54, 0x24, 0x10, // 8
        0x48, 0x89, 0x74, 0x24, 0x18, 0x48, 0x89, 0x7c, 0x24, 0x20, // 18
        0x4c, 0x89, 0x44, 0x24, 0x28, 0x4c, 0x89, 0x4c, 0x24, 0x30, // 28
        0x48, 0x8b, 0x74, 0x24, 0x40, 0x49, 0x89, 0xf3, // 38
        0x4c, 0x01, 0xde, 0x4c, 0x01, 0xde, 0x48, 0xc1, 0xe6, 0x03, // 46
        0x48, 0x8b, 0x7c, 0x24, 0x38, 0xe8, 0xee, 0x01, 0x00, 0x00, // 56
        0x49, 0x89, 0xc3, 0x4c, 0x8b, 0x4c, 0x24, 0x30, // 66
        0x4c, 0x8b, 0x44, 0x24, 0x28, 0x48, 0x8b, 0x7c, 0x24, 0x20, // 74
        0x48, 0x8b, 0x74, 0x24, 0x18, 0x48, 0x8b, 0x54, 0x24, 0x10, // 84
        0x48, 0x8b, 0x4c, 0x24, 0x08, 0x48, 0x8b, 0x04, 0x24, // 94
        0x48, 0x83, 0xc4, 0x48, 0x41, 0xff, 0xe3, // 103
    ],
    chunks: &[(0, 62), (66, 44)],
};

#[cfg(target_arch = "x86")]
const PLATFORM_PATTERNS: &[CodePattern] = &[X86_DEFAULT, X86_GLIBC_28];
#[cfg(target_arch = "x86")]
const LD_PREFIXES: &[&str] = &["/lib/ld"];

#[cfg(target_arch = "powerpc")]
const PLATFORM_PATTERNS: &[CodePattern] = &[PPC32_DEFAULT];
#[cfg(target_arch = "powerpc")]
const LD_PREFIXES: &[&str] = &["/lib/ld"];

#[cfg(target_arch = "x86_64")]
const PLATFORM_PATTERNS: &[CodePattern] = &[AMD64_DEFAULT];
#[cfg(target_arch = "x86_64")]
const LD_PREFIXES: &[&str] = &["/lib/ld", "/lib64/ld"];

#[cfg(not(any(target_arch = "x86", target_arch = "powerpc", target_arch = "x86_64")))]
const PLATFORM_PATTERNS: &[CodePattern] = &[];
#[cfg(not(any(target_arch = "x86", target_arch = "powerpc", target_arch = "x86_64")))]
const LD_PREFIXES: &[&str] = &[];

/// Search `text` (loaded at `base`) for `pattern`.
///
/// Every offset from the start of `text` up to and including the last one at
/// which the whole pattern still fits is tried; the first match wins.
///
/// # Panics
/// Panics if the first chunk does not start at 0 or is shorter than 3 bytes.
#[must_use]
pub fn scan(text: &[u8], base: u64, pattern: &CodePattern) -> Option<MemoryRange> {
    let &(first_start, first_len) = pattern.chunks.first()?;
    assert!(
        first_start == 0 && first_len > 2,
        "pattern {} must open with a chunk at offset 0 of at least 3 bytes",
        pattern.name
    );
    debug!(
        "scan: pattern {}, check {} bytes of {:02x?}...",
        pattern.name,
        first_len,
        &pattern.code[..3]
    );

    let last = text.len().checked_sub(pattern.len())?;
    let offset = (0..=last).find(|&offset| pattern.matches_at(text, offset))?;

    debug!("scan: {} found at offset {offset:#x}", pattern.name);
    Some(MemoryRange::from_len(base + offset as u64, pattern.len() as u64))
}

/// Look for the trampoline in `module` if it looks like the dynamic linker.
///
/// Only the patterns of the architecture this crate was built for are tried.
#[must_use]
pub fn search_runtime_resolve(module: &ModuleInfo, text: &[u8]) -> Option<MemoryRange> {
    if !LD_PREFIXES.iter().any(|prefix| module.name.starts_with(prefix)) {
        return None;
    }

    PLATFORM_PATTERNS.iter().find_map(|pattern| {
        let range = scan(text, module.text_avma, pattern)?;
        info!(
            "Found runtime_resolve ({}): {} +{:#x}={:#x}, length {}",
            pattern.name,
            short_name(&module.name),
            range.start - module.text_avma,
            range.start,
            range.len()
        );
        Some(range)
    })
}

fn short_name(name: &str) -> &str {
    name.rsplit_once('/').map_or(name, |(_, file)| file)
}
