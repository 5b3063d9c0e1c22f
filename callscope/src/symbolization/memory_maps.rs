//! Memory mapping utilities for process address space analysis
//!
//! Parses `/proc/<pid>/maps` to find where a binary was loaded, which is
//! what position-independent executables need to relocate debug addresses.

use anyhow::{Context, Result};
use log::info;
use std::fs;

/// Half-open address range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Range of `len` bytes starting at `start`
    #[must_use]
    pub fn from_len(start: u64, len: u64) -> Self {
        Self { start, end: start + len }
    }

    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Parse /proc/pid/maps to find the memory range of a specific binary
///
/// All mappings of the binary are merged into one range from the lowest
/// start to the highest end.
///
/// # Errors
/// Returns an error if /proc/pid/maps cannot be read or if the binary is not found
pub fn parse_memory_maps(pid: i32, binary_path: &str) -> Result<MemoryRange> {
    let maps_path = format!("/proc/{pid}/maps");
    let maps = fs::read_to_string(&maps_path).context(format!("Failed to read {maps_path}"))?;

    let range = parse_maps_content(&maps, binary_path)?
        .ok_or_else(|| anyhow::anyhow!("Could not find memory range for {binary_path}"))?;

    info!(
        "Executable memory range: 0x{:x} - 0x{:x} (size: {} KB)",
        range.start,
        range.end,
        range.len() / 1024
    );
    Ok(range)
}

/// Merge every mapping line of `binary_path` in a maps listing.
///
/// # Errors
/// Returns an error if a matching line carries an unparsable address range
pub fn parse_maps_content(maps: &str, binary_path: &str) -> Result<Option<MemoryRange>> {
    let mut merged: Option<MemoryRange> = None;

    // "start-end perms offset dev inode pathname"
    for line in maps.lines().filter(|line| line.ends_with(binary_path)) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }
        let Some((start, end)) = parts[0].split_once('-') else {
            continue;
        };
        let start = u64::from_str_radix(start, 16).context("Failed to parse range start")?;
        let end = u64::from_str_radix(end, 16).context("Failed to parse range end")?;

        merged = Some(match merged {
            Some(r) => MemoryRange { start: r.start.min(start), end: r.end.max(end) },
            None => MemoryRange { start, end },
        });
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPS: &str = "\
55d0a4a00000-55d0a4a02000 r--p 00000000 08:01 131 /usr/bin/app
55d0a4a02000-55d0a4a05000 r-xp 00002000 08:01 131 /usr/bin/app
55d0a4a05000-55d0a4a06000 rw-p 00005000 08:01 131 /usr/bin/app
7f1c2e000000-7f1c2e022000 r--p 00000000 08:01 77 /usr/lib/libc.so.6
7ffd1c1e0000-7ffd1c201000 rw-p 00000000 00:00 0 [stack]";

    #[test]
    fn test_memory_range_contains() {
        let range = MemoryRange { start: 0x1000, end: 0x2000 };

        assert!(range.contains(0x1000));
        assert!(range.contains(0x1FFF));
        assert!(!range.contains(0x0FFF));
        assert!(!range.contains(0x2000));
    }

    #[test]
    fn test_parse_maps_content_merges_segments() {
        let range = parse_maps_content(MAPS, "/usr/bin/app").unwrap().unwrap();
        assert_eq!(range.start, 0x55d0_a4a0_0000);
        assert_eq!(range.end, 0x55d0_a4a0_6000);
    }

    #[test]
    fn test_parse_maps_content_unknown_binary() {
        assert_eq!(parse_maps_content(MAPS, "/usr/bin/other").unwrap(), None);
    }

    #[test]
    fn test_parse_maps_content_rejects_bad_range() {
        let maps = "zzzz-1000 r-xp 00000000 08:01 1 /bin/x";
        assert!(parse_maps_content(maps, "/bin/x").is_err());
    }

    #[test]
    fn test_parse_memory_maps_missing_process() {
        assert!(parse_memory_maps(i32::MAX, "/bin/x").is_err());
    }
}
