//! Instruction side-table
//!
//! Address-keyed records of individual instructions. A record is created
//! the first time an address is seen, may be named up front from a mapping
//! file, and resolves its source position only when first asked.
//!
//! Mapping file format, one instruction per line:
//!
//! ```text
//! 4005d0:loop_head
//! 0x4005f4:loop_exit
//! ```

use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::domain::InstrMapError;
use crate::identity::file_path;
use crate::symbolization::DebugInfoSource;

/// Source position of an instruction, computed lazily
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrDesc {
    Known { file: String, line: u32 },
    Unknown,
}

impl fmt::Display for InstrDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrDesc::Known { file, line } => write!(f, "{file}:{line}"),
            InstrDesc::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr {
    addr: u64,
    /// Byte length, 0 while unknown
    size: u32,
    name: Option<String>,
    desc: Option<InstrDesc>,
}

impl Instr {
    #[must_use]
    pub fn addr(&self) -> u64 {
        self.addr
    }

    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Name given by the mapping file
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Source position, if it has been computed already
    #[must_use]
    pub fn cached_description(&self) -> Option<&InstrDesc> {
        self.desc.as_ref()
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x} [{}]", self.addr, self.size)
    }
}

#[derive(Debug, Default)]
pub struct InstrTable {
    instrs: HashMap<u64, Instr>,
}

impl InstrTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `addr`, created on first sight.
    ///
    /// A nonzero `size` fills in an unknown size and otherwise must agree
    /// with the recorded one.
    ///
    /// # Panics
    /// Panics if `size` contradicts a previously recorded nonzero size.
    pub fn get_instr(&mut self, addr: u64, size: u32) -> &mut Instr {
        match self.try_get_instr(addr, size) {
            Ok(instr) => instr,
            Err(recorded) => panic!("size of instruction 0x{addr:x} changed: {recorded} => {size}"),
        }
    }

    /// Like [`get_instr`](Self::get_instr), but a contradicting size is
    /// returned as `Err(recorded_size)` and leaves the record untouched.
    ///
    /// # Errors
    /// Returns the recorded size if it is nonzero and differs from `size`
    pub fn try_get_instr(&mut self, addr: u64, size: u32) -> Result<&mut Instr, u32> {
        let instr = self
            .instrs
            .entry(addr)
            .or_insert_with(|| Instr { addr, size, name: None, desc: None });

        if size != 0 {
            if instr.size == 0 {
                instr.size = size;
            } else if instr.size != size {
                return Err(instr.size);
            }
        }
        Ok(instr)
    }

    #[must_use]
    pub fn find_instr(&self, addr: u64) -> Option<&Instr> {
        self.instrs.get(&addr)
    }

    /// Source position of `addr`, looked up once and then cached.
    pub fn description(&mut self, addr: u64, source: &dyn DebugInfoSource) -> &InstrDesc {
        let instr = self.get_instr(addr, 0);
        instr.desc.get_or_insert_with(|| match source.file_line(addr) {
            Some(fl) => InstrDesc::Known { file: file_path(&fl.dir, &fl.file), line: fl.line },
            None => InstrDesc::Unknown,
        })
    }

    /// Name instructions from a `<hex-address>:<name>` mapping file.
    ///
    /// Returns the number of names applied. Lines that are not valid UTF-8
    /// are skipped like any other malformed line.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read
    pub fn load_names<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, InstrMapError> {
        let path = path.as_ref();
        let read_err = |source| InstrMapError::Read { path: path.to_path_buf(), source };

        let file = File::open(path).map_err(read_err)?;
        let mut named = 0;

        for (idx, raw) in BufReader::new(file).split(b'\n').enumerate() {
            let raw = raw.map_err(read_err)?;
            let Ok(line) = String::from_utf8(raw) else {
                warn!("{}:{}: skipping line that is not UTF-8", path.display(), idx + 1);
                continue;
            };
            let line: String = line.chars().filter(|&c| c != '\r').collect();
            let Some((addr, name)) = line.split_once(':') else {
                continue;
            };

            let addr = parse_hex_prefix(addr);
            if addr == 0 || name.is_empty() {
                warn!("{}:{}: skipping instruction name '{line}'", path.display(), idx + 1);
                continue;
            }

            self.get_instr(addr, 0).set_name(name);
            named += 1;
        }

        debug!("Loaded {named} instruction names from {}", path.display());
        Ok(named)
    }

    /// All records in address order
    #[must_use]
    pub fn sorted(&self) -> Vec<&Instr> {
        let mut instrs: Vec<&Instr> = self.instrs.values().collect();
        instrs.sort_unstable_by_key(|instr| instr.addr);
        instrs
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }
}

/// Leading hexadecimal number of `s` (optional `0x`), 0 if there is none
fn parse_hex_prefix(s: &str) -> u64 {
    let s = s.trim_start();
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let end = s.find(|c: char| !c.is_ascii_hexdigit()).unwrap_or(s.len());
    u64::from_str_radix(&s[..end], 16).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbolization::{ModuleInfo, NullSource, SourceLine};
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct OneLine;

    impl DebugInfoSource for OneLine {
        fn module_at(&self, _addr: u64) -> Option<ModuleInfo> {
            None
        }

        fn file_line(&self, addr: u64) -> Option<SourceLine> {
            (addr == 0x10).then(|| SourceLine::from_path("/src/loop.c", 42))
        }

        fn function_name(&self, _addr: u64) -> Option<String> {
            None
        }
    }

    #[test]
    fn test_get_instr_fills_unknown_size() {
        let mut table = InstrTable::new();
        assert_eq!(table.get_instr(0x10, 0).size(), 0);
        assert_eq!(table.get_instr(0x10, 4).size(), 4);
        assert_eq!(table.get_instr(0x10, 0).size(), 4);
        assert_eq!(table.len(), 1);
    }

    #[test]
    #[should_panic(expected = "changed")]
    fn test_get_instr_size_mismatch_panics() {
        let mut table = InstrTable::new();
        table.get_instr(0x10, 4);
        table.get_instr(0x10, 2);
    }

    #[test]
    fn test_description_is_lazy_and_cached() {
        let mut table = InstrTable::new();
        table.get_instr(0x10, 3);
        assert_eq!(table.find_instr(0x10).unwrap().cached_description(), None);

        assert_eq!(table.description(0x10, &OneLine).to_string(), "/src/loop.c:42");
        // Cached: a source that knows nothing does not change it
        assert_eq!(table.description(0x10, &NullSource).to_string(), "/src/loop.c:42");
        assert_eq!(table.description(0x20, &OneLine), &InstrDesc::Unknown);
        assert_eq!(table.find_instr(0x20).unwrap().to_string(), "0x20 [0]");
    }

    #[test]
    fn test_parse_hex_prefix() {
        assert_eq!(parse_hex_prefix("4005d0"), 0x4005d0);
        assert_eq!(parse_hex_prefix("0x4005d0"), 0x4005d0);
        assert_eq!(parse_hex_prefix("12zz"), 0x12);
        assert_eq!(parse_hex_prefix("zz"), 0);
        assert_eq!(parse_hex_prefix(""), 0);
    }

    #[test]
    fn test_load_names_skips_malformed_lines() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "4005d0:loop_head\r\n\
             no separator here\n\
             0:zero_address\n\
             4005e0:\n\
             xyz:not_hex\n\
             0x4005f4:loop_exit\n"
        )
        .unwrap();

        let mut table = InstrTable::new();
        assert_eq!(table.load_names(file.path()).unwrap(), 2);
        assert_eq!(table.find_instr(0x4005d0).unwrap().name(), Some("loop_head"));
        assert_eq!(table.find_instr(0x4005f4).unwrap().name(), Some("loop_exit"));
        assert!(table.find_instr(0x4005e0).is_none());
        assert_eq!(table.sorted().len(), 2);
    }

    #[test]
    fn test_try_get_instr_reports_recorded_size() {
        let mut table = InstrTable::new();
        table.get_instr(0x10, 4);
        assert_eq!(table.try_get_instr(0x10, 2).err(), Some(4));
        assert_eq!(table.find_instr(0x10).unwrap().size(), 4);
        assert_eq!(table.try_get_instr(0x10, 0).unwrap().size(), 4);
    }

    #[test]
    fn test_load_names_skips_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"4005d0:loop_head\n4005e0:bad\xff\xfename\n4005f4:loop_exit\n").unwrap();

        let mut table = InstrTable::new();
        assert_eq!(table.load_names(file.path()).unwrap(), 2);
        assert!(table.find_instr(0x4005e0).is_none());
        assert_eq!(table.find_instr(0x4005f4).unwrap().name(), Some("loop_exit"));
    }

    #[test]
    fn test_load_names_missing_file() {
        let mut table = InstrTable::new();
        let err = table.load_names("/nonexistent/instrs.map").unwrap_err();
        assert!(matches!(err, InstrMapError::Read { .. }));
    }
}
