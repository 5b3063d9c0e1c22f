//! Trace file format
//!
//! JSON Lines, one operation per line, tagged by `op`:
//!
//! ```text
//! {"op":"call","object":"/usr/bin/app","dir":"/src","file":"main.c","function":"main"}
//! {"op":"call_addr","addr":"0x4005d0"}
//! {"op":"cost","amount":120}
//! {"op":"instr","addr":4195792,"size":4,"cost":1}
//! {"op":"signal"}
//! {"op":"thread","id":2}
//! {"op":"return"}
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. Addresses may be
//! JSON numbers or `0x`-prefixed hex strings.
//!
//! A `call` names its object without addresses. When a later `call_addr`
//! resolves into an object of the same name, the object takes that
//! module's text addresses.

use serde::{Deserialize, Deserializer, Serialize};
use std::io::BufRead;

use crate::domain::TraceError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraceOp {
    /// Enter a function named by its object, file and name
    Call {
        #[serde(default)]
        object: Option<String>,
        #[serde(default)]
        dir: String,
        file: String,
        function: String,
    },
    /// Enter the function containing a code address
    CallAddr {
        #[serde(deserialize_with = "deserialize_addr")]
        addr: u64,
    },
    Return,
    /// Signal delivery: a frame that does not extend the call path
    Signal,
    /// Switch to another thread of the profiled program
    Thread { id: u32 },
    /// Charge cost to the current context
    Cost { amount: u64 },
    /// Execute one instruction
    Instr {
        #[serde(deserialize_with = "deserialize_addr")]
        addr: u64,
        #[serde(default)]
        size: u32,
        #[serde(default)]
        cost: u64,
    },
}

/// One parsed operation with its 1-based line number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLine {
    pub line: usize,
    pub op: TraceOp,
}

/// Parse one line; `Ok(None)` for blank lines and comments.
///
/// # Errors
/// Returns [`TraceError::Malformed`] if the line is not a valid operation
pub fn parse_line(text: &str, line: usize) -> Result<Option<TraceOp>, TraceError> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(text).map(Some).map_err(|source| TraceError::Malformed { line, source })
}

/// Parse a whole trace.
///
/// # Errors
/// Returns an error on the first unreadable or malformed line
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceLine>, TraceError> {
    let mut ops = Vec::new();
    for (idx, text) in reader.lines().enumerate() {
        let line = idx + 1;
        if let Some(op) = parse_line(&text?, line)? {
            ops.push(TraceLine { line, op });
        }
    }
    Ok(ops)
}

fn deserialize_addr<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Addr {
        Num(u64),
        Hex(String),
    }

    match Addr::deserialize(deserializer)? {
        Addr::Num(n) => Ok(n),
        Addr::Hex(s) => {
            let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(&s);
            u64::from_str_radix(digits, 16)
                .map_err(|e| serde::de::Error::custom(format!("invalid address '{s}': {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_call_defaults() {
        let op = parse_line(r#"{"op":"call","file":"main.c","function":"main"}"#, 1).unwrap();
        assert_eq!(
            op,
            Some(TraceOp::Call {
                object: None,
                dir: String::new(),
                file: "main.c".into(),
                function: "main".into()
            })
        );
    }

    #[test]
    fn test_parse_addresses() {
        let hex = parse_line(r#"{"op":"call_addr","addr":"0x4005d0"}"#, 1).unwrap();
        let num = parse_line(r#"{"op":"call_addr","addr":4195792}"#, 2).unwrap();
        assert_eq!(hex, num);
        assert_eq!(hex, Some(TraceOp::CallAddr { addr: 0x4005d0 }));

        let instr = parse_line(r#"{"op":"instr","addr":"10"}"#, 3).unwrap();
        assert_eq!(instr, Some(TraceOp::Instr { addr: 0x10, size: 0, cost: 0 }));
    }

    #[test]
    fn test_unit_ops() {
        assert_eq!(parse_line(r#"{"op":"return"}"#, 1).unwrap(), Some(TraceOp::Return));
        assert_eq!(parse_line(r#"{"op":"signal"}"#, 1).unwrap(), Some(TraceOp::Signal));
    }

    #[test]
    fn test_blank_and_comment_lines_are_skipped() {
        assert_eq!(parse_line("   ", 1).unwrap(), None);
        assert_eq!(parse_line("# recorded by hand", 2).unwrap(), None);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let err = parse_line(r#"{"op":"jump"}"#, 7).unwrap_err();
        assert!(matches!(err, TraceError::Malformed { line: 7, .. }));
        assert!(err.to_string().contains("line 7"));

        let bad_addr = parse_line(r#"{"op":"call_addr","addr":"0xzz"}"#, 8).unwrap_err();
        assert!(matches!(bad_addr, TraceError::Malformed { line: 8, .. }));
    }

    #[test]
    fn test_parse_trace_keeps_line_numbers() {
        let text = "# header\n{\"op\":\"thread\",\"id\":1}\n\n{\"op\":\"cost\",\"amount\":5}\n";
        let ops = parse_trace(text.as_bytes()).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0], TraceLine { line: 2, op: TraceOp::Thread { id: 1 } });
        assert_eq!(ops[1].line, 4);
    }
}
