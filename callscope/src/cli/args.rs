//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::config::EngineConfig;

#[derive(Parser, Debug)]
#[command(
    name = "callscope",
    version,
    about = "Replay call traces and attribute cost to calling contexts",
    after_help = "\
EXAMPLES:
    callscope trace.jsonl                              Context costs at depth 1
    callscope trace.jsonl --depth 3 --top 20           Separate callers up to 3 levels
    callscope trace.jsonl --binary ./app --pid 1234    Symbolize call_addr events of a PIE
    callscope trace.jsonl --export contexts.json       Write the full context report"
)]
pub struct Args {
    /// Trace to replay (JSON Lines, one op per line)
    #[arg(value_name = "TRACE")]
    pub trace: PathBuf,

    /// ELF binary used to symbolize `call_addr` events
    #[arg(short, long, value_name = "PATH")]
    pub binary: Option<PathBuf>,

    /// Process the trace was recorded from (relocates a PIE binary)
    #[arg(short, long, requires = "binary")]
    pub pid: Option<i32>,

    /// Instruction names, one `<hex-address>:<name>` per line
    #[arg(long, value_name = "FILE")]
    pub instr_map: Option<PathBuf>,

    /// Write the context report as JSON
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Number of innermost functions that make up a context
    #[arg(short, long, default_value_t = 1, value_parser = parse_depth)]
    pub depth: usize,

    /// Always hash the full path instead of trying the per-function cache first
    #[arg(long)]
    pub no_front_cache: bool,

    /// Number of contexts to list
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            max_depth: self.depth,
            front_cache: !self.no_front_cache,
            ..EngineConfig::default()
        }
    }
}

fn parse_depth(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("depth must be at least 1".to_string()),
        Ok(depth) => Ok(depth),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["callscope", "trace.jsonl"]).unwrap();
        assert_eq!(args.trace, PathBuf::from("trace.jsonl"));
        assert_eq!(args.engine_config(), EngineConfig::default());
        assert_eq!(args.top, 10);
    }

    #[test]
    fn test_engine_flags() {
        let args =
            Args::try_parse_from(["callscope", "t.jsonl", "--depth", "3", "--no-front-cache"])
                .unwrap();
        let config = args.engine_config();
        assert_eq!(config.max_depth, 3);
        assert!(!config.front_cache);
    }

    #[test]
    fn test_zero_depth_rejected() {
        assert!(Args::try_parse_from(["callscope", "t.jsonl", "--depth", "0"]).is_err());
    }

    #[test]
    fn test_pid_requires_binary() {
        assert!(Args::try_parse_from(["callscope", "t.jsonl", "--pid", "42"]).is_err());
        assert!(Args::try_parse_from(["callscope", "t.jsonl", "--pid", "42", "-b", "./app"]).is_ok());
    }
}
