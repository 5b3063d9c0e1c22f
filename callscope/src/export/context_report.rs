use serde::Serialize;
use std::io::Write;

use crate::analysis::{path_names, CostStats};
use crate::domain::ExportError;
use crate::instrs::InstrTable;
use crate::session::Session;
use crate::stats::Statistics;

/// Top-level JSON document
#[derive(Debug, Serialize)]
pub struct ContextReport {
    pub statistics: Statistics,
    pub max_depth: usize,
    pub total_cost: u64,
    /// Every context in creation order
    pub contexts: Vec<ContextEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<InstrEntry>,
}

#[derive(Debug, Serialize)]
pub struct ContextEntry {
    pub number: u32,
    pub hash: u64,
    /// Function names, innermost first
    pub path: Vec<String>,
    pub calls: u64,
    pub cost: u64,
}

#[derive(Debug, Serialize)]
pub struct InstrEntry {
    /// Hex address (`0x...`)
    pub addr: String,
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `file:line` or `unknown`, when resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Exporter for the context report
pub struct ContextExporter<'a> {
    session: &'a Session,
    costs: &'a CostStats,
    instrs: Option<&'a InstrTable>,
}

impl<'a> ContextExporter<'a> {
    #[must_use]
    pub fn new(session: &'a Session, costs: &'a CostStats) -> Self {
        Self { session, costs, instrs: None }
    }

    /// Also list the instruction side-table.
    #[must_use]
    pub fn with_instrs(mut self, instrs: &'a InstrTable) -> Self {
        self.instrs = Some(instrs);
        self
    }

    #[must_use]
    pub fn build(&self) -> ContextReport {
        let contexts = self
            .session
            .contexts()
            .iter()
            .map(|(id, cxt)| ContextEntry {
                number: cxt.number(),
                hash: cxt.hash(),
                path: path_names(self.session, id),
                calls: self.costs.calls_of(id),
                cost: self.costs.cost_of(id),
            })
            .collect();

        let instructions = self
            .instrs
            .map(|table| {
                table
                    .sorted()
                    .into_iter()
                    .map(|instr| InstrEntry {
                        addr: format!("0x{:x}", instr.addr()),
                        size: instr.size(),
                        name: instr.name().map(str::to_string),
                        description: instr.cached_description().map(ToString::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default();

        ContextReport {
            statistics: self.session.statistics(),
            max_depth: self.session.config().max_depth,
            total_cost: self.costs.total_cost(),
            contexts,
            instructions,
        }
    }

    /// Write the report as pretty-printed JSON
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails
    pub fn export<W: Write>(&self, mut writer: W) -> Result<(), ExportError> {
        serde_json::to_writer_pretty(&mut writer, &self.build())?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}
