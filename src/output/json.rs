// src/output/json.rs
//! JSON Lines (JSONL) output handler
//!
//! Records and the summary go to stdout; notices and diagnostics to stderr,
//! each as one JSON object per line.

use crate::aggregator::{AuditOutcome, AuditSummary};
use crate::output::OutputHandler;
use crate::types::{AuditRecord, Diagnostic};
use async_trait::async_trait;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Mutex;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Line<'a> {
    Notice { message: &'a str },
    Record(&'a AuditRecord),
    Diagnostic(&'a Diagnostic),
    Summary(&'a AuditSummary),
    NoData,
}

/// JSON Lines output handler
pub struct JsonOutput {
    out: Mutex<Box<dyn Write + Send>>,
    err: Mutex<Box<dyn Write + Send>>,
}

impl JsonOutput {
    pub fn new() -> Self {
        Self::with_writers(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    pub fn with_writers(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            err: Mutex::new(err),
        }
    }

    fn write(writer: &Mutex<Box<dyn Write + Send>>, line: &Line<'_>) -> anyhow::Result<()> {
        let json = serde_json::to_string(line)?;

        let mut writer = writer
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer poisoned"))?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        Ok(())
    }
}

impl Default for JsonOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputHandler for JsonOutput {
    async fn emit_notice(&self, message: &str) -> anyhow::Result<()> {
        Self::write(&self.err, &Line::Notice { message })
    }

    async fn emit_record(&self, record: &AuditRecord) -> anyhow::Result<()> {
        Self::write(&self.out, &Line::Record(record))
    }

    async fn emit_diagnostic(&self, diagnostic: &Diagnostic) -> anyhow::Result<()> {
        Self::write(&self.err, &Line::Diagnostic(diagnostic))
    }

    async fn emit_outcome(&self, outcome: &AuditOutcome) -> anyhow::Result<()> {
        match outcome {
            AuditOutcome::NoData => Self::write(&self.out, &Line::NoData),
            AuditOutcome::Summary(summary) => Self::write(&self.out, &Line::Summary(summary)),
        }
    }

    async fn flush(&self) -> anyhow::Result<()> {
        for writer in [&self.out, &self.err] {
            writer
                .lock()
                .map_err(|_| anyhow::anyhow!("output writer poisoned"))?
                .flush()?;
        }
        Ok(())
    }
}
