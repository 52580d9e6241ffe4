// src/output/human.rs
//! Human-readable terminal output
//!
//! Report lines go to stdout, diagnostics to stderr.

use crate::aggregator::{format_duration, AuditOutcome};
use crate::output::OutputHandler;
use crate::types::{AuditRecord, Diagnostic};
use async_trait::async_trait;
use colored::Colorize;
use std::io::{self, Write};
use std::sync::Mutex;

type Writer = Mutex<Box<dyn Write + Send>>;

/// Human-readable output handler with colored terminal output
pub struct HumanOutput {
    out: Writer,
    err: Writer,
    /// Colors are decided per stream; either may be redirected
    out_colors: bool,
    err_colors: bool,
}

impl HumanOutput {
    /// Write to stdout and stderr
    pub fn new() -> Self {
        Self {
            out: Mutex::new(Box::new(io::stdout())),
            err: Mutex::new(Box::new(io::stderr())),
            out_colors: is_terminal::is_terminal(std::io::stdout()),
            err_colors: is_terminal::is_terminal(std::io::stderr()),
        }
    }

    /// Write to the given sinks, without colors
    pub fn with_writers(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            err: Mutex::new(err),
            out_colors: false,
            err_colors: false,
        }
    }

    /// Enable colors on stdout and stderr independently
    pub fn with_colors(mut self, out: bool, err: bool) -> Self {
        self.out_colors = out;
        self.err_colors = err;
        self
    }

    fn write_line(writer: &Writer, line: &str) -> anyhow::Result<()> {
        let mut writer = writer
            .lock()
            .map_err(|_| anyhow::anyhow!("output writer poisoned"))?;
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    /// `notBefore serial names` line printed for each record in verbose mode
    pub fn record_line(record: &AuditRecord) -> String {
        format!(
            "{} {} {}",
            record.not_before.format("%Y-%m-%d %H:%M:%S UTC"),
            record.serial_hex,
            record.joined_names()
        )
    }

    /// Summary block for the end of a run
    pub fn summary_lines(outcome: &AuditOutcome) -> Vec<String> {
        let summary = match outcome {
            AuditOutcome::NoData => {
                return vec!["No certificates audited; nothing to summarize".to_string()];
            }
            AuditOutcome::Summary(summary) => summary,
        };

        let mut lines = vec![
            format!("Count: {} {}", summary.count, summary.distinct),
            format!(
                "Latest issue: {}",
                format_duration(summary.since_latest_issuance)
            ),
        ];

        match summary.latency {
            Some(latency) => lines.push(format!(
                "Latencies: {}ms median, {}ms mean, {}ms 90th, {}ms max",
                latency.median.as_millis(),
                latency.mean.as_millis(),
                latency.p90.as_millis(),
                latency.max.as_millis()
            )),
            None => lines.push("Latencies: no OCSP requests were sent".to_string()),
        }

        lines
    }
}

impl Default for HumanOutput {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OutputHandler for HumanOutput {
    async fn emit_notice(&self, message: &str) -> anyhow::Result<()> {
        Self::write_line(&self.out, message)
    }

    async fn emit_record(&self, record: &AuditRecord) -> anyhow::Result<()> {
        let line = Self::record_line(record);
        if self.out_colors {
            Self::write_line(&self.out, &line.dimmed().to_string())
        } else {
            Self::write_line(&self.out, &line)
        }
    }

    async fn emit_diagnostic(&self, diagnostic: &Diagnostic) -> anyhow::Result<()> {
        let line = diagnostic.to_string();
        if !self.err_colors {
            return Self::write_line(&self.err, &line);
        }

        let colored = match diagnostic {
            Diagnostic::QueryFailed { .. } | Diagnostic::BadlyOutOfDate { .. } => line.red(),
            _ => line.yellow(),
        };
        Self::write_line(&self.err, &colored.to_string())
    }

    async fn emit_outcome(&self, outcome: &AuditOutcome) -> anyhow::Result<()> {
        for (i, line) in Self::summary_lines(outcome).iter().enumerate() {
            if self.out_colors && i == 0 {
                Self::write_line(&self.out, &line.bold().to_string())?;
            } else {
                Self::write_line(&self.out, line)?;
            }
        }
        Ok(())
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
