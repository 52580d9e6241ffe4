// src/output/capture.rs
//! In-memory output handler, used to inspect what a run reported

use crate::aggregator::AuditOutcome;
use crate::output::OutputHandler;
use crate::types::{AuditRecord, Diagnostic};
use async_trait::async_trait;
use std::sync::Mutex;

/// One emitted item, in the order it was emitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Captured {
    Notice(String),
    Record(AuditRecord),
    Diagnostic(Diagnostic),
    Outcome(AuditOutcome),
}

/// Output handler that keeps everything in memory
#[derive(Default)]
pub struct CaptureOutput {
    events: Mutex<Vec<Captured>>,
}

impl CaptureOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything captured so far
    pub fn events(&self) -> Vec<Captured> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Captured::Diagnostic(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Captured) -> anyhow::Result<()> {
        self.events
            .lock()
            .map_err(|_| anyhow::anyhow!("capture buffer poisoned"))?
            .push(event);
        Ok(())
    }
}

#[async_trait]
impl OutputHandler for CaptureOutput {
    async fn emit_notice(&self, message: &str) -> anyhow::Result<()> {
        self.push(Captured::Notice(message.to_string()))
    }

    async fn emit_record(&self, record: &AuditRecord) -> anyhow::Result<()> {
        self.push(Captured::Record(record.clone()))
    }

    async fn emit_diagnostic(&self, diagnostic: &Diagnostic) -> anyhow::Result<()> {
        self.push(Captured::Diagnostic(diagnostic.clone()))
    }

    async fn emit_outcome(&self, outcome: &AuditOutcome) -> anyhow::Result<()> {
        self.push(Captured::Outcome(outcome.clone()))
    }

    async fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
