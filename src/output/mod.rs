// src/output/mod.rs
//! Report output for ocsp-audit
//!
//! Handlers receive progress notices, per-record lines, diagnostics and the
//! final outcome. Several handlers can be active at once.

use crate::aggregator::AuditOutcome;
use crate::types::{AuditRecord, Diagnostic};
use async_trait::async_trait;
use std::sync::Arc;

pub mod capture;
pub mod human;
pub mod json;

/// Trait for output handlers
#[async_trait]
pub trait OutputHandler: Send + Sync {
    /// Progress message such as the tree head summary
    async fn emit_notice(&self, message: &str) -> anyhow::Result<()>;

    /// One audited certificate (verbose mode only)
    async fn emit_record(&self, record: &AuditRecord) -> anyhow::Result<()>;

    /// A warning observed while auditing or aggregating
    async fn emit_diagnostic(&self, diagnostic: &Diagnostic) -> anyhow::Result<()>;

    /// The final summary
    async fn emit_outcome(&self, outcome: &AuditOutcome) -> anyhow::Result<()>;

    /// Flush any buffered output
    async fn flush(&self) -> anyhow::Result<()>;
}

/// Manager that dispatches output to multiple handlers
pub struct OutputManager {
    handlers: Vec<Arc<dyn OutputHandler>>,
}

impl OutputManager {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn add_handler(&mut self, handler: Arc<dyn OutputHandler>) {
        self.handlers.push(handler);
    }

    pub async fn notice(&self, message: &str) -> anyhow::Result<()> {
        let mut errors = Vec::new();
        for handler in &self.handlers {
            if let Err(e) = handler.emit_notice(message).await {
                errors.push(e);
            }
        }
        self.settle(errors)
    }

    pub async fn record(&self, record: &AuditRecord) -> anyhow::Result<()> {
        let mut errors = Vec::new();
        for handler in &self.handlers {
            if let Err(e) = handler.emit_record(record).await {
                errors.push(e);
            }
        }
        self.settle(errors)
    }

    pub async fn diagnostic(&self, diagnostic: &Diagnostic) -> anyhow::Result<()> {
        let mut errors = Vec::new();
        for handler in &self.handlers {
            if let Err(e) = handler.emit_diagnostic(diagnostic).await {
                errors.push(e);
            }
        }
        self.settle(errors)
    }

    pub async fn outcome(&self, outcome: &AuditOutcome) -> anyhow::Result<()> {
        let mut errors = Vec::new();
        for handler in &self.handlers {
            if let Err(e) = handler.emit_outcome(outcome).await {
                errors.push(e);
            }
        }
        self.settle(errors)
    }

    /// Flush all handlers
    pub async fn flush(&self) -> anyhow::Result<()> {
        for handler in &self.handlers {
            handler.flush().await?;
        }
        Ok(())
    }

    /// Log handler errors; fail only when every handler failed
    fn settle(&self, errors: Vec<anyhow::Error>) -> anyhow::Result<()> {
        let failed = errors.len();
        let mut last_error = None;
        for e in errors {
            tracing::warn!("Output handler error: {}", e);
            last_error = Some(e);
        }

        match last_error {
            Some(err) if failed == self.handlers.len() => Err(err),
            _ => Ok(()),
        }
    }
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::new()
    }
}
