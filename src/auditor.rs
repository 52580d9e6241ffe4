// src/auditor.rs
//! Producer half of the pipeline: filter log entries and query OCSP

use anyhow::Result;
use base64::Engine;
use chrono::{DateTime, Utc};
use futures_util::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cert_parser::{CertificateDetails, CertificateParser, EntryCerts};
use crate::ocsp::{build_request, parse_response, OcspTransport};
use crate::output::OutputManager;
use crate::types::{AuditRecord, Diagnostic};

/// Which certificates are audited and when a response counts as slow
#[derive(Debug, Clone)]
pub struct AuditorConfig {
    pub trusted_issuer: String,
    /// Issuers whose certificates legitimately carry no OCSP URL
    pub ocsp_exempt_issuers: Vec<String>,
    pub slow_threshold: Duration,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            trusted_issuer: "Let's Encrypt Authority X1".to_string(),
            ocsp_exempt_issuers: vec!["Merge Delay Intermediate 1".to_string()],
            slow_threshold: Duration::from_secs(1),
        }
    }
}

/// Result of the filter for a parsed certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    WrongIssuer,
    Expired,
    /// No OCSP URL; `exempt` issuers are dropped without a diagnostic
    NoOcspServer { exempt: bool },
}

/// Per-run counts of what happened to each entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditorTally {
    pub entries: u64,
    pub parse_errors: u64,
    pub wrong_issuer: u64,
    pub expired: u64,
    pub missing_ocsp: u64,
    pub audited: u64,
    pub failed: u64,
}

/// Walks log entries in order and produces one record per eligible certificate
pub struct CertificateAuditor {
    config: AuditorConfig,
    transport: Arc<dyn OcspTransport>,
    output: Arc<OutputManager>,
    reference_time: Option<DateTime<Utc>>,
}

impl CertificateAuditor {
    pub fn new(
        config: AuditorConfig,
        transport: Arc<dyn OcspTransport>,
        output: Arc<OutputManager>,
    ) -> Self {
        Self {
            config,
            transport,
            output,
            reference_time: None,
        }
    }

    /// Judge expiry against a fixed time instead of the wall clock
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }

    /// Run on a dedicated task; the receiver closes once every entry is done
    pub fn spawn(
        self,
        entries: BoxStream<'static, Result<EntryCerts>>,
    ) -> (JoinHandle<AuditorTally>, UnboundedReceiver<AuditRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move { self.run(entries, tx).await });
        (handle, rx)
    }

    /// Process every entry, sending records to `tx`
    ///
    /// Takes the sender by value so the channel closes when this returns.
    pub async fn run(
        &self,
        mut entries: BoxStream<'static, Result<EntryCerts>>,
        tx: UnboundedSender<AuditRecord>,
    ) -> AuditorTally {
        let mut tally = AuditorTally::default();

        while let Some(item) = entries.next().await {
            tally.entries += 1;

            let entry = match item {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping entry {}: {:#}", tally.entries - 1, e);
                    tally.parse_errors += 1;
                    continue;
                }
            };

            let cert = match CertificateParser::parse_certificate(&entry.leaf) {
                Ok(cert) => cert,
                Err(e) => {
                    debug!("Skipping entry {}: {:#}", tally.entries - 1, e);
                    tally.parse_errors += 1;
                    continue;
                }
            };

            let now = self.reference_time.unwrap_or_else(Utc::now);
            let eligibility = self.check_eligibility(&cert, now);
            match eligibility {
                Eligibility::WrongIssuer => {
                    tally.wrong_issuer += 1;
                    continue;
                }
                Eligibility::Expired => {
                    tally.expired += 1;
                    continue;
                }
                _ => {}
            }

            let issuer = match entry.issuer().map(CertificateParser::parse_certificate) {
                None => None,
                Some(Ok(issuer)) => Some(issuer),
                Some(Err(e)) => {
                    debug!("Failed to parse issuer of {}: {:#}", cert.serial_hex(), e);
                    tally.parse_errors += 1;
                    continue;
                }
            };

            if let Eligibility::NoOcspServer { exempt } = eligibility {
                tally.missing_ocsp += 1;
                if !exempt {
                    self.report(Diagnostic::MissingOcspServer {
                        issuer: cert.issuer_name().to_string(),
                    })
                    .await;
                }
                continue;
            }

            let record = self.audit(&cert, issuer.as_ref()).await;
            tally.audited += 1;
            if !record.is_success() {
                tally.failed += 1;
            }

            if tx.send(record).is_err() {
                warn!("Record receiver dropped; stopping audit");
                break;
            }
        }

        info!(
            "Audited {} of {} entries ({} failed queries, {} unparseable, {} other issuer, {} expired, {} without OCSP)",
            tally.audited,
            tally.entries,
            tally.failed,
            tally.parse_errors,
            tally.wrong_issuer,
            tally.expired,
            tally.missing_ocsp
        );

        tally
    }

    /// Apply the filter rules that need a parsed certificate, in order
    pub fn check_eligibility(&self, cert: &CertificateDetails, now: DateTime<Utc>) -> Eligibility {
        if cert.issuer_cn.as_deref() != Some(self.config.trusted_issuer.as_str()) {
            return Eligibility::WrongIssuer;
        }
        if cert.is_expired_at(now) {
            return Eligibility::Expired;
        }
        if cert.ocsp_servers.is_empty() {
            let exempt = self
                .config
                .ocsp_exempt_issuers
                .iter()
                .any(|i| i == cert.issuer_name());
            return Eligibility::NoOcspServer { exempt };
        }
        Eligibility::Eligible
    }

    /// Query the first OCSP server of an eligible certificate
    ///
    /// Every failure ends up in the record's `error`; nothing is retried.
    pub async fn audit(
        &self,
        cert: &CertificateDetails,
        issuer: Option<&CertificateDetails>,
    ) -> AuditRecord {
        let server = cert.ocsp_servers.first().cloned().unwrap_or_default();
        let names = cert.dns_names.join(", ");

        let mut record = AuditRecord {
            serial_hex: cert.serial_hex(),
            dns_names: cert.dns_names.clone(),
            not_before: cert.not_before,
            this_update: None,
            next_update: None,
            status: None,
            latency: None,
            request_url: server.clone(),
            error: None,
        };

        let request = match build_request(cert, issuer) {
            Ok(request) => request,
            Err(e) => {
                record.error = Some(format!(
                    "error creating OCSP request for {} {}: {:#}",
                    names, server, e
                ));
                return record;
            }
        };
        record.request_url = format!(
            "{}{}",
            server,
            base64::engine::general_purpose::STANDARD.encode(&request)
        );

        let start = Instant::now();
        let result = self.transport.query(&server, &request).await;
        let latency = start.elapsed();
        record.latency = Some(latency);

        if latency > self.config.slow_threshold {
            self.report(Diagnostic::SlowResponse {
                serial_hex: record.serial_hex.clone(),
                latency_ms: latency.as_millis() as u64,
                url: record.request_url.clone(),
            })
            .await;
        }

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                record.error = Some(format!(
                    "OCSP query failed for {} {}: {:#}",
                    names, record.request_url, e
                ));
                return record;
            }
        };

        match parse_response(&body, &cert.serial) {
            Ok(response) => {
                record.this_update = Some(response.this_update);
                record.next_update = response.next_update;
                record.status = Some(response.status);
            }
            Err(e) => {
                record.error = Some(format!(
                    "error parsing OCSP response for {} {}: {:#}",
                    names, record.request_url, e
                ));
            }
        }

        record
    }

    async fn report(&self, diagnostic: Diagnostic) {
        if let Err(e) = self.output.diagnostic(&diagnostic).await {
            warn!("Output error: {:?}", e);
        }
    }
}
