// src/aggregator.rs
//! Streaming statistics over audit records

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use crate::output::OutputManager;
use crate::types::{AuditRecord, Diagnostic};

/// Settings for the consumer side of the pipeline
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Print one line per record
    pub verbose: bool,
    /// Responses whose thisUpdate is older than this are reported
    pub stale_after: chrono::Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            stale_after: chrono::Duration::hours(96),
        }
    }
}

/// Latency figures over every record that carried a latency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    #[serde(rename = "median_ms", serialize_with = "as_millis")]
    pub median: Duration,
    #[serde(rename = "mean_ms", serialize_with = "as_millis")]
    pub mean: Duration,
    #[serde(rename = "p90_ms", serialize_with = "as_millis")]
    pub p90: Duration,
    #[serde(rename = "max_ms", serialize_with = "as_millis")]
    pub max: Duration,
}

impl LatencySummary {
    /// Summarize samples; `None` when there are none
    pub fn from_samples(mut samples: Vec<Duration>, total: Duration) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_unstable();

        let n = samples.len();
        let mean = Duration::from_nanos((total.as_nanos() / n as u128) as u64);

        Some(Self {
            median: samples[n / 2],
            mean,
            p90: samples[n * 9 / 10],
            max: samples[n - 1],
        })
    }
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

fn as_seconds<S: Serializer>(d: &chrono::Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_i64(d.num_seconds())
}

/// Final figures for a run that saw at least one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditSummary {
    pub count: u64,
    pub distinct: u64,
    /// Time between the run start and the newest certificate's notBefore
    #[serde(rename = "since_latest_issuance_secs", serialize_with = "as_seconds")]
    pub since_latest_issuance: chrono::Duration,
    pub latency: Option<LatencySummary>,
}

/// Result of consuming the whole record stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditOutcome {
    /// The stream closed without a single record
    NoData,
    Summary(AuditSummary),
}

/// Aggregates accumulated while the stream is open
#[derive(Debug, Default)]
pub struct RunningStats {
    count: u64,
    distinct_serials: HashSet<String>,
    latest_not_before: Option<DateTime<Utc>>,
    latency_samples: Vec<Duration>,
    total_latency: Duration,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn observe(&mut self, record: &AuditRecord) {
        self.count += 1;

        if self
            .latest_not_before
            .is_none_or(|latest| record.not_before > latest)
        {
            self.latest_not_before = Some(record.not_before);
        }

        if let Some(latency) = record.latency {
            self.latency_samples.push(latency);
            self.total_latency += latency;
        }

        if !self.distinct_serials.contains(&record.serial_hex) {
            self.distinct_serials.insert(record.serial_hex.clone());
        }
    }

    /// Consume the stats once the stream has closed
    pub fn finalize(self, started: DateTime<Utc>) -> AuditOutcome {
        let Some(latest) = self.latest_not_before else {
            return AuditOutcome::NoData;
        };

        AuditOutcome::Summary(AuditSummary {
            count: self.count,
            distinct: self.distinct_serials.len() as u64,
            since_latest_issuance: started - latest,
            latency: LatencySummary::from_samples(self.latency_samples, self.total_latency),
        })
    }
}

/// Consumer half of the pipeline
pub struct StreamAggregator {
    config: AggregatorConfig,
    output: Arc<OutputManager>,
    reference_time: Option<DateTime<Utc>>,
}

impl StreamAggregator {
    pub fn new(config: AggregatorConfig, output: Arc<OutputManager>) -> Self {
        Self {
            config,
            output,
            reference_time: None,
        }
    }

    /// Judge staleness against a fixed time instead of the wall clock
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }

    /// Findings for one record, in report order
    pub fn staleness(&self, record: &AuditRecord, now: DateTime<Utc>) -> Vec<Diagnostic> {
        let mut found = Vec::new();

        if let Some(ref message) = record.error {
            found.push(Diagnostic::QueryFailed {
                serial_hex: record.serial_hex.clone(),
                message: message.clone(),
            });
        }

        if let (Some(this_update), Some(next_update)) = (record.this_update, record.next_update) {
            if next_update < now {
                found.push(Diagnostic::BadlyOutOfDate {
                    serial_hex: record.serial_hex.clone(),
                    this_update,
                });
            }
        }

        if let Some(this_update) = record.this_update {
            if now - this_update > self.config.stale_after {
                found.push(Diagnostic::StaleResponse {
                    serial_hex: record.serial_hex.clone(),
                    this_update,
                    url: record.request_url.clone(),
                });
            }
        }

        found
    }

    /// Drain the channel until the producer closes it, then report
    pub async fn run(self, mut records: UnboundedReceiver<AuditRecord>) -> AuditOutcome {
        let started = self.reference_time.unwrap_or_else(Utc::now);
        let mut stats = RunningStats::new();

        while let Some(record) = records.recv().await {
            if self.config.verbose {
                if let Err(e) = self.output.record(&record).await {
                    warn!("Output error: {:?}", e);
                }
            }

            for diagnostic in self.staleness(&record, started) {
                if let Err(e) = self.output.diagnostic(&diagnostic).await {
                    warn!("Output error: {:?}", e);
                }
            }

            stats.observe(&record);
        }

        debug!("Record stream closed after {} records", stats.count());

        let outcome = stats.finalize(started);
        if let Err(e) = self.output.outcome(&outcome).await {
            warn!("Output error: {:?}", e);
        }

        outcome
    }
}

/// Format a duration as e.g. `2d 3h 4m 5s`
pub fn format_duration(duration: chrono::Duration) -> String {
    let total = duration.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let secs = total.unsigned_abs();

    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if days > 0 {
        format!("{}{}d {}h {}m {}s", sign, days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}{}h {}m {}s", sign, hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}{}m {}s", sign, minutes, seconds)
    } else {
        format!("{}{}s", sign, seconds)
    }
}
