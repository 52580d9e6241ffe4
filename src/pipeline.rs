// src/pipeline.rs
//! Wires the auditor and aggregator together over one channel

use anyhow::{Context, Result};
use futures_util::stream::BoxStream;
use tracing::debug;

use crate::aggregator::{AuditOutcome, StreamAggregator};
use crate::auditor::{AuditorTally, CertificateAuditor};
use crate::cert_parser::EntryCerts;

/// Audit every entry and aggregate the records until the stream is exhausted
///
/// The auditor runs on its own task; the aggregator runs on the caller's.
pub async fn run_audit(
    entries: BoxStream<'static, Result<EntryCerts>>,
    auditor: CertificateAuditor,
    aggregator: StreamAggregator,
) -> Result<(AuditOutcome, AuditorTally)> {
    let (producer, records) = auditor.spawn(entries);
    let outcome = aggregator.run(records).await;
    let tally = producer.await.context("Auditor task failed")?;

    debug!("Pipeline finished: {:?}", tally);

    Ok((outcome, tally))
}
