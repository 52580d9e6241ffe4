// src/ct_log/sync.rs
use anyhow::{Context, Result};
use tracing::{info, warn};

use super::client::CtLogClient;
use super::entries_file::EntriesFile;
use super::log_key::LogKey;
use super::types::SignedTreeHead;
use crate::output::OutputManager;
use crate::progress::DownloadProgress;

/// Settings for bringing the entries file up to the log's tree head
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub batch_size: u64,
    pub show_progress: bool,
}

/// Fetch and check the signed tree head, download missing entries, then
/// confirm the cache hashes to the tree head's root
///
/// Every failure here is fatal to the run.
pub async fn sync_cache(
    client: &CtLogClient,
    key: &LogKey,
    file: &EntriesFile,
    options: &SyncOptions,
    output: &OutputManager,
) -> Result<SignedTreeHead> {
    let sth = client.get_sth().await.context("GetSignedTreeHead")?;
    key.verify_sth(&sth)
        .with_context(|| format!("Invalid tree head from {}", client.base_url()))?;

    notice(
        output,
        format!("{} total entries at {}", sth.tree_size, sth.time_display()),
    )
    .await;

    let count = file.count().await.context("Failed to read entries file")?;

    if count < sth.tree_size {
        info!(
            "Downloading entries {}-{} from {}",
            count,
            sth.tree_size - 1,
            client.base_url()
        );
        let progress = DownloadProgress::new(options.show_progress, count, sth.tree_size);
        file.extend(client, sth.tree_size, options.batch_size, &progress)
            .await
            .context("Failed to update CT log")?;
    } else if count > sth.tree_size {
        warn!(
            "Entries file holds {} entries, more than tree size {}",
            count, sth.tree_size
        );
    }

    let expected = sth.root_hash()?;
    let calculated = file.verify(sth.tree_size, &expected).await?;

    notice(
        output,
        format!(
            "Hashes match! Calculated: {}, STH contains {}",
            hex::encode(calculated),
            hex::encode(expected)
        ),
    )
    .await;

    Ok(sth)
}

async fn notice(output: &OutputManager, message: String) {
    if let Err(e) = output.notice(&message).await {
        warn!("Output error: {:?}", e);
    }
}
