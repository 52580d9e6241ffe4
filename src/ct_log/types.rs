// src/ct_log/types.rs
use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Response from CT log's get-sth endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTreeHead {
    pub tree_size: u64,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub sha256_root_hash: String,
    #[serde(default)]
    pub tree_head_signature: String,
}

impl SignedTreeHead {
    /// Decoded root hash
    pub fn root_hash(&self) -> Result<[u8; 32]> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.sha256_root_hash)
            .context("Failed to decode sha256_root_hash")?;
        bytes
            .try_into()
            .map_err(|b: Vec<u8>| anyhow::anyhow!("Root hash has {} bytes, expected 32", b.len()))
    }

    /// Decoded DigitallySigned tree head signature
    pub fn signature(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.tree_head_signature)
            .context("Failed to decode tree_head_signature")
    }

    /// Timestamp formatted for display
    pub fn time_display(&self) -> String {
        chrono::DateTime::from_timestamp_millis(self.timestamp as i64)
            .map(|t| t.format("%a %b %e %H:%M:%S %Y").to_string())
            .unwrap_or_else(|| self.timestamp.to_string())
    }
}

/// Single entry from CT log's get-entries endpoint, also the cache file line format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub leaf_input: String, // base64-encoded MerkleTreeLeaf
    pub extra_data: String, // base64-encoded certificate chain
}

impl LogEntry {
    /// Raw MerkleTreeLeaf bytes, the input to the leaf hash
    pub fn leaf_bytes(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.leaf_input)
            .context("Failed to decode base64 leaf_input")
    }
}

/// Response wrapper for get-entries endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct GetEntriesResponse {
    pub entries: Vec<LogEntry>,
}
