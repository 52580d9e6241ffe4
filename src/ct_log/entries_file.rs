// src/ct_log/entries_file.rs
use anyhow::{Context, Result};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader, Lines};
use tracing::{debug, info, warn};

use super::client::CtLogClient;
use super::merkle::{Hash, TreeHasher};
use super::types::LogEntry;
use crate::cert_parser::{CertificateParser, EntryCerts};
use crate::progress::DownloadProgress;

/// Append-only local cache of a CT log's entries
///
/// One JSON object (`leaf_input`, `extra_data`) per line, in log order, so
/// line N holds log entry N.
pub struct EntriesFile {
    path: PathBuf,
}

impl EntriesFile {
    /// Open the cache file, creating it if it does not exist
    ///
    /// A final line without its newline is left by an interrupted append and
    /// is cut off, so the next download starts at that entry again.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open entries file {:?}", path))?;

        let len = file.metadata().await?.len();
        let keep = complete_lines_len(&mut file, len)
            .await
            .with_context(|| format!("Failed to read entries file {:?}", path))?;
        if keep < len {
            warn!(
                "Dropping {} bytes of unterminated entry at the end of {:?}",
                len - keep,
                path
            );
            file.set_len(keep)
                .await
                .with_context(|| format!("Failed to repair entries file {:?}", path))?;
        }

        debug!("Opened entries file {:?}", path);

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn lines(&self) -> Result<Lines<BufReader<File>>> {
        let file = File::open(&self.path)
            .await
            .with_context(|| format!("Failed to read entries file {:?}", self.path))?;
        Ok(BufReader::new(file).lines())
    }

    /// Number of entries currently cached
    pub async fn count(&self) -> Result<u64> {
        let mut lines = self.lines().await?;
        let mut count = 0;
        while let Some(line) = lines.next_line().await? {
            if !line.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Append entries to the end of the cache
    pub async fn append(&self, entries: &[LogEntry]) -> Result<()> {
        let mut buf = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut buf, entry).context("Failed to serialize log entry")?;
            buf.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .await
            .context("Failed to open entries file for append")?;
        file.write_all(&buf)
            .await
            .context("Failed to append to entries file")?;
        file.flush().await?;

        Ok(())
    }

    /// Download entries until the cache holds `target_size` of them
    ///
    /// Each batch is written before the next is requested, so entries
    /// fetched before a failure stay cached.
    pub async fn extend(
        &self,
        client: &CtLogClient,
        target_size: u64,
        batch_size: u64,
        progress: &DownloadProgress,
    ) -> Result<u64> {
        let batch_size = batch_size.max(1);
        let mut count = self.count().await?;

        while count < target_size {
            let end = std::cmp::min(count + batch_size, target_size) - 1;

            let entries = client
                .get_entries(count, end)
                .await
                .with_context(|| format!("Failed to download entries {}-{}", count, end))?;

            if entries.is_empty() {
                anyhow::bail!("Log returned no entries for range {}-{}", count, end);
            }

            let take = entries.len().min((target_size - count) as usize);
            self.append(&entries[..take]).await?;
            count += take as u64;
            progress.advance(take as u64);

            debug!("Cached {} entries, {} of {}", take, count, target_size);
        }

        progress.finish();
        info!("Entries file holds {} entries", count);

        Ok(count)
    }

    /// RFC 6962 tree hash over the first `tree_size` cached entries
    pub async fn root_hash(&self, tree_size: u64) -> Result<Hash> {
        let mut hasher = TreeHasher::new();
        let mut lines = self.lines().await?;

        while hasher.size() < tree_size {
            let Some(line) = lines.next_line().await? else {
                anyhow::bail!(
                    "Entries file holds {} entries, tree size is {}",
                    hasher.size(),
                    tree_size
                );
            };
            if line.trim().is_empty() {
                continue;
            }

            let entry: LogEntry = serde_json::from_str(&line)
                .with_context(|| format!("Malformed cache entry {}", hasher.size()))?;
            hasher.push_leaf(&entry.leaf_bytes()?);
        }

        Ok(hasher.root())
    }

    /// Recompute the tree hash and compare it with a trusted root
    pub async fn verify(&self, tree_size: u64, expected: &Hash) -> Result<Hash> {
        let calculated = self
            .root_hash(tree_size)
            .await
            .context("Error hashing tree")?;

        if &calculated != expected {
            anyhow::bail!(
                "Hashes do not match! Calculated: {}, STH contains {}",
                hex::encode(calculated),
                hex::encode(expected)
            );
        }

        Ok(calculated)
    }

    /// Lazily read cached entries in log order
    ///
    /// Entries that do not decode are yielded as `Err` items; the stream ends
    /// after the first I/O error.
    pub async fn entries(&self, parse_precerts: bool) -> Result<BoxStream<'static, Result<EntryCerts>>> {
        let lines = self.lines().await?;

        let entries = stream::unfold(Some(lines), move |state| async move {
            let mut lines = state?;
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        let item = serde_json::from_str::<LogEntry>(&line)
                            .context("Malformed cache entry")
                            .and_then(|entry| {
                                CertificateParser::parse_log_entry(
                                    &entry.leaf_input,
                                    &entry.extra_data,
                                    parse_precerts,
                                )
                            });
                        return Some((item, Some(lines)));
                    }
                    Ok(None) => return None,
                    Err(e) => {
                        warn!("Stopped reading entries file: {}", e);
                        let err = anyhow::Error::new(e).context("Failed to read entries file");
                        return Some((Err(err), None));
                    }
                }
            }
        });

        Ok(entries.boxed())
    }
}

/// Length of the file up to and including its last newline
async fn complete_lines_len(file: &mut File, len: u64) -> Result<u64> {
    let mut buf = vec![0u8; 4096];
    let mut end = len;

    while end > 0 {
        let start = end.saturating_sub(buf.len() as u64);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start)).await?;
        file.read_exact(chunk).await?;

        if let Some(pos) = chunk.iter().rposition(|b| *b == b'\n') {
            return Ok(start + pos as u64 + 1);
        }
        end = start;
    }

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert_parser::encode_u24_prefixed;
    use base64::Engine;
    use tempfile::TempDir;

    fn x509_entry(cert: &[u8]) -> LogEntry {
        let mut leaf = vec![0u8, 0u8];
        leaf.extend_from_slice(&0u64.to_be_bytes());
        leaf.extend_from_slice(&0u16.to_be_bytes());
        leaf.extend_from_slice(&encode_u24_prefixed(cert));
        leaf.extend_from_slice(&[0, 0]);

        let engine = base64::engine::general_purpose::STANDARD;
        LogEntry {
            leaf_input: engine.encode(&leaf),
            extra_data: engine.encode(encode_u24_prefixed(&[])),
        }
    }

    async fn temp_file(dir: &TempDir) -> EntriesFile {
        EntriesFile::open(dir.path().join("log.jsonl")).await.unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let file = temp_file(&dir).await;
        assert!(file.path().exists());
        assert_eq!(file.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_append_and_count() {
        let dir = TempDir::new().unwrap();
        let file = temp_file(&dir).await;

        file.append(&[x509_entry(b"one"), x509_entry(b"two")]).await.unwrap();
        file.append(&[x509_entry(b"three")]).await.unwrap();

        assert_eq!(file.count().await.unwrap(), 3);

        // Reopening keeps existing entries
        let reopened = temp_file(&dir).await;
        assert_eq!(reopened.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_verify_against_computed_root() {
        let dir = TempDir::new().unwrap();
        let file = temp_file(&dir).await;
        let entries = vec![x509_entry(b"a"), x509_entry(b"b"), x509_entry(b"c")];
        file.append(&entries).await.unwrap();

        let mut hasher = TreeHasher::new();
        for entry in &entries {
            hasher.push_leaf(&entry.leaf_bytes().unwrap());
        }
        let expected = hasher.root();

        assert_eq!(file.verify(3, &expected).await.unwrap(), expected);
        assert!(file.verify(3, &[0u8; 32]).await.is_err());
        // Prefix of the file hashes to a different tree
        assert!(file.verify(2, &expected).await.is_err());
    }

    #[tokio::test]
    async fn test_root_hash_beyond_cache_fails() {
        let dir = TempDir::new().unwrap();
        let file = temp_file(&dir).await;
        file.append(&[x509_entry(b"a")]).await.unwrap();

        assert!(file.root_hash(5).await.is_err());
    }

    #[tokio::test]
    async fn test_entries_stream_in_order_with_errors() {
        let dir = TempDir::new().unwrap();
        let file = temp_file(&dir).await;
        let broken = LogEntry {
            leaf_input: "%%%".to_string(),
            extra_data: String::new(),
        };
        file.append(&[x509_entry(b"first"), broken, x509_entry(b"third")])
            .await
            .unwrap();

        let items: Vec<_> = file.entries(false).await.unwrap().collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().leaf, b"first");
        assert!(items[1].is_err());
        assert_eq!(items[2].as_ref().unwrap().leaf, b"third");
    }

    #[tokio::test]
    async fn test_open_drops_unterminated_entry() {
        let dir = TempDir::new().unwrap();
        let file = temp_file(&dir).await;
        file.append(&[x509_entry(b"a"), x509_entry(b"b")]).await.unwrap();

        // An append cut short after part of the third entry
        let partial = serde_json::to_string(&x509_entry(b"c")).unwrap();
        let mut raw = OpenOptions::new().append(true).open(file.path()).await.unwrap();
        raw.write_all(&partial.as_bytes()[..10]).await.unwrap();
        raw.flush().await.unwrap();
        drop(raw);

        let reopened = temp_file(&dir).await;
        assert_eq!(reopened.count().await.unwrap(), 2);

        reopened.append(&[x509_entry(b"c")]).await.unwrap();
        let items: Vec<_> = reopened.entries(false).await.unwrap().collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[2].as_ref().unwrap().leaf, b"c");
    }

    #[tokio::test]
    async fn test_open_drops_lone_partial_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        tokio::fs::write(&path, b"{\"leaf_in").await.unwrap();

        let file = EntriesFile::open(&path).await.unwrap();
        assert_eq!(file.count().await.unwrap(), 0);
        assert!(tokio::fs::read(&path).await.unwrap().is_empty());
    }
}
