pub mod client;
pub mod entries_file;
pub mod log_key;
pub mod merkle;
pub mod sync;
pub mod types;

pub use client::CtLogClient;
pub use entries_file::EntriesFile;
pub use log_key::LogKey;
pub use sync::{sync_cache, SyncOptions};
pub use types::{LogEntry, SignedTreeHead};
