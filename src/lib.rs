// src/lib.rs
// Library interface for ocsp-audit
pub mod aggregator;
pub mod auditor;
pub mod cert_parser;
pub mod cli;
pub mod config;
pub mod ct_log;
pub mod ocsp;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod types;
