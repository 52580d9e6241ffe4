// src/cli.rs
use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;

/// ocsp-audit: OCSP responder audit over a Certificate Transparency log
///
/// Brings a local copy of the log up to date, checks it against the signed
/// tree head, then queries the OCSP responder of every unexpired certificate
/// from the trusted issuer and reports latency and freshness.
#[derive(Parser, Debug, Clone)]
#[command(name = "ocsp-audit")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    // ===== Log =====
    /// URL of the CT log [default: https://log.certly.io]
    #[arg(long = "url")]
    pub url: Option<String>,

    /// Base64-encoded CT log public key [default: Certly's key]
    #[arg(long = "key")]
    pub key: Option<String>,

    /// File in which to cache log entries [default: certly.log]
    #[arg(short = 'f', long = "file")]
    pub file: Option<PathBuf>,

    /// Audit the cached entries without contacting the log
    #[arg(long = "skip-update")]
    pub skip_update: bool,

    // ===== Configuration =====
    /// Path to TOML config file
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Audit certificates from this issuer CN instead of the configured one
    #[arg(long = "issuer")]
    pub issuer: Option<String>,

    // ===== Output =====
    /// Print one line per audited certificate
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Output records and summary in JSONL format to stdout
    #[arg(short = 'j', long = "json")]
    pub json: bool,

    /// Quiet logging (set log level to warn)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Disable the download progress bar
    #[arg(long = "no-progress")]
    pub no_progress: bool,
}

impl Cli {
    /// Validate flag values and return errors for invalid usage
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(ref raw) = self.url {
            let parsed = url::Url::parse(raw)
                .map_err(|e| anyhow::anyhow!("Invalid --url {:?}: {}", raw, e))?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                anyhow::bail!("--url must be an http or https URL, got {:?}", raw);
            }
        }

        if let Some(ref key) = self.key {
            if key.trim().is_empty() {
                anyhow::bail!("--key must not be empty");
            }
        }

        if let Some(ref issuer) = self.issuer {
            if issuer.is_empty() {
                anyhow::bail!("--issuer must not be empty");
            }
        }

        Ok(())
    }

    /// Overwrite config values with the flags that were given
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref url) = self.url {
            config.log.url = url.clone();
        }
        if let Some(ref key) = self.key {
            config.log.key = key.clone();
        }
        if let Some(ref file) = self.file {
            config.log.cache_file = file.to_string_lossy().into_owned();
        }
        if let Some(ref issuer) = self.issuer {
            config.audit.trusted_issuer = issuer.clone();
        }
    }

    /// Determine the output format based on flags
    pub fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }

    /// Check if the progress bar should be drawn
    pub fn should_show_progress(&self) -> bool {
        !self.no_progress && !self.json && !self.quiet && is_terminal::is_terminal(std::io::stderr())
    }

    /// Log level from flags, falling back to the configured level
    pub fn log_level<'a>(&self, configured: &'a str) -> &'a str {
        if self.quiet {
            "warn"
        } else {
            configured
        }
    }
}

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable colored text output (default)
    Human,
    /// JSON Lines format (one JSON object per line)
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["ocsp-audit"]);
        assert_eq!(cli.url, None);
        assert_eq!(cli.config, None);
        assert!(!cli.verbose);
        assert!(!cli.skip_update);
        assert_eq!(cli.output_format(), OutputFormat::Human);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_log_flags() {
        let cli = Cli::parse_from([
            "ocsp-audit",
            "--url",
            "https://ct.example.com",
            "--key",
            "AAAA",
            "--file",
            "example.log",
            "--skip-update",
        ]);
        assert_eq!(cli.url.as_deref(), Some("https://ct.example.com"));
        assert_eq!(cli.key.as_deref(), Some("AAAA"));
        assert_eq!(cli.file, Some(PathBuf::from("example.log")));
        assert!(cli.skip_update);
    }

    #[test]
    fn test_overrides_replace_config() {
        let cli = Cli::parse_from([
            "ocsp-audit",
            "--url",
            "https://ct.example.com",
            "-f",
            "other.log",
            "--issuer",
            "Example CA",
        ]);
        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.log.url, "https://ct.example.com");
        assert_eq!(config.log.cache_file, "other.log");
        assert_eq!(config.audit.trusted_issuer, "Example CA");
        assert_eq!(config.log.key, crate::config::DEFAULT_LOG_KEY);
    }

    #[test]
    fn test_invalid_url() {
        let cli = Cli::parse_from(["ocsp-audit", "--url", "not a url"]);
        assert!(cli.validate().is_err());

        let cli = Cli::parse_from(["ocsp-audit", "--url", "ftp://ct.example.com"]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_empty_issuer_invalid() {
        let cli = Cli::parse_from(["ocsp-audit", "--issuer", ""]);
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_json_output_format() {
        let cli = Cli::parse_from(["ocsp-audit", "--json"]);
        assert_eq!(cli.output_format(), OutputFormat::Json);
        assert!(!cli.should_show_progress());
    }

    #[test]
    fn test_progress_disabled_by_flag() {
        let cli = Cli::parse_from(["ocsp-audit", "--no-progress"]);
        assert!(!cli.should_show_progress());
    }

    #[test]
    fn test_log_level() {
        let cli = Cli::parse_from(["ocsp-audit", "--quiet"]);
        assert_eq!(cli.log_level("debug"), "warn");

        let cli = Cli::parse_from(["ocsp-audit", "-v"]);
        assert_eq!(cli.log_level("info"), "info");
    }

    #[test]
    fn test_short_flags() {
        let cli = Cli::parse_from(["ocsp-audit", "-c", "audit.toml", "-j", "-v", "-q"]);
        assert_eq!(cli.config, Some(PathBuf::from("audit.toml")));
        assert!(cli.json);
        assert!(cli.verbose);
        assert!(cli.quiet);
    }
}
