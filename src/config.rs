// src/config.rs

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::aggregator::AggregatorConfig;
use crate::auditor::AuditorConfig;

/// Certly's log, the default audit target
pub const DEFAULT_LOG_URL: &str = "https://log.certly.io";
pub const DEFAULT_LOG_KEY: &str = "MFkwEwYHKoZIzj0CAQYIKoZIzj0DAQcDQgAECyPLhWKYYUgEc+tUXfPQB4wtGS2MNvXrjwFCCnyYJifBtd2Sk7Cu+Js9DNhMTh35FftHaHu6ZrclnNBKwmbbSA==";

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_url")]
    pub url: String,
    /// Base64 SubjectPublicKeyInfo of the log's signing key
    #[serde(default = "default_log_key")]
    pub key: String,
    #[serde(default = "default_cache_file")]
    pub cache_file: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: u64,
    #[serde(default)]
    pub parse_precerts: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_log_url() -> String { DEFAULT_LOG_URL.to_string() }
fn default_log_key() -> String { DEFAULT_LOG_KEY.to_string() }
fn default_cache_file() -> String { "certly.log".to_string() }
fn default_batch_size() -> u64 { 256 }
fn default_request_timeout() -> u64 { 30 }

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            url: default_log_url(),
            key: default_log_key(),
            cache_file: default_cache_file(),
            batch_size: default_batch_size(),
            parse_precerts: false,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuditConfig {
    #[serde(default = "default_trusted_issuer")]
    pub trusted_issuer: String,
    #[serde(default = "default_exempt_issuers")]
    pub ocsp_exempt_issuers: Vec<String>,
    #[serde(default = "default_slow_threshold")]
    pub slow_threshold_ms: u64,
    #[serde(default = "default_stale_after")]
    pub stale_after_hours: u64,
    /// OCSP HTTP timeout; unset means no client-side timeout
    #[serde(default)]
    pub ocsp_timeout_secs: Option<u64>,
}

fn default_trusted_issuer() -> String { "Let's Encrypt Authority X1".to_string() }
fn default_exempt_issuers() -> Vec<String> { vec!["Merge Delay Intermediate 1".to_string()] }
fn default_slow_threshold() -> u64 { 1000 }
fn default_stale_after() -> u64 { 96 }

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            trusted_issuer: default_trusted_issuer(),
            ocsp_exempt_issuers: default_exempt_issuers(),
            slow_threshold_ms: default_slow_threshold(),
            stale_after_hours: default_stale_after(),
            ocsp_timeout_secs: None,
        }
    }
}

impl AuditConfig {
    pub fn auditor_config(&self) -> AuditorConfig {
        AuditorConfig {
            trusted_issuer: self.trusted_issuer.clone(),
            ocsp_exempt_issuers: self.ocsp_exempt_issuers.clone(),
            slow_threshold: Duration::from_millis(self.slow_threshold_ms),
        }
    }

    /// Age of `thisUpdate` past which a response is reported as stale
    pub fn stale_after(&self) -> anyhow::Result<chrono::Duration> {
        i64::try_from(self.stale_after_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .with_context(|| {
                format!("stale_after_hours {} is out of range", self.stale_after_hours)
            })
    }

    pub fn aggregator_config(&self, verbose: bool) -> anyhow::Result<AggregatorConfig> {
        Ok(AggregatorConfig {
            verbose,
            stale_after: self.stale_after()?,
        })
    }

    pub fn ocsp_timeout(&self) -> Option<Duration> {
        self.ocsp_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String { "info".to_string() }

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {:?}", path))?;
        cfg.audit
            .stale_after()
            .with_context(|| format!("Invalid config file {:?}", path))?;
        Ok(cfg)
    }

    /// Load `path` if given, otherwise use built-in defaults
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.log.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_config_from_valid_toml() {
        let temp_file = write_config(
            r#"
[log]
url = "https://ct.example.com/"
cache_file = "example.log"
batch_size = 512
parse_precerts = true

[audit]
trusted_issuer = "Example Issuing CA"
ocsp_exempt_issuers = []
slow_threshold_ms = 250
stale_after_hours = 48
ocsp_timeout_secs = 5

[logging]
level = "debug"
        "#,
        );

        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.log.url, "https://ct.example.com/");
        assert_eq!(config.log.key, DEFAULT_LOG_KEY);
        assert_eq!(config.log.cache_file, "example.log");
        assert_eq!(config.log.batch_size, 512);
        assert!(config.log.parse_precerts);
        assert_eq!(config.audit.trusted_issuer, "Example Issuing CA");
        assert!(config.audit.ocsp_exempt_issuers.is_empty());
        assert_eq!(config.audit.ocsp_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.logging.level, "debug");

        let auditor = config.audit.auditor_config();
        assert_eq!(auditor.slow_threshold, Duration::from_millis(250));
        let aggregator = config.audit.aggregator_config(true).unwrap();
        assert!(aggregator.verbose);
        assert_eq!(aggregator.stale_after, chrono::Duration::hours(48));
    }

    #[test]
    fn test_config_empty_toml_uses_defaults() {
        let temp_file = write_config("");
        let config = Config::from_file(temp_file.path()).unwrap();

        assert_eq!(config.log.url, DEFAULT_LOG_URL);
        assert_eq!(config.log.cache_file, "certly.log");
        assert_eq!(config.log.batch_size, 256);
        assert!(!config.log.parse_precerts);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.audit.trusted_issuer, "Let's Encrypt Authority X1");
        assert_eq!(
            config.audit.ocsp_exempt_issuers,
            vec!["Merge Delay Intermediate 1".to_string()]
        );
        assert_eq!(config.audit.slow_threshold_ms, 1000);
        assert_eq!(config.audit.stale_after_hours, 96);
        assert_eq!(config.audit.ocsp_timeout(), None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_invalid_toml() {
        let temp_file = write_config("invalid toml content {{{");
        assert!(Config::from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_config_wrong_type() {
        let temp_file = write_config("[log]\nbatch_size = \"lots\"\n");
        assert!(Config::from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_config_nonexistent_file() {
        let result = Config::from_file(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_without_path() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.log.url, DEFAULT_LOG_URL);
    }

    #[test]
    fn test_stale_after_out_of_range() {
        let temp_file = write_config(
            r#"
[audit]
stale_after_hours = 9000000000000000
"#,
        );
        let err = Config::from_file(temp_file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("stale_after_hours"));

        let audit = AuditConfig {
            stale_after_hours: 3_000_000_000_000,
            ..Default::default()
        };
        assert!(audit.aggregator_config(false).is_err());
    }
}
