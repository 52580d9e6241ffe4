// Test configuration loading
use clap::Parser;
use ocsp_audit::cli::Cli;
use ocsp_audit::config::{Config, DEFAULT_LOG_KEY};
use std::path::Path;
use std::time::Duration;

#[test]
fn test_load_test_config() {
    let config_path = Path::new("tests/test_config.toml");
    let config = Config::from_file(config_path).expect("Failed to load test config");

    // Log section
    assert_eq!(config.log.url, "https://ct.staging.example.net");
    assert_eq!(config.log.key, DEFAULT_LOG_KEY);
    assert_eq!(config.log.cache_file, "staging.log");
    assert_eq!(config.log.batch_size, 1000);
    assert!(!config.log.parse_precerts);
    assert_eq!(config.request_timeout(), Duration::from_secs(10));

    // Audit section
    assert_eq!(config.audit.trusted_issuer, "Fake LE Intermediate X1");
    assert_eq!(config.audit.ocsp_exempt_issuers.len(), 2);
    assert!(config
        .audit
        .ocsp_exempt_issuers
        .contains(&"Fake LE Root X1".to_string()));
    assert_eq!(config.audit.stale_after_hours, 96);
    assert_eq!(config.audit.ocsp_timeout(), Some(Duration::from_secs(15)));

    let auditor = config.audit.auditor_config();
    assert_eq!(auditor.slow_threshold, Duration::from_millis(500));

    // Logging section
    assert_eq!(config.logging.level, "warn");
}

#[test]
fn test_cli_overrides_test_config() {
    let mut config = Config::load(Some(Path::new("tests/test_config.toml"))).unwrap();
    let cli = Cli::parse_from([
        "ocsp-audit",
        "--config",
        "tests/test_config.toml",
        "--issuer",
        "Let's Encrypt Authority X1",
        "--file",
        "certly.log",
        "--quiet",
    ]);
    cli.validate().unwrap();
    cli.apply_overrides(&mut config);

    assert_eq!(config.audit.trusted_issuer, "Let's Encrypt Authority X1");
    assert_eq!(config.log.cache_file, "certly.log");
    // Flags that were not given leave the file's values alone
    assert_eq!(config.log.url, "https://ct.staging.example.net");
    assert_eq!(cli.log_level(&config.logging.level), "warn");
}
