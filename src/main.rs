// src/main.rs
use anyhow::Context;
use clap::Parser;
use ocsp_audit::aggregator::StreamAggregator;
use ocsp_audit::auditor::CertificateAuditor;
use ocsp_audit::cli::{Cli, OutputFormat};
use ocsp_audit::config::Config;
use ocsp_audit::ct_log::{sync_cache, CtLogClient, EntriesFile, LogKey, SyncOptions};
use ocsp_audit::ocsp::HttpOcspClient;
use ocsp_audit::output::{human, json, OutputManager};
use ocsp_audit::pipeline::run_audit;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Validate arguments
    cli.validate()?;

    // Load config file, then apply CLI overrides
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);

    // Initialize logging; stdout is reserved for the report
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level(&config.logging.level)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting ocsp-audit against {}", config.log.url);

    let mut output = OutputManager::new();
    match cli.output_format() {
        OutputFormat::Human => output.add_handler(Arc::new(human::HumanOutput::new())),
        OutputFormat::Json => output.add_handler(Arc::new(json::JsonOutput::new())),
    }
    let output = Arc::new(output);

    let key = LogKey::from_base64(&config.log.key).context("Failed to initialize log")?;
    tracing::debug!("Log ID {}", key.log_id_hex());

    let client = CtLogClient::new(config.log.url.clone(), config.request_timeout())
        .context("Failed to initialize log")?;

    let file = EntriesFile::open(&config.log.cache_file)
        .await
        .context("Failed to open entries file")?;

    if cli.skip_update {
        tracing::info!("Skipping log update; auditing cached entries only");
    } else {
        let options = SyncOptions {
            batch_size: config.log.batch_size,
            show_progress: cli.should_show_progress(),
        };
        sync_cache(&client, &key, &file, &options, &output).await?;
    }

    let transport = Arc::new(
        HttpOcspClient::new(config.audit.ocsp_timeout()).context("Failed to build OCSP client")?,
    );
    let auditor = CertificateAuditor::new(config.audit.auditor_config(), transport, output.clone());
    let aggregator = StreamAggregator::new(config.audit.aggregator_config(cli.verbose)?, output.clone());

    let entries = file.entries(config.log.parse_precerts).await?;
    let (_, tally) = run_audit(entries, auditor, aggregator).await?;

    tracing::info!(
        "Done: {} entries read, {} certificates audited",
        tally.entries,
        tally.audited
    );

    output.flush().await?;

    Ok(())
}
