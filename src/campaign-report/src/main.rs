//! Campaign Report — ingests one analytics export and prints its metadata,
//! metrics and funnel as JSON for the report generator.

use anyhow::Context;
use campaign_core::config::AppConfig;
use campaign_reporting::ReportPipeline;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "campaign-report")]
#[command(about = "Derive campaign report metrics from an analytics export")]
#[command(version)]
struct Cli {
    /// Export file (comma-delimited, header row first)
    file: PathBuf,

    /// TOML config file (defaults to ./campaign-report.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Funnel stages in order, comma-separated (defaults to a proposed selection)
    #[arg(long, value_delimiter = ',')]
    stages: Option<Vec<String>>,

    /// Manually supplied total audience size
    #[arg(long)]
    total_audience: Option<u64>,

    /// Test identities to exclude (overrides config)
    #[arg(long, value_delimiter = ',', env = "CAMPAIGN_REPORT__TEST_USERS")]
    test_users: Option<Vec<String>>,

    /// Pretty-print the JSON output
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_report=info,campaign_reporting=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = match cli.config.as_deref() {
        Some(path) => AppConfig::load(Some(path))
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::load(None).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load config, using defaults");
            AppConfig::default()
        }),
    };

    if let Some(ids) = cli.test_users {
        config.ingest.test_user_ids = ids;
    }

    info!(
        file = %cli.file.display(),
        test_users = config.ingest.test_user_ids.len(),
        prefix = %config.ingest.interaction_column_prefix,
        "Configuration loaded"
    );

    let pipeline = ReportPipeline::new(config)?;
    let mut report = pipeline
        .ingest_path(&cli.file)
        .with_context(|| format!("ingesting {}", cli.file.display()))?;

    if let Some(audience) = cli.total_audience {
        report = report.with_total_audience(audience);
    }

    let funnel = match cli.stages {
        Some(stages) => Some(pipeline.build_funnel(&report.metrics, &stages)?),
        None => {
            let stages = pipeline.default_funnel_selection(&report.metrics);
            match pipeline.build_funnel(&report.metrics, &stages) {
                Ok(funnel) => Some(funnel),
                Err(e) => {
                    warn!(error = %e, "No default funnel for this export");
                    None
                }
            }
        }
    };

    let output = serde_json::json!({
        "report": report,
        "funnel": funnel,
    });
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{rendered}");

    Ok(())
}
