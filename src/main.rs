//! CLI entry point for the retail LQ signal pipeline.
//!
//! Provides subcommands for ingesting yearly QCEW files, calculating state
//! signals, inspecting scores, and exporting results to CSV and S3.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use retail_lq_signal::analyzers::SignalCalculator;
use retail_lq_signal::config::PipelineConfig;
use retail_lq_signal::ingest::{YearOutcome, YearProcessor};
use retail_lq_signal::output::{ScoreIndex, publish_to_s3, write_signals_csv};
use retail_lq_signal::source::{LocalDirSource, S3Source, SourceProvider};
use retail_lq_signal::storage::{FsStore, SignalStore};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "retail_lq_signal")]
#[command(about = "Retail displacement signals from BLS QCEW location quotients", long_about = None)]
struct Cli {
    /// Directory holding processed markers, state-year records and signals
    #[arg(short = 'd', long, global = true, default_value = "data")]
    data_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Local directory with yearly CSV files (e.g. 2021.annual.singlefile.csv)
    #[arg(long, conflicts_with = "source_bucket")]
    source_dir: Option<String>,

    /// S3 bucket holding yearly CSV files
    #[arg(long)]
    source_bucket: Option<String>,

    /// Key prefix of the yearly CSV files in the source bucket
    #[arg(long, default_value = "qcew/")]
    source_prefix: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every available year that has not been processed yet
    ProcessYears {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Calculate and store signals for every state with data
    CalculateSignals,
    /// Ingest all years, then calculate signals
    Run {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Log the latest physical (outlier-corrected) and e-commerce scores
    Scores,
    /// Write the latest signals to CSV and optionally publish them to S3
    Export {
        /// CSV file to write
        #[arg(short, long, default_value = "signals.csv")]
        output: String,

        /// Optional: S3 bucket to publish the export and score index to
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Key prefix for published objects
        #[arg(long, default_value = "signals")]
        s3_prefix: String,

        /// Optional: Gzip compress the CSV before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/retail_lq_signal.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("retail_lq_signal.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::try_from_env("RUST_LOG_JSON").unwrap_or_else(|_| EnvFilter::new("debug")));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env()?;
    let store = Arc::new(FsStore::new(&cli.data_dir));

    match cli.command {
        Commands::ProcessYears { source } => {
            process_years(&source, store, &config).await?;
        }
        Commands::CalculateSignals => {
            SignalCalculator::new(store.clone(), store, &config)
                .calculate_all()
                .await?;
        }
        Commands::Run { source } => {
            process_years(&source, store.clone(), &config).await?;
            SignalCalculator::new(store.clone(), store, &config)
                .calculate_all()
                .await?;
        }
        Commands::Scores => {
            let calculator = SignalCalculator::new(store.clone(), store, &config);
            let physical = calculator.physical_scores().await?;
            let ecommerce: BTreeMap<_, _> = calculator.ecommerce_scores().await?.into_iter().collect();

            info!(
                median = physical.median,
                mean = physical.mean,
                stddev = physical.standard_deviation,
                outliers = ?physical.outliers,
                "Physical score distribution"
            );
            for (state, score) in BTreeMap::from_iter(physical.corrected_scores) {
                info!(state = %state, score, "Physical score");
            }
            for (state, score) in ecommerce {
                info!(state = %state, score, "E-commerce score");
            }
        }
        Commands::Export {
            output,
            s3_bucket,
            s3_prefix,
            gzip,
        } => {
            let signals = store.get_all_signals().await?;
            if signals.is_empty() {
                warn!("No signals stored yet, run calculate-signals first");
            }
            write_signals_csv(&output, &signals)?;
            info!(output = %output, signals = signals.len(), "Signals exported");

            if let Some(bucket) = s3_bucket {
                let calculator = SignalCalculator::new(store.clone(), store.clone(), &config);
                let index = ScoreIndex {
                    generated_at: chrono::Utc::now(),
                    physical: calculator.physical_scores().await?,
                    ecommerce: calculator.ecommerce_scores().await?,
                };

                let aws = aws_config::load_from_env().await;
                let s3 = aws_sdk_s3::Client::new(&aws);
                publish_to_s3(&s3, &bucket, &s3_prefix, &signals, &index, gzip).await?;
            }
        }
    }

    Ok(())
}

/// Picks the source provider from the CLI flags.
async fn source_provider(args: &SourceArgs) -> Result<Arc<dyn SourceProvider>> {
    if let Some(bucket) = &args.source_bucket {
        info!(bucket = %bucket, prefix = %args.source_prefix, "Reading sources from S3");
        let aws = aws_config::load_from_env().await;
        let client = aws_sdk_s3::Client::new(&aws);
        return Ok(Arc::new(S3Source::new(client, bucket, &args.source_prefix)));
    }

    match &args.source_dir {
        Some(dir) => {
            info!(dir = %dir, "Reading sources from local directory");
            Ok(Arc::new(LocalDirSource::new(dir)))
        }
        None => anyhow::bail!("either --source-dir or --source-bucket is required"),
    }
}

#[tracing::instrument(skip_all)]
async fn process_years(args: &SourceArgs, store: Arc<FsStore>, config: &PipelineConfig) -> Result<()> {
    let source = source_provider(args).await?;
    let processor = YearProcessor::new(source, store.clone(), store, config.ingest_batch_size);

    let outcomes = processor.process_all_years().await?;
    let processed = outcomes
        .iter()
        .filter(|(_, o)| matches!(o, YearOutcome::Processed { .. }))
        .count();

    info!(
        years = outcomes.len(),
        processed,
        skipped = outcomes.len() - processed,
        "Year processing finished"
    );
    Ok(())
}
