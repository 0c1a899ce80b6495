//! CLI entry point for the store geocoding and data quality pipeline.
//!
//! Provides subcommands for the full enrichment and cleaning run, listing the
//! addresses that would be geocoded, and scoring an existing record file.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use store_geo_quality::{
    address::extract_addresses,
    config::PipelineConfig,
    enricher::{DataEnricher, EnrichmentStats, build_geocoding_cache},
    fetch::{BasicClient, load_source},
    infra::{adresse::AdresseGeocoder, anthropic::AnthropicNarrator},
    output::{
        ReportContext, RunSummary, append_run_record, render_report, write_metrics_json,
        write_table_csv,
    },
    publish::{publish_outputs, run_stamp},
    quality::QualityAnalyzer,
    records::{Record, parse_records},
    table::Table,
    transform::{DataTransformer, NumericStrategy, OutlierFilter},
};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const NARRATOR_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Parser)]
#[command(name = "store_geo_quality")]
#[command(about = "Geocode product store addresses and score dataset quality", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: geocode, enrich, score, clean and write outputs
    Run {
        /// Path to a JSON record file or URL to fetch
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Directory for the cleaned CSV, metrics and run history
        #[arg(short, long)]
        output_dir: Option<String>,

        /// JSON config file
        #[arg(short, long)]
        config: Option<String>,

        /// Record field holding the store address
        #[arg(long)]
        address_field: Option<String>,

        /// Skip geocoding and score the records as loaded
        #[arg(long, default_value_t = false)]
        skip_enrichment: bool,

        /// Numeric columns to filter for outliers (comma separated)
        #[arg(long, value_delimiter = ',')]
        outlier_columns: Vec<String>,

        /// Outlier method: iqr or zscore
        #[arg(long, default_value = "iqr")]
        outlier_method: String,

        /// IQR multiplier or z-score threshold (method default if omitted)
        #[arg(long)]
        outlier_threshold: Option<f64>,

        /// Numeric null strategy: median, mean, zero or none
        #[arg(long, default_value = "median")]
        numeric_strategy: String,

        /// Fill value for null text cells
        #[arg(long, default_value = "unknown")]
        text_fill: String,

        /// Do not request AI recommendations even if ANTHROPIC_API_KEY is set
        #[arg(long, default_value_t = false)]
        no_ai: bool,

        /// Optional: S3 bucket to upload outputs to (e.g., "my-bucket")
        #[arg(long)]
        s3_bucket: Option<String>,

        /// Key prefix for uploaded objects
        #[arg(long, default_value = "store_geo_quality")]
        s3_prefix: String,

        /// Optional: Gzip compress outputs before uploading to S3
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
    /// List the distinct normalized store addresses that would be geocoded
    Addresses {
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        #[arg(long)]
        address_field: Option<String>,

        #[arg(short, long)]
        config: Option<String>,
    },
    /// Score a record file and print the metrics as JSON
    Quality {
        #[arg(value_name = "FILE_OR_URL")]
        source: String,
    },
}

/// Cleaning options, validated before any work starts.
struct CleaningPlan {
    outlier_columns: Vec<String>,
    outlier_filter: OutlierFilter,
    numeric_strategy: NumericStrategy,
    text_fill: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/store_geo_quality.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("store_geo_quality.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            source,
            output_dir,
            config,
            address_field,
            skip_enrichment,
            outlier_columns,
            outlier_method,
            outlier_threshold,
            numeric_strategy,
            text_fill,
            no_ai,
            s3_bucket,
            s3_prefix,
            gzip,
        } => {
            // Fail fast on bad method or strategy names
            let plan = CleaningPlan {
                outlier_columns,
                outlier_filter: OutlierFilter::parse(&outlier_method, outlier_threshold)?,
                numeric_strategy: numeric_strategy.parse()?,
                text_fill,
            };

            let mut config = PipelineConfig::resolve(config.as_deref())?;
            if let Some(field) = address_field {
                config.address_field = field;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }

            run_pipeline(
                &source,
                &config,
                &plan,
                skip_enrichment,
                no_ai,
                s3_bucket,
                &s3_prefix,
                gzip,
            )
            .await?;
        }
        Commands::Addresses {
            source,
            address_field,
            config,
        } => {
            let mut config = PipelineConfig::resolve(config.as_deref())?;
            if let Some(field) = address_field {
                config.address_field = field;
            }

            let records = load_records(&source).await?;
            let addresses = extract_addresses(&records, &config.address_field);
            for address in &addresses {
                println!("{address}");
            }
            info!(
                records = records.len(),
                unique_addresses = addresses.len(),
                field = %config.address_field,
                "Addresses extracted"
            );
        }
        Commands::Quality { source } => {
            let records = load_records(&source).await?;
            let table = Table::from_records(&records);
            let mut analyzer = QualityAnalyzer::new(&table);
            let metrics = analyzer.analyze();
            println!("{}", serde_json::to_string_pretty(metrics)?);
        }
    }

    Ok(())
}

/// Loads and parses records from a local file path or over HTTP.
#[tracing::instrument]
async fn load_records(source: &str) -> Result<Vec<Record>> {
    let client = BasicClient::new();
    let bytes = load_source(&client, source).await?;
    let records = parse_records(&bytes)?;
    info!(records = records.len(), "Records loaded");
    Ok(records)
}

/// Geocodes, scores and cleans the records at `source`, then writes the
/// outputs and optionally uploads them to S3.
#[allow(clippy::too_many_arguments)]
#[tracing::instrument(skip(config, plan, s3_bucket, s3_prefix))]
async fn run_pipeline(
    source: &str,
    config: &PipelineConfig,
    plan: &CleaningPlan,
    skip_enrichment: bool,
    no_ai: bool,
    s3_bucket: Option<String>,
    s3_prefix: &str,
    gzip: bool,
) -> Result<()> {
    let started = Instant::now();
    let started_at = Utc::now();
    let stamp = run_stamp(started_at);

    let records = load_records(source).await?;

    let (records, enrichment) = if skip_enrichment {
        info!("Enrichment skipped");
        (records, None)
    } else {
        let (enriched, stats) = enrich(&records, config).await?;
        (enriched, Some(stats))
    };

    let table = Table::from_records(&records);
    let mut analyzer = QualityAnalyzer::new(&table);
    let metrics = analyzer.analyze().clone();

    let narrator = if no_ai {
        None
    } else {
        match std::env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty()) {
            Some(key) => Some(AnthropicNarrator::new(
                BasicClient::with_timeout(NARRATOR_TIMEOUT)?,
                &key,
                &config.narrator,
            )?),
            None => {
                info!("ANTHROPIC_API_KEY not set, skipping recommendations");
                None
            }
        }
    };

    let recommendations = match &narrator {
        Some(narrator) => match analyzer.recommendations(narrator).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "Recommendations unavailable, continuing without them");
                None
            }
        },
        None => None,
    };

    // Derive before imputing so `is_geocoded` reflects real geocoding scores
    let mut transformer = DataTransformer::new(table.clone());
    transformer.remove_duplicates(None).add_derived_columns()?;
    transformer.handle_missing_values(plan.numeric_strategy, &plan.text_fill);
    if !plan.outlier_columns.is_empty() {
        transformer.filter_outliers(&plan.outlier_columns, plan.outlier_filter)?;
    }
    info!(summary = %transformer.summary(), "Cleaning finished");

    let suggested_transformations = match &narrator {
        Some(narrator) => match transformer.suggest_transformations(narrator).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "Transformation suggestions unavailable, continuing without them");
                None
            }
        },
        None => None,
    };

    let output_dir = PathBuf::from(&config.output_dir);
    let table_path = output_dir.join("products_clean.csv");
    let metrics_path = output_dir.join("quality_metrics.json");
    let report_path = PathBuf::from(&config.reports_dir).join(format!("quality_report_{stamp}.md"));
    let history_path = output_dir.join("run_history.csv");

    write_table_csv(&table_path, transformer.table())?;
    write_metrics_json(&metrics_path, &metrics)?;
    let report = render_report(&ReportContext {
        generated_at: started_at,
        source,
        metrics: &metrics,
        enrichment,
        transformations: transformer.transformations(),
        recommendations: recommendations.as_deref(),
        suggested_transformations: suggested_transformations.as_deref(),
    });
    std::fs::create_dir_all(&config.reports_dir)
        .with_context(|| format!("failed to create {}", config.reports_dir))?;
    std::fs::write(&report_path, report)
        .with_context(|| format!("failed to write {}", report_path.display()))?;

    let duration_seconds = started.elapsed().as_secs_f64();
    append_run_record(
        &history_path,
        &RunSummary {
            timestamp: started_at,
            source: source.to_string(),
            total_records: metrics.total_records,
            cleaned_records: transformer.table().row_count(),
            enriched_records: enrichment.map_or(0, |s| s.successfully_enriched),
            completeness_score: metrics.completeness_score,
            duplicates_pct: metrics.duplicates_pct,
            geocoding_success_rate: metrics.geocoding_success_rate,
            quality_grade: metrics.quality_grade.to_string(),
            duration_seconds,
        },
    )?;

    if let Some(bucket) = s3_bucket {
        info!(bucket = %bucket, gzip, "S3 upload enabled");
        let aws = aws_config::load_from_env().await;
        let s3 = aws_sdk_s3::Client::new(&aws);
        publish_outputs(
            &s3,
            &bucket,
            s3_prefix,
            &stamp,
            &[table_path, metrics_path, report_path, history_path],
            gzip,
        )
        .await?;
    }

    info!(
        duration_seconds,
        grade = %metrics.quality_grade,
        rows_in = metrics.total_records,
        rows_out = transformer.table().row_count(),
        "Pipeline complete"
    );
    Ok(())
}

/// Geocodes each unique store address once and merges the results back.
async fn enrich(records: &[Record], config: &PipelineConfig) -> Result<(Vec<Record>, EnrichmentStats)> {
    let addresses = extract_addresses(records, &config.address_field);

    let geocoder = AdresseGeocoder::new(
        BasicClient::with_timeout(config.geocoder.timeout())?,
        &config.geocoder,
    )?;
    let cache = build_geocoding_cache(&geocoder, &addresses).await?;

    let mut enricher = DataEnricher::new(config.address_field.as_str());
    let enriched = enricher.enrich(records, &cache);
    let stats = enricher.stats();
    info!(
        processed = stats.total_processed,
        enriched = stats.successfully_enriched,
        failed = stats.failed_enrichment,
        success_rate = stats.success_rate(),
        "Enrichment complete"
    );
    Ok((enriched, stats))
}
