use anyhow::{anyhow, Context};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use event_normalizer::batch::{jobs_from_config, BatchRunner};
use event_normalizer::config::Config;
use event_normalizer::constants::{builtin_defaults_for, GENERIC_VENUE_CLASS};
use event_normalizer::error::Rejection;
use event_normalizer::pipeline::date_range::DateRangeParser;
use event_normalizer::pipeline::{NormalizationPipeline, RunContext};
use event_normalizer::sources::{FragmentSource, JsonFileSource};
use event_normalizer::storage::open_store;
use event_normalizer::{logging, observability};

#[derive(Parser)]
#[command(name = "event_normalizer")]
#[command(about = "Normalize and deduplicate scraped venue event listings")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every configured site and store new events
    Run {
        /// Config file (defaults to $EVENT_PIPELINE_CONFIG or config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Specific sites to run (comma-separated)
        #[arg(long)]
        sites: Option<String>,
        /// Serve Prometheus metrics on this address, e.g. 127.0.0.1:9000
        #[arg(long)]
        metrics_addr: Option<SocketAddr>,
    },
    /// Normalize a fragment file for one site and print the events; touches no store
    Normalize {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Site whose settings to apply
        #[arg(long)]
        site: String,
        /// JSON file with fragments
        #[arg(long)]
        input: PathBuf,
    },
    /// Parse a date string the way the pipeline would
    ParseDate {
        text: String,
        /// Separate time-of-day text
        #[arg(long, default_value = "")]
        time: String,
        /// Venue class whose defaults apply
        #[arg(long, default_value = GENERIC_VENUE_CLASS)]
        class: String,
        /// Reference time, YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS (defaults to now)
        #[arg(long)]
        now: Option<String>,
        /// Use venue classes from this config file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    config.context("loading configuration")
}

fn parse_reference_now(raw: &str) -> anyhow::Result<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Ok(datetime);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Ok(datetime);
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("invalid --now '{}'", raw))?;
    date.and_hms_opt(0, 0, 0).ok_or_else(|| anyhow!("invalid --now '{}'", raw))
}

async fn run(config_path: Option<PathBuf>, sites: Option<String>, metrics_addr: Option<SocketAddr>) -> anyhow::Result<()> {
    println!("🚀 Running event normalization batch...");

    if let Some(addr) = metrics_addr {
        observability::init(addr).map_err(|e| anyhow!("{}", e))?;
    }

    let config = load_config(config_path.as_deref())?;
    let only: Option<Vec<String>> = sites.map(|list| {
        list.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    });

    let jobs = jobs_from_config(&config, only.as_deref())?;
    if jobs.is_empty() {
        warn!("No sites configured");
        println!("⚠️  No sites to run");
        return Ok(());
    }

    let store = open_store(&config.store)?;
    let runner = BatchRunner::from_config(store, &config);
    let report = runner.run(jobs, RunContext::now()).await;

    println!("\n📊 Batch Results (run {}):", report.run_id);
    for venue in &report.venues {
        println!("   {}:", venue.site_id);
        println!("      Fetched: {}", venue.fetched);
        println!("      Inserted: {}", venue.inserted);
        println!("      Duplicate-skipped: {}", venue.duplicates);
        println!("      Date-rejected: {}", venue.date_rejected);
        if venue.other_rejected > 0 {
            println!("      Other rejected: {}", venue.other_rejected);
        }
        if let Some(failure) = &venue.failure {
            println!("      ⚠️  Failed: {}", failure);
        }
    }
    println!(
        "\n   Total: {} inserted, {} duplicate-skipped, {} date-rejected",
        report.total_inserted(),
        report.total_duplicates(),
        report.total_date_rejected()
    );

    let failed = report.failed_venues().count();
    if failed > 0 {
        println!("⚠️  {} of {} venues failed", failed, report.venues.len());
    } else {
        println!("✅ Batch completed successfully");
    }
    Ok(())
}

async fn normalize(config_path: Option<PathBuf>, site_id: &str, input: PathBuf) -> anyhow::Result<()> {
    let config = load_config(config_path.as_deref())?;
    let site = config
        .site(site_id)
        .ok_or_else(|| anyhow!("unknown site '{}'", site_id))?;
    let pipeline = NormalizationPipeline::new(config.pipeline_settings(site));

    let fragments = JsonFileSource::new(input).fetch_fragments().await?;
    let ctx = RunContext::now();

    let mut events = Vec::new();
    for fragment in &fragments {
        match pipeline.normalize(fragment, &ctx) {
            Ok(event) => events.push(event),
            Err(Rejection::UnparseableDate(failure)) => {
                eprintln!("⚠️  Rejected '{}': {}", fragment.title, failure);
            }
            Err(rejection) => eprintln!("⚠️  Rejected fragment: {}", rejection),
        }
    }

    println!("{}", serde_json::to_string_pretty(&events)?);
    info!("Normalized {} of {} fragments for {}", events.len(), fragments.len(), site_id);
    Ok(())
}

fn parse_date(
    text: &str,
    time: &str,
    class: &str,
    now: Option<String>,
    config_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let defaults = match config_path {
        Some(path) => Config::load_from(&path)?.date_defaults_for(class),
        None => builtin_defaults_for(class),
    };
    let reference_now = match now {
        Some(raw) => parse_reference_now(&raw)?,
        None => RunContext::now().reference_now,
    };

    match DateRangeParser::parse(text, time, reference_now, &defaults) {
        Ok(range) => {
            println!("{}", serde_json::to_string_pretty(&range)?);
            Ok(())
        }
        Err(failure) => Err(anyhow!(failure)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            sites,
            metrics_addr,
        } => run(config, sites, metrics_addr).await,
        Commands::Normalize { config, site, input } => normalize(config, &site, input).await,
        Commands::ParseDate {
            text,
            time,
            class,
            now,
            config,
        } => parse_date(&text, &time, &class, now, config),
    };

    if let Err(e) = &result {
        error!("Command failed: {:#}", e);
    }
    result
}
