//! Rank projector: binary entrypoint.
//! Collects a schedule, scrapes team rank pages, scores every matchup and
//! writes the projections.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use rank_projector::backtest::{evaluate, load_results};
use rank_projector::config::AppConfig;
use rank_projector::fetch::sources::HttpPageSource;
use rank_projector::fetch::ContentFetcher;
use rank_projector::logging::init_tracing;
use rank_projector::metrics::Metrics;
use rank_projector::resolve::TeamUrlResolver;
use rank_projector::schedule::{
    backtest_dates, load_matchups, ScheduleCollector, ScheduleGrouper,
};
use rank_projector::{writer_for, OutputFormat, Projector, RankExtractor};

#[derive(Parser, Debug)]
#[command(name = "rank-projector", about = "Project game winners from team category ranks")]
struct Args {
    /// Destination file for the projections
    #[arg(long)]
    output: PathBuf,

    /// Number of past days (ending yesterday) to collect schedules for
    #[arg(long, default_value_t = 1)]
    backtest_period: u32,

    /// Config file (TOML or JSON); defaults to discovery
    #[arg(long)]
    config: Option<PathBuf>,

    /// Read matchups from a JSON file instead of scraping schedules
    #[arg(long)]
    schedule: Option<PathBuf>,

    /// Final scores (JSON) to evaluate the projections against
    #[arg(long)]
    results: Option<PathBuf>,

    /// Output format; overrides the config
    #[arg(long)]
    format: Option<OutputFormat>,

    /// Write Prometheus exposition text here after the run
    #[arg(long)]
    metrics_out: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let cfg = match &args.config {
        Some(p) => AppConfig::load_from(p)?,
        None => AppConfig::load_default()?,
    };
    init_tracing(&cfg.logging)?;
    let metrics = Metrics::init()?;

    let source = HttpPageSource::new(cfg.fetch.timeout(), &cfg.fetch.user_agent)?;
    let fetcher = ContentFetcher::new(Arc::new(source), cfg.fetch.concurrency, cfg.fetch.timeout());

    let matchups = match &args.schedule {
        Some(p) => load_matchups(p, &cfg.output.date_format)?,
        None => {
            let today = chrono::Local::now().date_naive();
            let dates = backtest_dates(today, args.backtest_period);
            ScheduleCollector::new(fetcher.clone(), &cfg.source.schedule_url, &cfg.output.date_format)
                .collect(&dates)
                .await
        }
    };
    let grouper = ScheduleGrouper::new(cfg.cache.capacity)?;
    for (date, games) in grouper.group(&matchups) {
        info!(%date, games = games.len(), "matchups for date");
    }

    let extractor = Arc::new(RankExtractor::new(fetcher, cfg.cache.capacity)?);
    let projector = Projector::new(extractor);
    let resolver = TeamUrlResolver::new(
        &cfg.source.team_base_url,
        &cfg.source.team_url_suffix,
        &cfg.team_name_mapping,
    );
    let projections = projector
        .build_projections(&matchups, &cfg.criteria(), &resolver, &cfg.categories)
        .await;

    if let Some(p) = &args.results {
        let results = load_results(p)?;
        let summary = evaluate(&projections, &results);
        println!("{summary}");
    }

    if let Some(p) = &args.metrics_out {
        metrics.write_to(p)?;
    }

    if projections.is_empty() {
        warn!("no projections were generated");
        return Ok(());
    }

    let format = args.format.unwrap_or(cfg.output.format);
    writer_for(format)
        .write(&projections, &args.output)
        .with_context(|| format!("writing {format} projections"))?;
    info!(output = %args.output.display(), count = projections.len(), "projections written");
    Ok(())
}
