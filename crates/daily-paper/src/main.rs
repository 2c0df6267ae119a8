use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDate, Utc};
use clap::Parser;
use digest_engine::{
    get_default_selections_dir, load_candidate_pool, save_selection, selection_filename, DigestConfig,
    DigestEngine, SelectionReport,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "daily-paper")]
#[command(about = "Deduplicate and select the day's stories from a candidate pool")]
struct Args {
    /// Candidate pool JSON written by feed ingestion
    #[arg(short, long)]
    input: PathBuf,

    /// Config file (defaults to DAILY_PAPER_CONFIG, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the selection (defaults to the local data dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Edition date, YYYY-MM-DD; its weekday decides which topics run
    #[arg(short, long)]
    date: Option<String>,

    /// Evaluate topics one after another instead of in parallel
    #[arg(long)]
    serial: bool,
}

fn parse_date(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("Invalid date: {}. Use YYYY-MM-DD", raw)),
        None => Ok(Local::now().date_naive()),
    }
}

fn print_summary(report: &SelectionReport) {
    for topic in &report.topics {
        let stats = &topic.stats;
        println!(
            "  • {}: {} selected from {} (duplicates -{}, off-topic -{}, capped -{})",
            topic.topic_id,
            topic.items.len(),
            stats.candidates,
            stats.exact_removed + stats.near_duplicate_removed + stats.translation_removed,
            stats.relevance_removed,
            stats.not_selected
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("daily_paper=info,digest_engine=info")),
        )
        .init();

    let args = Args::parse();

    let date = parse_date(args.date.as_deref())?;
    let config_path = DigestConfig::resolve_path(args.config)?;
    let config = DigestConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    println!("✓ Loaded config: {}", config_path.display());

    println!("\n📚 Reading candidate pool...");
    let pool = load_candidate_pool(&args.input).context("Failed to load candidate pool")?;
    info!("Loaded candidate pool from {}", args.input.display());

    if pool.is_empty() {
        println!("No candidates found in {}.", args.input.display());
    } else {
        println!(
            "✓ Found {} candidates across {} topics",
            pool.len(),
            pool.topics().len()
        );
    }

    let engine = DigestEngine::new(config).for_weekday(date.weekday());
    if !engine.warnings().is_empty() {
        println!("\n⚠ Config adjusted:");
        for warning in engine.warnings() {
            println!("  ✗ {}", warning);
        }
    }

    println!("\n🔗 Removing duplicates and selecting stories for {} ({})...", date, date.weekday());
    let report = if args.serial {
        engine.run(&pool)
    } else {
        engine
            .run_concurrent(&pool)
            .await
            .context("Failed to evaluate topics")?
    };

    println!("✓ Selected {} stories in {} topics", report.selected_count(), report.topics.len());
    print_summary(&report);

    let output = match args.output {
        Some(path) => path,
        None => get_default_selections_dir()?.join(selection_filename(date)),
    };
    let filepath = save_selection(&report, &output, Utc::now()).context("Failed to save selection")?;

    println!("\n✅ Selection saved to: {}", filepath.display());

    Ok(())
}
