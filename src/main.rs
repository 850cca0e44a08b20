use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use log::info;
use std::time::Instant;
use uuid::Uuid;

use angler_lib::matching::manager::run_pattern_match;
use angler_lib::models::stats::PipelineStats;
use angler_lib::parsing::angler::process_report_pages;
use angler_lib::parsing::atlas::process_location_blobs;
use angler_lib::scrape::angler::MasterAnglerScraper;
use angler_lib::scrape::atlas::FishingAtlasScraper;
use angler_lib::storage::combine::combine_species_tables;
use angler_lib::storage::db_connect::{connect, get_pool_status, PgPool};
use angler_lib::storage::warehouse::{record_pipeline_run, write_table};
use angler_lib::utils::env::load_env;

/// Atlas search terms; each run rebuilds one species table per entry.
const FISH_SPECIES: [&str; 10] = [
    "Trout: Brook",
    "Trout: Brown",
    "Trout: Cutbow",
    "Trout: Cutthroat",
    "Trout: Golden",
    "Trout: Lake",
    "Trout: Rainbow",
    "Trout: Snake River Cutthroat",
    "Trout: Tiger",
    "Trout: Unspecified",
];

#[derive(Parser)]
#[command(name = "pipeline", about = "CPW fishing data scrape, load and match pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Scrape Master Angler award pages and append them to the warehouse
    LoadReports,
    /// Scrape the Fishing Atlas and rebuild one table per species
    LoadAtlas {
        /// Single species search term; all ten when omitted
        #[arg(long)]
        species: Option<String>,
    },
    /// Rebuild all_species from the per-species tables
    Combine,
    /// Link award rows to atlas rows and write pattern_match_output
    Match,
    /// All phases in order
    Run,
}

async fn load_reports(pool: &PgPool, stats: &mut PipelineStats) -> Result<()> {
    info!("Phase: Master Angler scrape and load starting...");
    let scraper = MasterAnglerScraper::from_env()?;
    let raw_data = scraper
        .fetch_all()
        .await
        .context("Failed to scrape Master Angler pages")?;

    let table = process_report_pages(&raw_data);
    stats.report_rows_loaded = write_table(
        pool,
        &table,
        "master_angler_award",
        false,
        Some("master_angler_award_id"),
    )
    .await?;
    Ok(())
}

async fn load_atlas(
    pool: &PgPool,
    species_filter: Option<&str>,
    stats: &mut PipelineStats,
) -> Result<()> {
    let species_list: Vec<&str> = match species_filter {
        Some(one) => vec![one],
        None => FISH_SPECIES.to_vec(),
    };

    for species in species_list {
        info!("Phase: Fishing Atlas scrape and load for {} starting...", species);
        let scraper = FishingAtlasScraper::from_env(species)?;
        let raw_data = scraper
            .fetch_species()
            .await
            .with_context(|| format!("Failed to scrape atlas data for {}", species))?;

        let (table, parse_stats) = process_location_blobs(&raw_data);
        stats.atlas_locations_parsed += parse_stats.parsed;
        stats.atlas_locations_skipped += parse_stats.skipped;

        write_table(pool, &table, species, true, None).await?;
    }
    Ok(())
}

async fn combine(pool: &PgPool, stats: &mut PipelineStats) -> Result<()> {
    info!("Phase: combining species tables starting...");
    stats.species_rows_combined = combine_species_tables(pool).await?;
    Ok(())
}

async fn run_match(pool: &PgPool, stats: &mut PipelineStats) -> Result<()> {
    info!("Phase: pattern matching starting...");
    let match_stats = run_pattern_match(pool).await?;
    stats.candidate_pairs = match_stats.candidate_pairs;
    stats.matches_selected = match_stats.matches_selected;
    stats.match_rows_written = match_stats.rows_written;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("Starting CPW fishing data pipeline");
    load_env();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run);

    let pool = connect().await.context("Failed to connect to warehouse")?;

    let run_id = Uuid::new_v4().to_string();
    let mut stats = PipelineStats::new(run_id.clone(), Utc::now().naive_utc());
    info!("Instantiated pipeline run {}", run_id);

    match command {
        Command::LoadReports => {
            let start = Instant::now();
            load_reports(&pool, &mut stats).await?;
            stats.record_phase("load_reports", start.elapsed());
        }
        Command::LoadAtlas { species } => {
            let start = Instant::now();
            load_atlas(&pool, species.as_deref(), &mut stats).await?;
            stats.record_phase("load_atlas", start.elapsed());
        }
        Command::Combine => {
            let start = Instant::now();
            combine(&pool, &mut stats).await?;
            stats.record_phase("combine", start.elapsed());
        }
        Command::Match => {
            let start = Instant::now();
            run_match(&pool, &mut stats).await?;
            stats.record_phase("match", start.elapsed());
        }
        Command::Run => {
            let start = Instant::now();
            load_reports(&pool, &mut stats).await?;
            stats.record_phase("load_reports", start.elapsed());

            let start = Instant::now();
            load_atlas(&pool, None, &mut stats).await?;
            stats.record_phase("load_atlas", start.elapsed());

            let start = Instant::now();
            combine(&pool, &mut stats).await?;
            stats.record_phase("combine", start.elapsed());

            let start = Instant::now();
            run_match(&pool, &mut stats).await?;
            stats.record_phase("match", start.elapsed());
        }
    }

    stats.log_summary();
    record_pipeline_run(&pool, &stats)
        .await
        .context("Failed to record pipeline run")?;

    let (pool_size, available) = get_pool_status(&pool);
    info!(
        "Final DB Connection Pool Status: Total: {}, Available: {}",
        pool_size, available
    );

    info!("Pipeline completed successfully!");
    Ok(())
}
