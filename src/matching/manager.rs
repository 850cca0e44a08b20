// src/matching/manager.rs - Orchestrates the cross-source match phase
use anyhow::{Context, Result};
use log::info;

use crate::matching::blocking::{blocking_rules_from_env, candidate_pairs};
use crate::matching::compare::score_candidates;
use crate::matching::normalize::{add_clean_column, add_species_clean_column};
use crate::matching::select::{build_match_output, select_best_matches};
use crate::storage::db_connect::PgPool;
use crate::storage::warehouse::{read_table, write_match_output};

/// Only trout awards are matched against the atlas; everything else in the
/// award table has no counterpart on the secondary side.
pub const TROUT_SPECIES: [&str; 8] = [
    "Cutbow",
    "Rainbow Trout",
    "Brown Trout",
    "Lake Trout",
    "Brook Trout",
    "Cutthroat (Native) Trout",
    "Tiger Trout",
    "Golden Trout",
];

const PRIMARY_QUERY: &str =
    "SELECT * FROM cpw_data.master_angler_award WHERE species = ANY($1)";
const SECONDARY_QUERY: &str = "SELECT * FROM cpw_data.all_species";

#[derive(Debug, Default, Clone, Copy)]
pub struct MatchPhaseStats {
    pub primary_rows: usize,
    pub secondary_rows: usize,
    pub candidate_pairs: usize,
    pub matches_selected: usize,
    pub rows_written: u64,
}

/// Fetches both tables, derives the cleaned join keys, blocks, scores,
/// selects the best match per award row and writes `pattern_match_output`.
pub async fn run_pattern_match(pool: &PgPool) -> Result<MatchPhaseStats> {
    let species_filter: Vec<String> = TROUT_SPECIES.iter().map(|s| s.to_string()).collect();
    let mut primary = read_table(pool, PRIMARY_QUERY, &[&species_filter])
        .await
        .context("Failed to fetch master angler awards")?;
    let mut secondary = read_table(pool, SECONDARY_QUERY, &[])
        .await
        .context("Failed to fetch combined species table")?;

    info!(
        "Matching {} award row(s) against {} atlas row(s)",
        primary.num_rows(),
        secondary.num_rows()
    );

    add_clean_column(&mut primary, "location")?;
    add_species_clean_column(&mut primary, "species")?;
    add_clean_column(&mut secondary, "water")?;
    add_clean_column(&mut secondary, "property_name")?;

    // Rule problems are configuration faults and abort before any comparison.
    let rules = blocking_rules_from_env().context("Invalid BLOCKING_RULES configuration")?;

    let pairs = candidate_pairs(
        &primary,
        "master_angler_award_id",
        &secondary,
        "all_species_id",
        &rules,
    )?;

    let scored = score_candidates(
        &pairs,
        &primary,
        "master_angler_award_id",
        "location_clean",
        &secondary,
        "all_species_id",
        "water_clean",
    )?;

    let best = select_best_matches(&scored);
    let output = build_match_output(&best, &primary, &secondary)?;

    let rows_written = write_match_output(pool, &output)
        .await
        .context("Failed to write pattern match output")?;

    info!(
        "Successfully completed matching process with {} row(s). Review logs for details.",
        rows_written
    );

    Ok(MatchPhaseStats {
        primary_rows: primary.num_rows(),
        secondary_rows: secondary.num_rows(),
        candidate_pairs: pairs.len(),
        matches_selected: best.len(),
        rows_written,
    })
}
