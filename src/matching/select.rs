// src/matching/select.rs - Best-match selection and audit-column join
use std::collections::BTreeMap;

use anyhow::{bail, Result};
use log::info;

use crate::matching::compare::index_by_id;
use crate::models::core::{AssembledTable, NULL_MARKER};
use crate::models::matching::{CandidateLink, MatchOutputRow};

/// Keeps the highest-scoring candidate per primary row id.
///
/// Candidates arrive in sorted (primary, secondary) order and only a strictly
/// greater score displaces the incumbent, so ties resolve to the smallest
/// secondary row id — stable across runs. Primary ids with no candidates are
/// simply absent.
pub fn select_best_matches(scored: &[CandidateLink]) -> BTreeMap<String, CandidateLink> {
    let mut best: BTreeMap<String, CandidateLink> = BTreeMap::new();

    for link in scored {
        match best.get(&link.primary_id) {
            Some(current) if current.total_score >= link.total_score => {}
            _ => {
                best.insert(link.primary_id.clone(), link.clone());
            }
        }
    }

    info!(
        "Selected best match for {} of {} scored pair(s)",
        best.len(),
        scored.len()
    );
    best
}

fn optional(value: Option<&str>) -> Option<String> {
    match value {
        None => None,
        Some(v) if v == NULL_MARKER => None,
        Some(v) => Some(v.to_string()),
    }
}

/// Joins the compared raw and cleaned columns back onto the selection so the
/// output is auditable by eye. Every primary row appears; rows without a
/// retained candidate carry empty secondary columns and 0.0 scores.
pub fn build_match_output(
    best: &BTreeMap<String, CandidateLink>,
    primary: &AssembledTable,
    secondary: &AssembledTable,
) -> Result<Vec<MatchOutputRow>> {
    let secondary_rows = index_by_id(secondary, "all_species_id")?;

    let Some(primary_ids) = primary.column("master_angler_award_id") else {
        bail!("primary table is missing id column master_angler_award_id");
    };

    let mut output = Vec::with_capacity(primary_ids.len());
    for (row, id) in primary_ids.iter().enumerate() {
        let master_location = primary.value("location", row).unwrap_or_default().to_string();
        let master_location_clean = primary
            .value("location_clean", row)
            .unwrap_or_default()
            .to_string();

        let link = best.get(id);
        let secondary_row = match link {
            Some(l) => match secondary_rows.get(l.secondary_id.as_str()) {
                Some(r) => Some(*r),
                None => bail!("selected match references unknown all_species_id {}", l.secondary_id),
            },
            None => None,
        };

        output.push(MatchOutputRow {
            master_angler_award_id: id.clone(),
            all_species_id: link.map(|l| l.secondary_id.clone()),
            jaro_comparison: link.map(|l| l.jaro_comparison).unwrap_or(0.0),
            levenshtein_comparison: link.map(|l| l.levenshtein_comparison).unwrap_or(0.0),
            total_score: link.map(|l| l.total_score).unwrap_or(0.0),
            master_location,
            master_location_clean,
            species_water: secondary_row.and_then(|r| optional(secondary.value("water", r))),
            species_water_clean: secondary_row
                .and_then(|r| optional(secondary.value("water_clean", r))),
            main_species: secondary_row
                .and_then(|r| optional(secondary.value("main_species", r))),
        });
    }

    info!("Successfully created final pattern match output ({} row(s))", output.len());
    Ok(output)
}
