// src/matching/compare.rs - Similarity scoring for blocked candidate pairs
use std::collections::{BTreeSet, HashMap};

use anyhow::{bail, Result};
use log::info;
use strsim::{jaro_winkler, normalized_damerau_levenshtein};

use crate::models::core::AssembledTable;
use crate::models::matching::CandidateLink;

/// Scores every candidate pair over the cleaned location-name columns.
///
/// Two metrics on purpose: Jaro-Winkler tolerates transpositions and rewards
/// shared prefixes, Damerau-Levenshtein is a strict edit distance. Summing
/// the two hedges single-metric bias; no threshold is applied here.
pub fn score_candidates(
    pairs: &BTreeSet<(String, String)>,
    primary: &AssembledTable,
    primary_id: &str,
    primary_key: &str,
    secondary: &AssembledTable,
    secondary_id: &str,
    secondary_key: &str,
) -> Result<Vec<CandidateLink>> {
    let primary_rows = index_by_id(primary, primary_id)?;
    let secondary_rows = index_by_id(secondary, secondary_id)?;

    let mut scored = Vec::with_capacity(pairs.len());
    for (pid, sid) in pairs {
        let (Some(p_row), Some(s_row)) = (primary_rows.get(pid.as_str()), secondary_rows.get(sid.as_str()))
        else {
            bail!("candidate pair ({}, {}) references an unknown row id", pid, sid);
        };

        let left = primary.value(primary_key, *p_row).unwrap_or_default();
        let right = secondary.value(secondary_key, *s_row).unwrap_or_default();

        let jaro = jaro_winkler(left, right);
        let levenshtein = normalized_damerau_levenshtein(left, right);

        scored.push(CandidateLink {
            primary_id: pid.clone(),
            secondary_id: sid.clone(),
            jaro_comparison: jaro,
            levenshtein_comparison: levenshtein,
            total_score: jaro + levenshtein,
        });
    }

    info!("Successfully compared {} candidate pair(s)", scored.len());
    Ok(scored)
}

/// Maps each row id to its row index. Ids come from warehouse identity
/// columns, so a duplicate means the fetched data is corrupt.
pub fn index_by_id<'a>(
    table: &'a AssembledTable,
    id_column: &str,
) -> Result<HashMap<&'a str, usize>> {
    let Some(ids) = table.column(id_column) else {
        bail!("table is missing id column {}", id_column);
    };

    let mut index = HashMap::with_capacity(ids.len());
    for (row, id) in ids.iter().enumerate() {
        if index.insert(id.as_str(), row).is_some() {
            bail!("duplicate row id {} in column {}", id, id_column);
        }
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::FieldRecord;

    fn one_column_table(id_col: &str, key_col: &str, rows: &[(&str, &str)]) -> AssembledTable {
        let mut t = AssembledTable::new();
        for (id, key) in rows {
            let mut record = FieldRecord::new();
            record.push(id_col, *id);
            record.push(key_col, *key);
            t.push_record(&record);
        }
        t.align();
        t
    }

    #[test]
    fn test_identical_names_score_two() {
        let primary = one_column_table("pid", "location_clean", &[("1", "spinney")]);
        let secondary = one_column_table("sid", "water_clean", &[("10", "spinney")]);
        let pairs: BTreeSet<_> = [("1".to_string(), "10".to_string())].into_iter().collect();

        let scored =
            score_candidates(&pairs, &primary, "pid", "location_clean", &secondary, "sid", "water_clean")
                .unwrap();

        assert_eq!(scored.len(), 1);
        assert!((scored[0].jaro_comparison - 1.0).abs() < f64::EPSILON);
        assert!((scored[0].levenshtein_comparison - 1.0).abs() < f64::EPSILON);
        assert!((scored[0].total_score - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_unrelated_names_score_low() {
        let primary = one_column_table("pid", "location_clean", &[("1", "spinney")]);
        let secondary = one_column_table("sid", "water_clean", &[("10", "quartz")]);
        let pairs: BTreeSet<_> = [("1".to_string(), "10".to_string())].into_iter().collect();

        let scored =
            score_candidates(&pairs, &primary, "pid", "location_clean", &secondary, "sid", "water_clean")
                .unwrap();
        assert!(scored[0].total_score < 1.0);
    }

    #[test]
    fn test_near_miss_scores_between() {
        let primary = one_column_table("pid", "location_clean", &[("1", "elevenmile")]);
        let secondary = one_column_table("sid", "water_clean", &[("10", "elevenmlie")]);
        let pairs: BTreeSet<_> = [("1".to_string(), "10".to_string())].into_iter().collect();

        let scored =
            score_candidates(&pairs, &primary, "pid", "location_clean", &secondary, "sid", "water_clean")
                .unwrap();
        let link = &scored[0];
        assert!(link.total_score > 1.5 && link.total_score < 2.0);
        assert!((link.total_score - (link.jaro_comparison + link.levenshtein_comparison)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let primary = one_column_table("pid", "location_clean", &[("1", "a"), ("1", "b")]);
        assert!(index_by_id(&primary, "pid").is_err());
    }
}
