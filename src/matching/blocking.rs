// src/matching/blocking.rs - Candidate pair generation between the two tables
use std::collections::{BTreeSet, HashMap};
use std::env;

use anyhow::{bail, Result};
use log::{debug, info};

use crate::models::core::{AssembledTable, NULL_MARKER};

/// One equality block: rows from the two tables pair up when the named
/// columns hold the same value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingRule {
    pub primary: String,
    pub secondary: String,
}

impl BlockingRule {
    pub fn new(primary: &str, secondary: &str) -> Self {
        Self {
            primary: primary.to_string(),
            secondary: secondary.to_string(),
        }
    }

    /// Parses a `primary=secondary` rule string. Malformed rules are a
    /// startup-fatal configuration error.
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.split_once('=') {
            Some((primary, secondary))
                if !primary.trim().is_empty() && !secondary.trim().is_empty() =>
            {
                Ok(Self::new(primary.trim(), secondary.trim()))
            }
            _ => bail!("unparseable blocking rule: {:?} (expected primary=secondary)", raw),
        }
    }
}

/// The standard three blocks: cleaned location against cleaned water name,
/// cleaned location against cleaned property name, cleaned species against
/// the atlas main species. Overridable via the BLOCKING_RULES env variable
/// (comma-separated `primary=secondary` pairs).
pub fn blocking_rules_from_env() -> Result<Vec<BlockingRule>> {
    match env::var("BLOCKING_RULES") {
        Ok(raw) => raw
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(BlockingRule::parse)
            .collect(),
        Err(_) => Ok(vec![
            BlockingRule::new("location_clean", "water_clean"),
            BlockingRule::new("location_clean", "property_name_clean"),
            BlockingRule::new("species_clean", "main_species"),
        ]),
    }
}

/// Checks every rule (and the two id columns) against the fetched schemas.
/// A rule naming a missing column aborts the run before any comparison.
pub fn validate_rules(
    rules: &[BlockingRule],
    primary: &AssembledTable,
    primary_id: &str,
    secondary: &AssembledTable,
    secondary_id: &str,
) -> Result<()> {
    if !primary.has_column(primary_id) {
        bail!("primary table is missing id column {}", primary_id);
    }
    if !secondary.has_column(secondary_id) {
        bail!("secondary table is missing id column {}", secondary_id);
    }
    for rule in rules {
        if !primary.has_column(&rule.primary) {
            bail!("blocking rule references missing primary column {}", rule.primary);
        }
        if !secondary.has_column(&rule.secondary) {
            bail!(
                "blocking rule references missing secondary column {}",
                rule.secondary
            );
        }
    }
    Ok(())
}

fn blockable(value: &str) -> bool {
    !value.is_empty() && value != NULL_MARKER
}

/// Emits the union of all blocks as ordered `(primary_id, secondary_id)`
/// pairs. Union rather than intersection: recall over precision, the scorer
/// ranks whatever comes through.
pub fn candidate_pairs(
    primary: &AssembledTable,
    primary_id: &str,
    secondary: &AssembledTable,
    secondary_id: &str,
    rules: &[BlockingRule],
) -> Result<BTreeSet<(String, String)>> {
    validate_rules(rules, primary, primary_id, secondary, secondary_id)?;

    let mut pairs: BTreeSet<(String, String)> = BTreeSet::new();

    for rule in rules {
        let mut by_key: HashMap<&str, Vec<&str>> = HashMap::new();
        for row in 0..secondary.num_rows() {
            let key = secondary.value(&rule.secondary, row).unwrap_or_default();
            if !blockable(key) {
                continue;
            }
            let id = secondary.value(secondary_id, row).unwrap_or_default();
            by_key.entry(key).or_default().push(id);
        }

        let before = pairs.len();
        for row in 0..primary.num_rows() {
            let key = primary.value(&rule.primary, row).unwrap_or_default();
            if !blockable(key) {
                continue;
            }
            let Some(matches) = by_key.get(key) else {
                continue;
            };
            let id = primary.value(primary_id, row).unwrap_or_default();
            for secondary_match in matches {
                pairs.insert((id.to_string(), secondary_match.to_string()));
            }
        }
        debug!(
            "Block {}={} contributed {} new pair(s)",
            rule.primary,
            rule.secondary,
            pairs.len() - before
        );
    }

    info!("Blocked {} candidate pair(s)", pairs.len());
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::FieldRecord;

    fn table(columns: &[(&str, &[&str])]) -> AssembledTable {
        let mut t = AssembledTable::new();
        let rows = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        for row in 0..rows {
            let mut record = FieldRecord::new();
            for (label, values) in columns {
                record.push(*label, values[row]);
            }
            t.push_record(&record);
        }
        t.align();
        t
    }

    fn fixture() -> (AssembledTable, AssembledTable) {
        let primary = table(&[
            ("master_angler_award_id", &["1", "2", "3"]),
            ("location_clean", &["spinney", "11mile", "unknownwater"]),
            ("species_clean", &["Rainbow", "Brown", "Golden"]),
        ]);
        let secondary = table(&[
            ("all_species_id", &["10", "11"]),
            ("water_clean", &["spinney", "antero"]),
            ("property_name_clean", &["spinneymountainpark", "11mile"]),
            ("main_species", &["Rainbow", "Brown"]),
        ]);
        (primary, secondary)
    }

    #[test]
    fn test_union_of_blocks() {
        let (primary, secondary) = fixture();
        let rules = vec![
            BlockingRule::new("location_clean", "water_clean"),
            BlockingRule::new("location_clean", "property_name_clean"),
            BlockingRule::new("species_clean", "main_species"),
        ];

        let pairs = candidate_pairs(&primary, "master_angler_award_id", &secondary, "all_species_id", &rules)
            .unwrap();

        let expected: BTreeSet<(String, String)> = [
            ("1", "10"), // location block
            ("2", "11"), // property-name block and species block
        ]
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
        assert_eq!(pairs, expected);
    }

    #[test]
    fn test_null_and_empty_keys_do_not_block() {
        let primary = table(&[
            ("master_angler_award_id", &["1", "2"]),
            ("location_clean", &["", "NA"]),
        ]);
        let secondary = table(&[
            ("all_species_id", &["10", "11"]),
            ("water_clean", &["", "NA"]),
        ]);
        let rules = vec![BlockingRule::new("location_clean", "water_clean")];

        let pairs = candidate_pairs(&primary, "master_angler_award_id", &secondary, "all_species_id", &rules)
            .unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_missing_rule_column_is_fatal() {
        let (primary, secondary) = fixture();
        let rules = vec![BlockingRule::new("location_clean", "no_such_column")];
        assert!(candidate_pairs(
            &primary,
            "master_angler_award_id",
            &secondary,
            "all_species_id",
            &rules
        )
        .is_err());
    }

    #[test]
    fn test_rule_parsing() {
        let rule = BlockingRule::parse("species_clean=main_species").unwrap();
        assert_eq!(rule, BlockingRule::new("species_clean", "main_species"));
        assert!(BlockingRule::parse("species_clean").is_err());
        assert!(BlockingRule::parse("=main_species").is_err());
    }
}
