// src/matching/normalize.rs - Shared text cleaning for the join-key columns
use anyhow::{bail, Result};
use log::info;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::core::{AssembledTable, NULL_MARKER};

// "lake" and "reservoir" are near-universally redundant in these water names;
// removed whole-word so "Lakewood" survives.
static NOISE_WORDS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(lake|reservoir)\b").unwrap());

const SPECIES_SUFFIX: &str = " Trout";

/// Canonicalizes a free-text water name for blocking and comparison:
/// lowercase, noise words removed, everything outside `[a-z0-9]` dropped.
/// Whitespace goes with the punctuation so spelled and unspelled variants
/// ("11 Mile" / "11mile") land on the same key. Idempotent.
pub fn clean_for_matching(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let without_noise = NOISE_WORDS_RE.replace_all(&lowered, "");

    without_noise
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Species names arrive as "<species> Trout" on the award side; the atlas
/// side stores the bare species. Not folded into [`clean_for_matching`]
/// because the suffix is species vocabulary, not universal noise.
pub fn clean_species_name(raw: &str) -> String {
    raw.replace(SPECIES_SUFFIX, "")
}

/// Derives a `<source>_clean` column on the table. Null markers pass through
/// unchanged. A missing source column is a configuration fault and fatal.
pub fn add_clean_column(table: &mut AssembledTable, source: &str) -> Result<()> {
    derive_column(table, source, &format!("{}_clean", source), clean_for_matching)
}

/// Derives `species_clean` from the given species column.
pub fn add_species_clean_column(table: &mut AssembledTable, source: &str) -> Result<()> {
    derive_column(table, source, "species_clean", clean_species_name)
}

fn derive_column(
    table: &mut AssembledTable,
    source: &str,
    target: &str,
    clean: fn(&str) -> String,
) -> Result<()> {
    let Some(values) = table.column(source) else {
        bail!("cannot clean column {}: not present in table", source);
    };

    let cleaned: Vec<String> = values
        .iter()
        .map(|v| {
            if v == NULL_MARKER {
                v.clone()
            } else {
                clean(v)
            }
        })
        .collect();

    table.add_column(target, cleaned)?;
    info!("Cleaned column {} into {}", source, target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::FieldRecord;

    #[test]
    fn test_known_variants_collapse_to_one_key() {
        assert_eq!(clean_for_matching("Spinney Reservoir"), "spinney");
        assert_eq!(clean_for_matching("spinney"), "spinney");
        assert_eq!(clean_for_matching("11 Mile Reservoir"), "11mile");
        assert_eq!(clean_for_matching("11mile"), "11mile");
        assert_eq!(clean_for_matching("Arthur Lake"), "arthur");
        assert_eq!(
            clean_for_matching("N. St. Vrain Creek #3"),
            "nstvraincreek3"
        );
    }

    #[test]
    fn test_noise_words_are_whole_word_only() {
        assert_eq!(clean_for_matching("Lakewood Gulch"), "lakewoodgulch");
    }

    #[test]
    fn test_clean_is_idempotent() {
        let once = clean_for_matching("Eleven Mile Reservoir");
        assert_eq!(clean_for_matching(&once), once);
    }

    #[test]
    fn test_species_suffix_is_stripped() {
        assert_eq!(clean_species_name("Rainbow Trout"), "Rainbow");
        assert_eq!(clean_species_name("Cutbow"), "Cutbow");
        assert_eq!(
            clean_species_name("Cutthroat (Native) Trout"),
            "Cutthroat (Native)"
        );
    }

    #[test]
    fn test_clean_column_is_derived() {
        let mut table = AssembledTable::new();
        let mut record = FieldRecord::new();
        record.push("location", "Spinney Reservoir");
        table.push_record(&record);
        table.align();

        add_clean_column(&mut table, "location").unwrap();
        assert_eq!(table.value("location_clean", 0), Some("spinney"));
    }

    #[test]
    fn test_null_markers_pass_through() {
        let mut table = AssembledTable::new();
        let mut record = FieldRecord::new();
        record.push("water", NULL_MARKER);
        table.push_record(&record);
        table.align();

        add_clean_column(&mut table, "water").unwrap();
        assert_eq!(table.value("water_clean", 0), Some(NULL_MARKER));
    }

    #[test]
    fn test_missing_source_column_is_fatal() {
        let mut table = AssembledTable::new();
        assert!(add_clean_column(&mut table, "location").is_err());
    }
}
