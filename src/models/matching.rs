// src/models/matching.rs - Candidate links and the final match output row
/// One blocked candidate pair with its similarity scores. `total_score` is
/// the sum of the component scores, roughly 0.0 (unrelated) to 2.0
/// (identical under both metrics).
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateLink {
    pub primary_id: String,
    pub secondary_id: String,
    pub jaro_comparison: f64,
    pub levenshtein_comparison: f64,
    pub total_score: f64,
}

/// One row of `pattern_match_output`. Every primary-table row produces one of
/// these; rows with no retained candidate carry `None` for the secondary-side
/// columns and 0.0 scores.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutputRow {
    pub master_angler_award_id: String,
    pub all_species_id: Option<String>,
    pub jaro_comparison: f64,
    pub levenshtein_comparison: f64,
    pub total_score: f64,
    pub master_location: String,
    pub master_location_clean: String,
    pub species_water: Option<String>,
    pub species_water_clean: Option<String>,
    pub main_species: Option<String>,
}
