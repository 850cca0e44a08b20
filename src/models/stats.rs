// src/models/stats.rs - Per-run counters surfaced in the summary block
use std::collections::HashMap;
use std::time::Duration;

use chrono::NaiveDateTime;
use log::info;

#[derive(Debug, Clone)]
pub struct PipelineStats {
    pub run_id: String,
    pub run_timestamp: NaiveDateTime,
    pub report_rows_loaded: u64,
    pub atlas_locations_parsed: usize,
    pub atlas_locations_skipped: usize,
    pub species_rows_combined: u64,
    pub candidate_pairs: usize,
    pub matches_selected: usize,
    pub match_rows_written: u64,
    pub phase_times: HashMap<String, Duration>,
}

impl PipelineStats {
    pub fn new(run_id: String, run_timestamp: NaiveDateTime) -> Self {
        Self {
            run_id,
            run_timestamp,
            report_rows_loaded: 0,
            atlas_locations_parsed: 0,
            atlas_locations_skipped: 0,
            species_rows_combined: 0,
            candidate_pairs: 0,
            matches_selected: 0,
            match_rows_written: 0,
            phase_times: HashMap::new(),
        }
    }

    pub fn record_phase(&mut self, name: &str, elapsed: Duration) {
        self.phase_times.insert(name.to_string(), elapsed);
    }

    pub fn log_summary(&self) {
        info!("=== Pipeline Summary ===");
        info!("Run ID: {}", self.run_id);
        info!("Master Angler rows loaded: {}", self.report_rows_loaded);
        info!(
            "Atlas locations parsed: {} ({} skipped)",
            self.atlas_locations_parsed, self.atlas_locations_skipped
        );
        info!("Species rows combined: {}", self.species_rows_combined);
        info!("Candidate pairs blocked: {}", self.candidate_pairs);
        info!("Best matches selected: {}", self.matches_selected);
        info!("Match rows written: {}", self.match_rows_written);
        if !self.phase_times.is_empty() {
            info!("=== Timing Breakdown ===");
            let mut phases: Vec<_> = self.phase_times.iter().collect();
            phases.sort_by(|a, b| a.0.cmp(b.0));
            for (name, elapsed) in phases {
                info!("{}: {:.2?}", name, elapsed);
            }
        }
    }
}
