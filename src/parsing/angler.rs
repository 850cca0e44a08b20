// src/parsing/angler.rs - Master Angler award report parser
//
// Each scraped page blob is the award table's body: one row per line, cells
// separated by tabs. The column set is fixed by the source site.
use log::{info, warn};

use crate::models::core::{AssembledTable, FieldRecord};

pub const REPORT_COLUMNS: [&str; 6] = [
    "Angler", "Species", "Length", "Location", "Date", "Released",
];

/// Splits page blobs into rows and assembles the fixed six-column table.
/// Rows with the wrong cell count are logged and dropped.
pub fn process_report_pages(pages: &[String]) -> AssembledTable {
    let mut all_rows: Vec<&str> = Vec::new();
    for page in pages {
        all_rows.extend(page.lines());
    }

    let mut table = AssembledTable::new();
    for row in &all_rows {
        let cells: Vec<&str> = row.split('\t').collect();

        if cells.len() == REPORT_COLUMNS.len() {
            let mut record = FieldRecord::new();
            for (label, cell) in REPORT_COLUMNS.iter().zip(&cells) {
                record.push(*label, cell.trim());
            }
            table.push_record(&record);
        } else if !cells[0].is_empty() {
            warn!(
                "Incomplete record with {} item(s). Length of first element: {}",
                cells.len(),
                cells[0].len()
            );
        }
    }

    table.align();
    info!(
        "Number of elements in raw data={}. Number of rows in table {}",
        all_rows.len(),
        table.num_rows()
    );
    table
}
