// src/models/core.rs - Record and table primitives shared by every phase
use std::collections::HashMap;
use std::fmt;

use log::debug;

/// Sentinel written wherever a row has no data for a column.
pub const NULL_MARKER: &str = "NA";

/// Ordered `(label, value)` pairs extracted from one scraped blob.
/// Labels are unique within a record; insertion order is preserved so the
/// assembled table keeps a stable column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldRecord {
    fields: Vec<(String, String)>,
}

impl FieldRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field. Returns false (and keeps the first value) when the
    /// label is already present.
    pub fn push(&mut self, label: impl Into<String>, value: impl Into<String>) -> bool {
        let label = label.into();
        if self.fields.iter().any(|(l, _)| *l == label) {
            debug!("Duplicate label {} in record, keeping first value", label);
            return false;
        }
        self.fields.push((label, value.into()));
        true
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, String)> {
        self.fields.iter()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(l, _)| l.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Outcome of inserting a value into an [`AssembledTable`] column.
/// Distinguishes a plain append from creating a column that had to be
/// backfilled for rows already processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnInsert {
    Appended,
    Created { backfilled: usize },
}

/// Fatal table-shape faults. A width mismatch means the positional
/// correspondence between columns is corrupt and must never be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    WidthMismatch { column: String, expected: usize, got: usize },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::WidthMismatch { column, expected, got } => write!(
                f,
                "column {} has {} values but the table has {} rows",
                column, got, expected
            ),
        }
    }
}

impl std::error::Error for SchemaError {}

/// Column-oriented table of raw string values. The central invariant is that
/// every column has the same length once [`AssembledTable::align`] has run;
/// rows missing a field carry [`NULL_MARKER`].
#[derive(Debug, Clone, Default)]
pub struct AssembledTable {
    order: Vec<String>,
    columns: HashMap<String, Vec<String>>,
}

impl AssembledTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to an existing column, or creates the column backfilled with
    /// null markers so it lines up with the longest existing column after the
    /// value lands. Assumes a brand-new label is not the very first field of
    /// a record that is not the table's first.
    pub fn insert_or_create_column(&mut self, label: &str, value: String) -> ColumnInsert {
        if let Some(column) = self.columns.get_mut(label) {
            column.push(value);
            return ColumnInsert::Appended;
        }
        let backfilled = self.max_column_len().saturating_sub(1);
        let mut column = vec![NULL_MARKER.to_string(); backfilled];
        column.push(value);
        self.order.push(label.to_string());
        self.columns.insert(label.to_string(), column);
        ColumnInsert::Created { backfilled }
    }

    /// Adds every field of a record, in record order.
    pub fn push_record(&mut self, record: &FieldRecord) {
        for (label, value) in record.iter() {
            match self.insert_or_create_column(label, value.clone()) {
                ColumnInsert::Created { backfilled } if backfilled > 0 => {
                    debug!(
                        "Column {} first seen after {} row(s), backfilling with {}",
                        label, backfilled, NULL_MARKER
                    );
                }
                _ => {}
            }
        }
    }

    /// Pads every column shorter than the longest with null markers.
    /// Idempotent; returns the number of cells added.
    pub fn align(&mut self) -> usize {
        let target = self.max_column_len();
        let mut added = 0;
        for label in &self.order {
            let Some(column) = self.columns.get_mut(label) else {
                continue;
            };
            if column.len() < target {
                let missing = target - column.len();
                debug!("Column {} missing {} value(s), padding with {}", label, missing, NULL_MARKER);
                column.resize(target, NULL_MARKER.to_string());
                added += missing;
            }
        }
        added
    }

    pub fn is_aligned(&self) -> bool {
        let target = self.max_column_len();
        self.order
            .iter()
            .all(|l| self.columns[l].len() == target)
    }

    /// Checks the equal-length invariant, naming the first offending column.
    pub fn check_aligned(&self) -> Result<(), SchemaError> {
        let expected = self.max_column_len();
        for label in &self.order {
            let got = self.columns[label].len();
            if got != expected {
                return Err(SchemaError::WidthMismatch {
                    column: label.clone(),
                    expected,
                    got,
                });
            }
        }
        Ok(())
    }

    /// Adds a fully-materialized column, e.g. a derived `*_clean` join key.
    pub fn add_column(&mut self, label: &str, values: Vec<String>) -> Result<(), SchemaError> {
        let expected = self.num_rows();
        if values.len() != expected {
            return Err(SchemaError::WidthMismatch {
                column: label.to_string(),
                expected,
                got: values.len(),
            });
        }
        if self.columns.insert(label.to_string(), values).is_none() {
            self.order.push(label.to_string());
        }
        Ok(())
    }

    pub fn labels(&self) -> &[String] {
        &self.order
    }

    pub fn has_column(&self, label: &str) -> bool {
        self.columns.contains_key(label)
    }

    pub fn column(&self, label: &str) -> Option<&[String]> {
        self.columns.get(label).map(|c| c.as_slice())
    }

    pub fn value(&self, label: &str, row: usize) -> Option<&str> {
        self.columns.get(label).and_then(|c| c.get(row)).map(|v| v.as_str())
    }

    pub fn num_rows(&self) -> usize {
        self.max_column_len()
    }

    pub fn num_columns(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty() || self.max_column_len() == 0
    }

    fn max_column_len(&self) -> usize {
        self.columns.values().map(|c| c.len()).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> FieldRecord {
        let mut r = FieldRecord::new();
        for (l, v) in pairs {
            r.push(*l, *v);
        }
        r
    }

    #[test]
    fn test_duplicate_label_keeps_first() {
        let mut r = FieldRecord::new();
        assert!(r.push("Water", "Arthur Lake"));
        assert!(!r.push("Water", "Other Lake"));
        assert_eq!(r.get("Water"), Some("Arthur Lake"));
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_align_adds_null_markers() {
        let mut table = AssembledTable::new();
        table.insert_or_create_column("A", "1".to_string());
        table.insert_or_create_column("B", "2".to_string());
        table.insert_or_create_column("B", "5".to_string());

        let added = table.align();

        assert_eq!(added, 1);
        assert_eq!(table.column("A").unwrap(), &["1", "NA"]);
        assert_eq!(table.column("B").unwrap(), &["2", "5"]);
    }

    #[test]
    fn test_align_no_change_when_even() {
        let mut table = AssembledTable::new();
        table.push_record(&record(&[("A", "1"), ("B", "2")]));
        table.push_record(&record(&[("A", "1"), ("B", "5")]));

        assert_eq!(table.align(), 0);
        assert_eq!(table.column("A").unwrap(), &["1", "1"]);
        assert_eq!(table.column("B").unwrap(), &["2", "5"]);
    }

    #[test]
    fn test_align_is_idempotent() {
        let mut table = AssembledTable::new();
        table.push_record(&record(&[("A", "1"), ("B", "2")]));
        table.push_record(&record(&[("A", "3")]));

        table.align();
        let snapshot = table.column("B").unwrap().to_vec();
        assert_eq!(table.align(), 0);
        assert_eq!(table.column("B").unwrap(), snapshot.as_slice());
    }

    #[test]
    fn test_new_column_mid_batch_is_backfilled() {
        let mut table = AssembledTable::new();
        table.push_record(&record(&[("Water", "Arthur Lake"), ("County", "Chaffee")]));
        table.align();
        table.push_record(&record(&[
            ("Water", "Spinney"),
            ("County", "Park"),
            ("Boating", "None"),
        ]));
        table.align();

        assert_eq!(table.column("Boating").unwrap(), &["NA", "None"]);
        assert_eq!(table.num_rows(), 2);
        assert!(table.is_aligned());
    }

    #[test]
    fn test_insert_outcomes_are_tagged() {
        let mut table = AssembledTable::new();
        assert_eq!(
            table.insert_or_create_column("A", "1".to_string()),
            ColumnInsert::Created { backfilled: 0 }
        );
        assert_eq!(
            table.insert_or_create_column("A", "2".to_string()),
            ColumnInsert::Appended
        );
        assert_eq!(
            table.insert_or_create_column("B", "x".to_string()),
            ColumnInsert::Created { backfilled: 1 }
        );
    }

    #[test]
    fn test_check_aligned_reports_offender() {
        let mut table = AssembledTable::new();
        table.insert_or_create_column("A", "1".to_string());
        table.insert_or_create_column("A", "2".to_string());
        table.insert_or_create_column("B", "x".to_string());

        let err = table.check_aligned().unwrap_err();
        assert_eq!(
            err,
            SchemaError::WidthMismatch {
                column: "B".to_string(),
                expected: 2,
                got: 1
            }
        );

        table.align();
        assert!(table.check_aligned().is_ok());
    }

    #[test]
    fn test_add_column_rejects_wrong_width() {
        let mut table = AssembledTable::new();
        table.push_record(&record(&[("A", "1")]));
        table.push_record(&record(&[("A", "2")]));
        table.align();

        assert!(table.add_column("A_clean", vec!["1".to_string()]).is_err());
        assert!(table
            .add_column("A_clean", vec!["1".to_string(), "2".to_string()])
            .is_ok());
        assert_eq!(table.labels().last().map(|s| s.as_str()), Some("A_clean"));
    }
}
