// src/storage/warehouse.rs - Table writes and reads against the warehouse
use anyhow::{bail, Context, Result};
use log::{debug, info};
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::Row;

use crate::models::core::{AssembledTable, NULL_MARKER};
use crate::models::matching::MatchOutputRow;
use crate::models::stats::PipelineStats;
use crate::storage::db_connect::{PgPool, WAREHOUSE_SCHEMA};

const INSERT_CHUNK_ROWS: usize = 500;
const MATCH_OUTPUT_TABLE: &str = "pattern_match_output";

/// Snake-cases an assembled-table label into a column identifier,
/// e.g. "Fish Species" -> fish_species, "Elevation(ft)" -> elevation(ft).
pub fn column_ident(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}

pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

pub(crate) fn qualified(table: &str) -> String {
    format!("{}.{}", WAREHOUSE_SCHEMA, quote_ident(table))
}

/// Writes an assembled table. The table is created on first write (an
/// identity column is prepended when `id_column` is given); `overwrite`
/// drops and recreates, otherwise rows append.
///
/// A table that violates the equal-length invariant is a programming fault
/// and is refused outright — writing it would corrupt the positional
/// correspondence between columns.
pub async fn write_table(
    pool: &PgPool,
    table: &AssembledTable,
    table_name: &str,
    overwrite: bool,
    id_column: Option<&str>,
) -> Result<u64> {
    table
        .check_aligned()
        .with_context(|| format!("Refusing to write {}: schema width mismatch", table_name))?;

    let client = pool
        .get()
        .await
        .context("Failed to get DB connection for write_table")?;
    let target = qualified(table_name);

    if overwrite {
        client
            .execute(format!("DROP TABLE IF EXISTS {}", target).as_str(), &[])
            .await
            .with_context(|| format!("Failed to drop {}", target))?;
    }

    let mut ddl_columns: Vec<String> = Vec::new();
    if let Some(id) = id_column {
        ddl_columns.push(format!(
            "{} BIGINT GENERATED ALWAYS AS IDENTITY",
            quote_ident(id)
        ));
    }
    for label in table.labels() {
        ddl_columns.push(format!("{} TEXT", quote_ident(&column_ident(label))));
    }
    client
        .execute(
            format!(
                "CREATE TABLE IF NOT EXISTS {} ({})",
                target,
                ddl_columns.join(", ")
            )
            .as_str(),
            &[],
        )
        .await
        .with_context(|| format!("Failed to create {}", target))?;

    let labels = table.labels();
    let column_list = labels
        .iter()
        .map(|l| quote_ident(&column_ident(l)))
        .collect::<Vec<_>>()
        .join(", ");

    let mut written = 0u64;
    let rows = table.num_rows();
    let mut start = 0usize;
    while start < rows {
        let end = (start + INSERT_CHUNK_ROWS).min(rows);

        let mut placeholders = Vec::with_capacity(end - start);
        let mut flat: Vec<&str> = Vec::with_capacity((end - start) * labels.len());
        let mut next_param = 1usize;
        for row in start..end {
            let row_placeholders: Vec<String> = (0..labels.len())
                .map(|i| format!("${}", next_param + i))
                .collect();
            next_param += labels.len();
            placeholders.push(format!("({})", row_placeholders.join(", ")));
            for label in labels {
                flat.push(table.value(label, row).unwrap_or(NULL_MARKER));
            }
        }

        let params: Vec<&(dyn ToSql + Sync)> =
            flat.iter().map(|v| v as &(dyn ToSql + Sync)).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            target,
            column_list,
            placeholders.join(", ")
        );
        written += client
            .execute(sql.as_str(), &params)
            .await
            .with_context(|| format!("Failed to insert rows into {}", target))?;
        start = end;
    }

    info!("Successfully wrote {} row(s) to {}", written, target);
    Ok(written)
}

/// Runs a query and stringifies the result set into an [`AssembledTable`].
/// SQL NULL becomes the null marker.
pub async fn read_table(
    pool: &PgPool,
    query: &str,
    params: &[&(dyn ToSql + Sync)],
) -> Result<AssembledTable> {
    let client = pool
        .get()
        .await
        .context("Failed to get DB connection for read_table")?;
    let rows = client
        .query(query, params)
        .await
        .with_context(|| format!("Query failed: {}", query))?;

    let mut table = AssembledTable::new();
    for row in &rows {
        for (idx, column) in row.columns().iter().enumerate() {
            let value = stringify_value(row, idx)
                .with_context(|| format!("Failed to read column {}", column.name()))?;
            table.insert_or_create_column(column.name(), value);
        }
    }
    table.align();

    debug!(
        "Fetched {} row(s), {} column(s)",
        table.num_rows(),
        table.num_columns()
    );
    Ok(table)
}

fn stringify_value(row: &Row, idx: usize) -> Result<String> {
    let ty = row.columns()[idx].type_();

    let rendered = if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR {
        row.try_get::<_, Option<String>>(idx)?
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.map(|v| v.to_string())
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(|v| v.to_string())
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(|v| v.to_string())
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx)?.map(|v| v.to_string())
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)?.map(|v| v.to_string())
    } else if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.map(|v| v.to_string())
    } else {
        bail!(
            "unsupported column type {} for column {}",
            ty,
            row.columns()[idx].name()
        );
    };

    Ok(rendered.unwrap_or_else(|| NULL_MARKER.to_string()))
}

/// Rebuilds `pattern_match_output` from the selected matches. Always a full
/// overwrite; the match phase recomputes everything from current data.
pub async fn write_match_output(pool: &PgPool, rows: &[MatchOutputRow]) -> Result<u64> {
    let client = pool
        .get()
        .await
        .context("Failed to get DB connection for write_match_output")?;
    let target = qualified(MATCH_OUTPUT_TABLE);

    client
        .execute(format!("DROP TABLE IF EXISTS {}", target).as_str(), &[])
        .await
        .with_context(|| format!("Failed to drop {}", target))?;
    client
        .execute(
            format!(
                "CREATE TABLE {} (
                    master_angler_award_id TEXT,
                    all_species_id TEXT,
                    jaro_comparison DOUBLE PRECISION,
                    levenshtein_comparison DOUBLE PRECISION,
                    total_score DOUBLE PRECISION,
                    master_location TEXT,
                    master_location_clean TEXT,
                    species_water TEXT,
                    species_water_clean TEXT,
                    main_species TEXT
                )",
                target
            )
            .as_str(),
            &[],
        )
        .await
        .with_context(|| format!("Failed to create {}", target))?;

    const COLUMNS: usize = 10;
    let mut written = 0u64;
    for chunk in rows.chunks(INSERT_CHUNK_ROWS) {
        let mut placeholders = Vec::with_capacity(chunk.len());
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(chunk.len() * COLUMNS);
        for (i, row) in chunk.iter().enumerate() {
            let base = i * COLUMNS;
            let row_placeholders: Vec<String> =
                (1..=COLUMNS).map(|c| format!("${}", base + c)).collect();
            placeholders.push(format!("({})", row_placeholders.join(", ")));

            params.push(&row.master_angler_award_id);
            params.push(&row.all_species_id);
            params.push(&row.jaro_comparison);
            params.push(&row.levenshtein_comparison);
            params.push(&row.total_score);
            params.push(&row.master_location);
            params.push(&row.master_location_clean);
            params.push(&row.species_water);
            params.push(&row.species_water_clean);
            params.push(&row.main_species);
        }

        let sql = format!(
            "INSERT INTO {} (master_angler_award_id, all_species_id, jaro_comparison, \
             levenshtein_comparison, total_score, master_location, master_location_clean, \
             species_water, species_water_clean, main_species) VALUES {}",
            target,
            placeholders.join(", ")
        );
        written += client
            .execute(sql.as_str(), &params)
            .await
            .with_context(|| format!("Failed to insert rows into {}", target))?;
    }

    info!("Successfully wrote final output to {}", target);
    Ok(written)
}

/// Appends one summary row per pipeline run.
pub async fn record_pipeline_run(pool: &PgPool, stats: &PipelineStats) -> Result<()> {
    let client = pool
        .get()
        .await
        .context("Failed to get DB connection for record_pipeline_run")?;

    client
        .execute(
            format!(
                "CREATE TABLE IF NOT EXISTS {}.pipeline_run (
                    id TEXT,
                    run_timestamp TIMESTAMP,
                    report_rows_loaded BIGINT,
                    atlas_locations_parsed BIGINT,
                    atlas_locations_skipped BIGINT,
                    species_rows_combined BIGINT,
                    candidate_pairs BIGINT,
                    matches_selected BIGINT,
                    match_rows_written BIGINT
                )",
                WAREHOUSE_SCHEMA
            )
            .as_str(),
            &[],
        )
        .await
        .context("Failed to create pipeline_run")?;

    let report_rows = stats.report_rows_loaded as i64;
    let parsed = stats.atlas_locations_parsed as i64;
    let skipped = stats.atlas_locations_skipped as i64;
    let combined = stats.species_rows_combined as i64;
    let pairs = stats.candidate_pairs as i64;
    let selected = stats.matches_selected as i64;
    let written = stats.match_rows_written as i64;

    client
        .execute(
            format!(
                "INSERT INTO {}.pipeline_run VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                WAREHOUSE_SCHEMA
            )
            .as_str(),
            &[
                &stats.run_id,
                &stats.run_timestamp,
                &report_rows,
                &parsed,
                &skipped,
                &combined,
                &pairs,
                &selected,
                &written,
            ],
        )
        .await
        .context("Failed to insert pipeline_run record")?;

    info!("Recorded pipeline run {}", stats.run_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_become_column_idents() {
        assert_eq!(column_ident("Fish Species"), "fish_species");
        assert_eq!(column_ident("Property name"), "property_name");
        assert_eq!(column_ident("Elevation(ft)"), "elevation(ft)");
        assert_eq!(column_ident("Ease of access"), "ease_of_access");
    }

    #[test]
    fn test_idents_are_quoted() {
        assert_eq!(quote_ident("water"), "\"water\"");
        assert_eq!(quote_ident("Trout: Brook"), "\"Trout: Brook\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }
}
