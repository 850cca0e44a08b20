// src/storage/combine.rs - Union of the per-species tables into all_species
//
// Each scrape run leaves one "Trout: <species>" table with a data-dependent
// column set. The match phase wants a single secondary table, so this step
// rebuilds all_species with an identity id, a main_species column derived
// from the source table name, and the canonical descriptive columns.
use std::collections::HashSet;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::storage::db_connect::{PgPool, WAREHOUSE_SCHEMA};
use crate::storage::warehouse::{qualified, quote_ident};

pub const ALL_SPECIES_TABLE: &str = "all_species";

const SPECIES_TABLE_PREFIX: &str = "Trout: ";

/// Canonical descriptive columns. Species tables carry a subset of these;
/// absent ones land as NULL in the combined table.
pub const ALL_SPECIES_COLUMNS: [&str; 11] = [
    "fish_species",
    "water",
    "county",
    "property_name",
    "ease_of_access",
    "boating",
    "fishing_pressure",
    "stocked",
    "elevation(ft)",
    "latitude",
    "longitude",
];

pub async fn combine_species_tables(pool: &PgPool) -> Result<u64> {
    let client = pool
        .get()
        .await
        .context("Failed to get DB connection for combine_species_tables")?;

    let table_rows = client
        .query(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_name LIKE 'Trout%' AND table_schema = $1 \
             ORDER BY table_name",
            &[&WAREHOUSE_SCHEMA],
        )
        .await
        .context("Failed to list species tables")?;
    let tables: Vec<String> = table_rows
        .iter()
        .map(|row| row.get::<_, String>("table_name"))
        .collect();

    if tables.is_empty() {
        warn!("No species tables found to combine");
    }

    let target = qualified(ALL_SPECIES_TABLE);
    client
        .execute(format!("DROP TABLE IF EXISTS {}", target).as_str(), &[])
        .await
        .with_context(|| format!("Failed to drop {}", target))?;

    let ddl_columns = ALL_SPECIES_COLUMNS
        .iter()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    client
        .execute(
            format!(
                "CREATE TABLE {} (all_species_id BIGINT GENERATED ALWAYS AS IDENTITY, \
                 main_species TEXT, {})",
                target, ddl_columns
            )
            .as_str(),
            &[],
        )
        .await
        .with_context(|| format!("Failed to create {}", target))?;

    let mut total = 0u64;
    for table in &tables {
        info!("Beginning table: {}", table);

        let column_rows = client
            .query(
                "SELECT column_name FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2",
                &[&WAREHOUSE_SCHEMA, table],
            )
            .await
            .with_context(|| format!("Failed to describe table {}", table))?;
        let present: HashSet<String> = column_rows
            .iter()
            .map(|row| row.get::<_, String>("column_name"))
            .collect();

        let insert_columns: Vec<String> = ALL_SPECIES_COLUMNS
            .iter()
            .filter(|c| present.contains(**c))
            .map(|c| quote_ident(c))
            .collect();
        if insert_columns.is_empty() {
            warn!("Table {} has no recognized columns, skipping", table);
            continue;
        }

        let column_list = insert_columns.join(", ");
        let main_species = table
            .strip_prefix(SPECIES_TABLE_PREFIX)
            .unwrap_or(table.as_str());

        let sql = format!(
            "INSERT INTO {} (main_species, {}) SELECT $1, {} FROM {}.{}",
            target,
            column_list,
            column_list,
            WAREHOUSE_SCHEMA,
            quote_ident(table)
        );
        let inserted = client
            .execute(sql.as_str(), &[&main_species])
            .await
            .with_context(|| format!("Failed to insert rows from table {}", table))?;

        info!("Wrote {} rows from table: {}", inserted, table);
        total += inserted;
    }

    info!("Combined {} row(s) into {}", total, target);
    Ok(total)
}
