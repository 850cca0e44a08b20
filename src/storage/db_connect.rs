// src/storage/db_connect.rs - Warehouse connection pool
//
// Credentials come from an optional config.json next to the binary, with
// WAREHOUSE_* environment variables taking precedence.
use std::env;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use deadpool_postgres::{Config, ManagerConfig, RecyclingMethod, Runtime};
use log::{debug, info};
use serde::Deserialize;
use tokio_postgres::NoTls;

pub type PgPool = deadpool_postgres::Pool;

/// Schema owning every table this pipeline reads or writes.
pub const WAREHOUSE_SCHEMA: &str = "cpw_data";

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Default, Deserialize)]
struct WarehouseConfig {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    dbname: Option<String>,
}

impl WarehouseConfig {
    fn from_file() -> Result<Self> {
        if !Path::new(CONFIG_FILE).exists() {
            debug!("No {} found, relying on environment variables", CONFIG_FILE);
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(CONFIG_FILE)
            .with_context(|| format!("Failed to read {}", CONFIG_FILE))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", CONFIG_FILE))
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = env::var("WAREHOUSE_HOST") {
            self.host = Some(host);
        }
        if let Ok(port) = env::var("WAREHOUSE_PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.port = Some(port),
                Err(_) => bail!("WAREHOUSE_PORT is not a valid port number: {}", port),
            }
        }
        if let Ok(user) = env::var("WAREHOUSE_USER") {
            self.user = Some(user);
        }
        if let Ok(password) = env::var("WAREHOUSE_PASSWORD") {
            self.password = Some(password);
        }
        if let Ok(dbname) = env::var("WAREHOUSE_DBNAME") {
            self.dbname = Some(dbname);
        }
        Ok(())
    }
}

/// Builds the pool, verifies connectivity and makes sure the warehouse
/// schema exists. Credential problems surface here, before any phase runs.
pub async fn connect() -> Result<PgPool> {
    let mut warehouse = WarehouseConfig::from_file()?;
    warehouse.apply_env()?;

    let mut cfg = Config::new();
    cfg.host = Some(warehouse.host.unwrap_or_else(|| "localhost".to_string()));
    cfg.port = Some(warehouse.port.unwrap_or(5432));
    cfg.user = warehouse.user;
    cfg.password = warehouse.password;
    cfg.dbname = Some(
        warehouse
            .dbname
            .unwrap_or_else(|| "storage_database".to_string()),
    );
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });

    let pool = cfg
        .create_pool(Some(Runtime::Tokio1), NoTls)
        .context("Failed to create warehouse connection pool")?;

    let client = pool
        .get()
        .await
        .context("Failed to get initial warehouse connection")?;
    client
        .execute(
            format!("CREATE SCHEMA IF NOT EXISTS {}", WAREHOUSE_SCHEMA).as_str(),
            &[],
        )
        .await
        .context("Failed to ensure warehouse schema")?;

    info!("Successfully connected to the warehouse database");
    Ok(pool)
}

/// (total, available) connections, for the end-of-run status log.
pub fn get_pool_status(pool: &PgPool) -> (usize, usize) {
    let status = pool.status();
    (status.size, status.available.max(0) as usize)
}
