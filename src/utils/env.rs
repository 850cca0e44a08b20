// src/utils/env.rs - .env loading
use log::debug;

/// Loads a .env file when present. Missing files are fine; the process
/// environment is used as-is.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(_) => debug!("No .env file found, using process environment"),
    }
}
