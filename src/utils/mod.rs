// src/utils/mod.rs
// Shared startup helpers.

use log::debug;

/// Loads `.env` if one is present. Absence is fine; deployments supply
/// real environment variables.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(_) => debug!("No .env file found, using process environment"),
    }
}
