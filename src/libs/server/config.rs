use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub database_pool_size: u32,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("PORT", 5001),
            database_path: try_load("DATABASE_PATH", String::from("database.sqlite")),
            database_pool_size: try_load("DATABASE_POOL_SIZE", 8),
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Reads `key` from the environment, falling back to `default` when it is unset
/// or does not parse.
pub(crate) fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
            default
        }),
        None => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}
