use std::time::Duration;

use crate::limits::*;

/// Runtime settings, read once at startup and handed to [`crate::engine::Engine::open`].
#[derive(Debug, Clone)]
pub struct Config {
    /// sqlx SQLite URL, e.g. `sqlite://./data/bookings.db`.
    pub database_url: String,
    pub max_connections: u32,
    /// Deadline applied to every engine operation.
    pub op_timeout: Duration,
    /// How long one connection waits for another writer before giving up.
    pub busy_timeout: Duration,
    /// Room names to make sure exist at startup.
    pub rooms: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/roomledger.db".into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            op_timeout: DEFAULT_OP_TIMEOUT,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            rooms: Vec::new(),
        }
    }
}

impl Config {
    /// Defaults overridden by `ROOMLEDGER_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let database_url =
            std::env::var("ROOMLEDGER_DATABASE_URL").unwrap_or(defaults.database_url);
        let max_connections: u32 = std::env::var("ROOMLEDGER_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_connections);
        let op_timeout = std::env::var("ROOMLEDGER_OP_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.op_timeout);
        let busy_timeout = std::env::var("ROOMLEDGER_BUSY_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.busy_timeout);
        let rooms = std::env::var("ROOMLEDGER_ROOMS")
            .map(|s| parse_room_list(&s))
            .unwrap_or_default();

        Self {
            database_url,
            max_connections,
            op_timeout,
            busy_timeout,
            rooms,
        }
    }

    /// Defaults pointed at a specific database.
    pub fn for_database(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }
}

/// Comma-separated room names; blanks dropped.
fn parse_room_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
