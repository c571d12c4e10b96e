use crate::model::RoomId;

/// Message raised by the `room_restrictions` exclusion triggers.
pub(crate) const OVERLAP_MARKER: &str = "restriction_overlap";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Room,
    Reservation,
    Restriction,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Entity::Room => f.write_str("room"),
            Entity::Reservation => f.write_str("reservation"),
            Entity::Restriction => f.write_str("restriction"),
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    NotFound(Entity, i64),
    /// The room already has a restriction overlapping the requested span.
    Conflict(RoomId),
    /// The per-call deadline (or the store's lock wait) ran out.
    Timeout(&'static str),
    /// Connection or transport failure.
    StoreUnavailable(String),
    /// Any other backend error.
    Store(String),
    InvalidInput(&'static str),
    LimitExceeded(&'static str),
    InvalidViewToken(&'static str),
}

impl EngineError {
    /// Worth one retry with backoff by the caller. The engine never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Timeout(_) | EngineError::StoreUnavailable(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(entity, id) => write!(f, "{entity} not found: {id}"),
            EngineError::Conflict(room_id) => {
                write!(f, "room {room_id} already restricted for the requested dates")
            }
            EngineError::Timeout(op) => write!(f, "timed out: {op}"),
            EngineError::StoreUnavailable(e) => write!(f, "store unavailable: {e}"),
            EngineError::Store(e) => write!(f, "store error: {e}"),
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::InvalidViewToken(msg) => write!(f, "invalid calendar view token: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        if is_busy(&e) {
            return EngineError::Timeout("store busy");
        }
        match e {
            sqlx::Error::PoolTimedOut => EngineError::Timeout("connection pool"),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => EngineError::StoreUnavailable(e.to_string()),
            other => EngineError::Store(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for EngineError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        EngineError::Store(e.to_string())
    }
}

/// SQLITE_BUSY / SQLITE_LOCKED, including extended codes.
fn is_busy(e: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = e else {
        return false;
    };
    db.code()
        .and_then(|c| c.parse::<i32>().ok())
        .is_some_and(|c| matches!(c & 0xff, 5 | 6))
}

pub(crate) fn is_overlap_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.message().contains(OVERLAP_MARKER))
}

pub(crate) fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            matches!(db.kind(), sqlx::error::ErrorKind::ForeignKeyViolation)
                || db.message().contains("FOREIGN KEY constraint failed")
        }
        _ => false,
    }
}
