use std::time::Duration;

/// Longest bookable stay, in nights.
pub const MAX_STAY_NIGHTS: i64 = 366;

/// Widest window accepted by range and availability queries, in days.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 3 * 366;

/// Calendar years a stored date may fall in. Dates are kept as ISO-8601 text
/// and compared as strings, which only orders correctly for four-digit years.
pub const MIN_DATE_YEAR: i32 = 1;
pub const MAX_DATE_YEAR: i32 = 9999;

/// Room names and guest contact fields (the source schema used varchar(255)).
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_CONTACT_FIELD_LEN: usize = 255;

/// Rooms rendered in one calendar view.
pub const MAX_CALENDAR_ROOMS: usize = 512;

/// Block additions plus removals applied by one reconciliation.
pub const MAX_BLOCK_CHANGES: usize = 4096;

/// Upper bound on an encoded calendar view token.
pub const MAX_VIEW_TOKEN_BYTES: usize = 1 << 20;

/// Per-operation deadline when the configuration does not set one.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(3);

/// How long a connection waits on another writer's lock.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
