//! Row shapes read back from the store and their mapping onto model types.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

use crate::model::*;

#[derive(Debug, FromRow)]
pub(crate) struct RoomRow {
    pub id: i64,
    pub room_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RoomRow> for Room {
    fn from(row: RoomRow) -> Self {
        Room {
            id: row.id,
            name: row.room_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A reservation joined with its room's name.
#[derive(Debug, FromRow)]
pub(crate) struct ReservationRow {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub room_id: i64,
    pub room_name: String,
    pub processed: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ReservationRow> for Reservation {
    fn from(row: ReservationRow) -> Self {
        Reservation {
            id: row.id,
            room_id: row.room_id,
            room_name: row.room_name,
            // start < end is a table CHECK
            stay: Stay {
                start: row.start_date,
                end: row.end_date,
            },
            guest: GuestDetails {
                first_name: row.first_name,
                last_name: row.last_name,
                email: row.email,
                phone: row.phone,
            },
            state: ReservationState::from_flag(row.processed),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct RestrictionRow {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub room_id: i64,
    pub reservation_id: Option<i64>,
    pub restriction_type_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RestrictionRow> for Restriction {
    fn from(row: RestrictionRow) -> Self {
        // Unknown type ids are labeled by whether a guest is behind the span.
        let kind = RestrictionKind::from_type_id(row.restriction_type_id).unwrap_or(
            if row.reservation_id.is_some() {
                RestrictionKind::Reservation
            } else {
                RestrictionKind::OwnerBlock
            },
        );
        Restriction {
            id: row.id,
            room_id: row.room_id,
            stay: Stay {
                start: row.start_date,
                end: row.end_date,
            },
            reservation_id: row.reservation_id,
            kind,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct RestrictionTypeRow {
    pub id: i64,
    pub restriction_name: String,
}

impl From<RestrictionTypeRow> for RestrictionType {
    fn from(row: RestrictionTypeRow) -> Self {
        RestrictionType {
            id: row.id,
            name: row.restriction_name,
        }
    }
}

pub(crate) const ROOM_COLUMNS: &str = "id, room_name, created_at, updated_at";

pub(crate) const RESTRICTION_COLUMNS: &str =
    "id, start_date, end_date, room_id, reservation_id, restriction_type_id, created_at, updated_at";

pub(crate) const RESERVATION_SELECT: &str = "\
    SELECT r.id, r.first_name, r.last_name, r.email, r.phone, r.start_date, r.end_date, \
           r.room_id, rm.room_name, r.processed, r.created_at, r.updated_at \
    FROM reservations r \
    JOIN rooms rm ON rm.id = r.room_id";
