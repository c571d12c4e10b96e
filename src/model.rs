use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

pub type RoomId = i64;
pub type ReservationId = i64;
pub type RestrictionId = i64;

/// True iff `[a_start, a_end)` and `[b_start, b_end)` share at least one night.
///
/// This is the only overlap test in the crate; the SQL in the ledger and the
/// exclusion trigger spell out the same comparison.
pub fn overlaps(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> bool {
    a_start < b_end && b_start < a_end
}

/// Half-open night range `[start, end)`. `end` is the checkout day, so a stay
/// ending on D never conflicts with one starting on D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stay {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Stay {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, EngineError> {
        if start >= end {
            return Err(EngineError::InvalidInput("stay must end after it starts"));
        }
        Ok(Self { start, end })
    }

    /// The one-night span starting at `date`.
    pub fn single_night(date: NaiveDate) -> Result<Self, EngineError> {
        let end = date
            .succ_opt()
            .ok_or(EngineError::InvalidInput("date out of range"))?;
        Ok(Self { start: date, end })
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &Stay) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Intersection with `window`, or `None` when they only touch.
    pub fn clamp(&self, window: &Stay) -> Option<Stay> {
        let start = self.start.max(window.start);
        let end = self.end.min(window.end);
        (start < end).then_some(Stay { start, end })
    }

    /// Every occupied night, checkout day excluded.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d < end)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Where a reservation sits in the staff workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReservationState {
    /// Just submitted, not yet looked at (`processed = 0`).
    New,
    /// Handled by staff (`processed = 1`).
    Processed,
}

impl ReservationState {
    pub fn from_flag(flag: i64) -> Self {
        if flag == 0 { Self::New } else { Self::Processed }
    }

    pub fn flag(self) -> i64 {
        match self {
            Self::New => 0,
            Self::Processed => 1,
        }
    }
}

/// The guest-editable part of a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    pub room_id: RoomId,
    pub stay: Stay,
    pub guest: GuestDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub room_id: RoomId,
    pub room_name: String,
    pub stay: Stay,
    pub guest: GuestDetails,
    pub state: ReservationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn is_new(&self) -> bool {
        self.state == ReservationState::New
    }
}

/// Why a span is held out. Ids match the seeded `restrictions` lookup rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestrictionKind {
    Reservation,
    OwnerBlock,
}

impl RestrictionKind {
    pub fn type_id(self) -> i64 {
        match self {
            Self::Reservation => 1,
            Self::OwnerBlock => 2,
        }
    }

    pub fn from_type_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::Reservation),
            2 => Some(Self::OwnerBlock),
            _ => None,
        }
    }
}

/// One ledger row: a room is unavailable for `stay`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    pub id: RestrictionId,
    pub room_id: RoomId,
    pub stay: Stay,
    /// `None` for manual blocks.
    pub reservation_id: Option<ReservationId>,
    pub kind: RestrictionKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Restriction {
    pub fn is_manual_block(&self) -> bool {
        self.reservation_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictionType {
    pub id: i64,
    pub name: String,
}
