//! Calendar view tokens.
//!
//! A token records which manual blocks a calendar view showed, so a later
//! reconciliation can tell "the owner unticked this block" apart from "this
//! block was never on screen". Format:
//! `[u8: version][u32: len][bincode: Snapshot][u32: crc32]`, little-endian.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::limits::MAX_VIEW_TOKEN_BYTES;
use crate::model::{RestrictionId, RoomId};

use super::calendar::{CalendarMonth, RoomMonth};
use super::EngineError;

const TOKEN_VERSION: u8 = 1;
const HEADER_LEN: usize = 1 + 4;
const TRAILER_LEN: usize = 4;

/// Opaque handle returned with every calendar view. Hand it back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewToken(Vec<u8>);

impl ViewToken {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub(crate) fn encode(snapshot: &Snapshot) -> Result<Self, EngineError> {
        let payload = bincode::serialize(snapshot)
            .map_err(|e| EngineError::Store(format!("encoding view token: {e}")))?;
        let len = payload.len() as u32;
        let crc = crc32fast::hash(&payload);

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
        out.push(TOKEN_VERSION);
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&crc.to_le_bytes());
        Ok(Self(out))
    }

    pub(crate) fn decode(&self) -> Result<Snapshot, EngineError> {
        let bytes = self.0.as_slice();
        if bytes.len() > MAX_VIEW_TOKEN_BYTES {
            return Err(EngineError::InvalidViewToken("too large"));
        }
        if bytes.len() < HEADER_LEN + TRAILER_LEN {
            return Err(EngineError::InvalidViewToken("truncated"));
        }
        if bytes[0] != TOKEN_VERSION {
            return Err(EngineError::InvalidViewToken("unsupported version"));
        }
        let len = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
        if bytes.len() != HEADER_LEN + len + TRAILER_LEN {
            return Err(EngineError::InvalidViewToken("length mismatch"));
        }
        let payload = &bytes[HEADER_LEN..HEADER_LEN + len];
        let crc_at = HEADER_LEN + len;
        let stored_crc = u32::from_le_bytes([
            bytes[crc_at],
            bytes[crc_at + 1],
            bytes[crc_at + 2],
            bytes[crc_at + 3],
        ]);
        if stored_crc != crc32fast::hash(payload) {
            return Err(EngineError::InvalidViewToken("checksum mismatch"));
        }

        bincode::deserialize(payload)
            .map_err(|_| EngineError::InvalidViewToken("malformed payload"))
    }
}

/// The manual blocks shown for each room in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub month: CalendarMonth,
    pub rooms: Vec<RoomSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RoomSnapshot {
    pub room_id: RoomId,
    pub blocks: Vec<(NaiveDate, RestrictionId)>,
}

impl Snapshot {
    pub fn of(month: CalendarMonth, rooms: &[RoomMonth]) -> Self {
        Self {
            month,
            rooms: rooms
                .iter()
                .map(|rm| RoomSnapshot {
                    room_id: rm.room.id,
                    blocks: rm
                        .blocks
                        .iter()
                        .filter_map(|(day, id)| id.map(|id| (*day, id)))
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn room(&self, room_id: RoomId) -> Option<&RoomSnapshot> {
        self.rooms.iter().find(|r| r.room_id == room_id)
    }
}
