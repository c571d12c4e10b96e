use crate::model::*;
use crate::store::rows::RoomRow;

use super::ledger::room_exists;
use super::validate::validate_window;
use super::{Engine, EngineError, Entity};

impl Engine {
    /// True iff `room_id` has no restriction overlapping `stay`.
    ///
    /// A stay ending on D and one starting on D do not overlap, so checkout
    /// day is free for the next guest.
    pub async fn is_room_free(&self, room_id: RoomId, stay: Stay) -> Result<bool, EngineError> {
        validate_window(&stay)?;
        self.bounded("is_room_free", async {
            let mut conn = self.store.pool().acquire().await?;
            let taken: i64 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM room_restrictions \
                 WHERE room_id = ? AND start_date < ? AND ? < end_date",
            )
            .bind(room_id)
            .bind(stay.end)
            .bind(stay.start)
            .fetch_one(&mut *conn)
            .await?;
            if taken > 0 {
                return Ok(false);
            }
            // Zero rows also fits a room that was never created.
            if !room_exists(&mut conn, room_id).await? {
                return Err(EngineError::NotFound(Entity::Room, room_id));
            }
            Ok(true)
        })
        .await
    }

    /// Rooms with nothing overlapping `stay`, by room id.
    pub async fn free_rooms(&self, stay: Stay) -> Result<Vec<Room>, EngineError> {
        validate_window(&stay)?;
        self.bounded("free_rooms", async {
            let rows: Vec<RoomRow> = sqlx::query_as(
                "SELECT r.id, r.room_name, r.created_at, r.updated_at FROM rooms r \
                 WHERE NOT EXISTS ( \
                     SELECT 1 FROM room_restrictions rr \
                     WHERE rr.room_id = r.id AND rr.start_date < ? AND ? < rr.end_date \
                 ) \
                 ORDER BY r.id",
            )
            .bind(stay.end)
            .bind(stay.start)
            .fetch_all(self.store.pool())
            .await?;
            Ok(rows.into_iter().map(Room::from).collect())
        })
        .await
    }
}
