use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::model::*;
use crate::store::rows::{RESTRICTION_COLUMNS, RestrictionRow};

use super::error::{is_foreign_key_violation, is_overlap_violation};
use super::validate::{validate_stay, validate_window};
use super::{Engine, EngineError, Entity};

impl Engine {
    /// Hold `stay` on `room_id` for an existing reservation.
    pub async fn insert_reservation_restriction(
        &self,
        room_id: RoomId,
        stay: Stay,
        reservation_id: ReservationId,
    ) -> Result<RestrictionId, EngineError> {
        validate_stay(&stay)?;
        let id = self
            .bounded_write("insert_reservation_restriction", async {
                let mut tx = self.store.begin().await?;
                let id = insert_restriction(
                    &mut tx,
                    room_id,
                    &stay,
                    Some(reservation_id),
                    RestrictionKind::Reservation,
                )
                .await?;
                Ok((tx, id))
            })
            .await?;
        info!(
            "restriction {id}: room {room_id} [{}, {}) for reservation {reservation_id}",
            stay.start, stay.end
        );
        Ok(id)
    }

    /// Block one night on `room_id` with no guest behind it.
    pub async fn insert_manual_block(
        &self,
        room_id: RoomId,
        date: NaiveDate,
    ) -> Result<RestrictionId, EngineError> {
        self.insert_block_span(room_id, Stay::single_night(date)?).await
    }

    /// Block a multi-night span in one row.
    pub async fn insert_block_span(
        &self,
        room_id: RoomId,
        stay: Stay,
    ) -> Result<RestrictionId, EngineError> {
        validate_stay(&stay)?;
        let id = self
            .bounded_write("insert_block", async {
                let mut tx = self.store.begin().await?;
                let id =
                    insert_restriction(&mut tx, room_id, &stay, None, RestrictionKind::OwnerBlock)
                        .await?;
                Ok((tx, id))
            })
            .await?;
        info!("block {id}: room {room_id} [{}, {})", stay.start, stay.end);
        Ok(id)
    }

    /// Remove one restriction, block or reservation-backed.
    pub async fn delete_restriction(&self, id: RestrictionId) -> Result<(), EngineError> {
        self.bounded_write("delete_restriction", async {
            let mut tx = self.store.begin().await?;
            let done = sqlx::query("DELETE FROM room_restrictions WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            if done.rows_affected() == 0 {
                return Err(EngineError::NotFound(Entity::Restriction, id));
            }
            Ok((tx, ()))
        })
        .await?;
        info!("restriction {id} released");
        Ok(())
    }

    /// Every restriction on `room_id` overlapping `window`, by start date.
    pub async fn restrictions_for_room_in_range(
        &self,
        room_id: RoomId,
        window: Stay,
    ) -> Result<Vec<Restriction>, EngineError> {
        validate_window(&window)?;
        self.bounded(
            "restrictions_for_room_in_range",
            room_restrictions(self.store.pool(), room_id, window),
        )
        .await
    }
}

/// The range query behind [`Engine::restrictions_for_room_in_range`], with no
/// deadline or metrics of its own. `window` must already be validated.
pub(super) async fn room_restrictions(
    pool: &SqlitePool,
    room_id: RoomId,
    window: Stay,
) -> Result<Vec<Restriction>, EngineError> {
    let mut conn = pool.acquire().await?;
    if !room_exists(&mut conn, room_id).await? {
        return Err(EngineError::NotFound(Entity::Room, room_id));
    }
    let sql = format!(
        "SELECT {RESTRICTION_COLUMNS} FROM room_restrictions \
         WHERE room_id = ? AND start_date < ? AND ? < end_date \
         ORDER BY start_date, id"
    );
    let rows: Vec<RestrictionRow> = sqlx::query_as(&sql)
        .bind(room_id)
        .bind(window.end)
        .bind(window.start)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(Restriction::from).collect())
}

/// Insert one ledger row on an open connection or transaction.
///
/// The exclusion trigger turns an overlap into [`EngineError::Conflict`]; a
/// missing room or reservation into the matching `NotFound`.
pub(super) async fn insert_restriction(
    conn: &mut SqliteConnection,
    room_id: RoomId,
    stay: &Stay,
    reservation_id: Option<ReservationId>,
    kind: RestrictionKind,
) -> Result<RestrictionId, EngineError> {
    let now = Utc::now();
    let result = sqlx::query(
        "INSERT INTO room_restrictions \
         (start_date, end_date, room_id, reservation_id, restriction_type_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(stay.start)
    .bind(stay.end)
    .bind(room_id)
    .bind(reservation_id)
    .bind(kind.type_id())
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await;

    match result {
        Ok(done) => Ok(done.last_insert_rowid()),
        Err(e) if is_overlap_violation(&e) => Err(EngineError::Conflict(room_id)),
        Err(e) if is_foreign_key_violation(&e) => {
            Err(missing_parent(conn, room_id, reservation_id).await)
        }
        Err(e) => Err(e.into()),
    }
}

/// Work out which referenced row a failed insert was missing.
async fn missing_parent(
    conn: &mut SqliteConnection,
    room_id: RoomId,
    reservation_id: Option<ReservationId>,
) -> EngineError {
    match room_exists(conn, room_id).await {
        Ok(false) => return EngineError::NotFound(Entity::Room, room_id),
        Err(e) => return e,
        Ok(true) => {}
    }
    match reservation_id {
        Some(id) => EngineError::NotFound(Entity::Reservation, id),
        None => EngineError::Store("foreign key violation on room_restrictions".into()),
    }
}

pub(super) async fn room_exists(
    conn: &mut SqliteConnection,
    room_id: RoomId,
) -> Result<bool, EngineError> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM rooms WHERE id = ?")
        .bind(room_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}
