use chrono::Utc;
use tracing::info;

use crate::model::*;
use crate::store::rows::{RESERVATION_SELECT, ReservationRow};

use super::error::is_foreign_key_violation;
use super::ledger::insert_restriction;
use super::validate::{validate_guest, validate_stay};
use super::{Engine, EngineError, Entity};

impl Engine {
    /// Store a reservation and its restriction in one transaction.
    ///
    /// If the room is already taken for any night of the stay nothing is
    /// written and the caller gets [`EngineError::Conflict`].
    pub async fn create_reservation(
        &self,
        new: NewReservation,
    ) -> Result<ReservationId, EngineError> {
        validate_stay(&new.stay)?;
        validate_guest(&new.guest)?;
        let reservation_id = self
            .bounded_write("create_reservation", async {
                let mut tx = self.store.begin().await?;
                let now = Utc::now();
                // First statement is a write so the transaction takes the write
                // lock up front instead of upgrading a read snapshot.
                let inserted = sqlx::query(
                    "INSERT INTO reservations \
                     (first_name, last_name, email, phone, start_date, end_date, room_id, \
                      processed, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&new.guest.first_name)
                .bind(&new.guest.last_name)
                .bind(&new.guest.email)
                .bind(&new.guest.phone)
                .bind(new.stay.start)
                .bind(new.stay.end)
                .bind(new.room_id)
                .bind(ReservationState::New.flag())
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await;
                let reservation_id = match inserted {
                    Ok(done) => done.last_insert_rowid(),
                    Err(e) if is_foreign_key_violation(&e) => {
                        return Err(EngineError::NotFound(Entity::Room, new.room_id));
                    }
                    Err(e) => return Err(e.into()),
                };

                insert_restriction(
                    &mut tx,
                    new.room_id,
                    &new.stay,
                    Some(reservation_id),
                    RestrictionKind::Reservation,
                )
                .await?;
                Ok((tx, reservation_id))
            })
            .await?;

        info!(
            "reservation {reservation_id}: room {} [{}, {})",
            new.room_id, new.stay.start, new.stay.end
        );
        Ok(reservation_id)
    }

    /// Flag a reservation as handled by staff. Repeating it changes nothing.
    pub async fn mark_processed(&self, id: ReservationId) -> Result<(), EngineError> {
        let processed = ReservationState::Processed.flag();
        self.bounded_write("mark_processed", async {
            let mut tx = self.store.begin().await?;
            let done = sqlx::query(
                "UPDATE reservations \
                 SET updated_at = CASE WHEN processed = ? THEN updated_at ELSE ? END, \
                     processed = ? \
                 WHERE id = ?",
            )
            .bind(processed)
            .bind(Utc::now())
            .bind(processed)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            if done.rows_affected() == 0 {
                return Err(EngineError::NotFound(Entity::Reservation, id));
            }
            Ok((tx, ()))
        })
        .await
    }

    /// Replace the guest's contact details. Dates and room are not editable.
    pub async fn update_guest(
        &self,
        id: ReservationId,
        guest: GuestDetails,
    ) -> Result<(), EngineError> {
        validate_guest(&guest)?;
        self.bounded_write("update_guest", async {
            let mut tx = self.store.begin().await?;
            let done = sqlx::query(
                "UPDATE reservations \
                 SET first_name = ?, last_name = ?, email = ?, phone = ?, updated_at = ? \
                 WHERE id = ?",
            )
            .bind(&guest.first_name)
            .bind(&guest.last_name)
            .bind(&guest.email)
            .bind(&guest.phone)
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *tx)
            .await?;
            if done.rows_affected() == 0 {
                return Err(EngineError::NotFound(Entity::Reservation, id));
            }
            Ok((tx, ()))
        })
        .await
    }

    /// Delete a reservation and release every restriction it holds, atomically.
    /// Returns the released restriction ids.
    pub async fn delete_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Vec<RestrictionId>, EngineError> {
        let released = self
            .bounded_write("delete_reservation", async {
                let mut tx = self.store.begin().await?;
                let released: Vec<RestrictionId> = sqlx::query_scalar(
                    "DELETE FROM room_restrictions WHERE reservation_id = ? RETURNING id",
                )
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;
                let done = sqlx::query("DELETE FROM reservations WHERE id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                if done.rows_affected() == 0 {
                    return Err(EngineError::NotFound(Entity::Reservation, id));
                }
                Ok((tx, released))
            })
            .await?;

        info!("reservation {id} deleted, released {} restriction(s)", released.len());
        Ok(released)
    }

    /// Every reservation, by start date.
    pub async fn all_reservations(&self) -> Result<Vec<Reservation>, EngineError> {
        self.bounded("all_reservations", async {
            let sql = format!("{RESERVATION_SELECT} ORDER BY r.start_date, r.id");
            let rows: Vec<ReservationRow> =
                sqlx::query_as(&sql).fetch_all(self.store.pool()).await?;
            Ok(rows.into_iter().map(Reservation::from).collect())
        })
        .await
    }

    /// Reservations staff have not processed yet, by start date.
    pub async fn new_reservations(&self) -> Result<Vec<Reservation>, EngineError> {
        self.bounded("new_reservations", async {
            let sql =
                format!("{RESERVATION_SELECT} WHERE r.processed = ? ORDER BY r.start_date, r.id");
            let rows: Vec<ReservationRow> = sqlx::query_as(&sql)
                .bind(ReservationState::New.flag())
                .fetch_all(self.store.pool())
                .await?;
            Ok(rows.into_iter().map(Reservation::from).collect())
        })
        .await
    }

    pub async fn reservation_by_id(&self, id: ReservationId) -> Result<Reservation, EngineError> {
        self.bounded("reservation_by_id", async {
            let sql = format!("{RESERVATION_SELECT} WHERE r.id = ?");
            let row: Option<ReservationRow> = sqlx::query_as(&sql)
                .bind(id)
                .fetch_optional(self.store.pool())
                .await?;
            row.map(Reservation::from)
                .ok_or(EngineError::NotFound(Entity::Reservation, id))
        })
        .await
    }
}
