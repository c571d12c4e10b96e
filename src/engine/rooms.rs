use chrono::Utc;
use tracing::info;

use crate::model::*;
use crate::store::rows::{ROOM_COLUMNS, RestrictionTypeRow, RoomRow};

use super::validate::validate_room_name;
use super::{Engine, EngineError, Entity};

impl Engine {
    pub async fn create_room(&self, name: &str) -> Result<RoomId, EngineError> {
        validate_room_name(name)?;
        let id = self
            .bounded_write("create_room", async {
                let mut tx = self.store.begin().await?;
                let now = Utc::now();
                let done = sqlx::query(
                    "INSERT INTO rooms (room_name, created_at, updated_at) VALUES (?, ?, ?)",
                )
                .bind(name)
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                Ok((tx, done.last_insert_rowid()))
            })
            .await?;
        info!("room {id} created: {name}");
        Ok(id)
    }

    pub async fn rename_room(&self, id: RoomId, name: &str) -> Result<(), EngineError> {
        validate_room_name(name)?;
        self.bounded_write("rename_room", async {
            let mut tx = self.store.begin().await?;
            let done = sqlx::query("UPDATE rooms SET room_name = ?, updated_at = ? WHERE id = ?")
                .bind(name)
                .bind(Utc::now())
                .bind(id)
                .execute(&mut *tx)
                .await?;
            if done.rows_affected() == 0 {
                return Err(EngineError::NotFound(Entity::Room, id));
            }
            Ok((tx, ()))
        })
        .await
    }

    pub async fn room_by_id(&self, id: RoomId) -> Result<Room, EngineError> {
        self.bounded("room_by_id", async {
            let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = ?");
            let row: Option<RoomRow> = sqlx::query_as(&sql)
                .bind(id)
                .fetch_optional(self.store.pool())
                .await?;
            row.map(Room::from).ok_or(EngineError::NotFound(Entity::Room, id))
        })
        .await
    }

    /// Every room, by name.
    pub async fn all_rooms(&self) -> Result<Vec<Room>, EngineError> {
        self.bounded("all_rooms", async {
            let sql = format!("SELECT {ROOM_COLUMNS} FROM rooms ORDER BY room_name, id");
            let rows: Vec<RoomRow> = sqlx::query_as(&sql).fetch_all(self.store.pool()).await?;
            Ok(rows.into_iter().map(Room::from).collect())
        })
        .await
    }

    /// Create any of `names` that no room carries yet, then return all rooms.
    /// Safe to run concurrently from several instances.
    pub async fn ensure_rooms(&self, names: &[String]) -> Result<Vec<Room>, EngineError> {
        for name in names {
            validate_room_name(name)?;
        }
        let created = self
            .bounded_write("ensure_rooms", async {
                let mut tx = self.store.begin().await?;
                let now = Utc::now();
                let mut created = 0u64;
                for name in names {
                    let done = sqlx::query(
                        "INSERT INTO rooms (room_name, created_at, updated_at) \
                         SELECT ?, ?, ? WHERE NOT EXISTS (SELECT 1 FROM rooms WHERE room_name = ?)",
                    )
                    .bind(name)
                    .bind(now)
                    .bind(now)
                    .bind(name)
                    .execute(&mut *tx)
                    .await?;
                    created += done.rows_affected();
                }
                Ok((tx, created))
            })
            .await?;
        if created > 0 {
            info!("created {created} room(s)");
        }
        self.all_rooms().await
    }

    /// The seeded restriction type lookup.
    pub async fn restriction_types(&self) -> Result<Vec<RestrictionType>, EngineError> {
        self.bounded("restriction_types", async {
            let rows: Vec<RestrictionTypeRow> =
                sqlx::query_as("SELECT id, restriction_name FROM restrictions ORDER BY id")
                    .fetch_all(self.store.pool())
                    .await?;
            Ok(rows.into_iter().map(RestrictionType::from).collect())
        })
        .await
    }
}
