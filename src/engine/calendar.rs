//! Month-at-a-glance calendar of reservations and owner blocks, and the
//! reconciliation that applies an owner's edits to it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use async_trait::async_trait;
use chrono::{Datelike, Months, NaiveDate};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::limits::*;
use crate::model::*;

use crate::store::Store;

use super::ledger::{insert_restriction, room_restrictions};
use super::token::{Snapshot, ViewToken};
use super::validate::{validate_stay, validate_window};
use super::{Engine, EngineError};

/// One calendar month. Serializes as its first day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "NaiveDate", into = "NaiveDate")]
pub struct CalendarMonth {
    first: NaiveDate,
    following: NaiveDate,
}

impl CalendarMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, EngineError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or(EngineError::InvalidInput("no such month"))?;
        Self::starting(first)
    }

    pub fn containing(date: NaiveDate) -> Result<Self, EngineError> {
        let first = date
            .with_day(1)
            .ok_or(EngineError::InvalidInput("no such month"))?;
        Self::starting(first)
    }

    fn starting(first: NaiveDate) -> Result<Self, EngineError> {
        let following = first
            .checked_add_months(Months::new(1))
            .ok_or(EngineError::InvalidInput("month out of range"))?;
        Ok(Self { first, following })
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    /// `[first day, first day of next month)`.
    pub fn span(&self) -> Stay {
        Stay {
            start: self.first,
            end: self.following,
        }
    }

    pub fn days_in_month(&self) -> u32 {
        (self.following - self.first).num_days() as u32
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        self.span().days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.span().contains(date)
    }

    pub fn next(&self) -> Result<Self, EngineError> {
        Self::starting(self.following)
    }

    pub fn previous(&self) -> Result<Self, EngineError> {
        let first = self
            .first
            .checked_sub_months(Months::new(1))
            .ok_or(EngineError::InvalidInput("month out of range"))?;
        Self::starting(first)
    }
}

impl TryFrom<NaiveDate> for CalendarMonth {
    type Error = EngineError;

    fn try_from(first: NaiveDate) -> Result<Self, Self::Error> {
        if first.day() != 1 {
            return Err(EngineError::InvalidInput("month must start on day 1"));
        }
        Self::starting(first)
    }
}

impl From<CalendarMonth> for NaiveDate {
    fn from(month: CalendarMonth) -> Self {
        month.first
    }
}

impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

/// One room's row in a calendar view. Both maps have an entry for every day
/// of the month; `None` means nothing holds that night.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMonth {
    pub room: Room,
    pub reservations: BTreeMap<NaiveDate, Option<ReservationId>>,
    pub blocks: BTreeMap<NaiveDate, Option<RestrictionId>>,
}

impl RoomMonth {
    pub fn reservation_on(&self, day: NaiveDate) -> Option<ReservationId> {
        self.reservations.get(&day).copied().flatten()
    }

    pub fn block_on(&self, day: NaiveDate) -> Option<RestrictionId> {
        self.blocks.get(&day).copied().flatten()
    }

    /// Distinct manual block ids visible this month.
    pub fn block_ids(&self) -> BTreeSet<RestrictionId> {
        self.blocks.values().flatten().copied().collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarView {
    pub month: CalendarMonth,
    pub rooms: Vec<RoomMonth>,
    /// Pass back to [`Engine::reconcile_blocks`].
    pub token: ViewToken,
}

impl CalendarView {
    pub fn room(&self, room_id: RoomId) -> Option<&RoomMonth> {
        self.rooms.iter().find(|r| r.room.id == room_id)
    }

    /// Changes that keep every shown block and add nothing.
    pub fn unchanged(&self) -> Vec<BlockChanges> {
        self.rooms.iter().map(BlockChanges::keeping).collect()
    }
}

/// The owner's edit of one room's blocks: which shown block ids stay and
/// which days get a new one-night block. A shown block whose id is not in
/// `keep` is released. Rooms without an entry are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockChanges {
    pub room_id: RoomId,
    pub keep: BTreeSet<RestrictionId>,
    pub add: BTreeSet<NaiveDate>,
}

impl BlockChanges {
    /// Release every shown block, add none.
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            ..Self::default()
        }
    }

    /// Keep every block `room` currently shows.
    pub fn keeping(room: &RoomMonth) -> Self {
        Self {
            room_id: room.room.id,
            keep: room.block_ids(),
            add: BTreeSet::new(),
        }
    }

    pub fn keep(mut self, id: RestrictionId) -> Self {
        self.keep.insert(id);
        self
    }

    pub fn release(mut self, id: RestrictionId) -> Self {
        self.keep.remove(&id);
        self
    }

    pub fn add(mut self, day: NaiveDate) -> Self {
        self.add.insert(day);
        self
    }
}

/// Read side the calendar builder needs from the ledger.
#[async_trait]
pub trait LedgerView: Send + Sync {
    async fn restrictions_for_room_in_range(
        &self,
        room_id: RoomId,
        window: Stay,
    ) -> Result<Vec<Restriction>, EngineError>;
}

/// Plain store reads; the caller owns the deadline and the metrics.
#[async_trait]
impl LedgerView for Store {
    async fn restrictions_for_room_in_range(
        &self,
        room_id: RoomId,
        window: Stay,
    ) -> Result<Vec<Restriction>, EngineError> {
        room_restrictions(self.pool(), room_id, window).await
    }
}

/// Stamp `restrictions` onto every day of `month` for `room`. Nights outside
/// the month are dropped; the checkout day is never stamped.
pub fn project_room(room: Room, month: CalendarMonth, restrictions: &[Restriction]) -> RoomMonth {
    let mut reservations: BTreeMap<_, _> = month.days().map(|d| (d, None)).collect();
    let mut blocks: BTreeMap<_, _> = month.days().map(|d| (d, None)).collect();
    let window = month.span();

    for r in restrictions {
        let Some(visible) = r.stay.clamp(&window) else {
            continue;
        };
        for day in visible.days() {
            match r.reservation_id {
                Some(reservation_id) => {
                    reservations.insert(day, Some(reservation_id));
                }
                None => {
                    blocks.insert(day, Some(r.id));
                }
            }
        }
    }

    RoomMonth {
        room,
        reservations,
        blocks,
    }
}

/// Build every room's row for `month`, fetching rooms concurrently. Output
/// order follows `rooms`.
pub async fn build_month<L>(
    ledger: &L,
    month: CalendarMonth,
    rooms: Vec<Room>,
) -> Result<Vec<RoomMonth>, EngineError>
where
    L: LedgerView + ?Sized,
{
    let window = month.span();
    let rows = rooms.into_iter().map(|room| async move {
        let restrictions = ledger.restrictions_for_room_in_range(room.id, window).await?;
        Ok::<_, EngineError>(project_room(room, month, &restrictions))
    });
    try_join_all(rows).await
}

/// What one reconciliation will write.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct BlockPlan {
    pub release: Vec<(RoomId, RestrictionId)>,
    pub add: Vec<(RoomId, NaiveDate)>,
    /// Rooms to render afterwards: the token's rooms, then any new ones.
    pub rooms: Vec<RoomId>,
}

/// Diff the owner's edits against what the token says was on screen.
pub(crate) fn plan_block_changes(
    snapshot: &Snapshot,
    changes: &[BlockChanges],
) -> Result<BlockPlan, EngineError> {
    let mut plan = BlockPlan {
        rooms: snapshot.rooms.iter().map(|r| r.room_id).collect(),
        ..BlockPlan::default()
    };
    let mut seen = BTreeSet::new();

    for change in changes {
        if !seen.insert(change.room_id) {
            return Err(EngineError::InvalidInput("room listed twice in block changes"));
        }
        if change.add.iter().any(|day| !snapshot.month.contains(*day)) {
            return Err(EngineError::InvalidInput("block date outside the calendar month"));
        }

        let shown: &[(NaiveDate, RestrictionId)] = snapshot
            .room(change.room_id)
            .map(|r| r.blocks.as_slice())
            .unwrap_or_default();
        if shown.is_empty() && !plan.rooms.contains(&change.room_id) {
            plan.rooms.push(change.room_id);
        }

        let mut released = BTreeSet::new();
        for (_, id) in shown {
            if !change.keep.contains(id) && released.insert(*id) {
                plan.release.push((change.room_id, *id));
            }
        }
        for day in &change.add {
            let already_kept = shown
                .iter()
                .any(|(d, id)| d == day && change.keep.contains(id));
            if !already_kept {
                plan.add.push((change.room_id, *day));
            }
        }
    }

    if plan.release.len() + plan.add.len() > MAX_BLOCK_CHANGES {
        return Err(EngineError::LimitExceeded("too many block changes"));
    }
    Ok(plan)
}

impl Engine {
    /// Calendar of every room for `month`, rooms by name.
    pub async fn calendar(&self, month: CalendarMonth) -> Result<CalendarView, EngineError> {
        let rooms = self.all_rooms().await?;
        self.render(month, rooms).await
    }

    /// Calendar of the given rooms, in the given order.
    pub async fn calendar_for_rooms(
        &self,
        month: CalendarMonth,
        room_ids: &[RoomId],
    ) -> Result<CalendarView, EngineError> {
        if room_ids.len() > MAX_CALENDAR_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms in one calendar"));
        }
        let rooms = try_join_all(room_ids.iter().map(|id| self.room_by_id(*id))).await?;
        self.render(month, rooms).await
    }

    async fn render(
        &self,
        month: CalendarMonth,
        rooms: Vec<Room>,
    ) -> Result<CalendarView, EngineError> {
        if rooms.len() > MAX_CALENDAR_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms in one calendar"));
        }
        validate_window(&month.span())?;
        self.bounded("calendar", async {
            let rooms = build_month(&self.store, month, rooms).await?;
            let token = ViewToken::encode(&Snapshot::of(month, &rooms))?;
            Ok(CalendarView {
                month,
                rooms,
                token,
            })
        })
        .await
    }

    /// Apply an owner's block edits against the view `token` came from, in
    /// one transaction, and return a fresh view.
    ///
    /// Blocks released since the view was built are skipped. A new block that
    /// collides with anything on the room aborts the whole edit with
    /// [`EngineError::Conflict`].
    pub async fn reconcile_blocks(
        &self,
        token: &ViewToken,
        changes: &[BlockChanges],
    ) -> Result<CalendarView, EngineError> {
        let snapshot = token.decode()?;
        let plan = plan_block_changes(&snapshot, changes)?;
        let nights = plan
            .add
            .iter()
            .map(|(room_id, day)| -> Result<_, EngineError> {
                let night = Stay::single_night(*day)?;
                validate_stay(&night)?;
                Ok((*room_id, night))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if !plan.release.is_empty() || !nights.is_empty() {
            let released = self
                .bounded_write("reconcile_blocks", async {
                    let mut tx = self.store.begin().await?;
                    let mut released = 0u64;
                    for (room_id, id) in &plan.release {
                        let done = sqlx::query(
                            "DELETE FROM room_restrictions \
                             WHERE id = ? AND room_id = ? AND reservation_id IS NULL",
                        )
                        .bind(id)
                        .bind(room_id)
                        .execute(&mut *tx)
                        .await?;
                        if done.rows_affected() == 0 {
                            debug!("block {id} on room {room_id} already released");
                        }
                        released += done.rows_affected();
                    }
                    for (room_id, night) in &nights {
                        insert_restriction(
                            &mut tx,
                            *room_id,
                            night,
                            None,
                            RestrictionKind::OwnerBlock,
                        )
                        .await?;
                    }
                    Ok((tx, released))
                })
                .await?;
            info!(
                "blocks reconciled for {}: {released} released, {} added",
                snapshot.month,
                nights.len()
            );
        }

        self.calendar_for_rooms(snapshot.month, &plan.rooms).await
    }
}
