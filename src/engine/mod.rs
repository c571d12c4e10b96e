mod availability;
mod calendar;
mod error;
mod ledger;
mod reservations;
mod rooms;
mod token;
mod validate;

pub use calendar::{BlockChanges, CalendarMonth, CalendarView, LedgerView, RoomMonth, build_month, project_room};
pub use error::{EngineError, Entity};
pub use token::ViewToken;

use std::time::{Duration, Instant};

use sqlx::{Sqlite, Transaction};
use tracing::{debug, warn};

use crate::config::Config;
use crate::observability;
use crate::store::Store;

/// Handle to the availability ledger. Cheap to clone; every clone shares the
/// same connection pool. Any number of engines, in any number of processes,
/// may point at the same database.
#[derive(Clone)]
pub struct Engine {
    store: Store,
    op_timeout: Duration,
}

impl Engine {
    /// Connect, migrate and return a ready engine.
    pub async fn open(config: &Config) -> Result<Self, EngineError> {
        let store = Store::connect(config).await?;
        store.migrate().await?;
        Ok(Self::new(store, config.op_timeout))
    }

    pub fn new(store: Store, op_timeout: Duration) -> Self {
        Self { store, op_timeout }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run one read under the per-call deadline and record its outcome.
    pub(super) async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        self.observed(op, self.deadline(op, fut)).await
    }

    /// Run one write: `fut` stages its statements in a transaction under the
    /// deadline and hands the transaction back, which is then committed.
    ///
    /// On expiry the transaction is dropped before commit and rolls back, so
    /// [`EngineError::Timeout`] from a write always means nothing was written.
    /// The commit itself is not cut short; the transaction already holds the
    /// write lock, so it does not wait on other writers.
    pub(super) async fn bounded_write<T, F>(
        &self,
        op: &'static str,
        fut: F,
    ) -> Result<T, EngineError>
    where
        F: Future<Output = Result<(Transaction<'static, Sqlite>, T), EngineError>>,
    {
        self.observed(op, async {
            let (tx, value) = self.deadline(op, fut).await?;
            tx.commit().await?;
            Ok(value)
        })
        .await
    }

    async fn deadline<T, F>(&self, op: &'static str, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout(op)),
        }
    }

    async fn observed<T, F>(&self, op: &'static str, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        let start = Instant::now();
        let result = fut.await;
        let elapsed = start.elapsed();
        observability::record_op(op, elapsed, result.as_ref().err());

        match &result {
            Ok(_) => debug!("{op} ok in {elapsed:?}"),
            Err(
                e @ (EngineError::Timeout(_)
                | EngineError::StoreUnavailable(_)
                | EngineError::Store(_)),
            ) => warn!("{op} failed after {elapsed:?}: {e}"),
            Err(e) => debug!("{op} rejected: {e}"),
        }
        result
    }
}
