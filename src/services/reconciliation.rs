//! Counter-cache reconciliation.
//!
//! The `stores` table carries denormalized aggregates that incremental
//! upkeep can leave drifted (concurrent writes, partial failures, manual
//! data fixes). `check` reports drift; `fix` recomputes at fix time under
//! lock and overwrites. Fixes for the same store are serialized through a
//! per-store guard; different stores reconcile in parallel.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::db::DbPool;
use crate::entities::{
    inter_store_transfer::{self, Entity as InterStoreTransfer, TransferStatus},
    store::{self, Entity as Store},
    store_inventory::{self, Entity as StoreInventory},
};
use crate::errors::StockError;
use crate::events::{Event, EventSender};

const MAX_FIX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterKind {
    PendingOutbound,
    PendingInbound,
    LowStockItems,
}

impl CounterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CounterKind::PendingOutbound => "pending_outbound_count",
            CounterKind::PendingInbound => "pending_inbound_count",
            CounterKind::LowStockItems => "low_stock_items_count",
        }
    }
}

/// One drifted counter: what the cached column says vs what the live
/// relations say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterMismatch {
    pub counter: CounterKind,
    pub cached_value: i32,
    pub actual_value: i32,
}

/// Per-store outcome of a reconciliation sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSweepSummary {
    pub store_id: i64,
    pub corrected: Vec<CounterMismatch>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy)]
struct ActualCounters {
    pending_outbound: i32,
    pending_inbound: i32,
    low_stock_items: i32,
}

async fn compute_actuals<C: ConnectionTrait>(
    conn: &C,
    store_id: i64,
) -> Result<ActualCounters, StockError> {
    let open_statuses = [TransferStatus::Pending, TransferStatus::Approved];

    let pending_outbound = InterStoreTransfer::find()
        .filter(inter_store_transfer::Column::SourceStoreId.eq(store_id))
        .filter(inter_store_transfer::Column::Status.is_in(open_statuses.clone()))
        .count(conn)
        .await?;

    let pending_inbound = InterStoreTransfer::find()
        .filter(inter_store_transfer::Column::DestinationStoreId.eq(store_id))
        .filter(inter_store_transfer::Column::Status.is_in(open_statuses))
        .count(conn)
        .await?;

    let low_stock_items = StoreInventory::find()
        .filter(store_inventory::Column::StoreId.eq(store_id))
        .filter(
            Expr::col(store_inventory::Column::Quantity)
                .lt(Expr::col(store_inventory::Column::SafetyStockLevel)),
        )
        .count(conn)
        .await?;

    Ok(ActualCounters {
        pending_outbound: pending_outbound as i32,
        pending_inbound: pending_inbound as i32,
        low_stock_items: low_stock_items as i32,
    })
}

fn diff(cached: &store::Model, actual: &ActualCounters) -> Vec<CounterMismatch> {
    let mut mismatches = Vec::new();
    if cached.pending_outbound_count != actual.pending_outbound {
        mismatches.push(CounterMismatch {
            counter: CounterKind::PendingOutbound,
            cached_value: cached.pending_outbound_count,
            actual_value: actual.pending_outbound,
        });
    }
    if cached.pending_inbound_count != actual.pending_inbound {
        mismatches.push(CounterMismatch {
            counter: CounterKind::PendingInbound,
            cached_value: cached.pending_inbound_count,
            actual_value: actual.pending_inbound,
        });
    }
    if cached.low_stock_items_count != actual.low_stock_items {
        mismatches.push(CounterMismatch {
            counter: CounterKind::LowStockItems,
            cached_value: cached.low_stock_items_count,
            actual_value: actual.low_stock_items,
        });
    }
    mismatches
}

fn is_lock_contention(err: &sea_orm::DbErr) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("lock") || msg.contains("deadlock") || msg.contains("busy")
}

/// Service verifying and repairing the stores' cached counters.
#[derive(Clone)]
pub struct ReconciliationService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    guards: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl ReconciliationService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self {
            db,
            event_sender,
            guards: Arc::new(DashMap::new()),
        }
    }

    fn guard_for(&self, store_id: i64) -> Arc<Mutex<()>> {
        let entry = self
            .guards
            .entry(store_id)
            .or_insert_with(|| Arc::new(Mutex::new(())));
        entry.value().clone()
    }

    /// Compares every cached counter against live aggregation and returns
    /// the mismatches. An empty result means the store is consistent.
    #[instrument(skip(self))]
    pub async fn check(&self, store_id: i64) -> Result<Vec<CounterMismatch>, StockError> {
        let cached = Store::find_by_id(store_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| StockError::NotFound(format!("store {}", store_id)))?;

        let actual = compute_actuals(self.db.as_ref(), store_id).await?;
        Ok(diff(&cached, &actual))
    }

    /// Recomputes each counter and overwrites the drifted ones, returning
    /// what was corrected.
    ///
    /// Actual values are recomputed inside the fixing transaction, never
    /// reused from an earlier `check`, so a legitimately newer cached value
    /// cannot be clobbered by a stale reading. Transient lock contention is
    /// retried a bounded number of times internally; fix is idempotent, so
    /// the retry is invisible to callers.
    #[instrument(skip(self))]
    pub async fn fix(&self, store_id: i64) -> Result<Vec<CounterMismatch>, StockError> {
        let guard = self.guard_for(store_id);
        let _held = guard.lock().await;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fix_once(store_id).await {
                Err(StockError::Database(err))
                    if attempt < MAX_FIX_ATTEMPTS && is_lock_contention(&err) =>
                {
                    warn!(
                        store_id,
                        attempt,
                        error = %err,
                        "Retrying counter fix after lock contention"
                    );
                    tokio::time::sleep(Duration::from_millis(50 * u64::from(attempt))).await;
                }
                Ok(corrected) => {
                    if !corrected.is_empty() {
                        info!(store_id, corrected = corrected.len(), "Repaired counter drift");
                        self.event_sender
                            .emit(Event::CountersReconciled {
                                store_id,
                                corrected: corrected.len(),
                            })
                            .await;
                    }
                    return Ok(corrected);
                }
                Err(other) => return Err(other),
            }
        }
    }

    async fn fix_once(&self, store_id: i64) -> Result<Vec<CounterMismatch>, StockError> {
        self.db
            .transaction::<_, Vec<CounterMismatch>, StockError>(move |txn| {
                Box::pin(async move {
                    let cached = Store::find_by_id(store_id)
                        .lock_exclusive()
                        .one(txn)
                        .await?
                        .ok_or_else(|| StockError::NotFound(format!("store {}", store_id)))?;

                    let actual = compute_actuals(txn, store_id).await?;
                    let mismatches = diff(&cached, &actual);
                    if mismatches.is_empty() {
                        return Ok(mismatches);
                    }

                    let mut active: store::ActiveModel = cached.into();
                    for mismatch in &mismatches {
                        match mismatch.counter {
                            CounterKind::PendingOutbound => {
                                active.pending_outbound_count = Set(mismatch.actual_value);
                            }
                            CounterKind::PendingInbound => {
                                active.pending_inbound_count = Set(mismatch.actual_value);
                            }
                            CounterKind::LowStockItems => {
                                active.low_stock_items_count = Set(mismatch.actual_value);
                            }
                        }
                    }
                    active.updated_at = Set(chrono::Utc::now());
                    active.update(txn).await?;
                    Ok(mismatches)
                })
            })
            .await
            .map_err(StockError::from)
    }

    /// Check-then-fix over a set of stores for the periodic background
    /// task. Fixes run concurrently; per-store failures are captured in the
    /// summary rather than aborting the sweep.
    #[instrument(skip(self))]
    pub async fn sweep(&self, store_ids: &[i64]) -> Vec<StoreSweepSummary> {
        let fixes = store_ids.iter().map(|&store_id| {
            let service = self.clone();
            async move {
                match service.fix(store_id).await {
                    Ok(corrected) => StoreSweepSummary {
                        store_id,
                        corrected,
                        error: None,
                    },
                    Err(e) => {
                        warn!(store_id, error = %e, "Counter sweep failed for store");
                        StoreSweepSummary {
                            store_id,
                            corrected: Vec::new(),
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
        });
        join_all(fixes).await
    }
}
