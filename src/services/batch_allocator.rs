//! FEFO/FIFO batch allocation.
//!
//! Planning only selects which lots a movement will draw from; it never
//! moves stock. The caller applies the plan inside its own transaction, and
//! `apply` re-validates every planned lot under lock, failing closed with
//! `ConcurrentModification` when another transfer got there first.

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::entities::{
    batch::{self, Entity as Batch},
    batch_movement::{self, Entity as BatchMovement},
};
use crate::errors::StockError;

/// A lot and how much of it the given store can draw.
///
/// A lot with no movement rows anywhere is "untracked": its whole remaining
/// quantity sits in the origin pool and counts as available to the store
/// holding it. Once any movement exists, per-store sums are authoritative.
#[derive(Debug, Clone)]
pub struct BatchAvailability {
    pub batch: batch::Model,
    pub available: i32,
    pub tracked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLine {
    pub batch_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub store_id: i64,
    pub item_id: i64,
    pub requested: i32,
    pub lines: Vec<AllocationLine>,
}

/// Walks lots in FEFO order (nearest expiry first, no-expiry last, ties
/// broken by creation order) taking from each until the request is covered.
pub fn plan_over(
    store_id: i64,
    item_id: i64,
    availability: &[BatchAvailability],
    requested: i32,
) -> Result<AllocationPlan, StockError> {
    if requested <= 0 {
        return Err(StockError::Validation(format!(
            "allocation quantity must be positive, got {}",
            requested
        )));
    }

    let mut candidates: Vec<&BatchAvailability> =
        availability.iter().filter(|a| a.available > 0).collect();
    candidates.sort_by_key(|a| {
        (
            a.batch.expiry_date.unwrap_or(NaiveDate::MAX),
            a.batch.batch_id,
        )
    });

    let mut remaining = requested;
    let mut lines = Vec::new();
    for candidate in candidates {
        if remaining == 0 {
            break;
        }
        let take = candidate.available.min(remaining);
        lines.push(AllocationLine {
            batch_id: candidate.batch.batch_id,
            quantity: take,
        });
        remaining -= take;
    }

    if remaining > 0 {
        return Err(StockError::InsufficientBatchStock {
            store_id,
            item_id,
            requested,
            shortfall: remaining,
        });
    }

    Ok(AllocationPlan {
        store_id,
        item_id,
        requested,
        lines,
    })
}

/// Stateless allocator, injected into the transfer workflow.
#[derive(Debug, Clone, Default)]
pub struct BatchAllocator;

impl BatchAllocator {
    pub fn new() -> Self {
        Self
    }

    /// Fetches the item's lots and computes what the store can draw from
    /// each. Inside a transaction the lot rows are locked for the caller.
    pub async fn availability_at<C: ConnectionTrait>(
        &self,
        conn: &C,
        store_id: i64,
        item_id: i64,
    ) -> Result<Vec<BatchAvailability>, StockError> {
        let lots = Batch::find()
            .filter(batch::Column::ItemId.eq(item_id))
            .lock_exclusive()
            .all(conn)
            .await?;

        let mut availability = Vec::with_capacity(lots.len());
        for lot in lots {
            let movements = BatchMovement::find()
                .filter(batch_movement::Column::BatchId.eq(lot.batch_id))
                .all(conn)
                .await?;

            let (available, tracked) = if movements.is_empty() {
                (lot.quantity, false)
            } else {
                let at_store: i32 = movements
                    .iter()
                    .filter(|m| m.store_id == store_id)
                    .map(|m| m.quantity)
                    .sum();
                (at_store, true)
            };

            availability.push(BatchAvailability {
                batch: lot,
                available,
                tracked,
            });
        }
        Ok(availability)
    }

    /// Plans an allocation for the store without committing anything.
    #[instrument(skip(self, conn))]
    pub async fn plan<C: ConnectionTrait>(
        &self,
        conn: &C,
        store_id: i64,
        item_id: i64,
        requested: i32,
    ) -> Result<AllocationPlan, StockError> {
        let availability = self.availability_at(conn, store_id, item_id).await?;
        plan_over(store_id, item_id, &availability, requested)
    }

    /// Applies a plan as movement rows within the caller's transaction.
    ///
    /// Each planned lot is re-validated under lock; a lot consumed by a
    /// competing transfer since planning aborts the whole operation. An
    /// untracked lot is first registered at the source store (its origin
    /// pool drains into an explicit placement) so per-store sums stay exact
    /// from then on.
    pub async fn apply(
        &self,
        txn: &DatabaseTransaction,
        plan: &AllocationPlan,
        destination_store_id: i64,
        transfer_id: Uuid,
    ) -> Result<Vec<batch_movement::Model>, StockError> {
        let now = Utc::now();
        let mut recorded = Vec::new();

        for line in &plan.lines {
            let lot = Batch::find_by_id(line.batch_id)
                .lock_exclusive()
                .one(txn)
                .await?
                .ok_or_else(|| StockError::NotFound(format!("batch {}", line.batch_id)))?;

            let movements = BatchMovement::find()
                .filter(batch_movement::Column::BatchId.eq(lot.batch_id))
                .all(txn)
                .await?;

            let tracked = !movements.is_empty();
            let available = if tracked {
                movements
                    .iter()
                    .filter(|m| m.store_id == plan.store_id)
                    .map(|m| m.quantity)
                    .sum()
            } else {
                lot.quantity
            };

            if available < line.quantity {
                return Err(StockError::ConcurrentModification {
                    batch_id: line.batch_id,
                    planned: line.quantity,
                    available,
                });
            }

            if !tracked {
                // Legacy lot with no placements on record: register its
                // origin pool at the source store, after which per-store
                // sums are authoritative for it too.
                let seed = batch_movement::ActiveModel {
                    batch_id: Set(lot.batch_id),
                    store_id: Set(plan.store_id),
                    quantity: Set(lot.quantity),
                    transfer_id: Set(None),
                    moved_at: Set(now),
                    ..Default::default()
                };
                seed.insert(txn).await?;
            }

            let debit = batch_movement::ActiveModel {
                batch_id: Set(lot.batch_id),
                store_id: Set(plan.store_id),
                quantity: Set(-line.quantity),
                transfer_id: Set(Some(transfer_id)),
                moved_at: Set(now),
                ..Default::default()
            };
            recorded.push(debit.insert(txn).await?);

            let credit = batch_movement::ActiveModel {
                batch_id: Set(lot.batch_id),
                store_id: Set(destination_store_id),
                quantity: Set(line.quantity),
                transfer_id: Set(Some(transfer_id)),
                moved_at: Set(now),
                ..Default::default()
            };
            recorded.push(credit.insert(txn).await?);
        }

        Ok(recorded)
    }
}
