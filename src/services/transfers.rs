//! Inter-store transfer workflow.
//!
//! `pending -> approved -> completed`, with cancellation legal from
//! `pending` and `approved`. Each transition is one lock-protected atomic
//! unit; nothing holds a lock across the approval gap. A failed precondition
//! leaves the transfer in its prior state and surfaces a typed error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::StockSettings;
use crate::db::DbPool;
use crate::entities::{
    inter_store_transfer::{self, Entity as InterStoreTransfer, TransferPriority, TransferStatus},
    item::Entity as Item,
    stock_ledger_entry::OperationType,
    store::{self, Entity as Store},
};
use crate::errors::StockError;
use crate::events::{Event, EventSender};
use crate::services::batch_allocator::{plan_over, BatchAllocator};
use crate::services::stock_ledger::{
    adjust_reservation, apply_quantity_delta, find_inventory_for_update,
};

lazy_static! {
    static ref TRANSFERS_CREATED: IntCounter = IntCounter::new(
        "stock_transfers_created_total",
        "Total number of inter-store transfers created"
    )
    .expect("metric can be created");
    static ref TRANSFERS_COMPLETED: IntCounter = IntCounter::new(
        "stock_transfers_completed_total",
        "Total number of inter-store transfers executed to completion"
    )
    .expect("metric can be created");
    static ref TRANSFERS_CANCELLED: IntCounter = IntCounter::new(
        "stock_transfers_cancelled_total",
        "Total number of inter-store transfers cancelled"
    )
    .expect("metric can be created");
    static ref TRANSFER_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "stock_transfer_failures_total",
            "Total number of failed transfer operations"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// Inbound request to move stock between two stores.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewTransfer {
    pub source_store_id: i64,
    pub destination_store_id: i64,
    pub item_id: i64,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 64))]
    pub requested_by: String,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
    #[serde(default)]
    pub priority: TransferPriority,
}

/// Filters for listing transfers.
#[derive(Debug, Clone, Default)]
pub struct TransferFilter {
    /// Matches transfers where the store is either endpoint.
    pub store_id: Option<i64>,
    pub status: Option<TransferStatus>,
}

/// Result of one reservation-expiry sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpirySweepResult {
    pub cancelled_count: u64,
    pub swept_at: DateTime<Utc>,
}

/// Service coordinating the transfer state machine.
#[derive(Clone)]
pub struct TransferService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    allocator: BatchAllocator,
    settings: StockSettings,
}

async fn find_transfer_for_update(
    txn: &DatabaseTransaction,
    transfer_id: Uuid,
) -> Result<inter_store_transfer::Model, StockError> {
    InterStoreTransfer::find_by_id(transfer_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| StockError::NotFound(format!("transfer {}", transfer_id)))
}

/// Best-effort incremental upkeep of the pending-transfer counters. The
/// reconciliation service is authoritative; drift here is corrected there.
async fn bump_pending_counters(
    txn: &DatabaseTransaction,
    source_store_id: i64,
    destination_store_id: i64,
    delta: i32,
) -> Result<(), StockError> {
    Store::update_many()
        .col_expr(
            store::Column::PendingOutboundCount,
            Expr::col(store::Column::PendingOutboundCount).add(delta),
        )
        .filter(store::Column::StoreId.eq(source_store_id))
        .exec(txn)
        .await?;
    Store::update_many()
        .col_expr(
            store::Column::PendingInboundCount,
            Expr::col(store::Column::PendingInboundCount).add(delta),
        )
        .filter(store::Column::StoreId.eq(destination_store_id))
        .exec(txn)
        .await?;
    Ok(())
}

impl TransferService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: EventSender,
        allocator: BatchAllocator,
        settings: StockSettings,
    ) -> Self {
        Self {
            db,
            event_sender,
            allocator,
            settings,
        }
    }

    fn record_failure(err: StockError) -> StockError {
        TRANSFER_FAILURES.with_label_values(&[err.kind()]).inc();
        err
    }

    async fn active_store(&self, store_id: i64) -> Result<store::Model, StockError> {
        let found = Store::find_by_id(store_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| StockError::NotFound(format!("store {}", store_id)))?;
        if !found.active {
            return Err(StockError::Validation(format!(
                "store {} ({}) is inactive",
                store_id, found.code
            )));
        }
        Ok(found)
    }

    /// Creates a transfer request. The source reservation and the pending
    /// row commit together; if the reservation fails, nothing persists.
    #[instrument(skip(self, new), fields(source = new.source_store_id, dest = new.destination_store_id))]
    pub async fn create_transfer(
        &self,
        new: NewTransfer,
    ) -> Result<inter_store_transfer::Model, StockError> {
        new.validate().map_err(StockError::from).map_err(Self::record_failure)?;
        if new.source_store_id == new.destination_store_id {
            return Err(Self::record_failure(StockError::Validation(format!(
                "source and destination store must differ (both {})",
                new.source_store_id
            ))));
        }

        self.active_store(new.source_store_id).await?;
        self.active_store(new.destination_store_id).await?;
        Item::find_by_id(new.item_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| StockError::NotFound(format!("item {}", new.item_id)))?;

        let transfer_id = Uuid::new_v4();
        let request = new.clone();
        let txn_fut = self
            .db
            .transaction::<_, inter_store_transfer::Model, StockError>(move |txn| {
                Box::pin(async move {
                    adjust_reservation(
                        txn,
                        request.source_store_id,
                        request.item_id,
                        request.quantity,
                        OperationType::TransferReserve,
                        Some(transfer_id),
                    )
                    .await?;

                    let now = Utc::now();
                    let transfer = inter_store_transfer::ActiveModel {
                        transfer_id: Set(transfer_id),
                        source_store_id: Set(request.source_store_id),
                        destination_store_id: Set(request.destination_store_id),
                        item_id: Set(request.item_id),
                        quantity: Set(request.quantity),
                        status: Set(TransferStatus::Pending),
                        requested_by: Set(request.requested_by),
                        approved_by: Set(None),
                        reason: Set(request.reason),
                        cancellation_reason: Set(None),
                        priority: Set(request.priority),
                        created_at: Set(now),
                        updated_at: Set(now),
                    };
                    let transfer = transfer.insert(txn).await?;

                    bump_pending_counters(
                        txn,
                        transfer.source_store_id,
                        transfer.destination_store_id,
                        1,
                    )
                    .await?;
                    Ok(transfer)
                })
            });

        let transfer = super::with_lock_timeout(
            self.settings.lock_timeout(),
            new.source_store_id,
            new.item_id,
            txn_fut,
        )
        .await
        .map_err(Self::record_failure)?;

        TRANSFERS_CREATED.inc();
        info!(
            transfer_id = %transfer.transfer_id,
            quantity = transfer.quantity,
            "Created inter-store transfer"
        );
        self.event_sender
            .emit(Event::TransferCreated {
                transfer_id: transfer.transfer_id,
                source_store_id: transfer.source_store_id,
                destination_store_id: transfer.destination_store_id,
                item_id: transfer.item_id,
                quantity: transfer.quantity,
            })
            .await;
        Ok(transfer)
    }

    /// Approves a pending transfer after re-validating that its reservation
    /// is still intact (an expiry sweep or manual release may have raced it
    /// away).
    #[instrument(skip(self))]
    pub async fn approve_transfer(
        &self,
        transfer_id: Uuid,
        approver: &str,
    ) -> Result<inter_store_transfer::Model, StockError> {
        let approver = approver.trim().to_string();
        if approver.is_empty() {
            return Err(Self::record_failure(StockError::Validation(
                "approver must not be empty".to_string(),
            )));
        }

        let existing = self.get_transfer(transfer_id).await?;
        let txn_fut = self
            .db
            .transaction::<_, inter_store_transfer::Model, StockError>(move |txn| {
                Box::pin(async move {
                    let transfer = find_transfer_for_update(txn, transfer_id).await?;
                    if transfer.status != TransferStatus::Pending {
                        return Err(StockError::InvalidState(format!(
                            "cannot approve transfer {} in status {}",
                            transfer_id,
                            transfer.status.as_str()
                        )));
                    }
                    if transfer.requested_by == approver {
                        return Err(StockError::Validation(format!(
                            "transfer {} cannot be approved by its requester {}",
                            transfer_id, approver
                        )));
                    }

                    let inventory = find_inventory_for_update(
                        txn,
                        transfer.source_store_id,
                        transfer.item_id,
                    )
                    .await?
                    .ok_or_else(|| {
                        StockError::InvalidState(format!(
                            "reservation for transfer {} has no backing holding",
                            transfer_id
                        ))
                    })?;
                    if inventory.reserved_quantity < transfer.quantity {
                        return Err(StockError::InvalidState(format!(
                            "reservation for transfer {} is no longer intact ({} of {} held)",
                            transfer_id, inventory.reserved_quantity, transfer.quantity
                        )));
                    }

                    let mut active: inter_store_transfer::ActiveModel = transfer.into();
                    active.status = Set(TransferStatus::Approved);
                    active.approved_by = Set(Some(approver));
                    active.updated_at = Set(Utc::now());
                    active.update(txn).await.map_err(StockError::from)
                })
            });

        let transfer = super::with_lock_timeout(
            self.settings.lock_timeout(),
            existing.source_store_id,
            existing.item_id,
            txn_fut,
        )
        .await
        .map_err(Self::record_failure)?;

        info!(transfer_id = %transfer_id, approved_by = ?transfer.approved_by, "Approved transfer");
        self.event_sender
            .emit(Event::TransferApproved {
                transfer_id,
                approved_by: transfer.approved_by.clone().unwrap_or_default(),
            })
            .await;
        Ok(transfer)
    }

    /// Executes an approved transfer as one atomic unit: release the
    /// reservation, debit the source, credit the destination (creating its
    /// holding if absent), and record the batch movements per the
    /// allocator's plan. All four or none.
    #[instrument(skip(self))]
    pub async fn execute_transfer(
        &self,
        transfer_id: Uuid,
    ) -> Result<inter_store_transfer::Model, StockError> {
        let existing = self.get_transfer(transfer_id).await?;
        let allocator = self.allocator.clone();
        let default_safety_stock = self.settings.default_safety_stock;
        let txn_fut = self
            .db
            .transaction::<_, inter_store_transfer::Model, StockError>(move |txn| {
                Box::pin(async move {
                    let transfer = find_transfer_for_update(txn, transfer_id).await?;
                    if transfer.status != TransferStatus::Approved {
                        return Err(StockError::InvalidState(format!(
                            "cannot execute transfer {} in status {}",
                            transfer_id,
                            transfer.status.as_str()
                        )));
                    }

                    let source = transfer.source_store_id;
                    let destination = transfer.destination_store_id;
                    let item = transfer.item_id;
                    let quantity = transfer.quantity;

                    let inventory = find_inventory_for_update(txn, source, item)
                        .await?
                        .ok_or_else(|| {
                            StockError::InvalidState(format!(
                                "reservation for transfer {} has no backing holding",
                                transfer_id
                            ))
                        })?;
                    if inventory.reserved_quantity < quantity {
                        return Err(StockError::InvalidState(format!(
                            "reservation for transfer {} is no longer intact ({} of {} held)",
                            transfer_id, inventory.reserved_quantity, quantity
                        )));
                    }

                    let availability =
                        allocator.availability_at(txn, source, item).await?;
                    let plan = plan_over(source, item, &availability, quantity)?;

                    adjust_reservation(
                        txn,
                        source,
                        item,
                        -quantity,
                        OperationType::TransferRelease,
                        Some(transfer_id),
                    )
                    .await?;
                    apply_quantity_delta(
                        txn,
                        source,
                        item,
                        -quantity,
                        OperationType::TransferCommit,
                        Some(transfer_id),
                        default_safety_stock,
                    )
                    .await?;
                    apply_quantity_delta(
                        txn,
                        destination,
                        item,
                        quantity,
                        OperationType::TransferCommit,
                        Some(transfer_id),
                        default_safety_stock,
                    )
                    .await?;
                    allocator.apply(txn, &plan, destination, transfer_id).await?;

                    bump_pending_counters(txn, source, destination, -1).await?;

                    let mut active: inter_store_transfer::ActiveModel = transfer.into();
                    active.status = Set(TransferStatus::Completed);
                    active.updated_at = Set(Utc::now());
                    active.update(txn).await.map_err(StockError::from)
                })
            });

        let transfer = super::with_lock_timeout(
            self.settings.lock_timeout(),
            existing.source_store_id,
            existing.item_id,
            txn_fut,
        )
        .await
        .map_err(Self::record_failure)?;

        TRANSFERS_COMPLETED.inc();
        info!(
            transfer_id = %transfer_id,
            quantity = transfer.quantity,
            "Executed inter-store transfer"
        );
        self.event_sender
            .emit(Event::TransferCompleted {
                transfer_id,
                source_store_id: transfer.source_store_id,
                destination_store_id: transfer.destination_store_id,
                item_id: transfer.item_id,
                quantity: transfer.quantity,
            })
            .await;
        Ok(transfer)
    }

    /// Cancels a pending or approved transfer (rejection during approval is
    /// the same operation). The reservation is released; no stock moved, so
    /// nothing is debited or credited.
    #[instrument(skip(self))]
    pub async fn cancel_transfer(
        &self,
        transfer_id: Uuid,
        reason: Option<String>,
    ) -> Result<inter_store_transfer::Model, StockError> {
        let existing = self.get_transfer(transfer_id).await?;
        let cancellation_reason = reason.clone();
        let txn_fut = self
            .db
            .transaction::<_, inter_store_transfer::Model, StockError>(move |txn| {
                Box::pin(async move {
                    let transfer = find_transfer_for_update(txn, transfer_id).await?;
                    if !matches!(
                        transfer.status,
                        TransferStatus::Pending | TransferStatus::Approved
                    ) {
                        return Err(StockError::InvalidState(format!(
                            "cannot cancel transfer {} in status {}",
                            transfer_id,
                            transfer.status.as_str()
                        )));
                    }

                    adjust_reservation(
                        txn,
                        transfer.source_store_id,
                        transfer.item_id,
                        -transfer.quantity,
                        OperationType::TransferRelease,
                        Some(transfer_id),
                    )
                    .await?;

                    bump_pending_counters(
                        txn,
                        transfer.source_store_id,
                        transfer.destination_store_id,
                        -1,
                    )
                    .await?;

                    let mut active: inter_store_transfer::ActiveModel = transfer.into();
                    active.status = Set(TransferStatus::Cancelled);
                    active.cancellation_reason = Set(cancellation_reason);
                    active.updated_at = Set(Utc::now());
                    active.update(txn).await.map_err(StockError::from)
                })
            });

        let transfer = super::with_lock_timeout(
            self.settings.lock_timeout(),
            existing.source_store_id,
            existing.item_id,
            txn_fut,
        )
        .await
        .map_err(Self::record_failure)?;

        TRANSFERS_CANCELLED.inc();
        info!(transfer_id = %transfer_id, reason = ?reason, "Cancelled transfer");
        self.event_sender
            .emit(Event::TransferCancelled {
                transfer_id,
                reason,
            })
            .await;
        Ok(transfer)
    }

    #[instrument(skip(self))]
    pub async fn get_transfer(
        &self,
        transfer_id: Uuid,
    ) -> Result<inter_store_transfer::Model, StockError> {
        InterStoreTransfer::find_by_id(transfer_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| StockError::NotFound(format!("transfer {}", transfer_id)))
    }

    /// Paginated transfer listing, newest first.
    #[instrument(skip(self))]
    pub async fn list_transfers(
        &self,
        filter: TransferFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<inter_store_transfer::Model>, u64), StockError> {
        if page == 0 {
            return Err(StockError::Validation(
                "page number must be greater than 0".to_string(),
            ));
        }
        if limit == 0 || limit > 1000 {
            return Err(StockError::Validation(
                "limit must be between 1 and 1000".to_string(),
            ));
        }

        let mut query = InterStoreTransfer::find();
        if let Some(store_id) = filter.store_id {
            query = query.filter(
                Condition::any()
                    .add(inter_store_transfer::Column::SourceStoreId.eq(store_id))
                    .add(inter_store_transfer::Column::DestinationStoreId.eq(store_id)),
            );
        }
        if let Some(status) = filter.status {
            query = query.filter(inter_store_transfer::Column::Status.eq(status));
        }
        query = query.order_by_desc(inter_store_transfer::Column::CreatedAt);

        let paginator = query.paginate(self.db.as_ref(), limit);
        let total = paginator.num_items().await?;
        let transfers = paginator.fetch_page(page - 1).await?;
        Ok((transfers, total))
    }

    /// Cancels pending transfers whose reservations outlived the configured
    /// TTL. Meant to run periodically; individual failures are logged and
    /// skipped, the sweep continues.
    #[instrument(skip(self))]
    pub async fn expire_stale_reservations(&self) -> Result<ExpirySweepResult, StockError> {
        let cutoff = Utc::now() - self.settings.reservation_ttl();
        let stale = InterStoreTransfer::find()
            .filter(inter_store_transfer::Column::Status.eq(TransferStatus::Pending))
            .filter(inter_store_transfer::Column::CreatedAt.lt(cutoff))
            .all(self.db.as_ref())
            .await?;

        let mut cancelled = 0u64;
        for transfer in stale {
            match self
                .cancel_transfer(
                    transfer.transfer_id,
                    Some("reservation expired before approval".to_string()),
                )
                .await
            {
                Ok(_) => cancelled += 1,
                Err(e) => warn!(
                    transfer_id = %transfer.transfer_id,
                    error = %e,
                    "Failed to expire stale transfer"
                ),
            }
        }

        let swept_at = Utc::now();
        self.event_sender
            .emit(Event::ReservationsExpired {
                cancelled,
                swept_at,
            })
            .await;
        Ok(ExpirySweepResult {
            cancelled_count: cancelled,
            swept_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> NewTransfer {
        NewTransfer {
            source_store_id: 1,
            destination_store_id: 2,
            item_id: 3,
            quantity: 20,
            requested_by: "clerk".to_string(),
            reason: Some("restock".to_string()),
            priority: TransferPriority::Normal,
        }
    }

    #[test]
    fn valid_request_passes_validation() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn non_positive_quantity_fails_validation() {
        let mut new = request();
        new.quantity = 0;
        assert!(new.validate().is_err());
    }

    #[test]
    fn empty_requester_fails_validation() {
        let mut new = request();
        new.requested_by = String::new();
        assert!(new.validate().is_err());
    }

    #[test]
    fn priority_defaults_to_normal_in_serde() {
        let new: NewTransfer = serde_json::from_str(
            r#"{"source_store_id":1,"destination_store_id":2,"item_id":3,
                "quantity":5,"requested_by":"clerk","reason":null}"#,
        )
        .unwrap();
        assert_eq!(new.priority, TransferPriority::Normal);
    }
}
