//! Stock ledger and per-(store, item) holdings.
//!
//! Every change to a holding's `quantity` or `reserved_quantity` commits in
//! the same transaction as the ledger entry describing it; the two never
//! diverge. The holding row is locked (`SELECT ... FOR UPDATE`) for the
//! duration of each write so `available_quantity >= 0` is never observably
//! violated, even transiently.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionError, TransactionTrait,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::StockSettings;
use crate::db::DbPool;
use crate::entities::{
    batch, batch_movement,
    stock_ledger_entry::{self, Entity as StockLedgerEntry, OperationType},
    store_inventory::{self, Entity as StoreInventory},
};
use crate::errors::StockError;
use crate::events::{Event, EventSender};

/// Locks the holding row for a (store, item) pair for the remainder of the
/// transaction.
pub(crate) async fn find_inventory_for_update(
    txn: &DatabaseTransaction,
    store_id: i64,
    item_id: i64,
) -> Result<Option<store_inventory::Model>, StockError> {
    StoreInventory::find()
        .filter(store_inventory::Column::StoreId.eq(store_id))
        .filter(store_inventory::Column::ItemId.eq(item_id))
        .lock_exclusive()
        .one(txn)
        .await
        .map_err(StockError::from)
}

pub(crate) async fn insert_ledger_entry(
    txn: &DatabaseTransaction,
    store_id: i64,
    item_id: i64,
    delta: i32,
    operation_type: OperationType,
    previous_quantity: i32,
    resulting_quantity: i32,
    reference_id: Option<Uuid>,
) -> Result<stock_ledger_entry::Model, StockError> {
    let entry = stock_ledger_entry::ActiveModel {
        entry_id: Set(Uuid::new_v4()),
        store_id: Set(store_id),
        item_id: Set(item_id),
        delta: Set(delta),
        operation_type: Set(operation_type),
        previous_quantity: Set(previous_quantity),
        resulting_quantity: Set(resulting_quantity),
        reference_id: Set(reference_id),
        created_at: Set(Utc::now()),
    };
    entry.insert(txn).await.map_err(StockError::from)
}

/// Applies a signed on-hand delta and appends the matching ledger entry.
///
/// A positive delta against a missing holding creates the row first; a
/// negative delta against a missing holding is a `NotFound` (cannot consume
/// what was never received).
pub(crate) async fn apply_quantity_delta(
    txn: &DatabaseTransaction,
    store_id: i64,
    item_id: i64,
    delta: i32,
    operation_type: OperationType,
    reference_id: Option<Uuid>,
    default_safety_stock: i32,
) -> Result<(store_inventory::Model, stock_ledger_entry::Model), StockError> {
    let inventory = match find_inventory_for_update(txn, store_id, item_id).await? {
        Some(inv) => inv,
        None if delta < 0 => {
            return Err(StockError::NotFound(format!(
                "no holding of item {} at store {}",
                item_id, store_id
            )));
        }
        None => {
            let now = Utc::now();
            let created = store_inventory::ActiveModel {
                store_id: Set(store_id),
                item_id: Set(item_id),
                quantity: Set(0),
                reserved_quantity: Set(0),
                safety_stock_level: Set(default_safety_stock),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            };
            created.insert(txn).await?
        }
    };

    let previous = inventory.quantity;
    let resulting = previous + delta;
    if resulting < 0 {
        return Err(StockError::InsufficientStock {
            store_id,
            item_id,
            requested: -delta,
            on_hand: previous,
        });
    }
    if resulting < inventory.reserved_quantity {
        // Shipping reserved stock out from under a pending transfer would
        // push available below zero.
        return Err(StockError::InsufficientAvailableStock {
            store_id,
            item_id,
            requested: -delta,
            available: inventory.available_quantity(),
        });
    }

    let mut active: store_inventory::ActiveModel = inventory.into();
    active.quantity = Set(resulting);
    active.updated_at = Set(Utc::now());
    let updated = active.update(txn).await?;

    let entry = insert_ledger_entry(
        txn,
        store_id,
        item_id,
        delta,
        operation_type,
        previous,
        resulting,
        reference_id,
    )
    .await?;

    Ok((updated, entry))
}

/// Adjusts the reserved portion of a holding and appends the matching
/// zero-delta ledger entry (reservations hold stock, they do not move it).
pub(crate) async fn adjust_reservation(
    txn: &DatabaseTransaction,
    store_id: i64,
    item_id: i64,
    reserved_delta: i32,
    operation_type: OperationType,
    reference_id: Option<Uuid>,
) -> Result<(store_inventory::Model, stock_ledger_entry::Model), StockError> {
    let inventory = find_inventory_for_update(txn, store_id, item_id)
        .await?
        .ok_or_else(|| {
            StockError::NotFound(format!(
                "no holding of item {} at store {}",
                item_id, store_id
            ))
        })?;

    let resulting_reserved = inventory.reserved_quantity + reserved_delta;
    if reserved_delta > 0 && inventory.available_quantity() < reserved_delta {
        return Err(StockError::InsufficientAvailableStock {
            store_id,
            item_id,
            requested: reserved_delta,
            available: inventory.available_quantity(),
        });
    }
    if resulting_reserved < 0 {
        return Err(StockError::InvalidState(format!(
            "releasing {} would leave reserved_quantity of item {} at store {} negative ({} held)",
            -reserved_delta, item_id, store_id, inventory.reserved_quantity
        )));
    }

    let quantity = inventory.quantity;
    let mut active: store_inventory::ActiveModel = inventory.into();
    active.reserved_quantity = Set(resulting_reserved);
    active.updated_at = Set(Utc::now());
    let updated = active.update(txn).await?;

    let entry = insert_ledger_entry(
        txn,
        store_id,
        item_id,
        0,
        operation_type,
        quantity,
        quantity,
        reference_id,
    )
    .await?;

    Ok((updated, entry))
}

/// Service exposing ledger-backed stock movements against store holdings.
#[derive(Clone)]
pub struct StockLedgerService {
    db: Arc<DbPool>,
    event_sender: EventSender,
    settings: StockSettings,
}

impl StockLedgerService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, settings: StockSettings) -> Self {
        Self {
            db,
            event_sender,
            settings,
        }
    }

    async fn with_lock_timeout<T>(
        &self,
        store_id: i64,
        item_id: i64,
        fut: impl Future<Output = Result<T, TransactionError<StockError>>>,
    ) -> Result<T, StockError> {
        super::with_lock_timeout(self.settings.lock_timeout(), store_id, item_id, fut).await
    }

    /// Appends a ledger entry and atomically applies its delta to the
    /// holding's quantity.
    #[instrument(skip(self))]
    pub async fn record_movement(
        &self,
        store_id: i64,
        item_id: i64,
        delta: i32,
        operation_type: OperationType,
        reference_id: Option<Uuid>,
    ) -> Result<stock_ledger_entry::Model, StockError> {
        let default_safety_stock = self.settings.default_safety_stock;
        let op = operation_type.clone();
        let txn_fut = self
            .db
            .transaction::<_, stock_ledger_entry::Model, StockError>(move |txn| {
                Box::pin(async move {
                    let (_, entry) = apply_quantity_delta(
                        txn,
                        store_id,
                        item_id,
                        delta,
                        op,
                        reference_id,
                        default_safety_stock,
                    )
                    .await?;
                    Ok(entry)
                })
            });

        let entry = self.with_lock_timeout(store_id, item_id, txn_fut).await?;
        info!(
            store_id,
            item_id,
            delta,
            resulting = entry.resulting_quantity,
            "Recorded stock movement"
        );
        Ok(entry)
    }

    /// Receives a new lot into a store: creates the batch and credits the
    /// holding in one transaction.
    #[instrument(skip(self))]
    pub async fn receive_batch(
        &self,
        store_id: i64,
        item_id: i64,
        batch_number: &str,
        quantity: i32,
        expiry_date: Option<chrono::NaiveDate>,
        unit_cost: Option<rust_decimal::Decimal>,
    ) -> Result<(batch::Model, stock_ledger_entry::Model), StockError> {
        if quantity <= 0 {
            return Err(StockError::Validation(format!(
                "batch quantity must be positive, got {}",
                quantity
            )));
        }
        let default_safety_stock = self.settings.default_safety_stock;
        let batch_number = batch_number.to_string();
        let txn_fut = self
            .db
            .transaction::<_, (batch::Model, stock_ledger_entry::Model), StockError>(move |txn| {
                Box::pin(async move {
                    let now = Utc::now();
                    let lot = batch::ActiveModel {
                        item_id: Set(item_id),
                        batch_number: Set(batch_number),
                        quantity: Set(quantity),
                        initial_quantity: Set(quantity),
                        unit_cost: Set(unit_cost),
                        expiry_date: Set(expiry_date),
                        received_at: Set(now),
                        created_at: Set(now),
                        ..Default::default()
                    };
                    let lot = lot.insert(txn).await?;

                    // Place the whole lot at the receiving store so per-store
                    // movement sums are exact from the first day.
                    let placement = batch_movement::ActiveModel {
                        batch_id: Set(lot.batch_id),
                        store_id: Set(store_id),
                        quantity: Set(quantity),
                        transfer_id: Set(None),
                        moved_at: Set(now),
                        ..Default::default()
                    };
                    placement.insert(txn).await?;

                    let (_, entry) = apply_quantity_delta(
                        txn,
                        store_id,
                        item_id,
                        quantity,
                        OperationType::Receive,
                        None,
                        default_safety_stock,
                    )
                    .await?;
                    Ok((lot, entry))
                })
            });

        let (lot, entry) = self.with_lock_timeout(store_id, item_id, txn_fut).await?;
        self.event_sender
            .emit(Event::StockReceived {
                store_id,
                item_id,
                batch_id: lot.batch_id,
                quantity,
            })
            .await;
        Ok((lot, entry))
    }

    /// Places a soft hold on available stock. Fails with
    /// `InsufficientAvailableStock` when the uncommitted remainder cannot
    /// cover the request, even if total stock could.
    #[instrument(skip(self))]
    pub async fn reserve(
        &self,
        store_id: i64,
        item_id: i64,
        quantity: i32,
        reference_id: Option<Uuid>,
    ) -> Result<stock_ledger_entry::Model, StockError> {
        if quantity <= 0 {
            return Err(StockError::Validation(format!(
                "reservation quantity must be positive, got {}",
                quantity
            )));
        }
        let txn_fut = self
            .db
            .transaction::<_, stock_ledger_entry::Model, StockError>(move |txn| {
                Box::pin(async move {
                    let (_, entry) = adjust_reservation(
                        txn,
                        store_id,
                        item_id,
                        quantity,
                        OperationType::TransferReserve,
                        reference_id,
                    )
                    .await?;
                    Ok(entry)
                })
            });
        self.with_lock_timeout(store_id, item_id, txn_fut).await
    }

    /// Releases a previously placed hold.
    #[instrument(skip(self))]
    pub async fn release_reservation(
        &self,
        store_id: i64,
        item_id: i64,
        quantity: i32,
        reference_id: Option<Uuid>,
    ) -> Result<stock_ledger_entry::Model, StockError> {
        if quantity <= 0 {
            return Err(StockError::Validation(format!(
                "release quantity must be positive, got {}",
                quantity
            )));
        }
        let txn_fut = self
            .db
            .transaction::<_, stock_ledger_entry::Model, StockError>(move |txn| {
                Box::pin(async move {
                    let (_, entry) = adjust_reservation(
                        txn,
                        store_id,
                        item_id,
                        -quantity,
                        OperationType::TransferRelease,
                        reference_id,
                    )
                    .await?;
                    Ok(entry)
                })
            });
        self.with_lock_timeout(store_id, item_id, txn_fut).await
    }

    #[instrument(skip(self))]
    pub async fn get_inventory(
        &self,
        store_id: i64,
        item_id: i64,
    ) -> Result<Option<store_inventory::Model>, StockError> {
        StoreInventory::find()
            .filter(store_inventory::Column::StoreId.eq(store_id))
            .filter(store_inventory::Column::ItemId.eq(item_id))
            .one(self.db.as_ref())
            .await
            .map_err(StockError::from)
    }

    /// Paginated ledger history for a holding, newest first.
    #[instrument(skip(self))]
    pub async fn ledger_history(
        &self,
        store_id: i64,
        item_id: i64,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<stock_ledger_entry::Model>, u64), StockError> {
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

        let paginator = StockLedgerEntry::find()
            .filter(stock_ledger_entry::Column::StoreId.eq(store_id))
            .filter(stock_ledger_entry::Column::ItemId.eq(item_id))
            .order_by_desc(stock_ledger_entry::Column::CreatedAt)
            .paginate(self.db.as_ref(), limit);

        let total = paginator.num_items().await?;
        let entries = paginator.fetch_page(page - 1).await?;
        Ok((entries, total))
    }

    /// Signed sum of ledger deltas for a holding. The ledger is ground
    /// truth: this must always equal the holding's cached quantity.
    #[instrument(skip(self))]
    pub async fn ledger_balance(&self, store_id: i64, item_id: i64) -> Result<i64, StockError> {
        let entries = StockLedgerEntry::find()
            .filter(stock_ledger_entry::Column::StoreId.eq(store_id))
            .filter(stock_ledger_entry::Column::ItemId.eq(item_id))
            .all(self.db.as_ref())
            .await?;

        Ok(entries.iter().map(|e| i64::from(e.delta)).sum())
    }
}
