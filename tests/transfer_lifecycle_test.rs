mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use pharmstock_core::entities::{
    batch_movement,
    inter_store_transfer::{self, TransferPriority, TransferStatus},
    store,
};
use pharmstock_core::services::{NewTransfer, TransferFilter};
use pharmstock_core::StockError;

fn request(source: i64, dest: i64, item: i64, quantity: i32) -> NewTransfer {
    NewTransfer {
        source_store_id: source,
        destination_store_id: dest,
        item_id: item,
        quantity,
        requested_by: "clerk".to_string(),
        reason: Some("weekly restock".to_string()),
        priority: TransferPriority::Normal,
    }
}

#[tokio::test]
async fn transfer_happy_path_moves_stock_and_batches() {
    let core = common::setup_core().await;
    let a = common::seed_store(&core.db, "PH-A").await;
    let b = common::seed_store(&core.db, "PH-B").await;
    let item = common::seed_item(&core.db, "ENALAPRIL-10").await;

    core.ledger
        .receive_batch(
            a.store_id,
            item.item_id,
            "LOT-1",
            50,
            Some(common::date("2025-09-01")),
            None,
        )
        .await
        .unwrap();

    let transfer = core
        .transfers
        .create_transfer(request(a.store_id, b.store_id, item.item_id, 20))
        .await
        .unwrap();
    assert_eq!(transfer.status, TransferStatus::Pending);

    let source = core
        .ledger
        .get_inventory(a.store_id, item.item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.quantity, 50);
    assert_eq!(source.reserved_quantity, 20);

    let a_row = store::Entity::find_by_id(a.store_id)
        .one(core.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    let b_row = store::Entity::find_by_id(b.store_id)
        .one(core.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a_row.pending_outbound_count, 1);
    assert_eq!(b_row.pending_inbound_count, 1);

    let approved = core
        .transfers
        .approve_transfer(transfer.transfer_id, "manager")
        .await
        .unwrap();
    assert_eq!(approved.status, TransferStatus::Approved);
    assert_eq!(approved.approved_by.as_deref(), Some("manager"));

    let completed = core
        .transfers
        .execute_transfer(transfer.transfer_id)
        .await
        .unwrap();
    assert_eq!(completed.status, TransferStatus::Completed);

    let source = core
        .ledger
        .get_inventory(a.store_id, item.item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(source.quantity, 30);
    assert_eq!(source.reserved_quantity, 0);

    let dest = core
        .ledger
        .get_inventory(b.store_id, item.item_id)
        .await
        .unwrap()
        .expect("destination holding created by the credit");
    assert_eq!(dest.quantity, 20);
    assert_eq!(dest.reserved_quantity, 0);

    // The ledger stays ground truth on both sides.
    assert_eq!(
        core.ledger
            .ledger_balance(a.store_id, item.item_id)
            .await
            .unwrap(),
        30
    );
    assert_eq!(
        core.ledger
            .ledger_balance(b.store_id, item.item_id)
            .await
            .unwrap(),
        20
    );

    // Movement rows for the transfer put 20 units at the destination.
    let movements = batch_movement::Entity::find()
        .filter(batch_movement::Column::TransferId.eq(transfer.transfer_id))
        .all(core.db.as_ref())
        .await
        .unwrap();
    let at_destination: i32 = movements
        .iter()
        .filter(|m| m.store_id == b.store_id)
        .map(|m| m.quantity)
        .sum();
    let at_source: i32 = movements
        .iter()
        .filter(|m| m.store_id == a.store_id)
        .map(|m| m.quantity)
        .sum();
    assert_eq!(at_destination, 20);
    assert_eq!(at_source, -20);

    let a_row = store::Entity::find_by_id(a.store_id)
        .one(core.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    let b_row = store::Entity::find_by_id(b.store_id)
        .one(core.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a_row.pending_outbound_count, 0);
    assert_eq!(b_row.pending_inbound_count, 0);
}

#[tokio::test]
async fn insufficient_stock_persists_nothing() {
    let core = common::setup_core().await;
    let a = common::seed_store(&core.db, "PH-A").await;
    let b = common::seed_store(&core.db, "PH-B").await;
    let item = common::seed_item(&core.db, "LISINOPRIL-20").await;

    core.ledger
        .receive_batch(a.store_id, item.item_id, "LOT-1", 50, None, None)
        .await
        .unwrap();

    let err = core
        .transfers
        .create_transfer(request(a.store_id, b.store_id, item.item_id, 1000))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        StockError::InsufficientAvailableStock {
            requested: 1000,
            available: 50,
            ..
        }
    );

    let (_, total) = core
        .transfers
        .list_transfers(TransferFilter::default(), 1, 10)
        .await
        .unwrap();
    assert_eq!(total, 0);

    let inventory = core
        .ledger
        .get_inventory(a.store_id, item.item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(inventory.reserved_quantity, 0);

    // Only the receipt is on the ledger; the failed reservation left no
    // trace.
    let (_, entries) = core
        .ledger
        .ledger_history(a.store_id, item.item_id, 1, 10)
        .await
        .unwrap();
    assert_eq!(entries, 1);
}

#[tokio::test]
async fn same_store_and_unknown_ids_are_rejected_up_front() {
    let core = common::setup_core().await;
    let a = common::seed_store(&core.db, "PH-A").await;
    let item = common::seed_item(&core.db, "BISOPROLOL-5").await;

    let err = core
        .transfers
        .create_transfer(request(a.store_id, a.store_id, item.item_id, 5))
        .await
        .unwrap_err();
    assert_matches!(err, StockError::Validation(_));

    let err = core
        .transfers
        .create_transfer(request(a.store_id, 9999, item.item_id, 5))
        .await
        .unwrap_err();
    assert_matches!(err, StockError::NotFound(_));
}

#[tokio::test]
async fn self_approval_is_rejected() {
    let core = common::setup_core().await;
    let a = common::seed_store(&core.db, "PH-A").await;
    let b = common::seed_store(&core.db, "PH-B").await;
    let item = common::seed_item(&core.db, "DICLOFENAC-50").await;

    core.ledger
        .receive_batch(a.store_id, item.item_id, "LOT-1", 30, None, None)
        .await
        .unwrap();
    let transfer = core
        .transfers
        .create_transfer(request(a.store_id, b.store_id, item.item_id, 10))
        .await
        .unwrap();

    let err = core
        .transfers
        .approve_transfer(transfer.transfer_id, "clerk")
        .await
        .unwrap_err();
    assert_matches!(err, StockError::Validation(_));

    let unchanged = core
        .transfers
        .get_transfer(transfer.transfer_id)
        .await
        .unwrap();
    assert_eq!(unchanged.status, TransferStatus::Pending);
}

#[tokio::test]
async fn illegal_transitions_surface_invalid_state() {
    let core = common::setup_core().await;
    let a = common::seed_store(&core.db, "PH-A").await;
    let b = common::seed_store(&core.db, "PH-B").await;
    let item = common::seed_item(&core.db, "SERTRALINE-50").await;

    core.ledger
        .receive_batch(a.store_id, item.item_id, "LOT-1", 30, None, None)
        .await
        .unwrap();
    let transfer = core
        .transfers
        .create_transfer(request(a.store_id, b.store_id, item.item_id, 10))
        .await
        .unwrap();

    // Executing before approval is illegal.
    let err = core
        .transfers
        .execute_transfer(transfer.transfer_id)
        .await
        .unwrap_err();
    assert_matches!(err, StockError::InvalidState(_));

    core.transfers
        .approve_transfer(transfer.transfer_id, "manager")
        .await
        .unwrap();

    // Approving twice is illegal.
    let err = core
        .transfers
        .approve_transfer(transfer.transfer_id, "manager")
        .await
        .unwrap_err();
    assert_matches!(err, StockError::InvalidState(_));

    core.transfers
        .execute_transfer(transfer.transfer_id)
        .await
        .unwrap();

    // Completed is terminal: no cancel, no re-execute.
    let err = core
        .transfers
        .cancel_transfer(transfer.transfer_id, None)
        .await
        .unwrap_err();
    assert_matches!(err, StockError::InvalidState(_));
    let err = core
        .transfers
        .execute_transfer(transfer.transfer_id)
        .await
        .unwrap_err();
    assert_matches!(err, StockError::InvalidState(_));
}

#[tokio::test]
async fn cancellation_releases_the_reservation() {
    let core = common::setup_core().await;
    let a = common::seed_store(&core.db, "PH-A").await;
    let b = common::seed_store(&core.db, "PH-B").await;
    let item = common::seed_item(&core.db, "PANTOPRAZOLE-40").await;

    core.ledger
        .receive_batch(a.store_id, item.item_id, "LOT-1", 50, None, None)
        .await
        .unwrap();
    let transfer = core
        .transfers
        .create_transfer(request(a.store_id, b.store_id, item.item_id, 20))
        .await
        .unwrap();

    let cancelled = core
        .transfers
        .cancel_transfer(transfer.transfer_id, Some("shelf miscount".to_string()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, TransferStatus::Cancelled);
    assert_eq!(
        cancelled.cancellation_reason.as_deref(),
        Some("shelf miscount")
    );

    let inventory = core
        .ledger
        .get_inventory(a.store_id, item.item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(inventory.quantity, 50);
    assert_eq!(inventory.reserved_quantity, 0);

    let a_row = store::Entity::find_by_id(a.store_id)
        .one(core.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(a_row.pending_outbound_count, 0);
}

#[tokio::test]
async fn expiry_sweep_cancels_stale_pending_transfers() {
    let core = common::setup_core().await;
    let a = common::seed_store(&core.db, "PH-A").await;
    let b = common::seed_store(&core.db, "PH-B").await;
    let item = common::seed_item(&core.db, "SALBUTAMOL-INH").await;

    core.ledger
        .receive_batch(a.store_id, item.item_id, "LOT-1", 40, None, None)
        .await
        .unwrap();
    let transfer = core
        .transfers
        .create_transfer(request(a.store_id, b.store_id, item.item_id, 15))
        .await
        .unwrap();

    // Age the request past the 48h reservation TTL.
    let mut active: inter_store_transfer::ActiveModel = transfer.clone().into();
    active.created_at = Set(Utc::now() - Duration::hours(72));
    active.update(core.db.as_ref()).await.unwrap();

    let sweep = core.transfers.expire_stale_reservations().await.unwrap();
    assert_eq!(sweep.cancelled_count, 1);

    let swept = core
        .transfers
        .get_transfer(transfer.transfer_id)
        .await
        .unwrap();
    assert_eq!(swept.status, TransferStatus::Cancelled);

    let inventory = core
        .ledger
        .get_inventory(a.store_id, item.item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(inventory.reserved_quantity, 0);

    // The reservation it re-validates is gone, and so is the pending state.
    let err = core
        .transfers
        .approve_transfer(transfer.transfer_id, "manager")
        .await
        .unwrap_err();
    assert_matches!(err, StockError::InvalidState(_));
}

#[tokio::test]
async fn listing_filters_by_store_and_status() {
    let core = common::setup_core().await;
    let a = common::seed_store(&core.db, "PH-A").await;
    let b = common::seed_store(&core.db, "PH-B").await;
    let c = common::seed_store(&core.db, "PH-C").await;
    let item = common::seed_item(&core.db, "PREDNISONE-5").await;

    core.ledger
        .receive_batch(a.store_id, item.item_id, "LOT-1", 60, None, None)
        .await
        .unwrap();
    core.ledger
        .receive_batch(c.store_id, item.item_id, "LOT-2", 60, None, None)
        .await
        .unwrap();

    let t1 = core
        .transfers
        .create_transfer(request(a.store_id, b.store_id, item.item_id, 10))
        .await
        .unwrap();
    core.transfers
        .create_transfer(request(c.store_id, b.store_id, item.item_id, 10))
        .await
        .unwrap();
    core.transfers
        .cancel_transfer(t1.transfer_id, None)
        .await
        .unwrap();

    let (rows, total) = core
        .transfers
        .list_transfers(
            TransferFilter {
                store_id: Some(a.store_id),
                status: None,
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].transfer_id, t1.transfer_id);

    let (rows, total) = core
        .transfers
        .list_transfers(
            TransferFilter {
                store_id: Some(b.store_id),
                status: Some(TransferStatus::Pending),
            },
            1,
            10,
        )
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].source_store_id, c.store_id);
}
