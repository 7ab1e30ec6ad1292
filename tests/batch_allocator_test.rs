mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use uuid::Uuid;

use pharmstock_core::entities::{batch, batch_movement};
use pharmstock_core::services::BatchAllocator;
use pharmstock_core::StockError;

#[tokio::test]
async fn fefo_takes_nearest_expiry_first() {
    let core = common::setup_core().await;
    let store = common::seed_store(&core.db, "PH-001").await;
    let item = common::seed_item(&core.db, "INSULIN-GLARGINE").await;

    let (b1, _) = core
        .ledger
        .receive_batch(
            store.store_id,
            item.item_id,
            "LOT-JAN",
            10,
            Some(common::date("2025-01-01")),
            None,
        )
        .await
        .unwrap();
    let (b2, _) = core
        .ledger
        .receive_batch(
            store.store_id,
            item.item_id,
            "LOT-FEB",
            10,
            Some(common::date("2025-02-01")),
            None,
        )
        .await
        .unwrap();
    let (_b3, _) = core
        .ledger
        .receive_batch(store.store_id, item.item_id, "LOT-NODATE", 10, None, None)
        .await
        .unwrap();

    let allocator = BatchAllocator::new();
    let plan = allocator
        .plan(core.db.as_ref(), store.store_id, item.item_id, 15)
        .await
        .unwrap();

    assert_eq!(plan.lines.len(), 2);
    assert_eq!(plan.lines[0].batch_id, b1.batch_id);
    assert_eq!(plan.lines[0].quantity, 10);
    assert_eq!(plan.lines[1].batch_id, b2.batch_id);
    assert_eq!(plan.lines[1].quantity, 5);
}

#[tokio::test]
async fn fifo_tiebreak_on_equal_expiry_prefers_the_older_lot() {
    let core = common::setup_core().await;
    let store = common::seed_store(&core.db, "PH-001").await;
    let item = common::seed_item(&core.db, "WARFARIN-5").await;

    let expiry = Some(common::date("2025-06-01"));
    let (first, _) = core
        .ledger
        .receive_batch(store.store_id, item.item_id, "LOT-A", 10, expiry, None)
        .await
        .unwrap();
    let (second, _) = core
        .ledger
        .receive_batch(store.store_id, item.item_id, "LOT-B", 10, expiry, None)
        .await
        .unwrap();

    let allocator = BatchAllocator::new();
    let plan = allocator
        .plan(core.db.as_ref(), store.store_id, item.item_id, 12)
        .await
        .unwrap();

    assert_eq!(plan.lines[0].batch_id, first.batch_id);
    assert_eq!(plan.lines[0].quantity, 10);
    assert_eq!(plan.lines[1].batch_id, second.batch_id);
    assert_eq!(plan.lines[1].quantity, 2);
}

#[tokio::test]
async fn exhausted_lots_fail_without_partial_allocation() {
    let core = common::setup_core().await;
    let store = common::seed_store(&core.db, "PH-001").await;
    let item = common::seed_item(&core.db, "LEVOTHYROXINE-50").await;

    core.ledger
        .receive_batch(
            store.store_id,
            item.item_id,
            "LOT-ONLY",
            30,
            Some(common::date("2025-04-01")),
            None,
        )
        .await
        .unwrap();

    let allocator = BatchAllocator::new();
    let err = allocator
        .plan(core.db.as_ref(), store.store_id, item.item_id, 100)
        .await
        .unwrap_err();
    assert_matches!(
        err,
        StockError::InsufficientBatchStock {
            requested: 100,
            shortfall: 70,
            ..
        }
    );
}

#[tokio::test]
async fn stale_plan_is_rejected_at_apply_time() {
    let core = common::setup_core().await;
    let store = common::seed_store(&core.db, "PH-001").await;
    let other = common::seed_store(&core.db, "PH-002").await;
    let item = common::seed_item(&core.db, "ATORVASTATIN-20").await;

    let (lot, _) = core
        .ledger
        .receive_batch(
            store.store_id,
            item.item_id,
            "LOT-RACE",
            10,
            Some(common::date("2025-05-01")),
            None,
        )
        .await
        .unwrap();

    let allocator = BatchAllocator::new();
    let plan = allocator
        .plan(core.db.as_ref(), store.store_id, item.item_id, 10)
        .await
        .unwrap();

    // Another transfer drains most of the lot between planning and commit.
    batch_movement::ActiveModel {
        batch_id: Set(lot.batch_id),
        store_id: Set(store.store_id),
        quantity: Set(-7),
        transfer_id: Set(Some(Uuid::new_v4())),
        moved_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(core.db.as_ref())
    .await
    .unwrap();

    let txn = core.db.begin().await.unwrap();
    let err = allocator
        .apply(&txn, &plan, other.store_id, Uuid::new_v4())
        .await
        .unwrap_err();
    txn.rollback().await.unwrap();

    assert_matches!(
        err,
        StockError::ConcurrentModification {
            planned: 10,
            available: 3,
            ..
        }
    );
}

#[tokio::test]
async fn fully_moved_lot_stays_as_history_at_the_source() {
    let core = common::setup_core().await;
    let store = common::seed_store(&core.db, "PH-001").await;
    let other = common::seed_store(&core.db, "PH-002").await;
    let item = common::seed_item(&core.db, "RAMIPRIL-5").await;

    let (lot, _) = core
        .ledger
        .receive_batch(
            store.store_id,
            item.item_id,
            "LOT-ALL",
            10,
            Some(common::date("2025-03-01")),
            None,
        )
        .await
        .unwrap();

    let allocator = BatchAllocator::new();
    let plan = allocator
        .plan(core.db.as_ref(), store.store_id, item.item_id, 10)
        .await
        .unwrap();

    let txn = core.db.begin().await.unwrap();
    allocator
        .apply(&txn, &plan, other.store_id, Uuid::new_v4())
        .await
        .unwrap();
    txn.commit().await.unwrap();

    // The drained lot is never deleted; it just has nothing left to give at
    // the source.
    let survivor = batch::Entity::find_by_id(lot.batch_id)
        .one(core.db.as_ref())
        .await
        .unwrap()
        .expect("moved-out lot is kept as a historical record");
    assert_eq!(survivor.batch_number, "LOT-ALL");

    let at_source = allocator
        .availability_at(core.db.as_ref(), store.store_id, item.item_id)
        .await
        .unwrap();
    assert_eq!(at_source.len(), 1);
    assert_eq!(at_source[0].available, 0);

    // The whole lot now sits at the destination.
    let at_destination = allocator
        .availability_at(core.db.as_ref(), other.store_id, item.item_id)
        .await
        .unwrap();
    assert_eq!(at_destination.len(), 1);
    assert_eq!(at_destination[0].available, 10);
    assert!(at_destination[0].tracked);
}

#[tokio::test]
async fn legacy_lot_without_placements_falls_back_to_its_recorded_quantity() {
    let core = common::setup_core().await;
    let store = common::seed_store(&core.db, "PH-001").await;
    let other = common::seed_store(&core.db, "PH-002").await;
    let item = common::seed_item(&core.db, "NITROFURANTOIN-100").await;

    // A lot seeded outside the receiving flow: no placement rows at all.
    let now = Utc::now();
    batch::ActiveModel {
        item_id: Set(item.item_id),
        batch_number: Set("LOT-LEGACY".to_string()),
        quantity: Set(12),
        initial_quantity: Set(12),
        unit_cost: Set(None),
        expiry_date: Set(None),
        received_at: Set(now),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(core.db.as_ref())
    .await
    .unwrap();

    let allocator = BatchAllocator::new();
    let availability = allocator
        .availability_at(core.db.as_ref(), store.store_id, item.item_id)
        .await
        .unwrap();
    assert!(!availability[0].tracked);
    assert_eq!(availability[0].available, 12);

    let plan = allocator
        .plan(core.db.as_ref(), store.store_id, item.item_id, 5)
        .await
        .unwrap();

    let txn = core.db.begin().await.unwrap();
    allocator
        .apply(&txn, &plan, other.store_id, Uuid::new_v4())
        .await
        .unwrap();
    txn.commit().await.unwrap();

    // Applying registered the origin pool at the source; sums take over.
    let at_source = allocator
        .availability_at(core.db.as_ref(), store.store_id, item.item_id)
        .await
        .unwrap();
    assert!(at_source[0].tracked);
    assert_eq!(at_source[0].available, 7);

    let at_destination = allocator
        .availability_at(core.db.as_ref(), other.store_id, item.item_id)
        .await
        .unwrap();
    assert_eq!(at_destination[0].available, 5);
}
