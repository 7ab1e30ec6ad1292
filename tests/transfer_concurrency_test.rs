mod common;

use std::sync::Arc;

use tokio::sync::mpsc;

use pharmstock_core::db;
use pharmstock_core::events::{process_events, EventSender};
use pharmstock_core::services::NewTransfer;
use pharmstock_core::StockCore;

// This test needs a database with real row locking (e.g. Postgres) and more
// than one connection; point DATABASE_URL at one and run with:
// cargo test -- --ignored concurrent_reservations
#[tokio::test]
#[ignore]
async fn concurrent_reservations_never_overcommit() {
    let url = std::env::var("DATABASE_URL")
        .expect("set DATABASE_URL to a row-locking database for this test");
    let pool = db::establish_connection(&url).await.expect("db connect");
    db::run_migrations(&pool).await.expect("migrations");

    let (tx, rx) = mpsc::channel(100);
    tokio::spawn(process_events(rx));
    let core = StockCore::new(Arc::new(pool), common::test_config(), EventSender::new(tx));

    let a = common::seed_store(&core.db, "PH-RACE-A").await;
    let b = common::seed_store(&core.db, "PH-RACE-B").await;
    let item = common::seed_item(&core.db, "RACE-SKU").await;
    core.ledger
        .receive_batch(a.store_id, item.item_id, "LOT-RACE", 50, None, None)
        .await
        .unwrap();

    // Two racers each want 30 of the 50 available: exactly one can win.
    let mut tasks = Vec::new();
    for _ in 0..2 {
        let core = core.clone();
        let (source, dest, item_id) = (a.store_id, b.store_id, item.item_id);
        tasks.push(tokio::spawn(async move {
            core.transfers
                .create_transfer(NewTransfer {
                    source_store_id: source,
                    destination_store_id: dest,
                    item_id,
                    quantity: 30,
                    requested_by: "racer".to_string(),
                    reason: None,
                    priority: Default::default(),
                })
                .await
                .is_ok()
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1, "exactly one of two competing 30-unit reservations may win");

    let inventory = core
        .ledger
        .get_inventory(a.store_id, item.item_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(inventory.reserved_quantity, 30);
    assert!(inventory.reserved_quantity <= inventory.quantity);
}
