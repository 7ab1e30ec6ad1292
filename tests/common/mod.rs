#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use tokio::sync::mpsc;

use pharmstock_core::config::{AppConfig, StockSettings};
use pharmstock_core::db::{self, DbPool};
use pharmstock_core::entities::{
    item,
    store::{self, StoreType},
    store_inventory,
};
use pharmstock_core::events::{process_events, EventSender};
use pharmstock_core::StockCore;

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".to_string(),
        environment: "test".to_string(),
        log_level: "warn".to_string(),
        stock: StockSettings::default(),
    }
}

/// In-memory SQLite with migrations applied and a logging event consumer.
pub async fn setup_core() -> StockCore {
    pharmstock_core::logging::init_tracing("warn");

    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).sqlx_logging(false);
    let pool = Database::connect(options).await.expect("connect test db");
    db::run_migrations(&pool).await.expect("run migrations");

    let (tx, rx) = mpsc::channel(100);
    tokio::spawn(process_events(rx));

    StockCore::new(Arc::new(pool), test_config(), EventSender::new(tx))
}

pub async fn seed_store(db: &DbPool, code: &str) -> store::Model {
    let now = Utc::now();
    store::ActiveModel {
        code: Set(code.to_string()),
        name: Set(format!("{} pharmacy", code)),
        store_type: Set(StoreType::Pharmacy),
        active: Set(true),
        pending_outbound_count: Set(0),
        pending_inbound_count: Set(0),
        low_stock_items_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed store")
}

pub async fn seed_item(db: &DbPool, sku: &str) -> item::Model {
    item::ActiveModel {
        sku: Set(sku.to_string()),
        name: Set(format!("item {}", sku)),
        unit_price: Set(dec!(9.99)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed item")
}

pub async fn seed_inventory(
    db: &DbPool,
    store_id: i64,
    item_id: i64,
    quantity: i32,
    reserved: i32,
    safety: i32,
) -> store_inventory::Model {
    let now = Utc::now();
    store_inventory::ActiveModel {
        store_id: Set(store_id),
        item_id: Set(item_id),
        quantity: Set(quantity),
        reserved_quantity: Set(reserved),
        safety_stock_level: Set(safety),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed inventory")
}

pub fn date(s: &str) -> NaiveDate {
    s.parse().expect("valid date literal")
}
