pub mod batch;
pub mod batch_movement;
pub mod inter_store_transfer;
pub mod item;
pub mod stock_ledger_entry;
pub mod store;
pub mod store_inventory;
