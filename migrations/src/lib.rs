pub use sea_orm_migration::prelude::*;

mod m20250301_000001_create_stores_table;
mod m20250301_000002_create_items_table;
mod m20250301_000003_create_store_inventories_table;
mod m20250301_000004_create_batches_table;
mod m20250301_000005_create_batch_movements_table;
mod m20250301_000006_create_stock_ledger_entries_table;
mod m20250301_000007_create_inter_store_transfers_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_stores_table::Migration),
            Box::new(m20250301_000002_create_items_table::Migration),
            Box::new(m20250301_000003_create_store_inventories_table::Migration),
            Box::new(m20250301_000004_create_batches_table::Migration),
            Box::new(m20250301_000005_create_batch_movements_table::Migration),
            Box::new(m20250301_000006_create_stock_ledger_entries_table::Migration),
            Box::new(m20250301_000007_create_inter_store_transfers_table::Migration),
        ]
    }
}
