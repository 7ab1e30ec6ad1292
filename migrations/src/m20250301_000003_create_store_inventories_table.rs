use sea_orm_migration::prelude::*;

use super::m20250301_000001_create_stores_table::Stores;
use super::m20250301_000002_create_items_table::Items;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StoreInventories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StoreInventories::StoreInventoryId)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(StoreInventories::StoreId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StoreInventories::ItemId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StoreInventories::Quantity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StoreInventories::ReservedQuantity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StoreInventories::SafetyStockLevel)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(StoreInventories::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StoreInventories::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-store_inventories-store_id")
                            .from(StoreInventories::Table, StoreInventories::StoreId)
                            .to(Stores::Table, Stores::StoreId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-store_inventories-item_id")
                            .from(StoreInventories::Table, StoreInventories::ItemId)
                            .to(Items::Table, Items::ItemId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-store_inventories-store-item")
                    .table(StoreInventories::Table)
                    .col(StoreInventories::StoreId)
                    .col(StoreInventories::ItemId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StoreInventories::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum StoreInventories {
    Table,
    StoreInventoryId,
    StoreId,
    ItemId,
    Quantity,
    ReservedQuantity,
    SafetyStockLevel,
    CreatedAt,
    UpdatedAt,
}
