use sea_orm_migration::prelude::*;

use super::m20250301_000002_create_items_table::Items;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Batches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Batches::BatchId)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Batches::ItemId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Batches::BatchNumber)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Batches::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(Batches::InitialQuantity)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Batches::UnitCost).decimal_len(19, 4).null())
                    .col(ColumnDef::new(Batches::ExpiryDate).date().null())
                    .col(
                        ColumnDef::new(Batches::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Batches::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-batches-item_id")
                            .from(Batches::Table, Batches::ItemId)
                            .to(Items::Table, Items::ItemId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-batches-item-expiry")
                    .table(Batches::Table)
                    .col(Batches::ItemId)
                    .col(Batches::ExpiryDate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Batches::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Batches {
    Table,
    BatchId,
    ItemId,
    BatchNumber,
    Quantity,
    InitialQuantity,
    UnitCost,
    ExpiryDate,
    ReceivedAt,
    CreatedAt,
}
