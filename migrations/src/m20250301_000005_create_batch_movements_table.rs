use sea_orm_migration::prelude::*;

use super::m20250301_000001_create_stores_table::Stores;
use super::m20250301_000004_create_batches_table::Batches;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BatchMovements::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BatchMovements::MovementId)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(BatchMovements::BatchId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BatchMovements::StoreId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BatchMovements::Quantity)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BatchMovements::TransferId).uuid().null())
                    .col(
                        ColumnDef::new(BatchMovements::MovedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-batch_movements-batch_id")
                            .from(BatchMovements::Table, BatchMovements::BatchId)
                            .to(Batches::Table, Batches::BatchId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-batch_movements-store_id")
                            .from(BatchMovements::Table, BatchMovements::StoreId)
                            .to(Stores::Table, Stores::StoreId),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-batch_movements-batch-store")
                    .table(BatchMovements::Table)
                    .col(BatchMovements::BatchId)
                    .col(BatchMovements::StoreId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-batch_movements-transfer")
                    .table(BatchMovements::Table)
                    .col(BatchMovements::TransferId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BatchMovements::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum BatchMovements {
    Table,
    MovementId,
    BatchId,
    StoreId,
    Quantity,
    TransferId,
    MovedAt,
}
