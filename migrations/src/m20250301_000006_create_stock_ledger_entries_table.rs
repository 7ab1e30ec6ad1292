use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only audit table: no foreign keys, entries outlive everything
        // they reference.
        manager
            .create_table(
                Table::create()
                    .table(StockLedgerEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockLedgerEntries::EntryId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(StockLedgerEntries::StoreId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockLedgerEntries::ItemId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockLedgerEntries::Delta)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockLedgerEntries::OperationType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockLedgerEntries::PreviousQuantity)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockLedgerEntries::ResultingQuantity)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(StockLedgerEntries::ReferenceId)
                            .uuid()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(StockLedgerEntries::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-stock_ledger-store-item-created")
                    .table(StockLedgerEntries::Table)
                    .col(StockLedgerEntries::StoreId)
                    .col(StockLedgerEntries::ItemId)
                    .col(StockLedgerEntries::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StockLedgerEntries::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum StockLedgerEntries {
    Table,
    EntryId,
    StoreId,
    ItemId,
    Delta,
    OperationType,
    PreviousQuantity,
    ResultingQuantity,
    ReferenceId,
    CreatedAt,
}
