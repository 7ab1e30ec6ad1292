use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InterStoreTransfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InterStoreTransfers::TransferId)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InterStoreTransfers::SourceStoreId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InterStoreTransfers::DestinationStoreId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InterStoreTransfers::ItemId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InterStoreTransfers::Quantity)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InterStoreTransfers::Status)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InterStoreTransfers::RequestedBy)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InterStoreTransfers::ApprovedBy)
                            .string_len(64)
                            .null(),
                    )
                    .col(ColumnDef::new(InterStoreTransfers::Reason).string().null())
                    .col(
                        ColumnDef::new(InterStoreTransfers::CancellationReason)
                            .string()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(InterStoreTransfers::Priority)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InterStoreTransfers::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InterStoreTransfers::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-source-status")
                    .table(InterStoreTransfers::Table)
                    .col(InterStoreTransfers::SourceStoreId)
                    .col(InterStoreTransfers::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transfers-destination-status")
                    .table(InterStoreTransfers::Table)
                    .col(InterStoreTransfers::DestinationStoreId)
                    .col(InterStoreTransfers::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InterStoreTransfers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum InterStoreTransfers {
    Table,
    TransferId,
    SourceStoreId,
    DestinationStoreId,
    ItemId,
    Quantity,
    Status,
    RequestedBy,
    ApprovedBy,
    Reason,
    CancellationReason,
    Priority,
    CreatedAt,
    UpdatedAt,
}
