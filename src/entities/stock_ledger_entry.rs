use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Kinds of quantity-changing operations recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum OperationType {
    #[sea_orm(string_value = "receive")]
    Receive,
    #[sea_orm(string_value = "ship")]
    Ship,
    #[sea_orm(string_value = "adjust")]
    Adjust,
    #[sea_orm(string_value = "transfer_reserve")]
    TransferReserve,
    #[sea_orm(string_value = "transfer_commit")]
    TransferCommit,
    #[sea_orm(string_value = "transfer_release")]
    TransferRelease,
}

/// One quantity delta against one store's holding of an item, at one point in
/// time. Append-only: entries are never mutated or deleted; the only way to
/// undo an operation is a compensating entry.
///
/// Reservation and release entries carry `delta: 0` — they record the hold,
/// not an on-hand change — so the signed sum of deltas for a (store, item)
/// pair always equals the holding's current quantity.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub entry_id: Uuid,
    pub store_id: i64,
    pub item_id: i64,
    pub delta: i32,
    pub operation_type: OperationType,
    pub previous_quantity: i32,
    pub resulting_quantity: i32,
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}
