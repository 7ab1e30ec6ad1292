use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum StoreType {
    #[sea_orm(string_value = "pharmacy")]
    Pharmacy,
    #[sea_orm(string_value = "warehouse")]
    Warehouse,
    #[sea_orm(string_value = "headquarters")]
    Headquarters,
}

/// A physical location. The three `*_count` columns are denormalized
/// aggregates maintained best-effort on writes; the reconciliation service is
/// authoritative for their values.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stores")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub store_id: i64,
    #[sea_orm(unique)]
    pub code: String,
    pub name: String,
    pub store_type: StoreType,
    pub active: bool,
    pub pending_outbound_count: i32,
    pub pending_inbound_count: i32,
    pub low_stock_items_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::store_inventory::Entity")]
    StoreInventories,
    #[sea_orm(has_many = "super::batch_movement::Entity")]
    BatchMovements,
}

impl Related<super::store_inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StoreInventories.def()
    }
}

impl Related<super::batch_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BatchMovements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
