use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A lot of an item. `quantity` is the portion still in the origin pool (not
/// yet placed at a store through movements); `0 <= quantity <=
/// initial_quantity`. Fully consumed batches stay as zero-quantity history.
///
/// `expiry_date: None` means the lot carries no expiry tracking and sorts
/// after every dated lot during allocation.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "batches")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub batch_id: i64,
    pub item_id: i64,
    pub batch_number: String,
    pub quantity: i32,
    pub initial_quantity: i32,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_cost: Option<Decimal>,
    pub expiry_date: Option<NaiveDate>,
    pub received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::ItemId"
    )]
    Item,
    #[sea_orm(has_many = "super::batch_movement::Entity")]
    BatchMovements,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl Related<super::batch_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BatchMovements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
