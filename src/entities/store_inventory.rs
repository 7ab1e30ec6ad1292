use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-(store, item) holding record.
///
/// Invariant: `0 <= reserved_quantity <= quantity` at all times. Rows are
/// created on the first stock event for the pair and never deleted while
/// either quantity is nonzero.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "store_inventories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub store_inventory_id: i64,
    pub store_id: i64,
    pub item_id: i64,
    pub quantity: i32,
    pub reserved_quantity: i32,
    pub safety_stock_level: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Derived, never stored: the portion of on-hand stock not earmarked for
    /// in-flight outbound transfers.
    pub fn available_quantity(&self) -> i32 {
        self.quantity - self.reserved_quantity
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity < self.safety_stock_level
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::store::Entity",
        from = "Column::StoreId",
        to = "super::store::Column::StoreId"
    )]
    Store,
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::ItemId"
    )]
    Item,
}

impl Related<super::store::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Store.def()
    }
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
