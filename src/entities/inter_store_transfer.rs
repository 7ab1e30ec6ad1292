use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum TransferStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl TransferStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Cancelled)
    }

    /// Legal forward edges of the transfer state machine.
    pub fn can_transition_to(&self, next: &TransferStatus) -> bool {
        matches!(
            (self, next),
            (TransferStatus::Pending, TransferStatus::Approved)
                | (TransferStatus::Pending, TransferStatus::Cancelled)
                | (TransferStatus::Approved, TransferStatus::Completed)
                | (TransferStatus::Approved, TransferStatus::Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Approved => "approved",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum TransferPriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "normal")]
    Normal,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "urgent")]
    Urgent,
}

impl Default for TransferPriority {
    fn default() -> Self {
        TransferPriority::Normal
    }
}

/// A request to move a quantity of an item between two stores. Rows are
/// audit-relevant and never deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inter_store_transfers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub transfer_id: Uuid,
    pub source_store_id: i64,
    pub destination_store_id: i64,
    pub item_id: i64,
    pub quantity: i32,
    pub status: TransferStatus,
    pub requested_by: String,
    pub approved_by: Option<String>,
    pub reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub priority: TransferPriority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_have_no_exits() {
        for next in [
            TransferStatus::Pending,
            TransferStatus::Approved,
            TransferStatus::Completed,
            TransferStatus::Cancelled,
        ] {
            assert!(!TransferStatus::Completed.can_transition_to(&next));
            assert!(!TransferStatus::Cancelled.can_transition_to(&next));
        }
    }

    #[test]
    fn pending_can_be_approved_or_cancelled() {
        assert!(TransferStatus::Pending.can_transition_to(&TransferStatus::Approved));
        assert!(TransferStatus::Pending.can_transition_to(&TransferStatus::Cancelled));
        assert!(!TransferStatus::Pending.can_transition_to(&TransferStatus::Completed));
    }

    #[test]
    fn approved_can_complete_or_cancel() {
        assert!(TransferStatus::Approved.can_transition_to(&TransferStatus::Completed));
        assert!(TransferStatus::Approved.can_transition_to(&TransferStatus::Cancelled));
        assert!(!TransferStatus::Approved.can_transition_to(&TransferStatus::Pending));
    }
}
