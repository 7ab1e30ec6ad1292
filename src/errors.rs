use sea_orm::error::DbErr;
use sea_orm::TransactionError;

/// Error taxonomy for the stock core.
///
/// Business-rule rejections (insufficient stock, illegal transitions) are
/// ordinary failure paths surfaced to the caller; nothing is swallowed
/// internally. Each variant carries the identifiers and quantities needed to
/// render a precise message.
#[derive(Debug, thiserror::Error)]
pub enum StockError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("insufficient stock for item {item_id} at store {store_id}: requested {requested}, on hand {on_hand}")]
    InsufficientStock {
        store_id: i64,
        item_id: i64,
        requested: i32,
        on_hand: i32,
    },

    /// Stock exists but is already earmarked by other pending transfers.
    #[error("insufficient available stock for item {item_id} at store {store_id}: requested {requested}, available {available}")]
    InsufficientAvailableStock {
        store_id: i64,
        item_id: i64,
        requested: i32,
        available: i32,
    },

    #[error("insufficient batch stock for item {item_id} at store {store_id}: {shortfall} of {requested} unallocatable")]
    InsufficientBatchStock {
        store_id: i64,
        item_id: i64,
        requested: i32,
        shortfall: i32,
    },

    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Optimistic re-validation at commit found the planned batches changed
    /// underneath the plan. The caller may re-plan from scratch; the core
    /// never retries on its own.
    #[error("concurrent modification of batch {batch_id}: planned {planned}, available {available}")]
    ConcurrentModification {
        batch_id: i64,
        planned: i32,
        available: i32,
    },

    #[error("lock timeout for item {item_id} at store {store_id}")]
    LockTimeout { store_id: i64, item_id: i64 },

    #[error("event dispatch error: {0}")]
    Event(String),
}

impl From<validator::ValidationErrors> for StockError {
    fn from(err: validator::ValidationErrors) -> Self {
        StockError::Validation(err.to_string())
    }
}

impl From<TransactionError<StockError>> for StockError {
    fn from(err: TransactionError<StockError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => StockError::Database(db_err),
            TransactionError::Transaction(stock_err) => stock_err,
        }
    }
}

impl StockError {
    /// Label used for failure metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            StockError::Database(_) => "database",
            StockError::NotFound(_) => "not_found",
            StockError::Validation(_) => "validation",
            StockError::InsufficientStock { .. } => "insufficient_stock",
            StockError::InsufficientAvailableStock { .. } => "insufficient_available_stock",
            StockError::InsufficientBatchStock { .. } => "insufficient_batch_stock",
            StockError::InvalidState(_) => "invalid_state",
            StockError::ConcurrentModification { .. } => "concurrent_modification",
            StockError::LockTimeout { .. } => "lock_timeout",
            StockError::Event(_) => "event",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_quantities() {
        let err = StockError::InsufficientAvailableStock {
            store_id: 1,
            item_id: 7,
            requested: 30,
            available: 20,
        };
        let msg = err.to_string();
        assert!(msg.contains("item 7"));
        assert!(msg.contains("store 1"));
        assert!(msg.contains("requested 30"));
        assert!(msg.contains("available 20"));
        assert_eq!(err.kind(), "insufficient_available_stock");
    }

    #[test]
    fn transaction_error_unwraps_inner_variant() {
        let inner = StockError::InvalidState("pending only".into());
        let wrapped: StockError = TransactionError::Transaction(inner).into();
        assert_matches::assert_matches!(wrapped, StockError::InvalidState(_));
    }
}
