use std::future::Future;
use std::time::Duration;

use sea_orm::TransactionError;

use crate::errors::StockError;

pub mod batch_allocator;
pub mod reconciliation;
pub mod stock_ledger;
pub mod transfers;

pub use batch_allocator::{AllocationLine, AllocationPlan, BatchAllocator, BatchAvailability};
pub use reconciliation::{CounterMismatch, ReconciliationService, StoreSweepSummary};
pub use stock_ledger::StockLedgerService;
pub use transfers::{ExpirySweepResult, NewTransfer, TransferFilter, TransferService};

/// Bounds a lock-acquiring transaction so contention surfaces as
/// `LockTimeout` instead of unbounded blocking.
pub(crate) async fn with_lock_timeout<T>(
    lock_timeout: Duration,
    store_id: i64,
    item_id: i64,
    fut: impl Future<Output = Result<T, TransactionError<StockError>>>,
) -> Result<T, StockError> {
    match tokio::time::timeout(lock_timeout, fut).await {
        Ok(result) => result.map_err(StockError::from),
        Err(_) => Err(StockError::LockTimeout { store_id, item_id }),
    }
}
