//! Pharmacy-chain stock core.
//!
//! Library implementing multi-store inventory movement with an append-only
//! stock ledger as ground truth: per-(store, item) holdings with soft
//! reservations, FEFO/FIFO batch allocation, the inter-store transfer state
//! machine, and reconciliation of the stores' denormalized counters.
//!
//! The embedding application supplies the database pool and consumes
//! domain events from the [`events`] channel; everything else is wired
//! through [`StockCore`].

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod logging;
pub mod services;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    BatchAllocator, ReconciliationService, StockLedgerService, TransferService,
};

pub use crate::errors::StockError;

/// Wired-up stock core: every service sharing one pool, one event channel,
/// and one set of injected settings.
#[derive(Clone)]
pub struct StockCore {
    pub db: Arc<DbPool>,
    pub config: AppConfig,
    pub event_sender: EventSender,
    pub ledger: StockLedgerService,
    pub transfers: TransferService,
    pub reconciliation: ReconciliationService,
}

impl StockCore {
    pub fn new(db: Arc<DbPool>, config: AppConfig, event_sender: EventSender) -> Self {
        let ledger = StockLedgerService::new(
            db.clone(),
            event_sender.clone(),
            config.stock.clone(),
        );
        let transfers = TransferService::new(
            db.clone(),
            event_sender.clone(),
            BatchAllocator::new(),
            config.stock.clone(),
        );
        let reconciliation = ReconciliationService::new(db.clone(), event_sender.clone());
        Self {
            db,
            config,
            event_sender,
            ledger,
            transfers,
            reconciliation,
        }
    }
}
