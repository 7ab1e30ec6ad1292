//! Domain events emitted by the stock core.
//!
//! Dispatch is fire-and-forget: transitions publish onto an mpsc channel and
//! a consumer (logging here, a real notifier in the embedding application)
//! drains it. A failed send is logged by the emitter and never fails the
//! operation that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    TransferCreated {
        transfer_id: Uuid,
        source_store_id: i64,
        destination_store_id: i64,
        item_id: i64,
        quantity: i32,
    },
    TransferApproved {
        transfer_id: Uuid,
        approved_by: String,
    },
    TransferCompleted {
        transfer_id: Uuid,
        source_store_id: i64,
        destination_store_id: i64,
        item_id: i64,
        quantity: i32,
    },
    TransferCancelled {
        transfer_id: Uuid,
        reason: Option<String>,
    },
    StockReceived {
        store_id: i64,
        item_id: i64,
        batch_id: i64,
        quantity: i32,
    },
    CountersReconciled {
        store_id: i64,
        corrected: usize,
    },
    ReservationsExpired {
        cancelled: u64,
        swept_at: DateTime<Utc>,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::TransferCreated { .. } => "transfer.created",
            Event::TransferApproved { .. } => "transfer.approved",
            Event::TransferCompleted { .. } => "transfer.completed",
            Event::TransferCancelled { .. } => "transfer.cancelled",
            Event::StockReceived { .. } => "stock.received",
            Event::CountersReconciled { .. } => "counters.reconciled",
            Event::ReservationsExpired { .. } => "reservations.expired",
        }
    }

    /// Structured payload handed to the notification dispatcher.
    pub fn payload(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Null)
    }
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Fire-and-forget emission: delivery failure is logged, never surfaced.
    pub async fn emit(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.send(event).await {
            warn!(event = name, error = %e, "Dropped domain event");
        }
    }
}

/// Drains the event channel, logging each event. The embedding application
/// replaces or wraps this loop with its real notification dispatch.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(event = event.name(), payload = %event.payload(), "Domain event");
    }
}
