//! In-process settlement events.
//!
//! Services emit events after state changes; a single processor task drains
//! the channel. Event delivery is best-effort and must never fail the
//! operation that produced it.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the settlement flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CheckoutCommitted {
        order_group_id: Uuid,
        payment_txn_id: Uuid,
        order_count: usize,
    },
    PaymentSucceeded {
        payment_txn_id: Uuid,
        order_group_id: Uuid,
    },
    PaymentFailed {
        payment_txn_id: Uuid,
        order_group_id: Uuid,
    },
    OrderGroupCancelled(Uuid),
    OrderCancelled(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Send an event; a full or closed channel is logged and swallowed.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("failed to enqueue event: {}", e);
        }
    }
}

/// Create a connected sender/processor pair.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drain and log events until all senders are dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::CheckoutCommitted {
                order_group_id,
                payment_txn_id,
                order_count,
            } => info!(
                %order_group_id,
                %payment_txn_id,
                order_count,
                "checkout committed"
            ),
            Event::PaymentSucceeded {
                payment_txn_id,
                order_group_id,
            } => info!(%payment_txn_id, %order_group_id, "payment succeeded"),
            Event::PaymentFailed {
                payment_txn_id,
                order_group_id,
            } => info!(%payment_txn_id, %order_group_id, "payment failed"),
            Event::OrderGroupCancelled(id) => info!(order_group_id = %id, "order group cancelled"),
            Event::OrderCancelled(id) => info!(order_id = %id, "order cancelled"),
        }
    }
}
