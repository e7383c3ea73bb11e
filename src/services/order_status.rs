//! Order lifecycle states and the single transition function applied by the
//! webhook reconciler and the cancellation endpoints.

use strum::{Display, EnumString};

/// Order line / order group status.
///
/// Transitions are monotonic forward with two alternate terminals
/// (`Rejected`, `Cancelled`); see [`transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    OnHold,
    Pending,
    Accepted,
    Processing,
    OnProgress,
    Shipped,
    OnTheWay,
    PickupReady,
    Delivered,
    Rejected,
    Cancelled,
}

/// Payment transaction status. The pending → terminal flip is the
/// compare-and-swap the reconciler races on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Cancelled,
}

/// Events that can move an order through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    PaymentSucceeded,
    PaymentFailed,
    CustomerCancelled,
    MarkedShipped,
    MarkedDelivered,
}

/// Outcome of applying an event to a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    To(OrderStatus),
    /// Already in the target state; applying again is a no-op success.
    Noop,
    /// The event is not allowed from the current state.
    Refused,
}

impl OrderStatus {
    /// Customer cancellation is permitted only before fulfilment starts.
    pub fn is_customer_cancellable(self) -> bool {
        matches!(
            self,
            OrderStatus::OnHold
                | OrderStatus::Pending
                | OrderStatus::OnProgress
                | OrderStatus::Accepted
        )
    }
}

/// The uniform `(current, event) -> next` transition function.
///
/// Re-cancelling an already-cancelled order reports `Noop`: cancellation is
/// idempotent, the same policy on every endpoint.
pub fn transition(current: OrderStatus, event: OrderEvent) -> Transition {
    use OrderEvent::*;
    use OrderStatus::*;

    match (current, event) {
        (Pending, PaymentSucceeded) => Transition::To(OnProgress),
        (Pending, PaymentFailed) => Transition::To(Rejected),

        (Cancelled, CustomerCancelled) => Transition::Noop,
        (current, CustomerCancelled) if current.is_customer_cancellable() => {
            Transition::To(Cancelled)
        }

        (Accepted | Processing | OnProgress, MarkedShipped) => Transition::To(Shipped),
        (Shipped | OnTheWay | PickupReady, MarkedDelivered) => Transition::To(Delivered),

        _ => Transition::Refused,
    }
}
