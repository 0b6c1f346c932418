//! Order status and payment status transition tables.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// The fulfilment status of an order.
///
/// State transitions:
/// ```text
/// Pending ──► Placed ──┬──► ReadyForShipment ──┐
///    │          │      └────────────────────────┴──► Shipped ──► Fulfilled ──► Returned
///    │          │                   │
///    └──────────┴───────────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order recorded, nothing committed to the customer yet.
    #[default]
    Pending,
    Placed,
    /// Optional intermediate state between placed and shipped.
    ReadyForShipment,
    Shipped,
    Fulfilled,
    /// Terminal.
    Cancelled,
    /// Terminal.
    Returned,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Placed,
        OrderStatus::ReadyForShipment,
        OrderStatus::Shipped,
        OrderStatus::Fulfilled,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
    ];

    /// Returns the statuses directly reachable from this one.
    pub fn successors(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Placed, Cancelled],
            Placed => &[ReadyForShipment, Shipped, Cancelled],
            ReadyForShipment => &[Shipped, Cancelled],
            Shipped => &[Fulfilled],
            Fulfilled => &[Returned],
            Cancelled | Returned => &[],
        }
    }

    /// Returns true if `next` is a direct successor of this status.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.successors().contains(&next)
    }

    /// Returns the shortest chain of statuses leading from this status to `target`,
    /// excluding the current status and including `target`.
    ///
    /// Returns `None` if `target` is unreachable, and an empty path if it is the
    /// current status.
    pub fn path_to(&self, target: OrderStatus) -> Option<Vec<OrderStatus>> {
        if *self == target {
            return Some(Vec::new());
        }
        let mut previous: Vec<Option<OrderStatus>> = vec![None; Self::ALL.len()];
        let mut queue = VecDeque::from([*self]);
        while let Some(current) = queue.pop_front() {
            for &next in current.successors() {
                if next == *self || previous[next.index()].is_some() {
                    continue;
                }
                previous[next.index()] = Some(current);
                if next == target {
                    let mut path = vec![next];
                    let mut cursor = current;
                    while cursor != *self {
                        path.push(cursor);
                        cursor = previous[cursor.index()]?;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }
        None
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Returns true if line items may still be replaced.
    pub fn allows_item_edits(&self) -> bool {
        !matches!(
            self,
            OrderStatus::Shipped
                | OrderStatus::Fulfilled
                | OrderStatus::Cancelled
                | OrderStatus::Returned
        )
    }

    /// Returns true if the shipping address may still change (before shipment).
    pub fn allows_address_change(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Placed | OrderStatus::ReadyForShipment
        )
    }

    /// Returns true if the order may be deleted in this status.
    pub fn allows_deletion(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Cancelled)
    }

    /// Returns true if the payment status may move to anything other than pending.
    pub fn allows_payment_progress(&self) -> bool {
        matches!(
            self,
            OrderStatus::Placed | OrderStatus::Shipped | OrderStatus::Fulfilled
        )
    }

    /// Returns true if payment method and reference may still change.
    pub fn allows_payment_details(&self) -> bool {
        !matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Placed => "placed",
            OrderStatus::ReadyForShipment => "ready_for_shipment",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Fulfilled => "fulfilled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// The payment status of an order.
///
/// State transitions:
/// ```text
/// Pending ──► Paid ──► Refunded
///    ▲  │
///    │  ▼
///   Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    /// Terminal.
    Refunded,
}

impl PaymentStatus {
    /// All payment statuses.
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    /// Returns the payment statuses directly reachable from this one.
    pub fn successors(&self) -> &'static [PaymentStatus] {
        use PaymentStatus::*;
        match self {
            Pending => &[Paid, Failed],
            Failed => &[Pending],
            Paid => &[Refunded],
            Refunded => &[],
        }
    }

    /// Returns true if `next` is a direct successor of this status.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        self.successors().contains(&next)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.successors().is_empty()
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown status: {0}")]
pub struct UnknownStatus(pub String);
