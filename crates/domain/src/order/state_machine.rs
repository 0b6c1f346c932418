//! Validation and application of order and payment status transitions.
//!
//! The checks are pure functions over the two transition tables in
//! [`super::state`]; [`OrderStateMachine`] applies them to an [`Order`] and
//! stamps the matching stage timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::Order;
use super::state::{OrderStatus, PaymentStatus};
use crate::error::OrderError;

/// How a requested target status that is several hops away is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusPathPolicy {
    /// Only direct successors are accepted.
    #[default]
    SingleHop,
    /// The shortest path through the transition table is walked, stamping every
    /// intermediate stage.
    Walk,
}

impl std::str::FromStr for StatusPathPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_hop" => Ok(StatusPathPolicy::SingleHop),
            "walk" => Ok(StatusPathPolicy::Walk),
            other => Err(format!("unknown status path policy: {other}")),
        }
    }
}

/// Checks that `to` is a direct successor of `from`.
pub fn check_status_transition(from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition { from, to })
    }
}

/// Checks a payment transition against the payment table and the current
/// order status.
///
/// Moving back to `pending` is exempt from the order status requirement.
pub fn check_payment_transition(
    order_status: OrderStatus,
    from: PaymentStatus,
    to: PaymentStatus,
) -> Result<(), OrderError> {
    if !from.can_transition_to(to) {
        return Err(OrderError::InvalidPaymentTransition { from, to });
    }
    if to != PaymentStatus::Pending && !order_status.allows_payment_progress() {
        return Err(OrderError::PaymentStatusInvalidForOrderStatus {
            order_status,
            payment_status: to,
        });
    }
    Ok(())
}

/// Applies transitions to a single order.
pub struct OrderStateMachine<'a> {
    order: &'a mut Order,
}

impl<'a> OrderStateMachine<'a> {
    pub fn new(order: &'a mut Order) -> Self {
        Self { order }
    }

    /// Moves the order to a direct successor status.
    pub fn transition_status(
        &mut self,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        check_status_transition(self.order.status, to)?;
        self.order.status = to;
        self.order.timestamps.stamp_status(to, now);
        self.order.updated_at = now;
        Ok(())
    }

    /// Moves the order to `target` following `policy`.
    ///
    /// Returns the statuses entered, in order. An unchanged status is a no-op.
    pub fn advance_status(
        &mut self,
        target: OrderStatus,
        policy: StatusPathPolicy,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderStatus>, OrderError> {
        let from = self.order.status;
        if from == target {
            return Ok(Vec::new());
        }
        let path = match policy {
            StatusPathPolicy::SingleHop => vec![target],
            StatusPathPolicy::Walk => from
                .path_to(target)
                .ok_or(OrderError::InvalidTransition { from, to: target })?,
        };
        for &step in &path {
            self.transition_status(step, now)?;
        }
        Ok(path)
    }

    /// Moves the payment status, enforcing the order status cross-check.
    pub fn transition_payment_status(
        &mut self,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        check_payment_transition(self.order.status, self.order.payment_status, to)?;
        self.order.payment_status = to;
        self.order.timestamps.stamp_payment(to, now);
        self.order.updated_at = now;
        Ok(())
    }
}
