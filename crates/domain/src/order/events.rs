//! Events published to other subsystems after an order change commits.

use chrono::{DateTime, Utc};
use common::{BusinessId, OrderId};
use serde::{Deserialize, Serialize};

use super::model::{Order, PaymentMethod};
use crate::money::Money;

/// Notifications emitted by the order core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Payment status became paid.
    PaymentSucceeded(PaymentSucceededData),
}

impl OrderEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::PaymentSucceeded(_) => "OrderPaymentSucceeded",
        }
    }

    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::PaymentSucceeded(data) => data.order_id,
        }
    }
}

/// Data for the PaymentSucceeded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSucceededData {
    pub business_id: BusinessId,
    pub order_id: OrderId,
    pub payment_method: PaymentMethod,
    pub total: Money,
    pub currency: String,
    pub paid_at: DateTime<Utc>,
}

impl PaymentSucceededData {
    /// Builds the event payload for a paid order.
    ///
    /// Returns `None` if the order has no paid timestamp.
    pub fn from_order(order: &Order) -> Option<Self> {
        Some(Self {
            business_id: order.business_id,
            order_id: order.id,
            payment_method: order.payment_method,
            total: order.total,
            currency: order.currency.clone(),
            paid_at: order.timestamps.paid_at?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{AddressId, CustomerId};

    #[test]
    fn test_payload_requires_paid_timestamp() {
        let mut order = Order::new(
            BusinessId::new(),
            CustomerId::new(),
            AddressId::new(),
            "SAR",
            Utc::now(),
        );
        assert!(PaymentSucceededData::from_order(&order).is_none());

        let paid_at = Utc::now();
        order.timestamps.paid_at = Some(paid_at);
        order.total = Money::from_cents(6250);
        let data = PaymentSucceededData::from_order(&order).unwrap();
        assert_eq!(data.paid_at, paid_at);
        assert_eq!(data.total, Money::from_cents(6250));
        assert_eq!(data.currency, "SAR");

        let event = OrderEvent::PaymentSucceeded(data);
        assert_eq!(event.event_type(), "OrderPaymentSucceeded");
        assert_eq!(event.order_id(), order.id);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PaymentSucceeded");
    }
}
