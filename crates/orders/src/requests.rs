//! Inputs accepted by the coordinator.

use chrono::{DateTime, Utc};
use common::{AddressId, CustomerId, ShippingZoneId, VariantId};
use domain::{DiscountMode, OrderStatus, PaymentMethod, PaymentStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// One requested order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub unit_cost: Decimal,
}

impl LineItemRequest {
    pub fn new(
        variant_id: VariantId,
        quantity: u32,
        unit_price: Decimal,
        unit_cost: Decimal,
    ) -> Self {
        Self {
            variant_id,
            quantity,
            unit_price,
            unit_cost,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: CustomerId,
    pub shipping_address_id: AddressId,
    #[serde(default)]
    pub channel: Option<String>,
    /// When set, the fee is derived from the zone and `shipping_fee` is ignored.
    #[serde(default)]
    pub shipping_zone_id: Option<ShippingZoneId>,
    #[serde(default)]
    pub shipping_fee: Decimal,
    /// Plain discount amount, used when no typed discount is given.
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub discount_type: Option<DiscountMode>,
    #[serde(default)]
    pub discount_value: Decimal,
    /// Target order status applied after the order is recorded.
    #[serde(default)]
    pub status: Option<OrderStatus>,
    /// Target payment status applied after `status`.
    #[serde(default)]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub payment_reference: Option<String>,
    #[serde(default)]
    pub ordered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub note: Option<String>,
    pub items: Vec<LineItemRequest>,
}

impl CreateOrderRequest {
    pub fn new(
        customer_id: CustomerId,
        shipping_address_id: AddressId,
        items: Vec<LineItemRequest>,
    ) -> Self {
        Self {
            customer_id,
            shipping_address_id,
            items,
            ..Default::default()
        }
    }
}

/// Partial update of an order. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrderRequest {
    #[serde(default)]
    pub shipping_address_id: Option<AddressId>,
    /// `Some(None)` (an explicit `null`) removes the zone and keeps the
    /// current fee.
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    pub shipping_zone_id: Option<Option<ShippingZoneId>>,
    /// Manual fee; removes the zone. Ignored when `shipping_zone_id` is given.
    #[serde(default)]
    pub shipping_fee: Option<Decimal>,
    #[serde(default)]
    pub channel: Option<String>,
    /// Plain discount amount, stored as an amount-mode discount.
    #[serde(default)]
    pub discount: Option<Decimal>,
    #[serde(default)]
    pub discount_type: Option<DiscountMode>,
    /// Required when `discount_type` is given.
    #[serde(default)]
    pub discount_value: Option<Decimal>,
    #[serde(default)]
    pub ordered_at: Option<DateTime<Utc>>,
    /// Replaces every line item.
    #[serde(default)]
    pub items: Option<Vec<LineItemRequest>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetailsRequest {
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub payment_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRequest {
    pub content: String,
}

/// Distinguishes an absent field from an explicit `null`.
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_field_distinguishes_null_from_absent() {
        let absent: UpdateOrderRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.shipping_zone_id, None);

        let cleared: UpdateOrderRequest =
            serde_json::from_str(r#"{"shipping_zone_id": null}"#).unwrap();
        assert_eq!(cleared.shipping_zone_id, Some(None));

        let zone_id = ShippingZoneId::new();
        let set: UpdateOrderRequest =
            serde_json::from_str(&format!(r#"{{"shipping_zone_id": "{zone_id}"}}"#)).unwrap();
        assert_eq!(set.shipping_zone_id, Some(Some(zone_id)));
    }

    #[test]
    fn test_create_request_defaults() {
        let json = format!(
            r#"{{"customer_id": "{}", "shipping_address_id": "{}", "items": []}}"#,
            CustomerId::new(),
            AddressId::new()
        );
        let request: CreateOrderRequest = serde_json::from_str(&json).unwrap();
        assert!(request.payment_method.is_none());
        assert!(request.discount_type.is_none());
        assert_eq!(request.shipping_fee, Decimal::ZERO);
    }
}
