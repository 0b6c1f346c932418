//! Order, line item and note records.

use chrono::{DateTime, Utc};
use common::{
    AddressId, BusinessId, CustomerId, NoteId, OrderId, OrderLineItemId, ProductId,
    ShippingZoneId, VariantId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::state::{OrderStatus, PaymentStatus};
use crate::money::Money;
use crate::pricing::{DiscountMode, PriceBreakdown};

/// Sales channel used when none is given.
pub const DEFAULT_CHANNEL: &str = "direct";

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Paypal,
    #[default]
    BankTransfer,
    CashOnDelivery,
    Tamara,
    Tabby,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 6] = [
        PaymentMethod::CreditCard,
        PaymentMethod::Paypal,
        PaymentMethod::BankTransfer,
        PaymentMethod::CashOnDelivery,
        PaymentMethod::Tamara,
        PaymentMethod::Tabby,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::Paypal => "paypal",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::Tamara => "tamara",
            PaymentMethod::Tabby => "tabby",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown payment method: {s}"))
    }
}

/// Moments at which the order entered each stage. Each is written at most once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StageTimestamps {
    pub placed_at: Option<DateTime<Utc>>,
    pub ready_for_shipment_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub refunded_at: Option<DateTime<Utc>>,
}

impl StageTimestamps {
    /// Records entry into an order status unless already recorded.
    pub fn stamp_status(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        let slot = match status {
            OrderStatus::Pending => return,
            OrderStatus::Placed => &mut self.placed_at,
            OrderStatus::ReadyForShipment => &mut self.ready_for_shipment_at,
            OrderStatus::Shipped => &mut self.shipped_at,
            OrderStatus::Fulfilled => &mut self.fulfilled_at,
            OrderStatus::Cancelled => &mut self.cancelled_at,
            OrderStatus::Returned => &mut self.returned_at,
        };
        slot.get_or_insert(at);
    }

    /// Records entry into a payment status unless already recorded.
    pub fn stamp_payment(&mut self, status: PaymentStatus, at: DateTime<Utc>) {
        let slot = match status {
            PaymentStatus::Pending => return,
            PaymentStatus::Paid => &mut self.paid_at,
            PaymentStatus::Failed => &mut self.failed_at,
            PaymentStatus::Refunded => &mut self.refunded_at,
        };
        slot.get_or_insert(at);
    }
}

/// A single line of an order, priced at the time it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub id: OrderLineItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub currency: String,
    pub unit_price: Money,
    pub unit_cost: Money,
    /// `unit_price × quantity`.
    pub total: Money,
    /// `unit_cost × quantity`.
    pub total_cost: Money,
}

/// Free-text note attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNote {
    pub id: NoteId,
    pub order_id: OrderId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderNote {
    pub fn new(order_id: OrderId, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: NoteId::new(),
            order_id,
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A business-scoped order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub business_id: BusinessId,
    /// Unique within the business. Empty until the order is persisted.
    pub order_number: String,
    pub customer_id: CustomerId,
    pub shipping_address_id: AddressId,
    pub shipping_zone_id: Option<ShippingZoneId>,
    pub channel: String,
    pub currency: String,

    pub subtotal: Money,
    pub vat: Money,
    pub vat_rate: Decimal,
    pub shipping_fee: Money,
    pub discount: Money,
    pub discount_mode: Option<DiscountMode>,
    /// Value entered with `discount_mode` (an amount or a percentage).
    pub discount_value: Decimal,
    pub cogs: Money,
    pub total: Money,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub timestamps: StageTimestamps,

    pub ordered_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    pub items: Vec<OrderLineItem>,
    pub notes: Vec<OrderNote>,
}

impl Order {
    /// Creates an empty pending order.
    pub fn new(
        business_id: BusinessId,
        customer_id: CustomerId,
        shipping_address_id: AddressId,
        currency: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            business_id,
            order_number: String::new(),
            customer_id,
            shipping_address_id,
            shipping_zone_id: None,
            channel: DEFAULT_CHANNEL.to_string(),
            currency: currency.into(),
            subtotal: Money::zero(),
            vat: Money::zero(),
            vat_rate: Decimal::ZERO,
            shipping_fee: Money::zero(),
            discount: Money::zero(),
            discount_mode: None,
            discount_value: Decimal::ZERO,
            cogs: Money::zero(),
            total: Money::zero(),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::default(),
            payment_reference: None,
            timestamps: StageTimestamps::default(),
            ordered_at: now,
            created_at: now,
            updated_at: now,
            items: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Copies every computed money field from a price breakdown.
    pub fn apply_pricing(&mut self, breakdown: &PriceBreakdown) {
        self.subtotal = breakdown.subtotal;
        self.vat = breakdown.vat;
        self.vat_rate = breakdown.vat_rate;
        self.shipping_fee = breakdown.shipping_fee;
        self.discount = breakdown.discount;
        self.discount_mode = breakdown.discount_mode;
        self.discount_value = breakdown.discount_value;
        self.cogs = breakdown.cogs;
        self.total = breakdown.total;
    }

    /// Returns true if the stored money fields agree with the line items.
    pub fn totals_are_consistent(&self) -> bool {
        let subtotal = Money::checked_sum(self.items.iter().map(|i| i.total));
        let cogs = Money::checked_sum(self.items.iter().map(|i| i.total_cost));
        let total = self
            .subtotal
            .checked_add(self.vat)
            .and_then(|m| m.checked_add(self.shipping_fee))
            .and_then(|m| m.checked_sub(self.discount));
        subtotal == Some(self.subtotal) && cogs == Some(self.cogs) && total == Some(self.total)
    }
}
