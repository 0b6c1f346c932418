//! Dry-run order pricing.

use common::{ProductId, ShippingZoneId, VariantId};
use domain::{
    Money, OrderLineItem, PaymentMethod, PriceBreakdown, StockDirection, StockLedger,
};
use serde::{Deserialize, Serialize};

use crate::draft::OrderDraft;
use crate::error::Result;

/// What a create with the same request would record, computed without
/// writing anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPreview {
    #[serde(flatten)]
    pub breakdown: PriceBreakdown,
    pub currency: String,
    pub shipping_zone_id: Option<ShippingZoneId>,
    pub payment_method: PaymentMethod,
    pub items: Vec<OrderPreviewItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPreviewItem {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub unit_cost: Money,
    pub total: Money,
    pub total_cost: Money,
}

impl From<&OrderLineItem> for OrderPreviewItem {
    fn from(item: &OrderLineItem) -> Self {
        Self {
            variant_id: item.variant_id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
            unit_cost: item.unit_cost,
            total: item.total,
            total_cost: item.total_cost,
        }
    }
}

pub struct DryRunPreviewer;

impl DryRunPreviewer {
    /// Checks that the draft's stock adjustments would succeed against the
    /// levels read while drafting, then builds the preview.
    ///
    /// Fails with the same `InsufficientStock` an allocation would raise.
    pub fn preview(draft: &OrderDraft) -> Result<OrderPreview> {
        let mut ledger = StockLedger::new();
        for variant in &draft.variants {
            ledger.observe(variant.id, variant.stock_quantity);
        }
        for adjustment in &draft.adjustments {
            ledger.apply(adjustment, StockDirection::Allocate)?;
        }

        let order = &draft.order;
        Ok(OrderPreview {
            breakdown: PriceBreakdown {
                subtotal: order.subtotal,
                vat: order.vat,
                vat_rate: order.vat_rate,
                discount: order.discount,
                discount_mode: order.discount_mode,
                discount_value: order.discount_value,
                shipping_fee: order.shipping_fee,
                cogs: order.cogs,
                total: order.total,
            },
            currency: order.currency.clone(),
            shipping_zone_id: order.shipping_zone_id,
            payment_method: order.payment_method,
            items: order.items.iter().map(OrderPreviewItem::from).collect(),
        })
    }
}
