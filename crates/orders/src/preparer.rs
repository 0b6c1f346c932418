//! Line item preparation.
//!
//! Turns requested lines into priced [`OrderLineItem`]s and the stock
//! adjustments they require. Lines are kept in request order and never merged,
//! so two lines for the same variant produce two adjustments.

use common::{OrderId, OrderLineItemId};
use domain::{Business, Money, OrderError, OrderLineItem, PricingEngine, StockAdjustment, Variant};
use store::VariantReader;

use crate::error::Result;
use crate::requests::LineItemRequest;

/// Output of [`LineItemPreparer::prepare`].
#[derive(Debug, Clone, Default)]
pub struct PreparedItems {
    pub items: Vec<OrderLineItem>,
    pub adjustments: Vec<StockAdjustment>,
    /// Variants as read during preparation, one per line.
    pub variants: Vec<Variant>,
}

pub struct LineItemPreparer;

impl LineItemPreparer {
    /// Validates every requested line against its variant and prices it.
    ///
    /// Variants are read through `reader` without locks; stock is checked
    /// later by the allocator or the previewer.
    pub async fn prepare<R>(
        reader: &mut R,
        business: &Business,
        order_id: OrderId,
        requests: &[LineItemRequest],
    ) -> Result<PreparedItems>
    where
        R: VariantReader + ?Sized,
    {
        if requests.is_empty() {
            return Err(OrderError::EmptyItems.into());
        }

        let mut prepared = PreparedItems {
            items: Vec::with_capacity(requests.len()),
            adjustments: Vec::with_capacity(requests.len()),
            variants: Vec::with_capacity(requests.len()),
        };

        for request in requests {
            let variant = reader
                .read_variant(business.id, request.variant_id)
                .await?
                .ok_or(OrderError::VariantNotFound {
                    variant_id: request.variant_id,
                })?;

            let item = Self::price_line(business, order_id, &variant, request)?;
            prepared.adjustments.push(StockAdjustment {
                variant_id: variant.id,
                quantity: item.quantity,
            });
            prepared.items.push(item);
            prepared.variants.push(variant);
        }

        Ok(prepared)
    }

    fn price_line(
        business: &Business,
        order_id: OrderId,
        variant: &Variant,
        request: &LineItemRequest,
    ) -> std::result::Result<OrderLineItem, OrderError> {
        let variant_id = request.variant_id;
        if request.quantity == 0 {
            return Err(OrderError::InvalidQuantity {
                variant_id,
                quantity: request.quantity,
            });
        }

        let unit_price = Money::from_decimal(request.unit_price)
            .ok_or(OrderError::AmountOutOfRange { field: "unit_price" })?;
        if !unit_price.is_positive() {
            return Err(OrderError::InvalidUnitPrice { variant_id });
        }
        let unit_cost = Money::from_decimal(request.unit_cost)
            .ok_or(OrderError::AmountOutOfRange { field: "unit_cost" })?;
        if unit_cost.is_negative() {
            return Err(OrderError::NegativeUnitCost { variant_id });
        }

        if variant.currency != business.currency {
            return Err(OrderError::CurrencyMismatch {
                expected: business.currency.clone(),
                actual: variant.currency.clone(),
            });
        }

        let (total, total_cost) =
            PricingEngine::line_totals(request.unit_price, request.unit_cost, request.quantity)?;
        Ok(OrderLineItem {
            id: OrderLineItemId::new(),
            order_id,
            product_id: variant.product_id,
            variant_id,
            quantity: request.quantity,
            currency: business.currency.clone(),
            unit_price,
            unit_cost,
            total,
            total_cost,
        })
    }
}
