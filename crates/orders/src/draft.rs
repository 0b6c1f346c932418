//! Validation and pricing shared by create and preview.

use chrono::{DateTime, Utc};
use common::{AddressId, BusinessId, CustomerId, ShippingZoneId};
use domain::{
    Business, CustomerAddress, DiscountInput, Money, Order, OrderError, PaymentMethod,
    PricingEngine, ShippingInput, ShippingZone, StockAdjustment, Variant,
};
use rust_decimal::Decimal;
use store::VariantReader;

use crate::error::Result;
use crate::preparer::LineItemPreparer;
use crate::requests::CreateOrderRequest;
use crate::services::{BusinessDirectory, CustomerDirectory};

/// A validated, priced order that has not been written anywhere.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    /// Pending order with items and money fields set and no number.
    pub order: Order,
    pub adjustments: Vec<StockAdjustment>,
    /// Variants as read while preparing, one per line.
    pub variants: Vec<Variant>,
}

/// Lookups against the customer and business collaborators.
#[derive(Clone, Copy)]
pub struct Directories<'a> {
    pub customers: &'a dyn CustomerDirectory,
    pub businesses: &'a dyn BusinessDirectory,
}

impl Directories<'_> {
    pub async fn business(&self, business_id: BusinessId) -> Result<Business> {
        Ok(self
            .businesses
            .get_business(business_id)
            .await?
            .ok_or(OrderError::BusinessNotFound { business_id })?)
    }

    /// Checks that the customer belongs to the business and the address to
    /// the customer.
    pub async fn customer_address(
        &self,
        business_id: BusinessId,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> Result<CustomerAddress> {
        self.customers
            .get_customer(business_id, customer_id)
            .await?
            .ok_or(OrderError::CustomerNotFound { customer_id })?;
        self.address(customer_id, address_id).await
    }

    pub async fn address(
        &self,
        customer_id: CustomerId,
        address_id: AddressId,
    ) -> Result<CustomerAddress> {
        Ok(self
            .customers
            .get_address(customer_id, address_id)
            .await?
            .ok_or(OrderError::AddressNotFound { address_id })?)
    }

    /// Loads a zone of the business. When `destination` is given, the zone
    /// must price in the business currency and cover the address country.
    pub async fn shipping_zone(
        &self,
        business: &Business,
        zone_id: ShippingZoneId,
        destination: Option<&CustomerAddress>,
    ) -> Result<ShippingZone> {
        let zone = self
            .businesses
            .get_shipping_zone(business.id, zone_id)
            .await?
            .ok_or(OrderError::ShippingZoneNotFound { zone_id })?;

        if let Some(address) = destination {
            if zone.currency != business.currency {
                return Err(OrderError::CurrencyMismatch {
                    expected: business.currency.clone(),
                    actual: zone.currency.clone(),
                }
                .into());
            }
            let country_code = address.country();
            if !zone.covers(&country_code) {
                return Err(OrderError::ShippingZoneCountryMismatch {
                    zone_id,
                    country_code,
                }
                .into());
            }
        }
        Ok(zone)
    }

    pub async fn require_payment_method(
        &self,
        business_id: BusinessId,
        method: PaymentMethod,
    ) -> Result<()> {
        if self
            .businesses
            .is_payment_method_enabled(business_id, method)
            .await?
        {
            Ok(())
        } else {
            Err(OrderError::PaymentMethodDisabled {
                method: method.to_string(),
            }
            .into())
        }
    }
}

/// Rejects a negative decimal input and converts it to cents.
pub fn non_negative_money(value: Decimal, field: &'static str) -> Result<Money> {
    if value < Decimal::ZERO {
        return Err(OrderError::NegativeAmount { field }.into());
    }
    Ok(Money::from_decimal(value).ok_or(OrderError::AmountOutOfRange { field })?)
}

/// Runs every check a create performs short of touching stock or numbers,
/// and prices the result.
pub async fn draft_order<R>(
    directories: Directories<'_>,
    reader: &mut R,
    business: &Business,
    request: &CreateOrderRequest,
    now: DateTime<Utc>,
) -> Result<OrderDraft>
where
    R: VariantReader + ?Sized,
{
    if request.items.is_empty() {
        return Err(OrderError::EmptyItems.into());
    }
    let manual_fee = non_negative_money(request.shipping_fee, "shipping_fee")?;
    let legacy_discount = non_negative_money(request.discount, "discount")?;
    if request.discount_value < Decimal::ZERO {
        return Err(OrderError::NegativeAmount { field: "discount" }.into());
    }

    let address = directories
        .customer_address(business.id, request.customer_id, request.shipping_address_id)
        .await?;

    let mut order = Order::new(
        business.id,
        request.customer_id,
        request.shipping_address_id,
        business.currency.clone(),
        now,
    );
    if let Some(channel) = request.channel.as_deref().map(str::trim) {
        if !channel.is_empty() {
            order.channel = channel.to_string();
        }
    }
    if let Some(ordered_at) = request.ordered_at {
        order.ordered_at = ordered_at;
    }

    let prepared = LineItemPreparer::prepare(reader, business, order.id, &request.items).await?;

    let zone = match request.shipping_zone_id {
        Some(zone_id) => Some(
            directories
                .shipping_zone(business, zone_id, Some(&address))
                .await?,
        ),
        None => None,
    };

    let payment_method = request.payment_method.unwrap_or_default();
    directories
        .require_payment_method(business.id, payment_method)
        .await?;

    let discount = DiscountInput {
        mode: request.discount_type,
        value: request.discount_value,
        legacy_amount: legacy_discount,
    };
    let shipping = match &zone {
        Some(zone) => ShippingInput::Zone(zone),
        None => ShippingInput::Manual(manual_fee),
    };
    let breakdown = PricingEngine::compute(&prepared.items, business.vat_rate, &discount, shipping)?;

    order.apply_pricing(&breakdown);
    order.shipping_zone_id = zone.as_ref().map(|z| z.id);
    order.payment_method = payment_method;
    order.payment_reference = request
        .payment_reference
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);
    order.items = prepared.items;

    Ok(OrderDraft {
        order,
        adjustments: prepared.adjustments,
        variants: prepared.variants,
    })
}
