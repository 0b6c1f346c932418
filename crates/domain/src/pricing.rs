//! Order pricing.
//!
//! [`PricingEngine`] turns priced line items plus the order-level inputs
//! (VAT rate, discount, shipping) into a [`PriceBreakdown`]. Every
//! intermediate amount is a [`Money`], so rounding to cents happens at each
//! step rather than once at the end.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::business::ShippingZone;
use crate::error::OrderError;
use crate::money::Money;
use crate::order::OrderLineItem;

/// How a discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountMode {
    /// The value is a currency amount.
    Amount,
    /// The value is a percentage of the subtotal.
    Percent,
}

impl DiscountMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountMode::Amount => "amount",
            DiscountMode::Percent => "percent",
        }
    }
}

impl std::str::FromStr for DiscountMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "amount" => Ok(DiscountMode::Amount),
            "percent" => Ok(DiscountMode::Percent),
            other => Err(format!("unknown discount mode: {other}")),
        }
    }
}

/// Discount inputs for a pricing run.
///
/// When `mode` is set and `value` is non-zero the typed discount applies;
/// otherwise `legacy_amount` is used as a plain amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiscountInput {
    pub mode: Option<DiscountMode>,
    pub value: Decimal,
    pub legacy_amount: Money,
}

impl DiscountInput {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn amount(value: Decimal) -> Self {
        Self {
            mode: Some(DiscountMode::Amount),
            value,
            legacy_amount: Money::zero(),
        }
    }

    pub fn percent(value: Decimal) -> Self {
        Self {
            mode: Some(DiscountMode::Percent),
            value,
            legacy_amount: Money::zero(),
        }
    }
}

/// Where the shipping fee comes from.
#[derive(Debug, Clone, Copy)]
pub enum ShippingInput<'a> {
    /// Fee derived from a zone's flat cost and free-shipping threshold.
    Zone(&'a ShippingZone),
    /// Fee given by the caller.
    Manual(Money),
}

/// Result of a pricing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub vat: Money,
    pub vat_rate: Decimal,
    pub discount: Money,
    pub discount_mode: Option<DiscountMode>,
    pub discount_value: Decimal,
    pub shipping_fee: Money,
    pub cogs: Money,
    pub total: Money,
}

/// Stateless price calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingEngine;

impl PricingEngine {
    /// Computes `(unit_price × quantity, unit_cost × quantity)` for a line,
    /// each rounded to cents.
    pub fn line_totals(
        unit_price: Decimal,
        unit_cost: Decimal,
        quantity: u32,
    ) -> Result<(Money, Money), OrderError> {
        Ok((
            Self::extend(unit_price, quantity, "line total")?,
            Self::extend(unit_cost, quantity, "line total cost")?,
        ))
    }

    /// Rounds `unit × quantity` to cents. Fractional-cent unit amounts are
    /// multiplied before rounding.
    pub fn extend(unit: Decimal, quantity: u32, field: &'static str) -> Result<Money, OrderError> {
        unit.checked_mul(Decimal::from(quantity))
            .and_then(Money::from_decimal)
            .ok_or(OrderError::AmountOutOfRange { field })
    }

    /// Computes the full breakdown for a set of line items.
    ///
    /// The total is not clamped: a discount larger than the rest of the order
    /// yields a negative total.
    pub fn compute(
        items: &[OrderLineItem],
        vat_rate: Decimal,
        discount: &DiscountInput,
        shipping: ShippingInput<'_>,
    ) -> Result<PriceBreakdown, OrderError> {
        if vat_rate < Decimal::ZERO {
            return Err(OrderError::NegativeAmount { field: "vat_rate" });
        }

        let subtotal = Money::checked_sum(items.iter().map(|i| i.total))
            .ok_or(OrderError::AmountOutOfRange { field: "subtotal" })?;
        let cogs = Money::checked_sum(items.iter().map(|i| i.total_cost))
            .ok_or(OrderError::AmountOutOfRange { field: "cogs" })?;
        let vat = subtotal
            .apply_rate(vat_rate)
            .ok_or(OrderError::AmountOutOfRange { field: "vat" })?;

        let (discount_amount, discount_mode, discount_value) =
            Self::resolve_discount(subtotal, discount)?;

        let shipping_fee = match shipping {
            ShippingInput::Zone(zone) => Self::zone_fee(subtotal, discount_amount, zone),
            ShippingInput::Manual(fee) => {
                if fee.is_negative() {
                    return Err(OrderError::NegativeAmount {
                        field: "shipping_fee",
                    });
                }
                fee
            }
        };

        let total = subtotal
            .checked_add(vat)
            .and_then(|m| m.checked_add(shipping_fee))
            .and_then(|m| m.checked_sub(discount_amount))
            .ok_or(OrderError::AmountOutOfRange { field: "total" })?;

        Ok(PriceBreakdown {
            subtotal,
            vat,
            vat_rate,
            discount: discount_amount,
            discount_mode,
            discount_value,
            shipping_fee,
            cogs,
            total,
        })
    }

    /// Returns the discount amount together with the mode and value to store.
    fn resolve_discount(
        subtotal: Money,
        input: &DiscountInput,
    ) -> Result<(Money, Option<DiscountMode>, Decimal), OrderError> {
        match input.mode {
            Some(mode) if !input.value.is_zero() => {
                if input.value < Decimal::ZERO {
                    return Err(OrderError::NegativeAmount { field: "discount" });
                }
                let amount = match mode {
                    DiscountMode::Percent => input
                        .value
                        .checked_div(Decimal::ONE_HUNDRED)
                        .and_then(|rate| subtotal.apply_rate(rate)),
                    DiscountMode::Amount => Money::from_decimal(input.value),
                }
                .ok_or(OrderError::AmountOutOfRange { field: "discount" })?;
                Ok((amount, Some(mode), input.value))
            }
            _ => {
                if input.legacy_amount.is_negative() {
                    return Err(OrderError::NegativeAmount { field: "discount" });
                }
                Ok((input.legacy_amount, input.mode, input.value))
            }
        }
    }

    /// Flat zone cost, waived once the discounted subtotal reaches the zone's
    /// free-shipping threshold. A zero threshold never waives.
    pub fn zone_fee(subtotal: Money, discount: Money, zone: &ShippingZone) -> Money {
        let base = subtotal
            .checked_sub(discount)
            .unwrap_or_else(Money::zero)
            .max_zero();
        if zone.free_threshold.is_positive() && base >= zone.free_threshold {
            Money::zero()
        } else {
            zone.cost
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{BusinessId, OrderId, OrderLineItemId, ProductId, ShippingZoneId, VariantId};
    use rust_decimal_macros::dec;

    fn line(unit_price_cents: i64, unit_cost_cents: i64, quantity: u32) -> OrderLineItem {
        let unit_price = Money::from_cents(unit_price_cents);
        let unit_cost = Money::from_cents(unit_cost_cents);
        let (total, total_cost) =
            PricingEngine::line_totals(unit_price.to_decimal(), unit_cost.to_decimal(), quantity)
                .unwrap();
        OrderLineItem {
            id: OrderLineItemId::new(),
            order_id: OrderId::new(),
            product_id: ProductId::new(),
            variant_id: VariantId::new(),
            quantity,
            currency: "SAR".into(),
            unit_price,
            unit_cost,
            total,
            total_cost,
        }
    }

    fn zone(cost_cents: i64, threshold_cents: i64) -> ShippingZone {
        ShippingZone {
            id: ShippingZoneId::new(),
            business_id: BusinessId::new(),
            name: "Domestic".into(),
            currency: "SAR".into(),
            countries: vec!["SA".into()],
            cost: Money::from_cents(cost_cents),
            free_threshold: Money::from_cents(threshold_cents),
        }
    }

    #[test]
    fn test_end_to_end_breakdown() {
        let items = [line(2500, 1000, 2)];
        let breakdown = PricingEngine::compute(
            &items,
            dec!(0.15),
            &DiscountInput::amount(dec!(5.00)),
            ShippingInput::Manual(Money::from_cents(1000)),
        )
        .unwrap();

        assert_eq!(breakdown.subtotal, Money::from_cents(5000));
        assert_eq!(breakdown.vat, Money::from_cents(750));
        assert_eq!(breakdown.discount, Money::from_cents(500));
        assert_eq!(breakdown.shipping_fee, Money::from_cents(1000));
        assert_eq!(breakdown.cogs, Money::from_cents(2000));
        assert_eq!(breakdown.total, Money::from_cents(6250));
        assert_eq!(breakdown.discount_mode, Some(DiscountMode::Amount));
    }

    #[test]
    fn test_percent_discount() {
        let items = [line(10000, 0, 1)];
        let breakdown = PricingEngine::compute(
            &items,
            Decimal::ZERO,
            &DiscountInput::percent(dec!(10)),
            ShippingInput::Manual(Money::zero()),
        )
        .unwrap();
        assert_eq!(breakdown.discount, Money::from_cents(1000));
        assert_eq!(breakdown.total, Money::from_cents(9000));
    }

    #[test]
    fn test_percent_discount_rounds_half_away_from_zero() {
        // 0.33 * 50% = 0.165 -> 0.17
        let items = [line(33, 0, 1)];
        let breakdown = PricingEngine::compute(
            &items,
            Decimal::ZERO,
            &DiscountInput::percent(dec!(50)),
            ShippingInput::Manual(Money::zero()),
        )
        .unwrap();
        assert_eq!(breakdown.discount, Money::from_cents(17));
    }

    #[test]
    fn test_amount_discount_ignores_subtotal() {
        for cents in [1000, 50000] {
            let items = [line(cents, 0, 1)];
            let breakdown = PricingEngine::compute(
                &items,
                Decimal::ZERO,
                &DiscountInput::amount(dec!(7.50)),
                ShippingInput::Manual(Money::zero()),
            )
            .unwrap();
            assert_eq!(breakdown.discount, Money::from_cents(750));
        }
    }

    #[test]
    fn test_zero_typed_value_falls_back_to_legacy_amount() {
        let items = [line(10000, 0, 1)];
        let input = DiscountInput {
            mode: Some(DiscountMode::Percent),
            value: Decimal::ZERO,
            legacy_amount: Money::from_cents(300),
        };
        let breakdown = PricingEngine::compute(
            &items,
            Decimal::ZERO,
            &input,
            ShippingInput::Manual(Money::zero()),
        )
        .unwrap();
        assert_eq!(breakdown.discount, Money::from_cents(300));
    }

    #[test]
    fn test_extend_rounds_after_multiplying() {
        assert_eq!(
            PricingEngine::extend(dec!(0.333), 3, "line total"),
            Ok(Money::from_cents(100))
        );
        assert_eq!(
            PricingEngine::extend(dec!(25.00), 2, "line total"),
            Ok(Money::from_cents(5000))
        );
    }

    #[test]
    fn test_line_totals_round_price_and_cost_separately() {
        assert_eq!(
            PricingEngine::line_totals(dec!(0.333), dec!(0.125), 3),
            Ok((Money::from_cents(100), Money::from_cents(38)))
        );
        assert!(matches!(
            PricingEngine::line_totals(Decimal::MAX, dec!(1), 2),
            Err(OrderError::AmountOutOfRange {
                field: "line total"
            })
        ));
    }

    #[test]
    fn test_zone_threshold_waives_fee() {
        let zone = zone(2000, 10000);
        let items = [line(15000, 0, 1)];
        let breakdown = PricingEngine::compute(
            &items,
            Decimal::ZERO,
            &DiscountInput::none(),
            ShippingInput::Zone(&zone),
        )
        .unwrap();
        assert_eq!(breakdown.shipping_fee, Money::zero());

        let items = [line(5000, 0, 1)];
        let breakdown = PricingEngine::compute(
            &items,
            Decimal::ZERO,
            &DiscountInput::none(),
            ShippingInput::Zone(&zone),
        )
        .unwrap();
        assert_eq!(breakdown.shipping_fee, Money::from_cents(2000));
    }

    #[test]
    fn test_zone_threshold_uses_discounted_subtotal() {
        let zone = zone(2000, 10000);
        let items = [line(11000, 0, 1)];
        let breakdown = PricingEngine::compute(
            &items,
            Decimal::ZERO,
            &DiscountInput::amount(dec!(20)),
            ShippingInput::Zone(&zone),
        )
        .unwrap();
        assert_eq!(breakdown.shipping_fee, Money::from_cents(2000));
    }

    #[test]
    fn test_zero_threshold_never_waives() {
        let zone = zone(1500, 0);
        assert_eq!(
            PricingEngine::zone_fee(Money::from_cents(1_000_000), Money::zero(), &zone),
            Money::from_cents(1500)
        );
    }

    #[test]
    fn test_total_is_not_clamped() {
        let items = [line(1000, 0, 1)];
        let breakdown = PricingEngine::compute(
            &items,
            Decimal::ZERO,
            &DiscountInput::amount(dec!(25)),
            ShippingInput::Manual(Money::zero()),
        )
        .unwrap();
        assert_eq!(breakdown.total, Money::from_cents(-1500));
    }

    #[test]
    fn test_negative_inputs_are_rejected() {
        let items = [line(1000, 0, 1)];
        let err = PricingEngine::compute(
            &items,
            Decimal::ZERO,
            &DiscountInput::amount(dec!(-1)),
            ShippingInput::Manual(Money::zero()),
        )
        .unwrap_err();
        assert_eq!(err, OrderError::NegativeAmount { field: "discount" });

        let err = PricingEngine::compute(
            &items,
            Decimal::ZERO,
            &DiscountInput::none(),
            ShippingInput::Manual(Money::from_cents(-1)),
        )
        .unwrap_err();
        assert_eq!(
            err,
            OrderError::NegativeAmount {
                field: "shipping_fee"
            }
        );
    }

    #[test]
    fn test_totals_match_invariants() {
        let items = [line(1999, 500, 3), line(1, 0, 7), line(333, 111, 1)];
        let breakdown = PricingEngine::compute(
            &items,
            dec!(0.15),
            &DiscountInput::percent(dec!(12.5)),
            ShippingInput::Manual(Money::from_cents(1234)),
        )
        .unwrap();
        assert_eq!(breakdown.subtotal, Money::from_cents(5997 + 7 + 333));
        let expected_total = breakdown.subtotal.cents() + breakdown.vat.cents()
            + breakdown.shipping_fee.cents()
            - breakdown.discount.cents();
        assert_eq!(breakdown.total.cents(), expected_total);
    }
}
