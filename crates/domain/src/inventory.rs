//! Variants and stock arithmetic.

use std::collections::HashMap;

use common::{BusinessId, ProductId, VariantId};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::money::Money;

/// A sellable variant of a product; stock is tracked per variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub business_id: BusinessId,
    pub currency: String,
    pub unit_price: Money,
    pub unit_cost: Money,
    pub stock_quantity: i64,
}

/// Request to move `quantity` units of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub variant_id: VariantId,
    pub quantity: u32,
}

/// Direction in which an adjustment moves stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDirection {
    /// Reserve stock for an order line.
    Allocate,
    /// Return stock from a removed line.
    Restock,
}

impl StockDirection {
    pub fn sign(&self) -> i64 {
        match self {
            StockDirection::Allocate => -1,
            StockDirection::Restock => 1,
        }
    }
}

/// Returns the stock level after applying `adjustment` to `current`.
///
/// Fails with `InsufficientStock` if the result would be negative.
pub fn apply_stock_delta(
    current: i64,
    adjustment: &StockAdjustment,
    direction: StockDirection,
) -> Result<i64, OrderError> {
    let next = i64::from(adjustment.quantity)
        .checked_mul(direction.sign())
        .and_then(|delta| current.checked_add(delta))
        .ok_or(OrderError::AmountOutOfRange {
            field: "stock_quantity",
        })?;
    if next < 0 {
        return Err(OrderError::InsufficientStock {
            variant_id: adjustment.variant_id,
            requested: adjustment.quantity,
            available: current,
        });
    }
    Ok(next)
}

/// Working copy of stock levels used to check a batch of adjustments without
/// writing anything.
#[derive(Debug, Default)]
pub struct StockLedger {
    levels: HashMap<VariantId, i64>,
}

impl StockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the observed level of a variant, if not already tracked.
    pub fn observe(&mut self, variant_id: VariantId, stock_quantity: i64) {
        self.levels.entry(variant_id).or_insert(stock_quantity);
    }

    /// Applies an adjustment to the tracked level of its variant.
    ///
    /// Untracked variants start at zero.
    pub fn apply(
        &mut self,
        adjustment: &StockAdjustment,
        direction: StockDirection,
    ) -> Result<i64, OrderError> {
        let level = self.levels.entry(adjustment.variant_id).or_insert(0);
        *level = apply_stock_delta(*level, adjustment, direction)?;
        Ok(*level)
    }

    pub fn level(&self, variant_id: VariantId) -> Option<i64> {
        self.levels.get(&variant_id).copied()
    }
}
