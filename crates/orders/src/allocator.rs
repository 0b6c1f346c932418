//! Stock allocation inside a store transaction.

use common::BusinessId;
use domain::{OrderError, StockAdjustment, StockDirection, apply_stock_delta};
use store::StoreTransaction;

use crate::error::Result;

/// Applies signed stock deltas to variants.
///
/// Each variant is re-read under the transaction's write lock before its new
/// level is computed, so a level read earlier is never written back. The first
/// failure aborts the batch; the caller drops the transaction and nothing is
/// kept.
pub struct InventoryAllocator;

impl InventoryAllocator {
    /// Takes stock for new order lines.
    pub async fn allocate(
        tx: &mut dyn StoreTransaction,
        business_id: BusinessId,
        adjustments: &[StockAdjustment],
    ) -> Result<()> {
        Self::apply(tx, business_id, adjustments, StockDirection::Allocate).await
    }

    /// Returns stock from removed order lines.
    pub async fn restock(
        tx: &mut dyn StoreTransaction,
        business_id: BusinessId,
        adjustments: &[StockAdjustment],
    ) -> Result<()> {
        Self::apply(tx, business_id, adjustments, StockDirection::Restock).await
    }

    pub async fn apply(
        tx: &mut dyn StoreTransaction,
        business_id: BusinessId,
        adjustments: &[StockAdjustment],
        direction: StockDirection,
    ) -> Result<()> {
        for adjustment in adjustments {
            let variant = tx
                .lock_variant(business_id, adjustment.variant_id)
                .await?
                .ok_or(OrderError::VariantNotFound {
                    variant_id: adjustment.variant_id,
                })?;
            let next = apply_stock_delta(variant.stock_quantity, adjustment, direction)?;
            tx.set_variant_stock(variant.id, next).await?;
        }
        Ok(())
    }
}
