//! Pure domain layer of the order transaction core.
//!
//! This crate provides:
//! - `Money` in minor units with half-away-from-zero rounding
//! - `PricingEngine` for subtotal, VAT, discount, shipping and total
//! - Order and payment status tables with `OrderStateMachine`
//! - Order, line item, note and variant records
//!
//! Nothing here performs I/O.

pub mod business;
pub mod error;
pub mod inventory;
pub mod money;
pub mod order;
pub mod pricing;

pub use business::{Business, Customer, CustomerAddress, ShippingZone};
pub use error::{ErrorKind, OrderError};
pub use inventory::{StockAdjustment, StockDirection, StockLedger, Variant, apply_stock_delta};
pub use money::Money;
pub use order::{
    Order, OrderEvent, OrderLineItem, OrderNote, OrderStateMachine, OrderStatus, PaymentMethod,
    PaymentStatus, PaymentSucceededData, StageTimestamps, StatusPathPolicy,
};
pub use pricing::{DiscountInput, DiscountMode, PriceBreakdown, PricingEngine, ShippingInput};
