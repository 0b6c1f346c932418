//! Domain error types.

use common::{AddressId, BusinessId, CustomerId, NoteId, OrderId, ShippingZoneId, VariantId};
use thiserror::Error;

use crate::order::{OrderStatus, PaymentStatus};

/// Coarse classification of a failure, used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request itself is malformed or violates an input rule.
    Validation,
    /// A referenced entity does not exist for this business.
    NotFound,
    /// The request is well-formed but conflicts with current state.
    Conflict,
    /// The caller is sending requests too quickly.
    RateLimited,
    /// Infrastructure or configuration failure.
    Internal,
}

impl ErrorKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Order has no items.
    #[error("Order must contain at least one item")]
    EmptyItems,

    /// Invalid quantity.
    #[error("Invalid quantity {quantity} for variant {variant_id} (must be greater than 0)")]
    InvalidQuantity { variant_id: VariantId, quantity: u32 },

    /// Unit price must be strictly positive.
    #[error("Invalid unit price for variant {variant_id} (must be greater than 0)")]
    InvalidUnitPrice { variant_id: VariantId },

    /// Unit cost must not be negative.
    #[error("Invalid unit cost for variant {variant_id} (must not be negative)")]
    NegativeUnitCost { variant_id: VariantId },

    /// A monetary input was negative.
    #[error("{field} must not be negative")]
    NegativeAmount { field: &'static str },

    /// A monetary value does not fit in the supported range.
    #[error("{field} is out of range")]
    AmountOutOfRange { field: &'static str },

    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    /// A discount type was given without a value.
    #[error("Discount value is required when a discount type is set")]
    DiscountValueRequired,

    #[error("Note content cannot be empty")]
    EmptyNote,

    #[error("Payment method {method} is not enabled for this business")]
    PaymentMethodDisabled { method: String },

    #[error("Variant not found: {variant_id}")]
    VariantNotFound { variant_id: VariantId },

    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: OrderId },

    #[error("Order not found: {order_number}")]
    OrderNumberNotFound { order_number: String },

    #[error("Note not found: {note_id}")]
    NoteNotFound { note_id: NoteId },

    #[error("Business not found: {business_id}")]
    BusinessNotFound { business_id: BusinessId },

    #[error("Customer not found: {customer_id}")]
    CustomerNotFound { customer_id: CustomerId },

    #[error("Customer address not found: {address_id}")]
    AddressNotFound { address_id: AddressId },

    #[error("Shipping zone not found: {zone_id}")]
    ShippingZoneNotFound { zone_id: ShippingZoneId },

    /// Stock would go negative.
    #[error("Insufficient stock for variant {variant_id}: requested {requested}, available {available}")]
    InsufficientStock {
        variant_id: VariantId,
        requested: u32,
        available: i64,
    },

    /// Target order status is not a direct successor.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Target payment status is not a direct successor.
    #[error("Invalid payment status transition: {from} -> {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Payment may only progress while the order is placed, shipped or fulfilled.
    #[error("Payment status {payment_status} is not allowed while order is {order_status}")]
    PaymentStatusInvalidForOrderStatus {
        order_status: OrderStatus,
        payment_status: PaymentStatus,
    },

    #[error("Shipping zone {zone_id} does not cover country {country_code}")]
    ShippingZoneCountryMismatch {
        zone_id: ShippingZoneId,
        country_code: String,
    },

    #[error("Order cannot be deleted while {status}")]
    CannotDelete { status: OrderStatus },

    #[error("Order items cannot be changed while {status}")]
    ItemsUpdateNotAllowed { status: OrderStatus },

    #[error("Shipping address cannot be changed while {status}")]
    ShippingAddressUpdateNotAllowed { status: OrderStatus },

    #[error("Payment details cannot be changed while {status}")]
    PaymentDetailsUpdateNotAllowed { status: OrderStatus },
}

impl OrderError {
    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::EmptyItems
            | OrderError::InvalidQuantity { .. }
            | OrderError::InvalidUnitPrice { .. }
            | OrderError::NegativeUnitCost { .. }
            | OrderError::NegativeAmount { .. }
            | OrderError::AmountOutOfRange { .. }
            | OrderError::CurrencyMismatch { .. }
            | OrderError::DiscountValueRequired
            | OrderError::EmptyNote
            | OrderError::PaymentMethodDisabled { .. } => ErrorKind::Validation,

            OrderError::VariantNotFound { .. }
            | OrderError::OrderNotFound { .. }
            | OrderError::OrderNumberNotFound { .. }
            | OrderError::NoteNotFound { .. }
            | OrderError::BusinessNotFound { .. }
            | OrderError::CustomerNotFound { .. }
            | OrderError::AddressNotFound { .. }
            | OrderError::ShippingZoneNotFound { .. } => ErrorKind::NotFound,

            OrderError::InsufficientStock { .. }
            | OrderError::InvalidTransition { .. }
            | OrderError::InvalidPaymentTransition { .. }
            | OrderError::PaymentStatusInvalidForOrderStatus { .. }
            | OrderError::ShippingZoneCountryMismatch { .. }
            | OrderError::CannotDelete { .. }
            | OrderError::ItemsUpdateNotAllowed { .. }
            | OrderError::ShippingAddressUpdateNotAllowed { .. }
            | OrderError::PaymentDetailsUpdateNotAllowed { .. } => ErrorKind::Conflict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(OrderError::EmptyItems.kind(), ErrorKind::Validation);
        assert_eq!(
            OrderError::VariantNotFound {
                variant_id: VariantId::new()
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            OrderError::InsufficientStock {
                variant_id: VariantId::new(),
                requested: 3,
                available: 1
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            OrderError::ShippingZoneCountryMismatch {
                zone_id: ShippingZoneId::new(),
                country_code: "SA".into()
            }
            .kind(),
            ErrorKind::Conflict
        );
    }

    #[test]
    fn test_transition_error_message() {
        let err = OrderError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Fulfilled,
        };
        assert_eq!(err.to_string(), "Invalid status transition: pending -> fulfilled");
    }
}
