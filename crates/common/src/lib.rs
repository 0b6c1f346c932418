//! Shared identifier types for the order transaction core.

mod types;

pub use types::{
    ActorId, AddressId, BusinessId, CustomerId, NoteId, OrderId, OrderLineItemId, ProductId,
    ShippingZoneId, VariantId,
};
