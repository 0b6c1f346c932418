//! Order transaction core.
//!
//! [`OrderCoordinator`] is the entry point. It validates requests against the
//! customer and business directories, prices them with the domain
//! `PricingEngine`, reserves stock and allocates an order number inside one
//! serializable store transaction, and retries the whole transaction when the
//! store reports a serialization failure.
//!
//! ```ignore
//! let coordinator = OrderCoordinator::builder(store)
//!     .customers(customers)
//!     .businesses(businesses)
//!     .build()?;
//! let order = coordinator.create(actor_id, business_id, request).await?;
//! ```

pub mod allocator;
pub mod config;
pub mod coordinator;
pub mod draft;
pub mod error;
pub mod numbering;
pub mod preparer;
pub mod preview;
pub mod requests;
pub mod services;
pub mod throttle;

pub use allocator::InventoryAllocator;
pub use config::CoreConfig;
pub use coordinator::{OrderCoordinator, OrderCoordinatorBuilder};
pub use draft::OrderDraft;
pub use error::{Result, ServiceError};
pub use numbering::{
    OrderNumberAllocator, OrderNumberGenerator, RandomOrderNumbers, ScriptedOrderNumbers,
};
pub use preparer::{LineItemPreparer, PreparedItems};
pub use preview::{DryRunPreviewer, OrderPreview, OrderPreviewItem};
pub use requests::{
    CreateOrderRequest, LineItemRequest, NoteRequest, PaymentDetailsRequest, UpdateOrderRequest,
};
pub use services::{
    BusinessDirectory, CustomerDirectory, EventSink, InMemoryBusinessDirectory,
    InMemoryCustomerDirectory, InMemoryEventSink, LoggingEventSink,
};
pub use throttle::{
    InMemoryThrottleStore, RateLimiter, ThrottleEntry, ThrottleGuard, ThrottlePolicy,
    ThrottleStore, ThrottleStoreError, ThrottledOperation,
};
