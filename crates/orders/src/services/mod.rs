//! Collaborator interfaces consumed by the order core and their in-memory
//! implementations.

pub mod business;
pub mod customer;
pub mod events;

pub use business::{BusinessDirectory, InMemoryBusinessDirectory};
pub use customer::{CustomerDirectory, InMemoryCustomerDirectory};
pub use events::{EventSink, InMemoryEventSink, LoggingEventSink};
