//! Transactional persistence for orders, line items, notes and variant stock.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use store::{
    IsolationLevel, ORDER_NUMBER_CONSTRAINT, OrderStore, StoreTransaction, TransactionOptions,
    VariantReader,
};
