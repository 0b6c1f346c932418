use async_trait::async_trait;
use common::{BusinessId, NoteId, OrderId, VariantId};
use domain::{Order, OrderLineItem, OrderNote, Variant};

use crate::Result;

/// Name of the constraint that keeps order numbers unique within a business.
pub const ORDER_NUMBER_CONSTRAINT: &str = "orders_business_number_key";

/// Transaction isolation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    ReadCommitted,
    RepeatableRead,
    #[default]
    Serializable,
}

impl IsolationLevel {
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options for opening a transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionOptions {
    pub isolation: IsolationLevel,
}

impl TransactionOptions {
    /// Creates options with the default (serializable) isolation.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serializable() -> Self {
        Self {
            isolation: IsolationLevel::Serializable,
        }
    }
}

/// Entry point to order persistence.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Opens a transaction. Dropping it without `commit` discards its writes.
    async fn begin(&self, options: TransactionOptions) -> Result<Box<dyn StoreTransaction>>;

    /// Reads a variant outside of any transaction, without locking.
    async fn get_variant(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>>;

    /// Loads an order with its items and notes.
    async fn find_order(&self, business_id: BusinessId, order_id: OrderId)
    -> Result<Option<Order>>;

    /// Loads an order by its business-scoped number.
    async fn find_order_by_number(
        &self,
        business_id: BusinessId,
        order_number: &str,
    ) -> Result<Option<Order>>;
}

/// Unit of work against the order store.
///
/// Every write is visible to later reads in the same transaction and to no one
/// else until `commit` succeeds.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Records a named checkpoint.
    async fn savepoint(&mut self, name: &str) -> Result<()>;

    /// Discards everything written since the named checkpoint. The checkpoint
    /// itself stays usable.
    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<()>;

    /// Forgets the named checkpoint, keeping its writes.
    async fn release_savepoint(&mut self, name: &str) -> Result<()>;

    /// Inserts the order row. Items and notes are written separately.
    ///
    /// Fails with `UniqueViolation` on [`ORDER_NUMBER_CONSTRAINT`] if the
    /// number is already taken in the business.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Overwrites the order row.
    async fn update_order(&mut self, order: &Order) -> Result<()>;

    /// Loads an order with its items and notes and locks it for update.
    async fn lock_order(
        &mut self,
        business_id: BusinessId,
        order_id: OrderId,
    ) -> Result<Option<Order>>;

    /// Removes the order from view. Its number stays reserved.
    async fn delete_order(&mut self, business_id: BusinessId, order_id: OrderId) -> Result<()>;

    async fn insert_line_items(&mut self, items: &[OrderLineItem]) -> Result<()>;

    /// Deletes every line item of the order, returning how many were removed.
    async fn delete_line_items(&mut self, order_id: OrderId) -> Result<u64>;

    async fn insert_note(&mut self, note: &OrderNote) -> Result<()>;

    async fn update_note(&mut self, note: &OrderNote) -> Result<()>;

    async fn find_note(&mut self, order_id: OrderId, note_id: NoteId)
    -> Result<Option<OrderNote>>;

    /// Returns true if a note was deleted.
    async fn delete_note(&mut self, order_id: OrderId, note_id: NoteId) -> Result<bool>;

    /// Reads a variant without locking it.
    async fn get_variant(
        &mut self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>>;

    /// Reads a variant and holds a write lock on it until the transaction ends.
    async fn lock_variant(
        &mut self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>>;

    async fn set_variant_stock(&mut self, variant_id: VariantId, stock_quantity: i64)
    -> Result<()>;

    /// Makes all writes durable.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discards all writes.
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Source of variant reads, either inside a transaction or straight from the
/// store.
#[async_trait]
pub trait VariantReader: Send {
    async fn read_variant(
        &mut self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>>;
}

#[async_trait]
impl<'t> VariantReader for dyn StoreTransaction + 't {
    async fn read_variant(
        &mut self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>> {
        self.get_variant(business_id, variant_id).await
    }
}

#[async_trait]
impl<'a> VariantReader for &'a dyn OrderStore {
    async fn read_variant(
        &mut self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>> {
        self.get_variant(business_id, variant_id).await
    }
}

/// Returns true if `name` can be used verbatim as an SQL savepoint name.
pub fn is_valid_savepoint_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_savepoint_names() {
        assert!(is_valid_savepoint_name("order_number_1"));
        assert!(is_valid_savepoint_name("_sp"));
        assert!(!is_valid_savepoint_name("1abc"));
        assert!(!is_valid_savepoint_name("sp; DROP TABLE orders"));
        assert!(!is_valid_savepoint_name(""));
    }

    #[test]
    fn test_default_isolation_is_serializable() {
        assert_eq!(
            TransactionOptions::new().isolation,
            IsolationLevel::Serializable
        );
        assert_eq!(IsolationLevel::Serializable.as_sql(), "SERIALIZABLE");
    }
}
