use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BusinessId, NoteId, OrderId, VariantId};
use domain::{Order, OrderLineItem, OrderNote, Variant};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    Result, StoreError,
    store::{ORDER_NUMBER_CONSTRAINT, OrderStore, StoreTransaction, TransactionOptions},
};

#[derive(Debug, Clone)]
struct StoredOrder {
    order: Order,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    orders: HashMap<OrderId, StoredOrder>,
    line_items: HashMap<OrderId, Vec<OrderLineItem>>,
    notes: HashMap<OrderId, Vec<OrderNote>>,
    variants: HashMap<VariantId, Variant>,
}

impl Tables {
    fn live_order(&self, business_id: BusinessId, order_id: OrderId) -> Option<&Order> {
        self.orders
            .get(&order_id)
            .filter(|stored| stored.deleted_at.is_none() && stored.order.business_id == business_id)
            .map(|stored| &stored.order)
    }

    /// Returns the order with its items and notes attached.
    fn assemble(&self, order: &Order) -> Order {
        let mut order = order.clone();
        order.items = self.line_items.get(&order.id).cloned().unwrap_or_default();
        order.notes = self.notes.get(&order.id).cloned().unwrap_or_default();
        order
    }

    fn variant(&self, business_id: BusinessId, variant_id: VariantId) -> Option<Variant> {
        self.variants
            .get(&variant_id)
            .filter(|v| v.business_id == business_id)
            .cloned()
    }
}

/// In-memory order store for tests and local runs.
///
/// Transactions are serialized by a single writer lock held from `begin` until
/// the transaction ends, so every transaction is trivially serializable. Each
/// transaction works on a private copy of the tables that replaces the shared
/// copy on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    writer: Arc<Mutex<()>>,
    failing_commits: Arc<AtomicU32>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a variant.
    pub async fn insert_variant(&self, variant: Variant) {
        self.tables
            .write()
            .await
            .variants
            .insert(variant.id, variant);
    }

    /// Returns the committed state of a variant.
    pub async fn variant(&self, variant_id: VariantId) -> Option<Variant> {
        self.tables.read().await.variants.get(&variant_id).cloned()
    }

    /// Returns the number of orders that are not deleted.
    pub async fn order_count(&self) -> usize {
        self.tables
            .read()
            .await
            .orders
            .values()
            .filter(|stored| stored.deleted_at.is_none())
            .count()
    }

    /// Makes the next `count` commits fail with `SerializationFailure`.
    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }

    fn take_commit_failure(&self) -> bool {
        self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn begin(&self, _options: TransactionOptions) -> Result<Box<dyn StoreTransaction>> {
        let guard = self.writer.clone().lock_owned().await;
        let working = self.tables.read().await.clone();
        Ok(Box::new(InMemoryTransaction {
            store: self.clone(),
            _guard: guard,
            working,
            savepoints: Vec::new(),
        }))
    }

    async fn get_variant(
        &self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>> {
        Ok(self.tables.read().await.variant(business_id, variant_id))
    }

    async fn find_order(
        &self,
        business_id: BusinessId,
        order_id: OrderId,
    ) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .live_order(business_id, order_id)
            .map(|order| tables.assemble(order)))
    }

    async fn find_order_by_number(
        &self,
        business_id: BusinessId,
        order_number: &str,
    ) -> Result<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .find(|stored| {
                stored.deleted_at.is_none()
                    && stored.order.business_id == business_id
                    && stored.order.order_number == order_number
            })
            .map(|stored| tables.assemble(&stored.order)))
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    store: InMemoryStore,
    _guard: OwnedMutexGuard<()>,
    working: Tables,
    savepoints: Vec<(String, Tables)>,
}

impl InMemoryTransaction {
    fn savepoint_index(&self, name: &str) -> Result<usize> {
        self.savepoints
            .iter()
            .rposition(|(n, _)| n == name)
            .ok_or_else(|| StoreError::InvalidSavepoint(name.to_string()))
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn savepoint(&mut self, name: &str) -> Result<()> {
        self.savepoints
            .push((name.to_string(), self.working.clone()));
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<()> {
        let index = self.savepoint_index(name)?;
        self.savepoints.truncate(index + 1);
        self.working = self.savepoints[index].1.clone();
        Ok(())
    }

    async fn release_savepoint(&mut self, name: &str) -> Result<()> {
        let index = self.savepoint_index(name)?;
        self.savepoints.truncate(index);
        Ok(())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let taken = self.working.orders.values().any(|stored| {
            stored.order.business_id == order.business_id
                && stored.order.order_number == order.order_number
        });
        if taken {
            return Err(StoreError::UniqueViolation {
                constraint: ORDER_NUMBER_CONSTRAINT.to_string(),
            });
        }
        let mut row = order.clone();
        row.items.clear();
        row.notes.clear();
        self.working.orders.insert(
            order.id,
            StoredOrder {
                order: row,
                deleted_at: None,
            },
        );
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let stored = self
            .working
            .orders
            .get_mut(&order.id)
            .filter(|stored| stored.deleted_at.is_none())
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        let mut row = order.clone();
        row.items.clear();
        row.notes.clear();
        stored.order = row;
        Ok(())
    }

    async fn lock_order(
        &mut self,
        business_id: BusinessId,
        order_id: OrderId,
    ) -> Result<Option<Order>> {
        Ok(self
            .working
            .live_order(business_id, order_id)
            .map(|order| self.working.assemble(order)))
    }

    async fn delete_order(&mut self, business_id: BusinessId, order_id: OrderId) -> Result<()> {
        if let Some(stored) = self
            .working
            .orders
            .get_mut(&order_id)
            .filter(|stored| stored.order.business_id == business_id)
        {
            stored.deleted_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn insert_line_items(&mut self, items: &[OrderLineItem]) -> Result<()> {
        for item in items {
            self.working
                .line_items
                .entry(item.order_id)
                .or_default()
                .push(item.clone());
        }
        Ok(())
    }

    async fn delete_line_items(&mut self, order_id: OrderId) -> Result<u64> {
        Ok(self
            .working
            .line_items
            .remove(&order_id)
            .map_or(0, |items| items.len() as u64))
    }

    async fn insert_note(&mut self, note: &OrderNote) -> Result<()> {
        self.working
            .notes
            .entry(note.order_id)
            .or_default()
            .push(note.clone());
        Ok(())
    }

    async fn update_note(&mut self, note: &OrderNote) -> Result<()> {
        let existing = self
            .working
            .notes
            .get_mut(&note.order_id)
            .and_then(|notes| notes.iter_mut().find(|n| n.id == note.id))
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        *existing = note.clone();
        Ok(())
    }

    async fn find_note(
        &mut self,
        order_id: OrderId,
        note_id: NoteId,
    ) -> Result<Option<OrderNote>> {
        Ok(self
            .working
            .notes
            .get(&order_id)
            .and_then(|notes| notes.iter().find(|n| n.id == note_id))
            .cloned())
    }

    async fn delete_note(&mut self, order_id: OrderId, note_id: NoteId) -> Result<bool> {
        let Some(notes) = self.working.notes.get_mut(&order_id) else {
            return Ok(false);
        };
        let before = notes.len();
        notes.retain(|n| n.id != note_id);
        Ok(notes.len() != before)
    }

    async fn get_variant(
        &mut self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>> {
        Ok(self.working.variant(business_id, variant_id))
    }

    async fn lock_variant(
        &mut self,
        business_id: BusinessId,
        variant_id: VariantId,
    ) -> Result<Option<Variant>> {
        // The writer lock already excludes every other transaction.
        Ok(self.working.variant(business_id, variant_id))
    }

    async fn set_variant_stock(
        &mut self,
        variant_id: VariantId,
        stock_quantity: i64,
    ) -> Result<()> {
        let variant = self
            .working
            .variants
            .get_mut(&variant_id)
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        variant.stock_quantity = stock_quantity;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if self.store.take_commit_failure() {
            return Err(StoreError::SerializationFailure);
        }
        let InMemoryTransaction {
            store,
            _guard,
            working,
            ..
        } = *self;
        *store.tables.write().await = working;
        drop(_guard);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
