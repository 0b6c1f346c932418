//! Transactional order operations.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use common::{ActorId, BusinessId, NoteId, OrderId};
use domain::{
    Business, CustomerAddress, DiscountInput, Money, Order, OrderError, OrderEvent, OrderLineItem,
    OrderNote, OrderStateMachine, OrderStatus, PaymentStatus, PaymentSucceededData, PricingEngine,
    ShippingInput, StockAdjustment,
};
use rust_decimal::Decimal;
use store::{OrderStore, StoreTransaction, TransactionOptions};
use tracing::Instrument;

use crate::allocator::InventoryAllocator;
use crate::config::CoreConfig;
use crate::draft::{Directories, draft_order, non_negative_money};
use crate::error::{Result, ServiceError};
use crate::numbering::{OrderNumberAllocator, OrderNumberGenerator, RandomOrderNumbers};
use crate::preparer::LineItemPreparer;
use crate::preview::{DryRunPreviewer, OrderPreview};
use crate::requests::{CreateOrderRequest, NoteRequest, PaymentDetailsRequest, UpdateOrderRequest};
use crate::services::{BusinessDirectory, CustomerDirectory, EventSink, LoggingEventSink};
use crate::throttle::{
    InMemoryThrottleStore, RateLimiter, ThrottleGuard, ThrottlePolicy, ThrottledOperation,
};

/// Runs order mutations as serializable transactions against an
/// [`OrderStore`].
///
/// Every mutation is retried as a whole when the store reports a
/// serialization failure, up to [`CoreConfig::tx_attempts`] runs. Validation,
/// not-found and conflict errors abort the run and are returned unchanged.
#[derive(Clone)]
pub struct OrderCoordinator {
    store: Arc<dyn OrderStore>,
    customers: Arc<dyn CustomerDirectory>,
    businesses: Arc<dyn BusinessDirectory>,
    events: Arc<dyn EventSink>,
    limiter: Arc<dyn RateLimiter>,
    numbers: Arc<dyn OrderNumberGenerator>,
    config: CoreConfig,
}

/// Builder for [`OrderCoordinator`].
pub struct OrderCoordinatorBuilder {
    store: Arc<dyn OrderStore>,
    customers: Option<Arc<dyn CustomerDirectory>>,
    businesses: Option<Arc<dyn BusinessDirectory>>,
    events: Option<Arc<dyn EventSink>>,
    limiter: Option<Arc<dyn RateLimiter>>,
    numbers: Option<Arc<dyn OrderNumberGenerator>>,
    config: CoreConfig,
}

impl OrderCoordinatorBuilder {
    pub fn customers(mut self, customers: impl CustomerDirectory + 'static) -> Self {
        self.customers = Some(Arc::new(customers));
        self
    }

    pub fn businesses(mut self, businesses: impl BusinessDirectory + 'static) -> Self {
        self.businesses = Some(Arc::new(businesses));
        self
    }

    /// Defaults to [`LoggingEventSink`].
    pub fn events(mut self, events: impl EventSink + 'static) -> Self {
        self.events = Some(Arc::new(events));
        self
    }

    /// Defaults to a [`ThrottleGuard`] over an in-process store.
    pub fn rate_limiter(mut self, limiter: impl RateLimiter + 'static) -> Self {
        self.limiter = Some(Arc::new(limiter));
        self
    }

    /// Defaults to [`RandomOrderNumbers`].
    pub fn order_numbers(mut self, numbers: impl OrderNumberGenerator + 'static) -> Self {
        self.numbers = Some(Arc::new(numbers));
        self
    }

    pub fn config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Fails with `NotConfigured` if a required collaborator is missing.
    pub fn build(self) -> Result<OrderCoordinator> {
        Ok(OrderCoordinator {
            store: self.store,
            customers: self
                .customers
                .ok_or(ServiceError::NotConfigured("customer directory"))?,
            businesses: self
                .businesses
                .ok_or(ServiceError::NotConfigured("business directory"))?,
            events: self
                .events
                .unwrap_or_else(|| Arc::new(LoggingEventSink)),
            limiter: self
                .limiter
                .unwrap_or_else(|| Arc::new(ThrottleGuard::new(InMemoryThrottleStore::new()))),
            numbers: self
                .numbers
                .unwrap_or_else(|| Arc::new(RandomOrderNumbers)),
            config: self.config,
        })
    }
}

impl OrderCoordinator {
    pub fn builder(store: Arc<dyn OrderStore>) -> OrderCoordinatorBuilder {
        OrderCoordinatorBuilder {
            store,
            customers: None,
            businesses: None,
            events: None,
            limiter: None,
            numbers: None,
            config: CoreConfig::default(),
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Records a new order, reserving stock for every line.
    ///
    /// A target `status` and then `payment_status` from the request are
    /// applied in the same transaction. An optional note is stored with it.
    #[tracing::instrument(skip_all, fields(%actor_id, %business_id))]
    pub async fn create(
        &self,
        actor_id: ActorId,
        business_id: BusinessId,
        request: CreateOrderRequest,
    ) -> Result<Order> {
        self.throttle(
            ThrottledOperation::Create,
            business_id,
            actor_id,
            None,
            &self.config.create_throttle,
        )
        .await?;
        let business = self.directories().business(business_id).await?;

        let order = self
            .retrying("create", || self.create_once(&business, &request))
            .await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "order created"
        );
        self.publish_if_paid(PaymentStatus::Pending, &order);
        Ok(order)
    }

    /// Computes what [`create`](Self::create) would record without writing
    /// anything or taking locks.
    #[tracing::instrument(skip_all, fields(%actor_id, %business_id))]
    pub async fn preview(
        &self,
        actor_id: ActorId,
        business_id: BusinessId,
        request: CreateOrderRequest,
    ) -> Result<OrderPreview> {
        self.throttle(
            ThrottledOperation::Preview,
            business_id,
            actor_id,
            None,
            &self.config.preview_throttle,
        )
        .await?;
        let directories = self.directories();
        let business = directories.business(business_id).await?;

        let mut reader: &dyn OrderStore = self.store.as_ref();
        let draft = draft_order(directories, &mut reader, &business, &request, Utc::now()).await?;
        DryRunPreviewer::preview(&draft)
    }

    /// Applies a partial update. Replacing the items restocks the old lines
    /// and allocates the new ones; the money fields are recomputed.
    #[tracing::instrument(skip_all, fields(%actor_id, %business_id, %order_id))]
    pub async fn update(
        &self,
        actor_id: ActorId,
        business_id: BusinessId,
        order_id: OrderId,
        request: UpdateOrderRequest,
    ) -> Result<Order> {
        let business = self.directories().business(business_id).await?;
        let order = self
            .retrying("update", || self.update_once(&business, order_id, &request))
            .await?;
        tracing::info!(total = %order.total, "order updated");
        Ok(order)
    }

    /// Removes a pending or cancelled order and returns its stock.
    #[tracing::instrument(skip_all, fields(%actor_id, %business_id, %order_id))]
    pub async fn delete(
        &self,
        actor_id: ActorId,
        business_id: BusinessId,
        order_id: OrderId,
    ) -> Result<()> {
        self.retrying("delete", || async move {
            let mut tx = self.begin().await?;
            let result = delete_in(tx.as_mut(), business_id, order_id).await;
            finish(tx, result).await
        })
        .await?;
        tracing::info!("order deleted");
        Ok(())
    }

    /// Moves the order to a direct successor status.
    #[tracing::instrument(skip_all, fields(%actor_id, %business_id, %order_id))]
    pub async fn transition_status(
        &self,
        actor_id: ActorId,
        business_id: BusinessId,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<Order> {
        let order = self
            .retrying("transition_status", || async move {
                let mut tx = self.begin().await?;
                let result = status_in(tx.as_mut(), business_id, order_id, status).await;
                finish(tx, result).await
            })
            .await?;
        tracing::info!(status = %order.status, "order status changed");
        Ok(order)
    }

    /// Moves the payment status. The first move to `paid` publishes a payment
    /// event once the change has committed.
    #[tracing::instrument(skip_all, fields(%actor_id, %business_id, %order_id))]
    pub async fn transition_payment_status(
        &self,
        actor_id: ActorId,
        business_id: BusinessId,
        order_id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Order> {
        let (order, previous) = self
            .retrying("transition_payment_status", || async move {
                let mut tx = self.begin().await?;
                let result =
                    payment_status_in(tx.as_mut(), business_id, order_id, payment_status).await;
                finish(tx, result).await
            })
            .await?;
        tracing::info!(payment_status = %order.payment_status, "payment status changed");
        self.publish_if_paid(previous, &order);
        Ok(order)
    }

    /// Changes the payment method and reference without touching the payment
    /// status.
    #[tracing::instrument(skip_all, fields(%actor_id, %business_id, %order_id))]
    pub async fn add_payment_details(
        &self,
        actor_id: ActorId,
        business_id: BusinessId,
        order_id: OrderId,
        request: PaymentDetailsRequest,
    ) -> Result<Order> {
        let request = &request;
        self.retrying("add_payment_details", || async move {
            let mut tx = self.begin().await?;
            let result = self
                .payment_details_in(tx.as_mut(), business_id, order_id, request)
                .await;
            finish(tx, result).await
        })
        .await
    }

    /// Attaches a note to an order of the business.
    #[tracing::instrument(skip_all, fields(%actor_id, %business_id, %order_id))]
    pub async fn create_note(
        &self,
        actor_id: ActorId,
        business_id: BusinessId,
        order_id: OrderId,
        request: NoteRequest,
    ) -> Result<OrderNote> {
        self.throttle(
            ThrottledOperation::NoteCreate,
            business_id,
            actor_id,
            Some(order_id),
            &self.config.note_throttle,
        )
        .await?;
        let content = request.content.trim();
        if content.is_empty() {
            return Err(OrderError::EmptyNote.into());
        }

        self.retrying("create_note", || async move {
            let mut tx = self.begin().await?;
            let result = create_note_in(tx.as_mut(), business_id, order_id, content).await;
            finish(tx, result).await
        })
        .await
    }

    /// Replaces the content of a note. Blank content leaves it unchanged.
    #[tracing::instrument(skip_all, fields(%actor_id, %business_id, %order_id, %note_id))]
    pub async fn update_note(
        &self,
        actor_id: ActorId,
        business_id: BusinessId,
        order_id: OrderId,
        note_id: NoteId,
        request: NoteRequest,
    ) -> Result<OrderNote> {
        let content = request.content.trim();
        self.retrying("update_note", || async move {
            let mut tx = self.begin().await?;
            let result = update_note_in(tx.as_mut(), business_id, order_id, note_id, content).await;
            finish(tx, result).await
        })
        .await
    }

    #[tracing::instrument(skip_all, fields(%actor_id, %business_id, %order_id, %note_id))]
    pub async fn delete_note(
        &self,
        actor_id: ActorId,
        business_id: BusinessId,
        order_id: OrderId,
        note_id: NoteId,
    ) -> Result<()> {
        self.retrying("delete_note", || async move {
            let mut tx = self.begin().await?;
            let result = delete_note_in(tx.as_mut(), business_id, order_id, note_id).await;
            finish(tx, result).await
        })
        .await
    }

    /// Loads an order with its items and notes.
    #[tracing::instrument(skip_all, fields(%actor_id, %business_id, %order_id))]
    pub async fn get(
        &self,
        actor_id: ActorId,
        business_id: BusinessId,
        order_id: OrderId,
    ) -> Result<Order> {
        Ok(self
            .store
            .find_order(business_id, order_id)
            .await?
            .ok_or(OrderError::OrderNotFound { order_id })?)
    }

    #[tracing::instrument(skip_all, fields(%actor_id, %business_id))]
    pub async fn get_by_number(
        &self,
        actor_id: ActorId,
        business_id: BusinessId,
        order_number: &str,
    ) -> Result<Order> {
        Ok(self
            .store
            .find_order_by_number(business_id, order_number)
            .await?
            .ok_or_else(|| OrderError::OrderNumberNotFound {
                order_number: order_number.to_string(),
            })?)
    }

    fn directories(&self) -> Directories<'_> {
        Directories {
            customers: self.customers.as_ref(),
            businesses: self.businesses.as_ref(),
        }
    }

    async fn throttle(
        &self,
        operation: ThrottledOperation,
        business_id: BusinessId,
        actor_id: ActorId,
        order_id: Option<OrderId>,
        policy: &ThrottlePolicy,
    ) -> Result<()> {
        let key = operation.key(business_id, actor_id, order_id);
        self.limiter.check(operation, &key, policy).await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(self.store.begin(TransactionOptions::serializable()).await?)
    }

    /// Runs `attempt` until it succeeds, fails with anything other than a
    /// serialization failure, or the attempt budget is spent. Competing
    /// writers are spread out by a jittered pause between attempts.
    async fn retrying<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = Instant::now();
        let max_attempts = self.config.tx_attempts.max(1);
        let mut run = 0;

        let result = loop {
            run += 1;
            metrics::counter!("order_tx_attempts_total", "operation" => operation).increment(1);
            match attempt().await {
                Err(err) if err.is_serialization_failure() => {
                    if run >= max_attempts {
                        tracing::warn!(operation, attempts = run, "transaction retries exhausted");
                        break Err(ServiceError::RetriesExhausted { attempts: run });
                    }
                    metrics::counter!(
                        "order_tx_serialization_retries_total",
                        "operation" => operation
                    )
                    .increment(1);
                    let delay = self.config.retry_delay(run);
                    tracing::warn!(
                        operation,
                        attempt = run,
                        delay_ms = delay.as_millis() as u64,
                        "serialization failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => break other,
            }
        };

        metrics::histogram!("order_tx_duration_seconds", "operation" => operation)
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn create_once(&self, business: &Business, request: &CreateOrderRequest) -> Result<Order> {
        let mut tx = self.begin().await?;
        let result = self.create_in(tx.as_mut(), business, request).await;
        finish(tx, result).await
    }

    async fn create_in(
        &self,
        tx: &mut dyn StoreTransaction,
        business: &Business,
        request: &CreateOrderRequest,
    ) -> Result<Order> {
        let now = Utc::now();
        let draft = draft_order(self.directories(), &mut *tx, business, request, now).await?;
        let mut order = draft.order;
        let items = std::mem::take(&mut order.items);

        OrderNumberAllocator::new(
            self.numbers.as_ref(),
            self.config.number_length,
            self.config.number_attempts,
        )
        .insert(&mut *tx, &mut order)
        .await?;
        tx.insert_line_items(&items).await?;
        InventoryAllocator::allocate(&mut *tx, business.id, &draft.adjustments).await?;

        let mut advanced = false;
        if let Some(target) = request.status.filter(|s| *s != OrderStatus::Pending) {
            OrderStateMachine::new(&mut order).advance_status(
                target,
                self.config.status_path,
                now,
            )?;
            advanced = true;
        }
        if let Some(target) = request
            .payment_status
            .filter(|s| *s != PaymentStatus::Pending)
        {
            OrderStateMachine::new(&mut order).transition_payment_status(target, now)?;
            advanced = true;
        }
        if advanced {
            tx.update_order(&order).await?;
        }

        if let Some(content) = request.note.as_deref().map(str::trim) {
            if !content.is_empty() {
                let note = OrderNote::new(order.id, content, now);
                tx.insert_note(&note).await?;
                order.notes.push(note);
            }
        }

        order.items = items;
        Ok(order)
    }

    async fn update_once(
        &self,
        business: &Business,
        order_id: OrderId,
        request: &UpdateOrderRequest,
    ) -> Result<Order> {
        let mut tx = self.begin().await?;
        let result = self
            .update_in(tx.as_mut(), business, order_id, request)
            .await;
        finish(tx, result).await
    }

    async fn update_in(
        &self,
        tx: &mut dyn StoreTransaction,
        business: &Business,
        order_id: OrderId,
        request: &UpdateOrderRequest,
    ) -> Result<Order> {
        let directories = self.directories();
        let now = Utc::now();
        let mut order = lock_order(&mut *tx, business.id, order_id).await?;

        let manual_fee = request
            .shipping_fee
            .map(|fee| non_negative_money(fee, "shipping_fee"))
            .transpose()?;
        let discount = update_discount(&order, request)?;

        if let Some(channel) = request.channel.as_deref().map(str::trim) {
            if !channel.is_empty() {
                order.channel = channel.to_string();
            }
        }
        if let Some(ordered_at) = request.ordered_at {
            order.ordered_at = ordered_at;
        }

        let mut new_address: Option<CustomerAddress> = None;
        if let Some(address_id) = request.shipping_address_id {
            if !order.status.allows_address_change() {
                return Err(OrderError::ShippingAddressUpdateNotAllowed {
                    status: order.status,
                }
                .into());
            }
            let address = directories.address(order.customer_id, address_id).await?;
            order.shipping_address_id = address.id;
            new_address = Some(address);
        }

        let mut vat_rate = order.vat_rate;
        let mut items = std::mem::take(&mut order.items);
        if let Some(requested) = &request.items {
            if !order.status.allows_item_edits() {
                return Err(OrderError::ItemsUpdateNotAllowed {
                    status: order.status,
                }
                .into());
            }
            if requested.is_empty() {
                return Err(OrderError::EmptyItems.into());
            }

            tx.delete_line_items(order.id).await?;
            InventoryAllocator::restock(&mut *tx, business.id, &returned_stock(&items)).await?;

            let prepared =
                LineItemPreparer::prepare(&mut *tx, business, order.id, requested).await?;
            tx.insert_line_items(&prepared.items).await?;
            InventoryAllocator::allocate(&mut *tx, business.id, &prepared.adjustments).await?;
            items = prepared.items;
            vat_rate = business.vat_rate;
        }

        let zone = match (request.shipping_zone_id, manual_fee) {
            (Some(Some(zone_id)), _) => {
                let address = match new_address {
                    Some(address) => address,
                    None => {
                        directories
                            .address(order.customer_id, order.shipping_address_id)
                            .await?
                    }
                };
                Some(
                    directories
                        .shipping_zone(business, zone_id, Some(&address))
                        .await?,
                )
            }
            (Some(None), fee) | (None, fee @ Some(_)) => {
                if let Some(fee) = fee {
                    order.shipping_fee = fee;
                }
                None
            }
            (None, None) => match order.shipping_zone_id {
                Some(zone_id) => Some(
                    directories
                        .shipping_zone(business, zone_id, new_address.as_ref())
                        .await?,
                ),
                None => None,
            },
        };
        order.shipping_zone_id = zone.as_ref().map(|z| z.id);

        let shipping = match &zone {
            Some(zone) => ShippingInput::Zone(zone),
            None => ShippingInput::Manual(order.shipping_fee),
        };
        let breakdown = PricingEngine::compute(&items, vat_rate, &discount, shipping)?;
        order.apply_pricing(&breakdown);
        order.items = items;
        order.updated_at = now;
        tx.update_order(&order).await?;
        Ok(order)
    }

    async fn payment_details_in(
        &self,
        tx: &mut dyn StoreTransaction,
        business_id: BusinessId,
        order_id: OrderId,
        request: &PaymentDetailsRequest,
    ) -> Result<Order> {
        let mut order = lock_order(&mut *tx, business_id, order_id).await?;
        if !order.status.allows_payment_details() {
            return Err(OrderError::PaymentDetailsUpdateNotAllowed {
                status: order.status,
            }
            .into());
        }
        self.directories()
            .require_payment_method(business_id, request.payment_method)
            .await?;

        order.payment_method = request.payment_method;
        order.payment_reference = request
            .payment_reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        order.updated_at = Utc::now();
        tx.update_order(&order).await?;
        Ok(order)
    }

    /// Publishes the payment event on a detached task if `order` just became
    /// paid. Delivery failures are logged and never reach the caller.
    fn publish_if_paid(&self, previous: PaymentStatus, order: &Order) {
        if previous == PaymentStatus::Paid || order.payment_status != PaymentStatus::Paid {
            return;
        }
        let Some(data) = PaymentSucceededData::from_order(order) else {
            return;
        };
        let event = OrderEvent::PaymentSucceeded(data);
        let order_id = order.id;
        let events = Arc::clone(&self.events);
        tokio::spawn(
            async move {
                match events.publish(event).await {
                    Ok(()) => {
                        metrics::counter!("order_events_published_total").increment(1);
                    }
                    Err(err) => {
                        tracing::warn!(%order_id, error = %err, "failed to publish order event");
                    }
                }
            }
            .in_current_span(),
        );
    }
}

async fn lock_order(
    tx: &mut dyn StoreTransaction,
    business_id: BusinessId,
    order_id: OrderId,
) -> Result<Order> {
    Ok(tx
        .lock_order(business_id, order_id)
        .await?
        .ok_or(OrderError::OrderNotFound { order_id })?)
}

/// Stock held by `items`, to be put back.
fn returned_stock(items: &[OrderLineItem]) -> Vec<StockAdjustment> {
    items
        .iter()
        .map(|item| StockAdjustment {
            variant_id: item.variant_id,
            quantity: item.quantity,
        })
        .collect()
}

async fn delete_in(
    tx: &mut dyn StoreTransaction,
    business_id: BusinessId,
    order_id: OrderId,
) -> Result<()> {
    let order = lock_order(&mut *tx, business_id, order_id).await?;
    if !order.status.allows_deletion() {
        return Err(OrderError::CannotDelete {
            status: order.status,
        }
        .into());
    }

    tx.delete_line_items(order.id).await?;
    InventoryAllocator::restock(&mut *tx, business_id, &returned_stock(&order.items)).await?;
    tx.delete_order(business_id, order.id).await?;
    Ok(())
}

async fn status_in(
    tx: &mut dyn StoreTransaction,
    business_id: BusinessId,
    order_id: OrderId,
    status: OrderStatus,
) -> Result<Order> {
    let mut order = lock_order(&mut *tx, business_id, order_id).await?;
    OrderStateMachine::new(&mut order).transition_status(status, Utc::now())?;
    tx.update_order(&order).await?;
    Ok(order)
}

/// Returns the updated order and the payment status it had before.
async fn payment_status_in(
    tx: &mut dyn StoreTransaction,
    business_id: BusinessId,
    order_id: OrderId,
    payment_status: PaymentStatus,
) -> Result<(Order, PaymentStatus)> {
    let mut order = lock_order(&mut *tx, business_id, order_id).await?;
    let previous = order.payment_status;
    OrderStateMachine::new(&mut order).transition_payment_status(payment_status, Utc::now())?;
    tx.update_order(&order).await?;
    Ok((order, previous))
}

async fn create_note_in(
    tx: &mut dyn StoreTransaction,
    business_id: BusinessId,
    order_id: OrderId,
    content: &str,
) -> Result<OrderNote> {
    let order = lock_order(&mut *tx, business_id, order_id).await?;
    let note = OrderNote::new(order.id, content, Utc::now());
    tx.insert_note(&note).await?;
    Ok(note)
}

async fn update_note_in(
    tx: &mut dyn StoreTransaction,
    business_id: BusinessId,
    order_id: OrderId,
    note_id: NoteId,
    content: &str,
) -> Result<OrderNote> {
    let order = lock_order(&mut *tx, business_id, order_id).await?;
    let mut note = tx
        .find_note(order.id, note_id)
        .await?
        .ok_or(OrderError::NoteNotFound { note_id })?;
    if !content.is_empty() {
        note.content = content.to_string();
        note.updated_at = Utc::now();
        tx.update_note(&note).await?;
    }
    Ok(note)
}

async fn delete_note_in(
    tx: &mut dyn StoreTransaction,
    business_id: BusinessId,
    order_id: OrderId,
    note_id: NoteId,
) -> Result<()> {
    let order = lock_order(&mut *tx, business_id, order_id).await?;
    if tx.delete_note(order.id, note_id).await? {
        Ok(())
    } else {
        Err(OrderError::NoteNotFound { note_id }.into())
    }
}

/// Commits on success and rolls back on failure.
async fn finish<T>(tx: Box<dyn StoreTransaction>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Discount inputs for an update. A typed discount needs a value; a plain
/// amount is stored as an amount-mode discount; otherwise the stored discount
/// is re-applied to the new subtotal.
fn update_discount(
    order: &Order,
    request: &UpdateOrderRequest,
) -> std::result::Result<DiscountInput, OrderError> {
    if let Some(mode) = request.discount_type {
        let value = request
            .discount_value
            .ok_or(OrderError::DiscountValueRequired)?;
        if value < Decimal::ZERO {
            return Err(OrderError::NegativeAmount { field: "discount" });
        }
        return Ok(DiscountInput {
            mode: Some(mode),
            value,
            legacy_amount: Money::zero(),
        });
    }
    if let Some(amount) = request.discount {
        if amount < Decimal::ZERO {
            return Err(OrderError::NegativeAmount { field: "discount" });
        }
        return Ok(DiscountInput::amount(amount));
    }
    Ok(DiscountInput {
        mode: order.discount_mode,
        value: order.discount_value,
        legacy_amount: order.discount,
    })
}
