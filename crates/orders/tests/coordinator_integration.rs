//! End-to-end tests of the order coordinator over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use common::{
    ActorId, AddressId, BusinessId, CustomerId, NoteId, ProductId, ShippingZoneId, VariantId,
};
use domain::{
    Business, Customer, CustomerAddress, DiscountMode, ErrorKind, Money, OrderError, OrderEvent,
    OrderStatus, PaymentMethod, PaymentStatus, ShippingZone, StatusPathPolicy, Variant,
};
use orders::{
    CoreConfig, CreateOrderRequest, InMemoryBusinessDirectory, InMemoryCustomerDirectory,
    InMemoryEventSink, InMemoryThrottleStore, LineItemRequest, NoteRequest, OrderCoordinator,
    PaymentDetailsRequest, ScriptedOrderNumbers, ServiceError, ThrottleGuard, UpdateOrderRequest,
};
use rust_decimal_macros::dec;
use store::{InMemoryStore, OrderStore};

struct Fixture {
    store: InMemoryStore,
    customers: InMemoryCustomerDirectory,
    businesses: InMemoryBusinessDirectory,
    events: InMemoryEventSink,
    actor_id: ActorId,
    business_id: BusinessId,
    customer_id: CustomerId,
    address_id: AddressId,
}

impl Fixture {
    async fn new() -> Self {
        let store = InMemoryStore::new();
        let customers = InMemoryCustomerDirectory::new();
        let businesses = InMemoryBusinessDirectory::new();
        let business_id = BusinessId::new();
        let customer_id = CustomerId::new();
        let address_id = AddressId::new();

        businesses
            .add_business(Business {
                id: business_id,
                name: "Acme".into(),
                currency: "SAR".into(),
                vat_rate: dec!(0.15),
            })
            .await;
        customers
            .add_customer(Customer {
                id: customer_id,
                business_id,
                name: "Noor".into(),
            })
            .await;
        customers
            .add_address(CustomerAddress {
                id: address_id,
                customer_id,
                country_code: "sa".into(),
            })
            .await;

        Self {
            store,
            customers,
            businesses,
            events: InMemoryEventSink::new(),
            actor_id: ActorId::new(),
            business_id,
            customer_id,
            address_id,
        }
    }

    fn coordinator(&self, config: CoreConfig) -> OrderCoordinator {
        self.builder(config).build().unwrap()
    }

    fn builder(&self, config: CoreConfig) -> orders::OrderCoordinatorBuilder {
        OrderCoordinator::builder(Arc::new(self.store.clone()))
            .customers(self.customers.clone())
            .businesses(self.businesses.clone())
            .events(self.events.clone())
            .config(config)
    }

    async fn variant(&self, stock: i64) -> VariantId {
        let variant = Variant {
            id: VariantId::new(),
            product_id: ProductId::new(),
            business_id: self.business_id,
            currency: "SAR".into(),
            unit_price: Money::from_cents(2500),
            unit_cost: Money::from_cents(1000),
            stock_quantity: stock,
        };
        let id = variant.id;
        self.store.insert_variant(variant).await;
        id
    }

    async fn stock(&self, variant_id: VariantId) -> i64 {
        self.store.variant(variant_id).await.unwrap().stock_quantity
    }

    async fn zone(
        &self,
        cost_cents: i64,
        threshold_cents: i64,
        countries: &[&str],
    ) -> ShippingZoneId {
        let zone = ShippingZone {
            id: ShippingZoneId::new(),
            business_id: self.business_id,
            name: "Domestic".into(),
            currency: "SAR".into(),
            countries: countries.iter().map(|c| c.to_string()).collect(),
            cost: Money::from_cents(cost_cents),
            free_threshold: Money::from_cents(threshold_cents),
        };
        let id = zone.id;
        self.businesses.add_shipping_zone(zone).await;
        id
    }

    fn request(&self, variant_id: VariantId, quantity: u32) -> CreateOrderRequest {
        CreateOrderRequest::new(
            self.customer_id,
            self.address_id,
            vec![LineItemRequest::new(
                variant_id,
                quantity,
                dec!(25.00),
                dec!(10.00),
            )],
        )
    }
}

fn unthrottled() -> CoreConfig {
    CoreConfig::default().without_throttling()
}

#[tokio::test]
async fn test_create_prices_order_and_reserves_stock() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx.coordinator(unthrottled());

    let mut request = fx.request(variant_id, 2);
    request.discount_type = Some(DiscountMode::Amount);
    request.discount_value = dec!(5.00);
    request.shipping_fee = dec!(10.00);

    let order = coordinator
        .create(fx.actor_id, fx.business_id, request)
        .await
        .unwrap();

    assert_eq!(order.subtotal, Money::from_cents(5000));
    assert_eq!(order.vat, Money::from_cents(750));
    assert_eq!(order.discount, Money::from_cents(500));
    assert_eq!(order.shipping_fee, Money::from_cents(1000));
    assert_eq!(order.cogs, Money::from_cents(2000));
    assert_eq!(order.total, Money::from_cents(6250));
    assert_eq!(order.order_number.len(), 6);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert!(order.totals_are_consistent());
    assert_eq!(fx.stock(variant_id).await, 8);

    let loaded = coordinator
        .get_by_number(fx.actor_id, fx.business_id, &order.order_number)
        .await
        .unwrap();
    assert_eq!(loaded.id, order.id);
    assert_eq!(loaded.items.len(), 1);
    assert_eq!(loaded.total, Money::from_cents(6250));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_never_oversell() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(3).await;
    let coordinator = Arc::new(fx.coordinator(unthrottled()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let coordinator = Arc::clone(&coordinator);
        let request = fx.request(variant_id, 1);
        let business_id = fx.business_id;
        handles.push(tokio::spawn(async move {
            coordinator.create(ActorId::new(), business_id, request).await
        }));
    }

    let mut created = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(ServiceError::Order(OrderError::InsufficientStock { .. })) => out_of_stock += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(created, 3);
    assert_eq!(out_of_stock, 5);
    assert_eq!(fx.stock(variant_id).await, 0);
    assert_eq!(fx.store.order_count().await, 3);
}

#[tokio::test]
async fn test_insufficient_stock_leaves_nothing_behind() {
    let fx = Fixture::new().await;
    let plenty = fx.variant(10).await;
    let scarce = fx.variant(1).await;
    let coordinator = fx.coordinator(unthrottled());

    let mut request = fx.request(plenty, 4);
    request
        .items
        .push(LineItemRequest::new(scarce, 2, dec!(25.00), dec!(10.00)));

    let err = coordinator
        .create(fx.actor_id, fx.business_id, request)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(fx.stock(plenty).await, 10);
    assert_eq!(fx.stock(scarce).await, 1);
    assert_eq!(fx.store.order_count().await, 0);
}

#[tokio::test]
async fn test_delete_returns_stock_of_every_line() {
    let fx = Fixture::new().await;
    let first = fx.variant(10).await;
    let second = fx.variant(10).await;
    let coordinator = fx.coordinator(unthrottled());

    let mut request = fx.request(first, 3);
    request
        .items
        .push(LineItemRequest::new(second, 5, dec!(12.00), dec!(4.00)));
    let order = coordinator
        .create(fx.actor_id, fx.business_id, request)
        .await
        .unwrap();
    assert_eq!(fx.stock(first).await, 7);
    assert_eq!(fx.stock(second).await, 5);

    coordinator
        .delete(fx.actor_id, fx.business_id, order.id)
        .await
        .unwrap();

    assert_eq!(fx.stock(first).await, 10);
    assert_eq!(fx.stock(second).await, 10);
    let err = coordinator
        .get(fx.actor_id, fx.business_id, order.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Order(OrderError::OrderNotFound { .. })
    ));
}

#[tokio::test]
async fn test_delete_rejected_once_placed() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx.coordinator(unthrottled());

    let mut request = fx.request(variant_id, 1);
    request.status = Some(OrderStatus::Placed);
    let order = coordinator
        .create(fx.actor_id, fx.business_id, request)
        .await
        .unwrap();

    let err = coordinator
        .delete(fx.actor_id, fx.business_id, order.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Order(OrderError::CannotDelete {
            status: OrderStatus::Placed
        })
    ));
    assert_eq!(fx.stock(variant_id).await, 9);
}

#[tokio::test]
async fn test_preview_matches_create_without_writing() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx.coordinator(unthrottled());

    let mut request = fx.request(variant_id, 2);
    request.discount_type = Some(DiscountMode::Percent);
    request.discount_value = dec!(10);
    request.shipping_fee = dec!(10.00);

    let first = coordinator
        .preview(fx.actor_id, fx.business_id, request.clone())
        .await
        .unwrap();
    let second = coordinator
        .preview(fx.actor_id, fx.business_id, request.clone())
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(fx.stock(variant_id).await, 10);
    assert_eq!(fx.store.order_count().await, 0);

    let order = coordinator
        .create(fx.actor_id, fx.business_id, request)
        .await
        .unwrap();
    assert_eq!(first.breakdown.total, order.total);
    assert_eq!(first.breakdown.discount, Money::from_cents(500));
    assert_eq!(first.items.len(), 1);
}

#[tokio::test]
async fn test_preview_reports_insufficient_stock() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(1).await;
    let coordinator = fx.coordinator(unthrottled());

    let err = coordinator
        .preview(fx.actor_id, fx.business_id, fx.request(variant_id, 2))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Order(OrderError::InsufficientStock { .. })
    ));
}

#[tokio::test]
async fn test_order_number_collision_retries_with_new_number() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx
        .builder(unthrottled())
        .order_numbers(ScriptedOrderNumbers::new(["AAA111", "AAA111", "BBB222"]))
        .build()
        .unwrap();

    let first = coordinator
        .create(fx.actor_id, fx.business_id, fx.request(variant_id, 1))
        .await
        .unwrap();
    let second = coordinator
        .create(fx.actor_id, fx.business_id, fx.request(variant_id, 1))
        .await
        .unwrap();

    assert_eq!(first.order_number, "AAA111");
    assert_eq!(second.order_number, "BBB222");
    assert_eq!(fx.stock(variant_id).await, 8);
}

#[tokio::test]
async fn test_order_number_exhaustion_rolls_back() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx
        .builder(unthrottled().with_number_attempts(2))
        .order_numbers(ScriptedOrderNumbers::new(["AAA111", "AAA111", "AAA111"]))
        .build()
        .unwrap();

    coordinator
        .create(fx.actor_id, fx.business_id, fx.request(variant_id, 1))
        .await
        .unwrap();
    let err = coordinator
        .create(fx.actor_id, fx.business_id, fx.request(variant_id, 1))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::OrderNumberGenerationFailed { attempts: 2 }
    ));
    assert_eq!(fx.stock(variant_id).await, 9);
    assert_eq!(fx.store.order_count().await, 1);
}

#[tokio::test]
async fn test_serialization_failure_is_retried() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx.coordinator(unthrottled());

    fx.store.fail_next_commits(2);
    let order = coordinator
        .create(fx.actor_id, fx.business_id, fx.request(variant_id, 2))
        .await
        .unwrap();

    assert_eq!(fx.store.order_count().await, 1);
    assert_eq!(fx.stock(variant_id).await, 8);
    assert!(
        fx.store
            .find_order(fx.business_id, order.id)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn test_serialization_retries_are_bounded() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx.coordinator(unthrottled().with_tx_attempts(3));

    fx.store.fail_next_commits(3);
    let err = coordinator
        .create(fx.actor_id, fx.business_id, fx.request(variant_id, 2))
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::RetriesExhausted { attempts: 3 }));
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(fx.store.order_count().await, 0);
    assert_eq!(fx.stock(variant_id).await, 10);
}

#[tokio::test]
async fn test_create_target_status_follows_path_policy() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;

    let mut request = fx.request(variant_id, 1);
    request.status = Some(OrderStatus::Shipped);

    let single_hop = fx.coordinator(unthrottled());
    let err = single_hop
        .create(fx.actor_id, fx.business_id, request.clone())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Order(OrderError::InvalidTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped
        })
    ));
    assert_eq!(fx.stock(variant_id).await, 10);

    let walking = fx.coordinator(unthrottled().with_status_path(StatusPathPolicy::Walk));
    let order = walking
        .create(fx.actor_id, fx.business_id, request)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Shipped);
    assert!(order.timestamps.placed_at.is_some());
    assert!(order.timestamps.shipped_at.is_some());
}

#[tokio::test]
async fn test_transition_status_is_single_hop() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx.coordinator(unthrottled().with_status_path(StatusPathPolicy::Walk));
    let order = coordinator
        .create(fx.actor_id, fx.business_id, fx.request(variant_id, 1))
        .await
        .unwrap();

    let err = coordinator
        .transition_status(fx.actor_id, fx.business_id, order.id, OrderStatus::Fulfilled)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let placed = coordinator
        .transition_status(fx.actor_id, fx.business_id, order.id, OrderStatus::Placed)
        .await
        .unwrap();
    assert_eq!(placed.status, OrderStatus::Placed);
    assert!(placed.timestamps.placed_at.is_some());
}

#[tokio::test]
async fn test_payment_requires_placed_order_and_publishes_once() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx.coordinator(unthrottled());
    let order = coordinator
        .create(fx.actor_id, fx.business_id, fx.request(variant_id, 1))
        .await
        .unwrap();

    let err = coordinator
        .transition_payment_status(fx.actor_id, fx.business_id, order.id, PaymentStatus::Paid)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Order(OrderError::PaymentStatusInvalidForOrderStatus { .. })
    ));

    coordinator
        .transition_status(fx.actor_id, fx.business_id, order.id, OrderStatus::Placed)
        .await
        .unwrap();
    let paid = coordinator
        .transition_payment_status(fx.actor_id, fx.business_id, order.id, PaymentStatus::Paid)
        .await
        .unwrap();
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert!(paid.timestamps.paid_at.is_some());

    let events = fx.events.wait_for(1, Duration::from_secs(2)).await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        OrderEvent::PaymentSucceeded(data) => {
            assert_eq!(data.order_id, order.id);
            assert_eq!(data.total, paid.total);
        }
    }

    coordinator
        .transition_payment_status(
            fx.actor_id,
            fx.business_id,
            order.id,
            PaymentStatus::Refunded,
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fx.events.events().await.len(), 1);
}

#[tokio::test]
async fn test_paid_at_create_publishes_event_even_if_sink_fails_later() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx.coordinator(unthrottled());

    let mut request = fx.request(variant_id, 1);
    request.status = Some(OrderStatus::Placed);
    request.payment_status = Some(PaymentStatus::Paid);
    let order = coordinator
        .create(fx.actor_id, fx.business_id, request)
        .await
        .unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Paid);
    assert_eq!(fx.events.wait_for(1, Duration::from_secs(2)).await.len(), 1);

    fx.events.set_fail_on_publish(true).await;
    let mut request = fx.request(variant_id, 1);
    request.status = Some(OrderStatus::Placed);
    request.payment_status = Some(PaymentStatus::Paid);
    let second = coordinator
        .create(fx.actor_id, fx.business_id, request)
        .await;
    assert!(second.is_ok());
}

#[tokio::test]
async fn test_zone_shipping_waives_fee_above_threshold() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let zone_id = fx.zone(1500, 4000, &["SA", "AE"]).await;
    let coordinator = fx.coordinator(unthrottled());

    let mut below = fx.request(variant_id, 1);
    below.shipping_zone_id = Some(zone_id);
    below.shipping_fee = dec!(99.00);
    let order = coordinator
        .create(fx.actor_id, fx.business_id, below)
        .await
        .unwrap();
    assert_eq!(order.shipping_fee, Money::from_cents(1500));
    assert_eq!(order.shipping_zone_id, Some(zone_id));

    let mut above = fx.request(variant_id, 2);
    above.shipping_zone_id = Some(zone_id);
    let order = coordinator
        .create(fx.actor_id, fx.business_id, above)
        .await
        .unwrap();
    assert_eq!(order.shipping_fee, Money::zero());
}

#[tokio::test]
async fn test_zone_must_cover_address_country() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let zone_id = fx.zone(1500, 0, &["AE"]).await;
    let coordinator = fx.coordinator(unthrottled());

    let mut request = fx.request(variant_id, 1);
    request.shipping_zone_id = Some(zone_id);
    let err = coordinator
        .create(fx.actor_id, fx.business_id, request)
        .await
        .unwrap_err();

    match err {
        ServiceError::Order(OrderError::ShippingZoneCountryMismatch { country_code, .. }) => {
            assert_eq!(country_code, "SA");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fx.stock(variant_id).await, 10);
}

#[tokio::test]
async fn test_create_validates_ownership_and_payment_method() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx.coordinator(unthrottled());

    let mut stranger = fx.request(variant_id, 1);
    stranger.customer_id = CustomerId::new();
    let err = coordinator
        .create(fx.actor_id, fx.business_id, stranger)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    fx.businesses
        .disable_payment_method(fx.business_id, PaymentMethod::CashOnDelivery)
        .await;
    let mut cod = fx.request(variant_id, 1);
    cod.payment_method = Some(PaymentMethod::CashOnDelivery);
    let err = coordinator
        .create(fx.actor_id, fx.business_id, cod)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Order(OrderError::PaymentMethodDisabled { .. })
    ));

    let err = coordinator
        .create(fx.actor_id, BusinessId::new(), fx.request(variant_id, 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Order(OrderError::BusinessNotFound { .. })
    ));
    assert_eq!(fx.store.order_count().await, 0);
}

#[tokio::test]
async fn test_update_replaces_items_and_moves_stock() {
    let fx = Fixture::new().await;
    let first = fx.variant(10).await;
    let second = fx.variant(10).await;
    let coordinator = fx.coordinator(unthrottled());
    let order = coordinator
        .create(fx.actor_id, fx.business_id, fx.request(first, 2))
        .await
        .unwrap();

    let update = UpdateOrderRequest {
        items: Some(vec![LineItemRequest::new(
            second,
            4,
            dec!(10.00),
            dec!(2.50),
        )]),
        shipping_fee: Some(dec!(5.00)),
        ..Default::default()
    };
    let updated = coordinator
        .update(fx.actor_id, fx.business_id, order.id, update)
        .await
        .unwrap();

    assert_eq!(fx.stock(first).await, 10);
    assert_eq!(fx.stock(second).await, 6);
    assert_eq!(updated.items.len(), 1);
    assert_eq!(updated.subtotal, Money::from_cents(4000));
    assert_eq!(updated.vat, Money::from_cents(600));
    assert_eq!(updated.shipping_fee, Money::from_cents(500));
    assert_eq!(updated.total, Money::from_cents(5100));
    assert!(updated.totals_are_consistent());
}

#[tokio::test]
async fn test_update_rejects_item_edits_after_shipping() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx.coordinator(unthrottled().with_status_path(StatusPathPolicy::Walk));
    let mut request = fx.request(variant_id, 1);
    request.status = Some(OrderStatus::Shipped);
    let order = coordinator
        .create(fx.actor_id, fx.business_id, request)
        .await
        .unwrap();

    let update = UpdateOrderRequest {
        items: Some(vec![LineItemRequest::new(
            variant_id,
            3,
            dec!(25.00),
            dec!(10.00),
        )]),
        ..Default::default()
    };
    let err = coordinator
        .update(fx.actor_id, fx.business_id, order.id, update)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Order(OrderError::ItemsUpdateNotAllowed { .. })
    ));
    assert_eq!(fx.stock(variant_id).await, 9);
}

#[tokio::test]
async fn test_update_discount_and_zone_changes() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let zone_id = fx.zone(1500, 0, &["SA"]).await;
    let coordinator = fx.coordinator(unthrottled());
    let order = coordinator
        .create(fx.actor_id, fx.business_id, fx.request(variant_id, 2))
        .await
        .unwrap();

    let err = coordinator
        .update(
            fx.actor_id,
            fx.business_id,
            order.id,
            UpdateOrderRequest {
                discount_type: Some(DiscountMode::Percent),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Order(OrderError::DiscountValueRequired)
    ));

    let zoned = coordinator
        .update(
            fx.actor_id,
            fx.business_id,
            order.id,
            UpdateOrderRequest {
                shipping_zone_id: Some(Some(zone_id)),
                discount_type: Some(DiscountMode::Percent),
                discount_value: Some(dec!(20)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(zoned.shipping_zone_id, Some(zone_id));
    assert_eq!(zoned.shipping_fee, Money::from_cents(1500));
    assert_eq!(zoned.discount, Money::from_cents(1000));
    // 50.00 + 7.50 + 15.00 - 10.00
    assert_eq!(zoned.total, Money::from_cents(6250));

    let cleared = coordinator
        .update(
            fx.actor_id,
            fx.business_id,
            order.id,
            UpdateOrderRequest {
                shipping_zone_id: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.shipping_zone_id, None);
    assert_eq!(cleared.shipping_fee, Money::from_cents(1500));
    assert_eq!(cleared.discount, Money::from_cents(1000));
    assert_eq!(cleared.discount_mode, Some(DiscountMode::Percent));
}

#[tokio::test]
async fn test_payment_details_follow_order_status() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx.coordinator(unthrottled());
    let order = coordinator
        .create(fx.actor_id, fx.business_id, fx.request(variant_id, 1))
        .await
        .unwrap();

    let updated = coordinator
        .add_payment_details(
            fx.actor_id,
            fx.business_id,
            order.id,
            PaymentDetailsRequest {
                payment_method: PaymentMethod::CreditCard,
                payment_reference: Some("  ch_123  ".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.payment_method, PaymentMethod::CreditCard);
    assert_eq!(updated.payment_reference.as_deref(), Some("ch_123"));
    assert_eq!(updated.payment_status, PaymentStatus::Pending);

    coordinator
        .transition_status(fx.actor_id, fx.business_id, order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    let err = coordinator
        .add_payment_details(
            fx.actor_id,
            fx.business_id,
            order.id,
            PaymentDetailsRequest {
                payment_method: PaymentMethod::Tabby,
                payment_reference: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Order(OrderError::PaymentDetailsUpdateNotAllowed { .. })
    ));
}

#[tokio::test]
async fn test_notes_lifecycle() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx.coordinator(unthrottled());

    let mut request = fx.request(variant_id, 1);
    request.note = Some("gift wrap".into());
    let order = coordinator
        .create(fx.actor_id, fx.business_id, request)
        .await
        .unwrap();
    assert_eq!(order.notes.len(), 1);

    let err = coordinator
        .create_note(
            fx.actor_id,
            fx.business_id,
            order.id,
            NoteRequest {
                content: "   ".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Order(OrderError::EmptyNote)));

    let note = coordinator
        .create_note(
            fx.actor_id,
            fx.business_id,
            order.id,
            NoteRequest {
                content: " call first ".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(note.content, "call first");

    let unchanged = coordinator
        .update_note(
            fx.actor_id,
            fx.business_id,
            order.id,
            note.id,
            NoteRequest { content: "".into() },
        )
        .await
        .unwrap();
    assert_eq!(unchanged.content, "call first");

    let edited = coordinator
        .update_note(
            fx.actor_id,
            fx.business_id,
            order.id,
            note.id,
            NoteRequest {
                content: "call twice".into(),
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.content, "call twice");

    coordinator
        .delete_note(fx.actor_id, fx.business_id, order.id, note.id)
        .await
        .unwrap();
    let err = coordinator
        .delete_note(fx.actor_id, fx.business_id, order.id, note.id)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Order(OrderError::NoteNotFound { .. })
    ));

    let err = coordinator
        .update_note(
            fx.actor_id,
            fx.business_id,
            order.id,
            NoteId::new(),
            NoteRequest {
                content: "x".into(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let loaded = coordinator
        .get(fx.actor_id, fx.business_id, order.id)
        .await
        .unwrap();
    assert_eq!(loaded.notes.len(), 1);
    assert_eq!(loaded.notes[0].content, "gift wrap");
}

#[tokio::test]
async fn test_create_is_throttled_per_actor() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let coordinator = fx.coordinator(CoreConfig::default());

    coordinator
        .create(fx.actor_id, fx.business_id, fx.request(variant_id, 1))
        .await
        .unwrap();
    let err = coordinator
        .create(fx.actor_id, fx.business_id, fx.request(variant_id, 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::RateLimited {
            operation: "create"
        }
    ));
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert_eq!(fx.stock(variant_id).await, 9);

    coordinator
        .create(ActorId::new(), fx.business_id, fx.request(variant_id, 1))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_throttle_fails_open_when_store_is_down() {
    let fx = Fixture::new().await;
    let variant_id = fx.variant(10).await;
    let throttle_store = InMemoryThrottleStore::new();
    throttle_store.set_unavailable(true).await;
    let coordinator = fx
        .builder(CoreConfig::default())
        .rate_limiter(ThrottleGuard::new(throttle_store))
        .build()
        .unwrap();

    for _ in 0..3 {
        coordinator
            .create(fx.actor_id, fx.business_id, fx.request(variant_id, 1))
            .await
            .unwrap();
    }
    assert_eq!(fx.stock(variant_id).await, 7);
}
