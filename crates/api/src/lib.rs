//! HTTP API over the order transaction core.
//!
//! Exposes the coordinator's operations under `/businesses/{business_id}/orders`,
//! with structured logging (tracing) and Prometheus metrics. The acting user
//! is read from the `x-actor-id` header.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use orders::{
    BusinessDirectory, CoreConfig, CustomerDirectory, EventSink, OrderCoordinator, ServiceError,
};
use store::OrderStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub coordinator: OrderCoordinator,
    pub metrics: PrometheusHandle,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>) -> Router {
    let orders = Router::new()
        .route("/", post(routes::orders::create))
        .route("/preview", post(routes::orders::preview))
        .route(
            "/by-number/{order_number}",
            get(routes::orders::get_by_number),
        )
        .route(
            "/{order_id}",
            get(routes::orders::get)
                .patch(routes::orders::update)
                .delete(routes::orders::delete),
        )
        .route("/{order_id}/status", post(routes::orders::transition_status))
        .route(
            "/{order_id}/payment-status",
            post(routes::orders::transition_payment_status),
        )
        .route(
            "/{order_id}/payment-details",
            post(routes::orders::add_payment_details),
        )
        .route("/{order_id}/notes", post(routes::orders::create_note))
        .route(
            "/{order_id}/notes/{note_id}",
            patch(routes::orders::update_note).delete(routes::orders::delete_note),
        );

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/metrics", get(routes::metrics::get))
        .nest("/businesses/{business_id}/orders", orders)
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires a coordinator over `store` and the given collaborators.
pub fn create_state(
    store: Arc<dyn OrderStore>,
    customers: impl CustomerDirectory + 'static,
    businesses: impl BusinessDirectory + 'static,
    events: impl EventSink + 'static,
    config: CoreConfig,
    metrics: PrometheusHandle,
) -> Result<Arc<AppState>, ServiceError> {
    let coordinator = OrderCoordinator::builder(store)
        .customers(customers)
        .businesses(businesses)
        .events(events)
        .config(config)
        .build()?;
    Ok(Arc::new(AppState {
        coordinator,
        metrics,
    }))
}
