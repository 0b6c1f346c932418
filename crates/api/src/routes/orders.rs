//! Order endpoints, scoped to a business in the path.

use std::sync::Arc;

use axum::Json;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use common::{
    ActorId, AddressId, BusinessId, CustomerId, NoteId, OrderId, ProductId, ShippingZoneId,
    VariantId,
};
use domain::{
    DiscountMode, Money, Order, OrderLineItem, OrderNote, OrderStatus, PaymentMethod,
    PaymentStatus,
};
use orders::{
    CreateOrderRequest, NoteRequest, OrderPreview, PaymentDetailsRequest, UpdateOrderRequest,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::error::ApiError;

/// Header carrying the id of the acting user.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// The acting user, taken from [`ACTOR_HEADER`].
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub ActorId);

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(ACTOR_HEADER)
            .ok_or_else(|| ApiError::BadRequest(format!("Missing {ACTOR_HEADER} header")))?;
        let id = value
            .to_str()
            .ok()
            .and_then(|v| v.parse::<ActorId>().ok())
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid {ACTOR_HEADER} header")))?;
        Ok(Actor(id))
    }
}

// -- Request types --

#[derive(Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

#[derive(Deserialize)]
pub struct PaymentStatusChange {
    pub payment_status: PaymentStatus,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub order_number: String,
    pub business_id: BusinessId,
    pub customer_id: CustomerId,
    pub shipping_address_id: AddressId,
    pub shipping_zone_id: Option<ShippingZoneId>,
    pub channel: String,
    pub currency: String,
    pub subtotal: Decimal,
    pub vat: Decimal,
    pub vat_rate: Decimal,
    pub shipping_fee: Decimal,
    pub discount: Decimal,
    pub discount_type: Option<DiscountMode>,
    pub discount_value: Decimal,
    pub cogs: Decimal,
    pub total: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub payment_reference: Option<String>,
    pub ordered_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<LineItemResponse>,
    pub notes: Vec<NoteResponse>,
}

#[derive(Serialize)]
pub struct LineItemResponse {
    pub product_id: ProductId,
    pub variant_id: VariantId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub unit_cost: Decimal,
    pub total: Decimal,
    pub total_cost: Decimal,
}

#[derive(Serialize)]
pub struct NoteResponse {
    pub id: NoteId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct PreviewResponse {
    pub currency: String,
    pub subtotal: Decimal,
    pub vat: Decimal,
    pub vat_rate: Decimal,
    pub shipping_fee: Decimal,
    pub shipping_zone_id: Option<ShippingZoneId>,
    pub discount: Decimal,
    pub discount_type: Option<DiscountMode>,
    pub discount_value: Decimal,
    pub cogs: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    pub items: Vec<LineItemResponse>,
}

fn amount(money: Money) -> Decimal {
    money.to_decimal()
}

impl From<&OrderLineItem> for LineItemResponse {
    fn from(item: &OrderLineItem) -> Self {
        Self {
            product_id: item.product_id,
            variant_id: item.variant_id,
            quantity: item.quantity,
            unit_price: amount(item.unit_price),
            unit_cost: amount(item.unit_cost),
            total: amount(item.total),
            total_cost: amount(item.total_cost),
        }
    }
}

impl From<&OrderNote> for NoteResponse {
    fn from(note: &OrderNote) -> Self {
        Self {
            id: note.id,
            content: note.content.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            business_id: order.business_id,
            customer_id: order.customer_id,
            shipping_address_id: order.shipping_address_id,
            shipping_zone_id: order.shipping_zone_id,
            subtotal: amount(order.subtotal),
            vat: amount(order.vat),
            vat_rate: order.vat_rate,
            shipping_fee: amount(order.shipping_fee),
            discount: amount(order.discount),
            discount_type: order.discount_mode,
            discount_value: order.discount_value,
            cogs: amount(order.cogs),
            total: amount(order.total),
            status: order.status,
            payment_status: order.payment_status,
            payment_method: order.payment_method,
            ordered_at: order.ordered_at,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: order.items.iter().map(LineItemResponse::from).collect(),
            notes: order.notes.iter().map(NoteResponse::from).collect(),
            order_number: order.order_number,
            channel: order.channel,
            currency: order.currency,
            payment_reference: order.payment_reference,
        }
    }
}

impl From<OrderPreview> for PreviewResponse {
    fn from(preview: OrderPreview) -> Self {
        let breakdown = preview.breakdown;
        Self {
            currency: preview.currency,
            subtotal: amount(breakdown.subtotal),
            vat: amount(breakdown.vat),
            vat_rate: breakdown.vat_rate,
            shipping_fee: amount(breakdown.shipping_fee),
            shipping_zone_id: preview.shipping_zone_id,
            discount: amount(breakdown.discount),
            discount_type: breakdown.discount_mode,
            discount_value: breakdown.discount_value,
            cogs: amount(breakdown.cogs),
            total: amount(breakdown.total),
            payment_method: preview.payment_method,
            items: preview
                .items
                .iter()
                .map(|item| LineItemResponse {
                    product_id: item.product_id,
                    variant_id: item.variant_id,
                    quantity: item.quantity,
                    unit_price: amount(item.unit_price),
                    unit_cost: amount(item.unit_cost),
                    total: amount(item.total),
                    total_cost: amount(item.total_cost),
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// POST /businesses/{business_id}/orders: record a new order.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    Path(business_id): Path<BusinessId>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state.coordinator.create(actor_id, business_id, req).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// POST /businesses/{business_id}/orders/preview: price an order without recording it.
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    Path(business_id): Path<BusinessId>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<PreviewResponse>, ApiError> {
    let preview = state.coordinator.preview(actor_id, business_id, req).await?;
    Ok(Json(preview.into()))
}

/// GET /businesses/{business_id}/orders/{order_id}
pub async fn get(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    Path((business_id, order_id)): Path<(BusinessId, OrderId)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state.coordinator.get(actor_id, business_id, order_id).await?;
    Ok(Json(order.into()))
}

/// GET /businesses/{business_id}/orders/by-number/{order_number}
pub async fn get_by_number(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    Path((business_id, order_number)): Path<(BusinessId, String)>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .coordinator
        .get_by_number(actor_id, business_id, &order_number)
        .await?;
    Ok(Json(order.into()))
}

/// PATCH /businesses/{business_id}/orders/{order_id}
pub async fn update(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    Path((business_id, order_id)): Path<(BusinessId, OrderId)>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .coordinator
        .update(actor_id, business_id, order_id, req)
        .await?;
    Ok(Json(order.into()))
}

/// DELETE /businesses/{business_id}/orders/{order_id}
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    Path((business_id, order_id)): Path<(BusinessId, OrderId)>,
) -> Result<StatusCode, ApiError> {
    state
        .coordinator
        .delete(actor_id, business_id, order_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /businesses/{business_id}/orders/{order_id}/status
pub async fn transition_status(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    Path((business_id, order_id)): Path<(BusinessId, OrderId)>,
    Json(req): Json<StatusChange>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .coordinator
        .transition_status(actor_id, business_id, order_id, req.status)
        .await?;
    Ok(Json(order.into()))
}

/// POST /businesses/{business_id}/orders/{order_id}/payment-status
pub async fn transition_payment_status(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    Path((business_id, order_id)): Path<(BusinessId, OrderId)>,
    Json(req): Json<PaymentStatusChange>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .coordinator
        .transition_payment_status(actor_id, business_id, order_id, req.payment_status)
        .await?;
    Ok(Json(order.into()))
}

/// POST /businesses/{business_id}/orders/{order_id}/payment-details
pub async fn add_payment_details(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    Path((business_id, order_id)): Path<(BusinessId, OrderId)>,
    Json(req): Json<PaymentDetailsRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order = state
        .coordinator
        .add_payment_details(actor_id, business_id, order_id, req)
        .await?;
    Ok(Json(order.into()))
}

/// POST /businesses/{business_id}/orders/{order_id}/notes
pub async fn create_note(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    Path((business_id, order_id)): Path<(BusinessId, OrderId)>,
    Json(req): Json<NoteRequest>,
) -> Result<(StatusCode, Json<NoteResponse>), ApiError> {
    let note = state
        .coordinator
        .create_note(actor_id, business_id, order_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(NoteResponse::from(&note))))
}

/// PATCH /businesses/{business_id}/orders/{order_id}/notes/{note_id}
pub async fn update_note(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    Path((business_id, order_id, note_id)): Path<(BusinessId, OrderId, NoteId)>,
    Json(req): Json<NoteRequest>,
) -> Result<Json<NoteResponse>, ApiError> {
    let note = state
        .coordinator
        .update_note(actor_id, business_id, order_id, note_id, req)
        .await?;
    Ok(Json(NoteResponse::from(&note)))
}

/// DELETE /businesses/{business_id}/orders/{order_id}/notes/{note_id}
pub async fn delete_note(
    State(state): State<Arc<AppState>>,
    Actor(actor_id): Actor,
    Path((business_id, order_id, note_id)): Path<(BusinessId, OrderId, NoteId)>,
) -> Result<StatusCode, ApiError> {
    state
        .coordinator
        .delete_note(actor_id, business_id, order_id, note_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
