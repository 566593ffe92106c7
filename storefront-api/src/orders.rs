//! Order intake and lifecycle.
//!
//! Placement and cancellation each run in a single database transaction:
//! order rows, line items, stock, the payment transaction, the admin
//! notification and the outbox event commit or roll back together.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use shared::pricing::{Adjustments, OrderTotals, PricedLine};
use shared::validation::{is_blank, is_valid_email, is_valid_phone, normalize_email};
use shared::*;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{AppState, Page, Pagination};
use crate::error::{ApiError, ApiResult};
use crate::models::*;
use crate::notifications::{notify_admin, NotificationKind};
use crate::outbox;
use crate::schema::*;
use crate::transactions;

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: Option<Uuid>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub items: Vec<OrderLineRequest>,
    pub discount: Option<BigDecimal>,
    pub tax: Option<BigDecimal>,
    pub shipping_fee: Option<BigDecimal>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
}

impl CreateOrderRequest {
    pub fn validate(&self) -> ApiResult<()> {
        if self.items.is_empty() {
            return Err(ApiError::validation("order must contain at least one item"));
        }
        let mut seen = HashSet::new();
        for item in &self.items {
            if item.quantity < 1 {
                return Err(ApiError::validation(format!(
                    "quantity for product {} must be at least 1",
                    item.product_id
                )));
            }
            if !seen.insert(item.product_id) {
                return Err(ApiError::validation(format!(
                    "product {} appears more than once",
                    item.product_id
                )));
            }
        }
        if is_blank(&self.customer_name) {
            return Err(ApiError::validation("customer_name is required"));
        }
        if !is_valid_email(&self.customer_email) {
            return Err(ApiError::validation("customer_email is not a valid email address"));
        }
        if let Some(phone) = self.customer_phone.as_deref().filter(|p| !is_blank(p)) {
            if !is_valid_phone(phone) {
                return Err(ApiError::validation("customer_phone is not a valid phone number"));
            }
        }
        if self.payment_reference.as_deref().is_some_and(is_blank) {
            return Err(ApiError::validation("payment_reference must not be blank"));
        }
        let missing = self.shipping_address.missing_fields();
        if !missing.is_empty() {
            return Err(ApiError::validation(format!(
                "shipping_address is missing {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    fn adjustments(&self) -> Adjustments {
        Adjustments {
            discount: self.discount.clone().unwrap_or_default(),
            tax: self.tax.clone().unwrap_or_default(),
            shipping_fee: self.shipping_fee.clone().unwrap_or_default(),
        }
    }
}

/// Prices each requested line from the catalogue, enforcing availability.
pub fn price_lines(
    requested: &[OrderLineRequest],
    products: &HashMap<Uuid, Product>,
    is_pre_order: bool,
) -> ApiResult<Vec<PricedLine>> {
    requested
        .iter()
        .map(|line| {
            let product = products
                .get(&line.product_id)
                .filter(|p| p.is_active)
                .ok_or_else(|| ApiError::validation(format!("product {} is not available", line.product_id)))?;
            if !is_pre_order && product.stock_quantity < line.quantity {
                return Err(ApiError::conflict(format!(
                    "insufficient stock for {}: {} requested, {} available",
                    product.name, line.quantity, product.stock_quantity
                )));
            }
            Ok(PricedLine::new(product.id, product.name.clone(), &product.price, line.quantity)?)
        })
        .collect()
}

#[derive(QueryableByName)]
struct NextSequenceValue {
    #[diesel(sql_type = BigInt)]
    value: i64,
}

async fn next_order_number(conn: &mut AsyncPgConnection) -> ApiResult<String> {
    let next = diesel::sql_query("SELECT nextval('order_number_seq') AS value")
        .get_result::<NextSequenceValue>(conn)
        .await?;
    Ok(order_number::format(next.value, Utc::now().date_naive()))
}

async fn decrement_stock(conn: &mut AsyncPgConnection, line: &PricedLine) -> ApiResult<()> {
    let updated = diesel::update(
        products::table
            .filter(products::id.eq(line.product_id))
            .filter(products::stock_quantity.ge(line.quantity)),
    )
    .set((
        products::stock_quantity.eq(products::stock_quantity - line.quantity),
        products::in_stock.eq((products::stock_quantity - line.quantity).gt(0)),
        products::updated_at.eq(Utc::now()),
    ))
    .execute(conn)
    .await?;

    if updated == 0 {
        return Err(ApiError::conflict(format!(
            "insufficient stock for {}",
            line.product_name
        )));
    }
    Ok(())
}

/// Lines whose stock moves, in product order so that concurrent orders
/// sharing products lock their rows in the same sequence. Pre-orders move
/// no stock.
pub fn stock_moves(lines: &[PricedLine], is_pre_order: bool) -> Vec<&PricedLine> {
    if is_pre_order {
        return Vec::new();
    }
    let mut moves: Vec<&PricedLine> = lines.iter().collect();
    moves.sort_by_key(|line| line.product_id);
    moves
}

async fn restore_stock(conn: &mut AsyncPgConnection, items: &[OrderItem]) -> ApiResult<()> {
    let mut items: Vec<&OrderItem> = items.iter().collect();
    items.sort_by_key(|item| item.product_id);
    for item in items {
        diesel::update(products::table.find(item.product_id))
            .set((
                products::stock_quantity.eq(products::stock_quantity + item.quantity),
                products::in_stock.eq(true),
                products::updated_at.eq(Utc::now()),
            ))
            .execute(conn)
            .await?;
    }
    Ok(())
}

pub(crate) async fn load_items(conn: &mut AsyncPgConnection, order_id: Uuid) -> ApiResult<Vec<OrderItem>> {
    Ok(order_items::table
        .filter(order_items::order_id.eq(order_id))
        .order(order_items::position.asc())
        .load::<OrderItem>(conn)
        .await?)
}

async fn find_order(conn: &mut AsyncPgConnection, id: Uuid) -> ApiResult<Order> {
    orders::table
        .find(id)
        .first::<Order>(conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found(format!("order {id}")))
}

pub(crate) async fn place_order(conn: &mut AsyncPgConnection, request: CreateOrderRequest) -> ApiResult<OrderWithItems> {
    let is_pre_order = request.shipping_address.is_pre_order();
    let product_ids: Vec<Uuid> = request.items.iter().map(|i| i.product_id).collect();

    let catalogue: HashMap<Uuid, Product> = products::table
        .filter(products::id.eq_any(product_ids))
        .load::<Product>(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let lines = price_lines(&request.items, &catalogue, is_pre_order)?;
    let totals = OrderTotals::compute(&lines, &request.adjustments())?;
    let order_number = next_order_number(conn).await?;

    let new_order = NewOrder {
        id: Uuid::new_v4(),
        order_number,
        user_id: request.user_id,
        customer_name: request.customer_name.trim().to_string(),
        customer_email: normalize_email(&request.customer_email),
        customer_phone: request.customer_phone.filter(|p| !is_blank(p)),
        subtotal: totals.subtotal,
        discount: totals.discount,
        tax: totals.tax,
        shipping_fee: totals.shipping_fee,
        total: totals.total,
        status: OrderStatus::Pending.as_str().to_string(),
        payment_status: PaymentStatus::Pending.as_str().to_string(),
        payment_method: request.payment_method.filter(|m| !is_blank(m)),
        payment_reference: request.payment_reference.map(|r| r.trim().to_string()),
        shipping_address: serde_json::to_value(&request.shipping_address).map_err(anyhow::Error::from)?,
        is_pre_order,
        notes: request.notes.filter(|n| !is_blank(n)),
    };

    let mut order = diesel::insert_into(orders::table)
        .values(&new_order)
        .get_result::<Order>(conn)
        .await?;

    let new_items: Vec<NewOrderItem> = lines
        .iter()
        .zip(0..)
        .map(|(line, position)| NewOrderItem {
            id: Uuid::new_v4(),
            order_id: order.id,
            product_id: line.product_id,
            product_name: line.product_name.clone(),
            unit_price: line.unit_price.clone(),
            quantity: line.quantity,
            line_total: line.line_total.clone(),
            position,
        })
        .collect();

    let items = diesel::insert_into(order_items::table)
        .values(&new_items)
        .get_results::<OrderItem>(conn)
        .await?;

    for line in stock_moves(&lines, is_pre_order) {
        decrement_stock(conn, line).await?;
    }

    let transaction = transactions::attach_to_order(conn, &order).await?;
    if let Some(status) = transactions::status_to_mirror(&order, &transaction) {
        order = diesel::update(orders::table.find(order.id))
            .set(orders::payment_status.eq(status))
            .get_result::<Order>(conn)
            .await?;
    }

    notify_admin(
        conn,
        NotificationKind::NewOrder,
        format!("New order {}", order.order_number),
        format!(
            "{} placed an order of {} item(s) totalling {}{}",
            order.customer_name,
            items.len(),
            money::format_amount(&order.total),
            if is_pre_order { " (pre-order)" } else { "" }
        ),
        Some(order.id),
    )
    .await?;

    outbox::enqueue(conn, DomainEvent::OrderPlaced { order: order.snapshot(&items)? }).await?;

    Ok(OrderWithItems { order, items })
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<OrderWithItems>)> {
    request.validate()?;

    let mut conn = state.pool.get().await?;
    let placed = conn
        .transaction::<_, ApiError, _>(|conn| Box::pin(place_order(conn, request)))
        .await
        .map_err(|e| {
            warn!(error = %e, "Order placement rolled back");
            e
        })?;

    info!(
        order_id = %placed.order.id,
        order_number = %placed.order.order_number,
        total = %placed.order.total,
        "Order placed"
    );
    Ok((StatusCode::CREATED, Json(placed)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub user_id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl OrderQuery {
    fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

fn filtered_orders(query: &OrderQuery) -> orders::BoxedQuery<'static, Pg> {
    let mut sql = orders::table.into_boxed();
    if let Some(status) = query.status {
        sql = sql.filter(orders::status.eq(status.as_str()));
    }
    if let Some(payment_status) = query.payment_status {
        sql = sql.filter(orders::payment_status.eq(payment_status.as_str()));
    }
    if let Some(user_id) = query.user_id {
        sql = sql.filter(orders::user_id.eq(user_id));
    }
    sql
}

async fn with_items(conn: &mut AsyncPgConnection, orders: Vec<Order>) -> ApiResult<Vec<OrderWithItems>> {
    let items = OrderItem::belonging_to(&orders)
        .order(order_items::position.asc())
        .load::<OrderItem>(conn)
        .await?;

    Ok(items
        .grouped_by(&orders)
        .into_iter()
        .zip(orders)
        .map(|(items, order)| OrderWithItems { order, items })
        .collect())
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<Json<Page<OrderWithItems>>> {
    let mut conn = state.pool.get().await?;
    let pagination = query.pagination();

    let total = filtered_orders(&query).count().get_result::<i64>(&mut conn).await?;
    let orders = filtered_orders(&query)
        .order(orders::created_at.desc())
        .limit(pagination.limit())
        .offset(pagination.offset())
        .load::<Order>(&mut conn)
        .await?;

    Ok(Json(Page::new(with_items(&mut conn, orders).await?, total, pagination)))
}

pub async fn list_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Page<OrderWithItems>>> {
    let query = OrderQuery {
        status: None,
        payment_status: None,
        user_id: Some(user_id),
        page: pagination.page,
        limit: pagination.limit,
    };
    list_orders(State(state), Query(query)).await
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OrderWithItems>> {
    let mut conn = state.pool.get().await?;
    let order = find_order(&mut conn, id).await?;
    let items = load_items(&mut conn, id).await?;
    Ok(Json(OrderWithItems { order, items }))
}

pub async fn get_order_by_number(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> ApiResult<Json<OrderWithItems>> {
    if order_number::parse(&order_number).is_none() {
        return Err(ApiError::validation(format!("'{order_number}' is not an order number")));
    }
    let mut conn = state.pool.get().await?;

    let order = orders::table
        .filter(orders::order_number.eq(&order_number))
        .first::<Order>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found(format!("order {order_number}")))?;
    let items = load_items(&mut conn, order.id).await?;

    Ok(Json(OrderWithItems { order, items }))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

/// Whether cancelling `order` puts its stock back, or why it cannot be
/// cancelled.
pub fn cancellation_restores_stock(order: &Order) -> ApiResult<bool> {
    let status = order.order_status()?;
    if status == OrderStatus::Cancelled {
        return Err(ApiError::conflict(format!("order {} is already cancelled", order.order_number)));
    }
    if !status.can_transition_to(OrderStatus::Cancelled) {
        return Err(ApiError::conflict(format!(
            "order {} can no longer be cancelled ({})",
            order.order_number, status
        )));
    }
    Ok(!order.is_pre_order)
}

async fn cancel(conn: &mut AsyncPgConnection, id: Uuid, reason: Option<String>) -> ApiResult<OrderWithItems> {
    let current = orders::table
        .find(id)
        .for_update()
        .first::<Order>(conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found(format!("order {id}")))?;

    let stock_restored = cancellation_restores_stock(&current)?;

    // The status guard makes stock restoration happen at most once even if
    // two cancellations race past the check above.
    let order = diesel::update(
        orders::table
            .filter(orders::id.eq(id))
            .filter(orders::status.ne(OrderStatus::Cancelled.as_str())),
    )
    .set((
        orders::status.eq(OrderStatus::Cancelled.as_str()),
        orders::updated_at.eq(Utc::now()),
    ))
    .get_result::<Order>(conn)
    .await
    .optional()?
    .ok_or_else(|| ApiError::conflict(format!("order {} is already cancelled", current.order_number)))?;

    let items = load_items(conn, id).await?;
    if stock_restored {
        restore_stock(conn, &items).await?;
    }

    notify_admin(
        conn,
        NotificationKind::OrderCancelled,
        format!("Order {} cancelled", order.order_number),
        match reason.as_deref() {
            Some(reason) => format!("{} cancelled their order: {}", order.customer_name, reason),
            None => format!("{} cancelled their order", order.customer_name),
        },
        Some(order.id),
    )
    .await?;

    outbox::enqueue(
        conn,
        DomainEvent::OrderCancelled {
            order: order.snapshot(&items)?,
            reason,
            stock_restored,
        },
    )
    .await?;

    Ok(OrderWithItems { order, items })
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelOrderRequest>>,
) -> ApiResult<Json<OrderWithItems>> {
    let reason = body
        .and_then(|Json(request)| request.reason)
        .filter(|r| !is_blank(r));

    let mut conn = state.pool.get().await?;
    let cancelled = conn
        .transaction::<_, ApiError, _>(|conn| Box::pin(cancel(conn, id, reason)))
        .await?;

    info!(order_id = %id, order_number = %cancelled.order.order_number, "Order cancelled");
    Ok(Json(cancelled))
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    pub reason: Option<String>,
}

async fn change_status(
    conn: &mut AsyncPgConnection,
    id: Uuid,
    next: OrderStatus,
    reason: Option<String>,
) -> ApiResult<OrderWithItems> {
    let current = orders::table
        .find(id)
        .for_update()
        .first::<Order>(conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found(format!("order {id}")))?;

    let previous = current.order_status()?;
    if !previous.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "order {} cannot move from {} to {}",
            current.order_number, previous, next
        )));
    }

    let order = diesel::update(orders::table.find(id))
        .set((orders::status.eq(next.as_str()), orders::updated_at.eq(Utc::now())))
        .get_result::<Order>(conn)
        .await?;
    let items = load_items(conn, id).await?;

    outbox::enqueue(
        conn,
        DomainEvent::OrderStatusChanged {
            order: order.snapshot(&items)?,
            previous,
            reason,
        },
    )
    .await?;

    Ok(OrderWithItems { order, items })
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> ApiResult<Json<OrderWithItems>> {
    let mut conn = state.pool.get().await?;
    let next = request.status;
    let reason = request.reason.filter(|r| !is_blank(r));

    let updated = conn
        .transaction::<_, ApiError, _>(|conn| {
            Box::pin(async move {
                if next == OrderStatus::Cancelled {
                    cancel(conn, id, reason).await
                } else {
                    change_status(conn, id, next, reason).await
                }
            })
        })
        .await?;

    info!(order_id = %id, status = %next, "Order status updated");
    Ok(Json(updated))
}

pub async fn download_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let mut conn = state.pool.get().await?;
    let order = find_order(&mut conn, id).await?;
    let items = load_items(&mut conn, id).await?;
    drop(conn);

    let snapshot = order.snapshot(&items)?;
    let store = state.store.clone();
    let pdf = tokio::task::spawn_blocking(move || invoice::render_invoice(&snapshot, &store))
        .await
        .map_err(anyhow::Error::from)??;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}.pdf\"", order.order_number),
        ),
    ];
    Ok((headers, pdf).into_response())
}
