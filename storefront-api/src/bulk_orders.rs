//! Bulk-order enquiries from the wholesale form.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use shared::validation::{is_blank, is_valid_email, is_valid_phone, normalize_email};
use shared::{BulkOrderSnapshot, BulkOrderStatus, DomainEvent};
use tracing::info;
use uuid::Uuid;

use crate::api::{AppState, Page, Pagination};
use crate::error::{ApiError, ApiResult};
use crate::models::{BulkOrder, NewBulkOrder};
use crate::notifications::{notify_admin, NotificationKind};
use crate::outbox;
use crate::schema::bulk_orders;

#[derive(Debug, Clone, Deserialize)]
pub struct BulkOrderRequest {
    pub contact_name: String,
    pub company_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub product_details: String,
    pub quantity: i32,
    pub message: Option<String>,
}

impl BulkOrderRequest {
    pub fn into_new(self) -> ApiResult<NewBulkOrder> {
        if is_blank(&self.contact_name) {
            return Err(ApiError::validation("contact_name is required"));
        }
        if !is_valid_email(&self.email) {
            return Err(ApiError::validation("email is not a valid email address"));
        }
        let phone = self.phone.filter(|p| !is_blank(p));
        if phone.as_deref().is_some_and(|p| !is_valid_phone(p)) {
            return Err(ApiError::validation("phone is not a valid phone number"));
        }
        if is_blank(&self.product_details) {
            return Err(ApiError::validation("product_details is required"));
        }
        if self.quantity < 1 {
            return Err(ApiError::validation("quantity must be at least 1"));
        }

        Ok(NewBulkOrder {
            id: Uuid::new_v4(),
            contact_name: self.contact_name.trim().to_string(),
            company_name: self.company_name.filter(|c| !is_blank(c)),
            email: normalize_email(&self.email),
            phone,
            product_details: self.product_details.trim().to_string(),
            quantity: self.quantity,
            message: self.message.filter(|m| !is_blank(m)),
            status: BulkOrderStatus::New.as_str().to_string(),
        })
    }
}

async fn record(conn: &mut AsyncPgConnection, lead: NewBulkOrder) -> ApiResult<BulkOrder> {
    let bulk_order = diesel::insert_into(bulk_orders::table)
        .values(&lead)
        .get_result::<BulkOrder>(conn)
        .await?;

    let who = match &lead.company_name {
        Some(company) => format!("{} ({})", lead.contact_name, company),
        None => lead.contact_name.clone(),
    };
    notify_admin(
        conn,
        NotificationKind::BulkOrder,
        format!("Bulk order enquiry from {who}"),
        format!("{} x {}", lead.quantity, lead.product_details),
        Some(bulk_order.id),
    )
    .await?;

    outbox::enqueue(
        conn,
        DomainEvent::BulkOrderRequested {
            bulk_order: BulkOrderSnapshot::from(&lead),
        },
    )
    .await?;

    Ok(bulk_order)
}

pub async fn create_bulk_order(
    State(state): State<AppState>,
    Json(request): Json<BulkOrderRequest>,
) -> ApiResult<(StatusCode, Json<BulkOrder>)> {
    let lead = request.into_new()?;
    let mut conn = state.pool.get().await?;

    let bulk_order = conn
        .transaction::<_, ApiError, _>(|conn| Box::pin(record(conn, lead)))
        .await?;

    info!(bulk_order_id = %bulk_order.id, quantity = bulk_order.quantity, "Bulk order enquiry received");
    Ok((StatusCode::CREATED, Json(bulk_order)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkOrderQuery {
    pub status: Option<BulkOrderStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_bulk_orders(
    State(state): State<AppState>,
    Query(query): Query<BulkOrderQuery>,
) -> ApiResult<Json<Page<BulkOrder>>> {
    let pagination = Pagination {
        page: query.page,
        limit: query.limit,
    };
    let filtered = || {
        let mut sql = bulk_orders::table.into_boxed();
        if let Some(status) = query.status {
            sql = sql.filter(bulk_orders::status.eq(status.as_str()));
        }
        sql
    };

    let mut conn = state.pool.get().await?;
    let total = filtered().count().get_result::<i64>(&mut conn).await?;
    let data = filtered()
        .order(bulk_orders::created_at.desc())
        .limit(pagination.limit())
        .offset(pagination.offset())
        .load::<BulkOrder>(&mut conn)
        .await?;

    Ok(Json(Page::new(data, total, pagination)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBulkOrderStatusRequest {
    pub status: BulkOrderStatus,
}

pub async fn update_bulk_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBulkOrderStatusRequest>,
) -> ApiResult<Json<BulkOrder>> {
    let mut conn = state.pool.get().await?;

    let current = bulk_orders::table
        .find(id)
        .first::<BulkOrder>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found(format!("bulk order {id}")))?;

    let previous: BulkOrderStatus = current.status.parse()?;
    if !previous.can_transition_to(request.status) {
        return Err(ApiError::conflict(format!(
            "bulk order cannot move from {previous} to {}",
            request.status
        )));
    }

    let updated = diesel::update(
        bulk_orders::table
            .filter(bulk_orders::id.eq(id))
            .filter(bulk_orders::status.eq(previous.as_str())),
    )
    .set((
        bulk_orders::status.eq(request.status.as_str()),
        bulk_orders::updated_at.eq(Utc::now()),
    ))
    .get_result::<BulkOrder>(&mut conn)
    .await
    .optional()?
    .ok_or_else(|| ApiError::conflict("bulk order was updated concurrently"))?;

    Ok(Json(updated))
}
