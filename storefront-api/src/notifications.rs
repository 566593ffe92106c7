//! Admin notification feed shown in the back office.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::{AdminNotification, NewAdminNotification};
use crate::schema::admin_notifications;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    NewOrder,
    OrderCancelled,
    BulkOrder,
    AffiliateSignup,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewOrder => "new_order",
            NotificationKind::OrderCancelled => "order_cancelled",
            NotificationKind::BulkOrder => "bulk_order",
            NotificationKind::AffiliateSignup => "affiliate_signup",
        }
    }
}

pub async fn notify_admin(
    conn: &mut AsyncPgConnection,
    kind: NotificationKind,
    title: String,
    message: String,
    reference_id: Option<Uuid>,
) -> ApiResult<()> {
    let notification = NewAdminNotification {
        id: Uuid::new_v4(),
        kind: kind.as_str().to_string(),
        title,
        message,
        reference_id,
    };

    diesel::insert_into(admin_notifications::table)
        .values(&notification)
        .execute(conn)
        .await?;

    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Vec<AdminNotification>>> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let mut conn = state.pool.get().await?;

    let mut sql = admin_notifications::table
        .order(admin_notifications::created_at.desc())
        .limit(limit)
        .into_boxed();
    if query.unread_only {
        sql = sql.filter(admin_notifications::is_read.eq(false));
    }

    Ok(Json(sql.load::<AdminNotification>(&mut conn).await?))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AdminNotification>> {
    let mut conn = state.pool.get().await?;

    let notification = diesel::update(admin_notifications::table.find(id))
        .set(admin_notifications::is_read.eq(true))
        .get_result::<AdminNotification>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found(format!("notification {id}")))?;

    Ok(Json(notification))
}
