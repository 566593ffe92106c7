//! Affiliate programme applications.

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
use shared::{AffiliateSnapshot, AffiliateStatus, DomainEvent};
use tracing::info;
use uuid::Uuid;

use crate::api::{AppState, Page, Pagination};
use crate::error::{ApiError, ApiResult};
use crate::models::{Affiliate, NewAffiliate};
use crate::notifications::{notify_admin, NotificationKind};
use crate::outbox;
use crate::schema::affiliates;

#[derive(Debug, Clone, Deserialize)]
pub struct AffiliateApplication {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub social_handle: Option<String>,
    pub audience_size: Option<i32>,
    pub message: Option<String>,
}

impl AffiliateApplication {
    pub fn into_new(self) -> ApiResult<NewAffiliate> {
        if is_blank(&self.name) {
            return Err(ApiError::validation("name is required"));
        }
        if !is_valid_email(&self.email) {
            return Err(ApiError::validation("email is not a valid email address"));
        }
        let phone = self.phone.filter(|p| !is_blank(p));
        if phone.as_deref().is_some_and(|p| !is_valid_phone(p)) {
            return Err(ApiError::validation("phone is not a valid phone number"));
        }
        if self.audience_size.is_some_and(|n| n < 0) {
            return Err(ApiError::validation("audience_size must not be negative"));
        }

        Ok(NewAffiliate {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            email: normalize_email(&self.email),
            phone,
            website: self.website.filter(|w| !is_blank(w)),
            social_handle: self.social_handle.filter(|s| !is_blank(s)),
            audience_size: self.audience_size,
            message: self.message.filter(|m| !is_blank(m)),
            status: AffiliateStatus::Pending.as_str().to_string(),
        })
    }
}

async fn register(conn: &mut AsyncPgConnection, application: NewAffiliate) -> ApiResult<Affiliate> {
    // Emails are stored normalized; the LOWER(email) unique index backs
    // this check up under concurrent signups.
    let taken = diesel::select(diesel::dsl::exists(
        affiliates::table.filter(affiliates::email.eq(&application.email)),
    ))
    .get_result::<bool>(conn)
    .await?;
    if taken {
        return Err(ApiError::conflict(format!(
            "an application for {} already exists",
            application.email
        )));
    }

    let affiliate = diesel::insert_into(affiliates::table)
        .values(&application)
        .get_result::<Affiliate>(conn)
        .await?;

    notify_admin(
        conn,
        NotificationKind::AffiliateSignup,
        format!("Affiliate application from {}", application.name),
        match &application.social_handle {
            Some(handle) => format!("{} <{}> ({})", application.name, application.email, handle),
            None => format!("{} <{}>", application.name, application.email),
        },
        Some(affiliate.id),
    )
    .await?;

    outbox::enqueue(
        conn,
        DomainEvent::AffiliateApplied {
            affiliate: AffiliateSnapshot::from(&application),
        },
    )
    .await?;

    Ok(affiliate)
}

pub async fn apply(
    State(state): State<AppState>,
    Json(application): Json<AffiliateApplication>,
) -> ApiResult<(StatusCode, Json<Affiliate>)> {
    let application = application.into_new()?;
    let mut conn = state.pool.get().await?;

    let affiliate = conn
        .transaction::<_, ApiError, _>(|conn| Box::pin(register(conn, application)))
        .await?;

    info!(affiliate_id = %affiliate.id, "Affiliate application received");
    Ok((StatusCode::CREATED, Json(affiliate)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct AffiliateQuery {
    pub status: Option<AffiliateStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_affiliates(
    State(state): State<AppState>,
    Query(query): Query<AffiliateQuery>,
) -> ApiResult<Json<Page<Affiliate>>> {
    let pagination = Pagination {
        page: query.page,
        limit: query.limit,
    };
    let filtered = || {
        let mut sql = affiliates::table.into_boxed();
        if let Some(status) = query.status {
            sql = sql.filter(affiliates::status.eq(status.as_str()));
        }
        sql
    };

    let mut conn = state.pool.get().await?;
    let total = filtered().count().get_result::<i64>(&mut conn).await?;
    let data = filtered()
        .order(affiliates::created_at.desc())
        .limit(pagination.limit())
        .offset(pagination.offset())
        .load::<Affiliate>(&mut conn)
        .await?;

    Ok(Json(Page::new(data, total, pagination)))
}

#[derive(Debug, Clone, Deserialize)]
pub struct AffiliateDecision {
    pub status: AffiliateStatus,
}

async fn decide(conn: &mut AsyncPgConnection, id: Uuid, next: AffiliateStatus) -> ApiResult<Affiliate> {
    let current = affiliates::table
        .find(id)
        .for_update()
        .first::<Affiliate>(conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found(format!("affiliate {id}")))?;

    let previous: AffiliateStatus = current.status.parse()?;
    if !previous.can_transition_to(next) {
        return Err(ApiError::conflict(format!(
            "affiliate application is already {previous}"
        )));
    }

    let affiliate = diesel::update(affiliates::table.find(id))
        .set((affiliates::status.eq(next.as_str()), affiliates::updated_at.eq(Utc::now())))
        .get_result::<Affiliate>(conn)
        .await?;

    outbox::enqueue(
        conn,
        DomainEvent::AffiliateStatusChanged {
            affiliate: AffiliateSnapshot::from(&affiliate),
            status: next,
        },
    )
    .await?;

    Ok(affiliate)
}

pub async fn update_affiliate_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(decision): Json<AffiliateDecision>,
) -> ApiResult<Json<Affiliate>> {
    let mut conn = state.pool.get().await?;
    let affiliate = conn
        .transaction::<_, ApiError, _>(|conn| Box::pin(decide(conn, id, decision.status)))
        .await?;

    info!(affiliate_id = %id, status = %decision.status, "Affiliate application decided");
    Ok(Json(affiliate))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application() -> AffiliateApplication {
        AffiliateApplication {
            name: "Meera".into(),
            email: " Meera@Blog.example ".into(),
            phone: None,
            website: Some("https://meera.example".into()),
            social_handle: Some("@meerasips".into()),
            audience_size: Some(12000),
            message: None,
        }
    }

    #[test]
    fn normalizes_email_and_starts_pending() {
        let new = application().into_new().unwrap();
        assert_eq!(new.email, "meera@blog.example");
        assert_eq!(new.status, "pending");
        assert_eq!(AffiliateSnapshot::from(&new).audience_size, Some(12000));
    }

    #[test]
    fn rejects_invalid_applications() {
        let mut app = application();
        app.name = String::new();
        assert!(app.into_new().is_err());

        let mut app = application();
        app.audience_size = Some(-5);
        assert!(app.into_new().is_err());
    }
}
