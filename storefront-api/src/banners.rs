use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use shared::validation::is_blank;
use tracing::info;
use uuid::Uuid;

use crate::api::AppState;
use crate::error::{ApiError, ApiResult};
use crate::models::{Banner, BannerValues};
use crate::schema::banners;

#[derive(Debug, Clone, Deserialize)]
pub struct BannerRequest {
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    #[serde(default)]
    pub position: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

fn default_active() -> bool {
    true
}

impl BannerRequest {
    pub fn into_values(self) -> ApiResult<BannerValues> {
        if is_blank(&self.title) {
            return Err(ApiError::validation("title is required"));
        }
        if is_blank(&self.image_url) {
            return Err(ApiError::validation("image_url is required"));
        }
        if let (Some(starts_at), Some(ends_at)) = (self.starts_at, self.ends_at) {
            if ends_at <= starts_at {
                return Err(ApiError::validation("ends_at must be after starts_at"));
            }
        }

        Ok(BannerValues {
            title: self.title.trim().to_string(),
            subtitle: self.subtitle.filter(|s| !is_blank(s)),
            image_url: self.image_url.trim().to_string(),
            link_url: self.link_url.filter(|s| !is_blank(s)),
            position: self.position,
            is_active: self.is_active,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
        })
    }
}

/// Active banners whose schedule window contains `now`, by position.
pub async fn list_active_banners(State(state): State<AppState>) -> ApiResult<Json<Vec<Banner>>> {
    let now = Utc::now();
    let mut conn = state.pool.get().await?;

    let data = banners::table
        .filter(banners::is_active.eq(true))
        .filter(banners::starts_at.is_null().or(banners::starts_at.le(now)))
        .filter(banners::ends_at.is_null().or(banners::ends_at.gt(now)))
        .order((banners::position.asc(), banners::created_at.desc()))
        .load::<Banner>(&mut conn)
        .await?;

    Ok(Json(data))
}

pub async fn list_all_banners(State(state): State<AppState>) -> ApiResult<Json<Vec<Banner>>> {
    let mut conn = state.pool.get().await?;
    let data = banners::table
        .order((banners::position.asc(), banners::created_at.desc()))
        .load::<Banner>(&mut conn)
        .await?;
    Ok(Json(data))
}

pub async fn create_banner(
    State(state): State<AppState>,
    Json(request): Json<BannerRequest>,
) -> ApiResult<(StatusCode, Json<Banner>)> {
    let values = request.into_values()?;
    let mut conn = state.pool.get().await?;

    let banner = diesel::insert_into(banners::table)
        .values((banners::id.eq(Uuid::new_v4()), &values))
        .get_result::<Banner>(&mut conn)
        .await?;

    info!(banner_id = %banner.id, "Banner created");
    Ok((StatusCode::CREATED, Json(banner)))
}

pub async fn update_banner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<BannerRequest>,
) -> ApiResult<Json<Banner>> {
    let values = request.into_values()?;
    let mut conn = state.pool.get().await?;

    let banner = diesel::update(banners::table.find(id))
        .set((&values, banners::updated_at.eq(Utc::now())))
        .get_result::<Banner>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| ApiError::not_found(format!("banner {id}")))?;

    Ok(Json(banner))
}

pub async fn delete_banner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = state.pool.get().await?;
    let deleted = diesel::delete(banners::table.find(id))
        .execute(&mut conn)
        .await?;

    if deleted == 0 {
        return Err(ApiError::not_found(format!("banner {id}")));
    }
    info!(banner_id = %id, "Banner deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request() -> BannerRequest {
        BannerRequest {
            title: " Diwali Sale ".into(),
            subtitle: Some(String::new()),
            image_url: "https://cdn.example.com/diwali.jpg".into(),
            link_url: None,
            position: 1,
            is_active: true,
            starts_at: None,
            ends_at: None,
        }
    }

    #[test]
    fn trims_and_drops_blank_optionals() {
        let values = request().into_values().unwrap();
        assert_eq!(values.title, "Diwali Sale");
        assert_eq!(values.subtitle, None);
    }

    #[test]
    fn requires_title_and_image() {
        let mut req = request();
        req.image_url = " ".into();
        assert!(req.into_values().is_err());
    }

    #[test]
    fn schedule_must_end_after_it_starts() {
        let now = Utc::now();
        let mut req = request();
        req.starts_at = Some(now);
        req.ends_at = Some(now - Duration::hours(1));
        assert!(matches!(req.into_values(), Err(ApiError::Validation(_))));
    }

    #[test]
    fn new_banners_default_to_active() {
        let req: BannerRequest = serde_json::from_value(serde_json::json!({
            "title": "Hello",
            "image_url": "https://cdn.example.com/a.jpg"
        }))
        .unwrap();
        assert!(req.is_active);
        assert_eq!(req.position, 0);
    }
}
