//! services/api/src/web/websites.rs
//!
//! The site registry: list and create tracked websites for an owner.

use crate::web::state::AppState;
use crate::web::{error_response, ErrorBody};
use ai_traffic_core::domain::{normalize_domain, Website};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteDto {
    pub id: Uuid,
    pub user_id: String,
    pub domain: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Website> for WebsiteDto {
    fn from(w: Website) -> Self {
        Self {
            id: w.id,
            user_id: w.owner_id,
            domain: w.domain,
            name: w.name,
            created_at: w.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct WebsiteList {
    pub data: Vec<WebsiteDto>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebsiteRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CreateWebsiteResponse {
    pub success: bool,
    pub website: WebsiteDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// List the websites registered by one owner.
#[utoipa::path(
    get,
    path = "/api/websites",
    params(("userId" = String, Query, description = "The owner's identity-provider uid.")),
    responses(
        (status = 200, description = "Websites for the owner", body = WebsiteList),
        (status = 400, description = "Missing userId parameter", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    )
)]
pub async fn list_websites_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<OwnerQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let user_id = query
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Missing userId parameter"))?;

    let websites = state.store.websites_for_owner(&user_id).await.map_err(|e| {
        error!("Failed to fetch websites: {e}");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch websites")
    })?;

    Ok(Json(WebsiteList {
        data: websites.into_iter().map(WebsiteDto::from).collect(),
    }))
}

/// Register a new website for tracking.
///
/// The owning user record is upserted first, so the first website a user
/// registers also creates their account row.
#[utoipa::path(
    post,
    path = "/api/websites",
    request_body = CreateWebsiteRequest,
    responses(
        (status = 200, description = "Website created", body = CreateWebsiteResponse),
        (status = 400, description = "Missing or unusable field", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    )
)]
pub async fn create_website_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateWebsiteRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let user_id = req
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Missing required fields"))?;

    let domain = req
        .domain
        .as_deref()
        .and_then(normalize_domain)
        .ok_or_else(|| error_response(StatusCode::BAD_REQUEST, "Missing required fields"))?;

    state
        .store
        .ensure_user(&user_id, None)
        .await
        .map_err(|e| {
            error!("Failed to ensure user: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to check user")
        })?;

    let website = state
        .store
        .create_website(&user_id, &domain, req.name.as_deref())
        .await
        .map_err(|e| {
            error!("Failed to add website: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to add website")
        })?;

    Ok(Json(CreateWebsiteResponse {
        success: true,
        website: website.into(),
    }))
}
