//! services/api/src/web/mod.rs
//!
//! The HTTP surface: ingestion, site registry, dashboard reads, and the
//! embeddable snippet, plus the master OpenAPI definition.

pub mod snippet;
pub mod state;
pub mod stats;
pub mod track;
pub mod websites;

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

pub use snippet::snippet_handler;
pub use track::track_handler;
pub use websites::{create_website_handler, list_websites_handler};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        snippet::snippet_handler,
        track::track_handler,
        websites::list_websites_handler,
        websites::create_website_handler,
        stats::events_handler,
        stats::sources_handler,
        stats::pages_handler,
        stats::trend_handler,
        stats::summary_handler,
    ),
    components(schemas(
        ErrorBody,
        track::TrackRequest,
        track::TrackResponse,
        websites::WebsiteDto,
        websites::WebsiteList,
        websites::CreateWebsiteRequest,
        websites::CreateWebsiteResponse,
        stats::VisitDto,
        stats::SourceRow,
        stats::PageRow,
        stats::TrendResponse,
        stats::TrendPointDto,
        stats::TrendInsightsDto,
        stats::SummaryDto,
    )),
    tags(
        (name = "AI Traffic Analytics API", description = "Ingestion and dashboard endpoints for AI-referred traffic.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Wire Error Format
//=========================================================================================

/// The error body every failing endpoint returns: `{"error": "..."}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// Translates an error message into the wire format at the handler boundary.
pub(crate) fn error_response(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorBody>) {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}
