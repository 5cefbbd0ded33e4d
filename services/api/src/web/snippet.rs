//! services/api/src/web/snippet.rs
//!
//! Serves the embeddable browser tracking script. Sites include it as
//! `<script src=".../tracker.js" data-website-id="..."></script>`; the
//! script classifies the visit in the browser and posts it to `/api/track`.

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;

const TRACKER_JS: &str = include_str!("../../assets/tracker.js");

/// The embeddable tracking script.
#[utoipa::path(
    get,
    path = "/tracker.js",
    responses(
        (status = 200, description = "The tracking script")
    )
)]
pub async fn snippet_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        TRACKER_JS,
    )
}
