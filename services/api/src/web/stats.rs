//! services/api/src/web/stats.rs
//!
//! Dashboard reads. Every endpoint is scoped by website and a symbolic time
//! window, does one bulk fetch of the raw rows, and applies the core
//! aggregator in process. A store failure fails the whole request; no
//! partial aggregates are computed from incomplete data.

use crate::web::state::AppState;
use crate::web::{error_response, ErrorBody};
use ai_traffic_core::aggregate;
use ai_traffic_core::domain::{TimeWindow, VisitEvent};
use ai_traffic_core::ports::StoreError;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Default number of raw rows returned by the events endpoint.
const DEFAULT_EVENT_LIMIT: usize = 50;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub range: Option<String>,
}

/// Only the raw-events endpoint takes a row limit.
#[derive(Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VisitDto {
    pub source: String,
    #[serde(rename = "type")]
    pub visit_type: String,
    pub page_path: String,
    pub referrer: String,
    pub timestamp: DateTime<Utc>,
}

impl From<VisitEvent> for VisitDto {
    fn from(e: VisitEvent) -> Self {
        Self {
            source: e.source,
            visit_type: e.visit_type.as_str().to_string(),
            page_path: e.page_path,
            referrer: e.referrer,
            timestamp: e.observed_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SourceRow {
    pub source: String,
    pub count: u64,
    /// Share of the window's total, rounded to a whole percent.
    pub percentage: u32,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageRow {
    pub page_path: String,
    pub count: u64,
    pub main_source: String,
}

#[derive(Serialize, ToSchema)]
pub struct TrendPointDto {
    pub bucket: String,
    pub count: u64,
}

#[derive(Serialize, ToSchema)]
pub struct TrendInsightsDto {
    pub peak: TrendPointDto,
    pub average: u64,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendResponse {
    pub points: Vec<TrendPointDto>,
    /// Percent growth between the first and last bucket; absent when the
    /// first bucket is empty or there are fewer than two points.
    pub growth_rate: Option<f64>,
    pub insights: Option<TrendInsightsDto>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDto {
    pub total: u64,
    pub referrals: u64,
    pub crawlers: u64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

//=========================================================================================
// Shared Fetch
//=========================================================================================

/// Parses the window, checks the website exists, and fetches the raw rows
/// once. Every aggregate endpoint goes through here.
async fn load_events(
    state: &AppState,
    website_id: Uuid,
    range: Option<String>,
) -> Result<(TimeWindow, Vec<VisitEvent>), (StatusCode, Json<ErrorBody>)> {
    let window = match range.as_deref() {
        None => TimeWindow::Last7Days,
        Some(token) => token
            .parse::<TimeWindow>()
            .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?,
    };

    state.store.website_by_id(website_id).await.map_err(|e| match e {
        StoreError::NotFound(_) => error_response(StatusCode::NOT_FOUND, "Website not found"),
        StoreError::Unexpected(msg) => {
            error!("Website lookup failed: {msg}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load traffic data")
        }
    })?;

    let since = window.start(Utc::now());
    let events = state
        .store
        .visits_since(website_id, since)
        .await
        .map_err(|e| {
            error!("Failed to fetch visits: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load traffic data")
        })?;

    Ok((window, events))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Raw visit rows, newest first.
#[utoipa::path(
    get,
    path = "/api/websites/{id}/events",
    params(
        ("id" = Uuid, Path, description = "Website id"),
        ("range" = Option<String>, Query, description = "24h|7d|30d|90d|all, default 7d"),
        ("limit" = Option<usize>, Query, description = "Maximum rows returned, default 50")
    ),
    responses(
        (status = 200, description = "Recent visits", body = [VisitDto]),
        (status = 400, description = "Unknown range token", body = ErrorBody),
        (status = 404, description = "Website not found", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    )
)]
pub async fn events_handler(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<Uuid>,
    Query(query): Query<EventsQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let limit = query.limit.unwrap_or(DEFAULT_EVENT_LIMIT);
    let (_, events) = load_events(&state, website_id, query.range).await?;
    let rows: Vec<VisitDto> = events
        .into_iter()
        .rev()
        .take(limit)
        .map(VisitDto::from)
        .collect();
    Ok(Json(rows))
}

/// Visit counts grouped by source, largest first.
#[utoipa::path(
    get,
    path = "/api/websites/{id}/sources",
    params(
        ("id" = Uuid, Path, description = "Website id"),
        ("range" = Option<String>, Query, description = "24h|7d|30d|90d|all, default 7d")
    ),
    responses(
        (status = 200, description = "Counts by source", body = [SourceRow]),
        (status = 400, description = "Unknown range token", body = ErrorBody),
        (status = 404, description = "Website not found", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    )
)]
pub async fn sources_handler(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<Uuid>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let (_, events) = load_events(&state, website_id, query.range).await?;
    let total = events.len() as u64;
    let rows: Vec<SourceRow> = aggregate::by_source(&events)
        .into_iter()
        .map(|c| SourceRow {
            percentage: aggregate::percentage(c.count, total),
            source: c.source,
            count: c.count,
        })
        .collect();
    Ok(Json(rows))
}

/// The top pages by visit count, each with its dominant source.
#[utoipa::path(
    get,
    path = "/api/websites/{id}/pages",
    params(
        ("id" = Uuid, Path, description = "Website id"),
        ("range" = Option<String>, Query, description = "24h|7d|30d|90d|all, default 7d")
    ),
    responses(
        (status = 200, description = "Top pages", body = [PageRow]),
        (status = 400, description = "Unknown range token", body = ErrorBody),
        (status = 404, description = "Website not found", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    )
)]
pub async fn pages_handler(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<Uuid>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let (_, events) = load_events(&state, website_id, query.range).await?;
    let rows: Vec<PageRow> = aggregate::top_pages(&events)
        .into_iter()
        .map(|p| PageRow {
            page_path: p.page_path,
            count: p.count,
            main_source: p.main_source,
        })
        .collect();
    Ok(Json(rows))
}

/// The time-bucketed trend series with growth rate and insights.
#[utoipa::path(
    get,
    path = "/api/websites/{id}/trend",
    params(
        ("id" = Uuid, Path, description = "Website id"),
        ("range" = Option<String>, Query, description = "24h|7d|30d|90d|all, default 7d")
    ),
    responses(
        (status = 200, description = "Trend series", body = TrendResponse),
        (status = 400, description = "Unknown range token", body = ErrorBody),
        (status = 404, description = "Website not found", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    )
)]
pub async fn trend_handler(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<Uuid>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let (window, events) = load_events(&state, website_id, query.range).await?;
    let points = aggregate::trend(&events, window);
    let growth_rate = aggregate::growth_rate(&points);
    let insights = aggregate::trend_insights(&points).map(|i| TrendInsightsDto {
        peak: TrendPointDto {
            bucket: i.peak.bucket,
            count: i.peak.count,
        },
        average: i.average,
    });
    Ok(Json(TrendResponse {
        points: points
            .into_iter()
            .map(|p| TrendPointDto {
                bucket: p.bucket,
                count: p.count,
            })
            .collect(),
        growth_rate,
        insights,
    }))
}

/// Headline totals for the window.
#[utoipa::path(
    get,
    path = "/api/websites/{id}/summary",
    params(
        ("id" = Uuid, Path, description = "Website id"),
        ("range" = Option<String>, Query, description = "24h|7d|30d|90d|all, default 7d")
    ),
    responses(
        (status = 200, description = "Traffic summary", body = SummaryDto),
        (status = 400, description = "Unknown range token", body = ErrorBody),
        (status = 404, description = "Website not found", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    )
)]
pub async fn summary_handler(
    State(state): State<Arc<AppState>>,
    Path(website_id): Path<Uuid>,
    Query(query): Query<RangeQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let (_, events) = load_events(&state, website_id, query.range).await?;
    let s = aggregate::summary(&events);
    Ok(Json(SummaryDto {
        total: s.total,
        referrals: s.referrals,
        crawlers: s.crawlers,
        first_seen: s.first_seen,
        last_seen: s.last_seen,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use ai_traffic_core::domain::{NewVisit, User, VisitType, Website};
    use ai_traffic_core::ports::{StoreResult, TrafficStore};
    use async_trait::async_trait;
    use chrono::Duration;

    /// An in-memory store holding one website and a fixed set of visits.
    /// `visits_since` honors the port contract: the start is inclusive and
    /// rows come back ascending by `observed_at`.
    struct MemoryStore {
        website: Option<Website>,
        events: Vec<VisitEvent>,
        fail_fetch: bool,
    }

    #[async_trait]
    impl TrafficStore for MemoryStore {
        async fn ensure_user(&self, _user_id: &str, _email: Option<&str>) -> StoreResult<User> {
            Err(StoreError::Unexpected("not used here".to_string()))
        }

        async fn create_website(
            &self,
            _owner_id: &str,
            _domain: &str,
            _name: Option<&str>,
        ) -> StoreResult<Website> {
            Err(StoreError::Unexpected("not used here".to_string()))
        }

        async fn websites_for_owner(&self, _owner_id: &str) -> StoreResult<Vec<Website>> {
            Err(StoreError::Unexpected("not used here".to_string()))
        }

        async fn website_by_id(&self, website_id: Uuid) -> StoreResult<Website> {
            match &self.website {
                Some(w) if w.id == website_id => Ok(w.clone()),
                _ => Err(StoreError::NotFound(format!(
                    "Website {} not found",
                    website_id
                ))),
            }
        }

        async fn insert_visit(&self, _visit: NewVisit) -> StoreResult<()> {
            Err(StoreError::Unexpected("not used here".to_string()))
        }

        async fn visits_since(
            &self,
            website_id: Uuid,
            since: DateTime<Utc>,
        ) -> StoreResult<Vec<VisitEvent>> {
            if self.fail_fetch {
                return Err(StoreError::Unexpected("connection reset".to_string()));
            }
            let mut rows: Vec<VisitEvent> = self
                .events
                .iter()
                .filter(|e| e.website_id == website_id && e.observed_at >= since)
                .cloned()
                .collect();
            rows.sort_by_key(|e| e.observed_at);
            Ok(rows)
        }
    }

    fn website() -> Website {
        Website {
            id: Uuid::new_v4(),
            owner_id: "owner-1".to_string(),
            domain: "example.com".to_string(),
            name: None,
            created_at: Utc::now(),
        }
    }

    fn visit(website_id: Uuid, at: DateTime<Utc>) -> VisitEvent {
        VisitEvent {
            id: Uuid::new_v4(),
            website_id,
            source: "chatgpt".to_string(),
            visit_type: VisitType::Referral,
            page_path: "/x".to_string(),
            referrer: String::new(),
            user_agent: String::new(),
            language: None,
            screen_width: None,
            screen_height: None,
            observed_at: at,
        }
    }

    fn app_state(store: MemoryStore) -> AppState {
        AppState {
            store: Arc::new(store),
            config: Arc::new(Config {
                bind_address: "127.0.0.1:3000".parse().unwrap(),
                database_url: String::new(),
                log_level: tracing::Level::INFO,
                default_source: "stealth-ai".to_string(),
                public_url: "http://127.0.0.1:3000".to_string(),
            }),
        }
    }

    #[test]
    fn only_the_events_query_carries_a_row_limit() {
        let q: EventsQuery =
            serde_json::from_value(serde_json::json!({"range": "24h", "limit": 5})).unwrap();
        assert_eq!(q.range.as_deref(), Some("24h"));
        assert_eq!(q.limit, Some(5));

        let q: RangeQuery = serde_json::from_value(serde_json::json!({"range": "24h"})).unwrap();
        assert_eq!(q.range.as_deref(), Some("24h"));
    }

    #[tokio::test]
    async fn window_filtering_keeps_events_inside_and_drops_older_ones() {
        let site = website();
        let id = site.id;
        let now = Utc::now();
        let state = app_state(MemoryStore {
            website: Some(site),
            events: vec![
                visit(id, now - Duration::days(6)),
                // Just inside the 7d window start.
                visit(id, now - Duration::days(7) + Duration::minutes(5)),
                // Older than the window, must not be included.
                visit(id, now - Duration::days(8)),
            ],
            fail_fetch: false,
        });

        let (window, events) = load_events(&state, id, Some("7d".to_string()))
            .await
            .unwrap();
        assert_eq!(window, TimeWindow::Last7Days);
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn widening_the_window_never_decreases_the_event_count() {
        let site = website();
        let id = site.id;
        let now = Utc::now();
        let state = app_state(MemoryStore {
            website: Some(site),
            events: vec![
                visit(id, now - Duration::days(2)),
                visit(id, now - Duration::days(20)),
                visit(id, now - Duration::days(60)),
            ],
            fail_fetch: false,
        });

        let (_, week) = load_events(&state, id, Some("7d".to_string())).await.unwrap();
        let (_, month) = load_events(&state, id, Some("30d".to_string())).await.unwrap();
        let (_, all) = load_events(&state, id, Some("all".to_string())).await.unwrap();
        assert!(month.len() >= week.len());
        assert!(all.len() >= month.len());
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn default_window_is_seven_days() {
        let site = website();
        let id = site.id;
        let state = app_state(MemoryStore {
            website: Some(site),
            events: Vec::new(),
            fail_fetch: false,
        });
        let (window, _) = load_events(&state, id, None).await.unwrap();
        assert_eq!(window, TimeWindow::Last7Days);
    }

    #[tokio::test]
    async fn unknown_range_token_is_a_bad_request() {
        let site = website();
        let id = site.id;
        let state = app_state(MemoryStore {
            website: Some(site),
            events: Vec::new(),
            fail_fetch: false,
        });
        let (status, _) = load_events(&state, id, Some("1y".to_string()))
            .await
            .err()
            .expect("expected an error response");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_website_is_not_found() {
        let state = app_state(MemoryStore {
            website: None,
            events: Vec::new(),
            fail_fetch: false,
        });
        let (status, body) = load_events(&state, Uuid::new_v4(), None)
            .await
            .err()
            .expect("expected an error response");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.0.error, "Website not found");
    }

    #[tokio::test]
    async fn fetch_failure_fails_the_whole_request() {
        let site = website();
        let id = site.id;
        let state = app_state(MemoryStore {
            website: Some(site),
            events: Vec::new(),
            fail_fetch: true,
        });
        let (status, body) = load_events(&state, id, Some("7d".to_string()))
            .await
            .err()
            .expect("expected an error response");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.0.error, "Failed to load traffic data");
    }
}
