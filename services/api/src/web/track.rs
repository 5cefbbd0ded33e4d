//! services/api/src/web/track.rs
//!
//! The ingestion endpoint. Accepts one visit event per request from the
//! tracking snippet running on arbitrary third-party origins, validates it,
//! verifies the target website is registered, and appends the row.
//!
//! Delivery is at-most-once by design: the client never retries, and neither
//! does this endpoint.

use crate::web::state::AppState;
use crate::web::{error_response, ErrorBody};
use ai_traffic_core::classify::classify;
use ai_traffic_core::domain::{NewVisit, VisitType};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Wire Types
//=========================================================================================

/// The tracking payload posted by the snippet or the tracker client.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    #[serde(default)]
    pub website_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default, rename = "type")]
    pub visit_type: Option<String>,
    #[serde(default)]
    pub page_path: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub screen_width: Option<i32>,
    #[serde(default)]
    pub screen_height: Option<i32>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct TrackResponse {
    pub success: bool,
}

//=========================================================================================
// Validation
//=========================================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub(crate) enum ValidationError {
    #[error("Missing required field: websiteId")]
    MissingWebsiteId,
    #[error("Missing required field: pagePath")]
    MissingPagePath,
    #[error("Invalid visit type: {0}")]
    InvalidVisitType(String),
}

/// Everything of a visit row except the website, which is resolved against
/// the registry afterwards.
#[derive(Debug)]
pub(crate) struct VisitDraft {
    source: String,
    visit_type: VisitType,
    page_path: String,
    referrer: String,
    user_agent: String,
    language: Option<String>,
    screen_width: Option<i32>,
    screen_height: Option<i32>,
    observed_at: DateTime<Utc>,
}

impl VisitDraft {
    pub(crate) fn into_new_visit(self, website_id: Uuid) -> NewVisit {
        NewVisit {
            website_id,
            source: self.source,
            visit_type: self.visit_type,
            page_path: self.page_path,
            referrer: self.referrer,
            user_agent: self.user_agent,
            language: self.language,
            screen_width: self.screen_width,
            screen_height: self.screen_height,
            observed_at: self.observed_at,
        }
    }
}

/// The single validation step: either a typed draft or a typed error, before
/// any business logic runs.
///
/// Defaults: `timestamp` falls back to server time. When `source` is absent
/// the classifier is re-run on the submitted referrer and user agent; if it
/// cannot attribute an AI source the configured sentinel is recorded with
/// visit type `referral`.
pub(crate) fn validate(
    req: TrackRequest,
    now: DateTime<Utc>,
    default_source: &str,
) -> Result<(String, VisitDraft), ValidationError> {
    let website_id = match req.website_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => return Err(ValidationError::MissingWebsiteId),
    };
    let page_path = match req.page_path {
        Some(p) if !p.trim().is_empty() => p,
        _ => return Err(ValidationError::MissingPagePath),
    };

    let referrer = req.referrer.unwrap_or_default();
    let user_agent = req.user_agent.unwrap_or_default();

    let (source, classified_type) = match req.source {
        Some(s) if !s.trim().is_empty() => (s, VisitType::Referral),
        _ => {
            let c = classify(&referrer, &user_agent, &HashMap::new());
            if c.is_ai() {
                (c.source, c.visit_type)
            } else {
                (default_source.to_string(), VisitType::Referral)
            }
        }
    };

    let visit_type = match req.visit_type {
        Some(t) => {
            VisitType::from_str(&t).map_err(|_| ValidationError::InvalidVisitType(t))?
        }
        None => classified_type,
    };

    Ok((
        website_id,
        VisitDraft {
            source,
            visit_type,
            page_path,
            referrer,
            user_agent,
            language: req.language,
            screen_width: req.screen_width,
            screen_height: req.screen_height,
            observed_at: req.timestamp.unwrap_or(now),
        },
    ))
}

//=========================================================================================
// Handler
//=========================================================================================

/// Record one tracked visit.
#[utoipa::path(
    post,
    path = "/api/track",
    request_body = TrackRequest,
    responses(
        (status = 200, description = "Visit recorded", body = TrackResponse),
        (status = 400, description = "Missing required field", body = ErrorBody),
        (status = 404, description = "Website not registered", body = ErrorBody),
        (status = 500, description = "Storage failure", body = ErrorBody)
    )
)]
pub async fn track_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TrackRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorBody>)> {
    let (website_raw, draft) = validate(req, Utc::now(), &state.config.default_source)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;

    // An id that is not even a UUID cannot name a registered website.
    let website_id = Uuid::parse_str(&website_raw)
        .map_err(|_| error_response(StatusCode::NOT_FOUND, "Website not found"))?;

    let website = state.store.website_by_id(website_id).await.map_err(|e| {
        use ai_traffic_core::ports::StoreError;
        match e {
            StoreError::NotFound(_) => error_response(StatusCode::NOT_FOUND, "Website not found"),
            StoreError::Unexpected(msg) => {
                error!("Website lookup failed: {msg}");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    })?;

    state
        .store
        .insert_visit(draft.into_new_visit(website.id))
        .await
        .map_err(|e| {
            error!("Failed to record visit: {e}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to record traffic data",
            )
        })?;

    Ok(Json(TrackResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use ai_traffic_core::domain::{User, VisitEvent, Website};
    use ai_traffic_core::ports::{StoreError, StoreResult, TrafficStore};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// An in-memory store: serves one optional website and records inserts.
    struct StubStore {
        website: Option<Website>,
        fail_insert: bool,
        inserted: Mutex<Vec<NewVisit>>,
    }

    impl StubStore {
        fn with_website(website: Option<Website>) -> Self {
            Self {
                website,
                fail_insert: false,
                inserted: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TrafficStore for StubStore {
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

        async fn insert_visit(&self, visit: NewVisit) -> StoreResult<()> {
            if self.fail_insert {
                return Err(StoreError::Unexpected("connection reset".to_string()));
            }
            self.inserted.lock().unwrap().push(visit);
            Ok(())
        }

        async fn visits_since(
            &self,
            _website_id: Uuid,
            _since: DateTime<Utc>,
        ) -> StoreResult<Vec<VisitEvent>> {
            Ok(Vec::new())
        }
    }

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            bind_address: "127.0.0.1:3000".parse().unwrap(),
            database_url: String::new(),
            log_level: tracing::Level::INFO,
            default_source: "stealth-ai".to_string(),
            public_url: "http://127.0.0.1:3000".to_string(),
        })
    }

    fn app_state(store: Arc<StubStore>) -> Arc<AppState> {
        Arc::new(AppState {
            store,
            config: test_config(),
        })
    }

    fn registered_website() -> Website {
        Website {
            id: Uuid::new_v4(),
            owner_id: "owner-1".to_string(),
            domain: "example.com".to_string(),
            name: None,
            created_at: Utc::now(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn base_request() -> TrackRequest {
        TrackRequest {
            website_id: Some("b7f9a6ce-3c1f-4a6e-9a5e-1f2d3c4b5a69".to_string()),
            page_path: Some("/x".to_string()),
            ..TrackRequest::default()
        }
    }

    #[test]
    fn wire_payload_uses_camel_case_names() {
        let req: TrackRequest = serde_json::from_str(
            r#"{
                "websiteId": "w-1",
                "pagePath": "/docs",
                "type": "crawler",
                "screenWidth": 1280,
                "timestamp": "2024-06-01T10:30:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(req.website_id.as_deref(), Some("w-1"));
        assert_eq!(req.page_path.as_deref(), Some("/docs"));
        assert_eq!(req.visit_type.as_deref(), Some("crawler"));
        assert_eq!(req.screen_width, Some(1280));
        assert!(req.timestamp.is_some());
    }

    #[test]
    fn missing_website_id_is_rejected() {
        let req = TrackRequest {
            website_id: None,
            page_path: Some("/x".to_string()),
            ..TrackRequest::default()
        };
        assert_eq!(
            validate(req, now(), "stealth-ai").unwrap_err(),
            ValidationError::MissingWebsiteId
        );
    }

    #[test]
    fn missing_page_path_is_rejected() {
        let req = TrackRequest {
            website_id: Some("abc".to_string()),
            page_path: None,
            ..TrackRequest::default()
        };
        assert_eq!(
            validate(req, now(), "stealth-ai").unwrap_err(),
            ValidationError::MissingPagePath
        );
    }

    #[test]
    fn unknown_visit_type_is_rejected() {
        let req = TrackRequest {
            visit_type: Some("spider".to_string()),
            ..base_request()
        };
        assert!(matches!(
            validate(req, now(), "stealth-ai").unwrap_err(),
            ValidationError::InvalidVisitType(_)
        ));
    }

    #[test]
    fn missing_source_falls_back_to_the_sentinel() {
        let (_, draft) = validate(base_request(), now(), "stealth-ai").unwrap();
        assert_eq!(draft.source, "stealth-ai");
        assert_eq!(draft.visit_type, VisitType::Referral);
        assert_eq!(draft.observed_at, now());
    }

    #[test]
    fn missing_source_is_reclassified_from_the_user_agent() {
        let req = TrackRequest {
            user_agent: Some("Mozilla/5.0 (compatible; GPTBot/1.0)".to_string()),
            ..base_request()
        };
        let (_, draft) = validate(req, now(), "stealth-ai").unwrap();
        assert_eq!(draft.source, "gptbot");
        assert_eq!(draft.visit_type, VisitType::Crawler);
    }

    #[tokio::test]
    async fn unknown_website_is_not_found_and_nothing_is_persisted() {
        let stub = Arc::new(StubStore::with_website(None));
        let req = TrackRequest {
            website_id: Some(Uuid::new_v4().to_string()),
            page_path: Some("/x".to_string()),
            ..TrackRequest::default()
        };
        let result = track_handler(State(app_state(stub.clone())), Json(req)).await;
        let (status, body) = result.err().expect("expected an error response");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.0.error, "Website not found");
        assert!(stub.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_uuid_website_id_is_not_found_and_nothing_is_persisted() {
        let stub = Arc::new(StubStore::with_website(None));
        let req = TrackRequest {
            website_id: Some("missing-id".to_string()),
            page_path: Some("/x".to_string()),
            ..TrackRequest::default()
        };
        let result = track_handler(State(app_state(stub.clone())), Json(req)).await;
        let (status, body) = result.err().expect("expected an error response");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.0.error, "Website not found");
        assert!(stub.inserted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn valid_event_is_persisted_for_a_registered_website() {
        let website = registered_website();
        let website_id = website.id;
        let stub = Arc::new(StubStore::with_website(Some(website)));
        let req = TrackRequest {
            website_id: Some(website_id.to_string()),
            page_path: Some("/pricing".to_string()),
            source: Some("chatgpt".to_string()),
            ..TrackRequest::default()
        };
        let result = track_handler(State(app_state(stub.clone())), Json(req)).await;
        assert!(result.is_ok());
        let inserted = stub.inserted.lock().unwrap();
        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].website_id, website_id);
        assert_eq!(inserted[0].source, "chatgpt");
        assert_eq!(inserted[0].page_path, "/pricing");
    }

    #[tokio::test]
    async fn storage_failure_on_insert_is_an_internal_error() {
        let website = registered_website();
        let website_id = website.id;
        let stub = Arc::new(StubStore {
            website: Some(website),
            fail_insert: true,
            inserted: Mutex::new(Vec::new()),
        });
        let req = TrackRequest {
            website_id: Some(website_id.to_string()),
            page_path: Some("/x".to_string()),
            ..TrackRequest::default()
        };
        let result = track_handler(State(app_state(stub.clone())), Json(req)).await;
        let (status, _) = result.err().expect("expected an error response");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(stub.inserted.lock().unwrap().is_empty());
    }

    #[test]
    fn explicit_fields_are_kept() {
        let at = Utc.with_ymd_and_hms(2024, 5, 30, 8, 0, 0).unwrap();
        let req = TrackRequest {
            source: Some("claude".to_string()),
            visit_type: Some("crawler".to_string()),
            timestamp: Some(at),
            language: Some("de-DE".to_string()),
            screen_width: Some(800),
            ..base_request()
        };
        let (raw, draft) = validate(req, now(), "stealth-ai").unwrap();
        assert_eq!(raw, "b7f9a6ce-3c1f-4a6e-9a5e-1f2d3c4b5a69");
        assert_eq!(draft.source, "claude");
        assert_eq!(draft.visit_type, VisitType::Crawler);
        assert_eq!(draft.observed_at, at);
        assert_eq!(draft.language.as_deref(), Some("de-DE"));
        assert_eq!(draft.screen_width, Some(800));
    }
}
