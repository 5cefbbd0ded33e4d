//! crates/tracker/src/lib.rs
//!
//! The event emitter: assembles a visit payload from classifier output plus
//! page metadata and delivers it to the ingestion endpoint.
//!
//! Delivery is fire-and-forget. A failed or slow request is logged at debug
//! level and swallowed; the caller never sees an error and no retry is made.
//! Tracking must never break the host application.

use ai_traffic_core::classify::classify;
use reqwest::Url;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Upper bound on one delivery attempt. Keeps the emitter from hanging an
/// unloading page.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, thiserror::Error)]
pub enum EmitterError {
    /// The embedding site did not configure its website id. Constructing the
    /// emitter fails fast instead of ever sending a malformed event.
    #[error("no website id configured")]
    MissingWebsiteId,
    #[error("invalid ingestion endpoint '{0}': {1}")]
    InvalidEndpoint(String, String),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// The browsing context of one page load or SPA transition.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub page_path: String,
    pub referrer: String,
    pub user_agent: String,
    pub language: Option<String>,
    pub screen_width: Option<i32>,
    pub screen_height: Option<i32>,
    /// Query parameters of the current page, checked for a source override.
    pub query: HashMap<String, String>,
}

/// The wire payload for `POST /api/track`.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct TrackPayload {
    website_id: String,
    source: String,
    #[serde(rename = "type")]
    visit_type: String,
    page_path: String,
    referrer: String,
    user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    screen_width: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    screen_height: Option<i32>,
}

fn build_payload(website_id: &str, ctx: &PageContext) -> TrackPayload {
    let classification = classify(&ctx.referrer, &ctx.user_agent, &ctx.query);
    TrackPayload {
        website_id: website_id.to_string(),
        source: classification.source,
        visit_type: classification.visit_type.as_str().to_string(),
        page_path: ctx.page_path.clone(),
        referrer: ctx.referrer.clone(),
        user_agent: ctx.user_agent.clone(),
        language: ctx.language.clone(),
        screen_width: ctx.screen_width,
        screen_height: ctx.screen_height,
    }
}

/// Sends classified visit events to one ingestion endpoint for one website.
pub struct Emitter {
    endpoint: Url,
    website_id: String,
    client: reqwest::Client,
}

impl Emitter {
    /// Creates an emitter for the given ingestion endpoint and website id.
    /// Fails when the website id is empty or the endpoint does not parse.
    pub fn new(endpoint: &str, website_id: &str) -> Result<Self, EmitterError> {
        if website_id.trim().is_empty() {
            return Err(EmitterError::MissingWebsiteId);
        }
        let endpoint = Url::parse(endpoint)
            .map_err(|e| EmitterError::InvalidEndpoint(endpoint.to_string(), e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| EmitterError::Client(e.to_string()))?;
        Ok(Self {
            endpoint,
            website_id: website_id.to_string(),
            client,
        })
    }

    /// Records the initial page load. Exactly one delivery attempt is made;
    /// the outcome is discarded.
    pub async fn page_view(&self, ctx: &PageContext) {
        self.send(ctx).await;
    }

    /// Entry point for client-side navigation transitions: the host's router
    /// calls this with a refreshed `page_path` after each route change.
    pub async fn notify_navigation(&self, ctx: &PageContext) {
        self.send(ctx).await;
    }

    async fn send(&self, ctx: &PageContext) {
        let payload = build_payload(&self.website_id, ctx);
        match self
            .client
            .post(self.endpoint.clone())
            .json(&payload)
            .send()
            .await
        {
            Ok(resp) if !resp.status().is_success() => {
                debug!(status = %resp.status(), "tracking event rejected");
            }
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "tracking event delivery failed");
            }
        }
    }
}
