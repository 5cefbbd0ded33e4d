//! crates/ai_traffic_core/src/ports.rs
//!
//! Defines the storage contract (trait) for the application's core logic.
//! The trait forms the boundary of the hexagonal architecture, keeping the
//! core independent of the concrete database behind it.

use crate::domain::{NewVisit, User, VisitEvent, Website};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A generic error type for all store operations.
/// This abstracts away the specific errors of the backing database.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

/// The storage port: websites, owners, and the append-only visit table.
#[async_trait]
pub trait TrafficStore: Send + Sync {
    /// Idempotent upsert of a user record keyed by the identity provider uid.
    async fn ensure_user(&self, user_id: &str, email: Option<&str>) -> StoreResult<User>;

    async fn create_website(
        &self,
        owner_id: &str,
        domain: &str,
        name: Option<&str>,
    ) -> StoreResult<Website>;

    async fn websites_for_owner(&self, owner_id: &str) -> StoreResult<Vec<Website>>;

    async fn website_by_id(&self, website_id: Uuid) -> StoreResult<Website>;

    /// Appends one visit row. Rows are never updated or deleted afterwards.
    async fn insert_visit(&self, visit: NewVisit) -> StoreResult<()>;

    /// All visits for a website with `observed_at >= since`, ascending by
    /// `observed_at`.
    async fn visits_since(
        &self,
        website_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<VisitEvent>>;
}
