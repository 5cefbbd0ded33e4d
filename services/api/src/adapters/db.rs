//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `TrafficStore` port from the core crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use ai_traffic_core::domain::{NewVisit, User, VisitEvent, VisitType, Website};
use ai_traffic_core::ports::{StoreError, StoreResult, TrafficStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `TrafficStore` port.
#[derive(Clone)]
pub struct DbStore {
    pool: PgPool,
}

impl DbStore {
    /// Creates a new `DbStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> StoreError {
    StoreError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: String,
    email: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct WebsiteRecord {
    id: Uuid,
    user_id: String,
    domain: String,
    name: Option<String>,
    created_at: DateTime<Utc>,
}
impl WebsiteRecord {
    fn to_domain(self) -> Website {
        Website {
            id: self.id,
            owner_id: self.user_id,
            domain: self.domain,
            name: self.name,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct VisitRecord {
    id: Uuid,
    website_id: Uuid,
    source: String,
    visit_type: String,
    page_path: String,
    referrer: String,
    user_agent: String,
    language: Option<String>,
    screen_width: Option<i32>,
    screen_height: Option<i32>,
    observed_at: DateTime<Utc>,
}
impl VisitRecord {
    fn to_domain(self) -> StoreResult<VisitEvent> {
        let visit_type = self
            .visit_type
            .parse::<VisitType>()
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(VisitEvent {
            id: self.id,
            website_id: self.website_id,
            source: self.source,
            visit_type,
            page_path: self.page_path,
            referrer: self.referrer,
            user_agent: self.user_agent,
            language: self.language,
            screen_width: self.screen_width,
            screen_height: self.screen_height,
            observed_at: self.observed_at,
        })
    }
}

//=========================================================================================
// `TrafficStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl TrafficStore for DbStore {
    async fn ensure_user(&self, user_id: &str, email: Option<&str>) -> StoreResult<User> {
        sqlx::query(
            "INSERT INTO users (id, email) VALUES ($1, $2) ON CONFLICT (id) DO NOTHING",
        )
        .bind(user_id)
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        let record = sqlx::query_as::<_, UserRecord>("SELECT id, email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    StoreError::NotFound(format!("User {} not found", user_id))
                }
                _ => unexpected(e),
            })?;

        Ok(record.to_domain())
    }

    async fn create_website(
        &self,
        owner_id: &str,
        domain: &str,
        name: Option<&str>,
    ) -> StoreResult<Website> {
        let record = sqlx::query_as::<_, WebsiteRecord>(
            "INSERT INTO websites (id, user_id, domain, name) VALUES ($1, $2, $3, $4) \
             RETURNING id, user_id, domain, name, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(domain)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn websites_for_owner(&self, owner_id: &str) -> StoreResult<Vec<Website>> {
        let records = sqlx::query_as::<_, WebsiteRecord>(
            "SELECT id, user_id, domain, name, created_at FROM websites \
             WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn website_by_id(&self, website_id: Uuid) -> StoreResult<Website> {
        let record = sqlx::query_as::<_, WebsiteRecord>(
            "SELECT id, user_id, domain, name, created_at FROM websites WHERE id = $1",
        )
        .bind(website_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                StoreError::NotFound(format!("Website {} not found", website_id))
            }
            _ => unexpected(e),
        })?;
        Ok(record.to_domain())
    }

    async fn insert_visit(&self, visit: NewVisit) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO visits \
             (id, website_id, source, visit_type, page_path, referrer, user_agent, \
              language, screen_width, screen_height, observed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(Uuid::new_v4())
        .bind(visit.website_id)
        .bind(&visit.source)
        .bind(visit.visit_type.as_str())
        .bind(&visit.page_path)
        .bind(&visit.referrer)
        .bind(&visit.user_agent)
        .bind(&visit.language)
        .bind(visit.screen_width)
        .bind(visit.screen_height)
        .bind(visit.observed_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn visits_since(
        &self,
        website_id: Uuid,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<VisitEvent>> {
        // The window start is inclusive: rows at exactly `since` are returned.
        let records = sqlx::query_as::<_, VisitRecord>(
            "SELECT id, website_id, source, visit_type, page_path, referrer, user_agent, \
                    language, screen_width, screen_height, observed_at \
             FROM visits \
             WHERE website_id = $1 AND observed_at >= $2 \
             ORDER BY observed_at ASC",
        )
        .bind(website_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        records.into_iter().map(|r| r.to_domain()).collect()
    }
}
