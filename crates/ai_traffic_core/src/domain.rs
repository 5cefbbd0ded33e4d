//! crates/ai_traffic_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;
use uuid::Uuid;

/// Represents a registered website being tracked, owned by one user.
///
/// Owner ids are opaque strings issued by the hosted identity provider.
#[derive(Debug, Clone)]
pub struct Website {
    pub id: Uuid,
    pub owner_id: String,
    pub domain: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Represents a user account, keyed by the identity provider's uid.
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
}

/// The category of interaction behind one recorded visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitType {
    /// A human arrived via a link from an AI surface.
    Referral,
    /// An automated AI fetch hit the page.
    Crawler,
    /// Direct navigation, no referrer.
    Direct,
    /// An ordinary (non-AI) referral.
    Standard,
}

impl VisitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitType::Referral => "referral",
            VisitType::Crawler => "crawler",
            VisitType::Direct => "direct",
            VisitType::Standard => "standard",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a valid visit type")]
pub struct ParseVisitTypeError(String);

impl FromStr for VisitType {
    type Err = ParseVisitTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "referral" => Ok(VisitType::Referral),
            "crawler" => Ok(VisitType::Crawler),
            "direct" => Ok(VisitType::Direct),
            "standard" => Ok(VisitType::Standard),
            other => Err(ParseVisitTypeError(other.to_string())),
        }
    }
}

/// One immutable recorded pageview or crawl hit.
#[derive(Debug, Clone)]
pub struct VisitEvent {
    pub id: Uuid,
    pub website_id: Uuid,
    pub source: String,
    pub visit_type: VisitType,
    pub page_path: String,
    pub referrer: String,
    pub user_agent: String,
    pub language: Option<String>,
    pub screen_width: Option<i32>,
    pub screen_height: Option<i32>,
    pub observed_at: DateTime<Utc>,
}

/// The insert-shaped visit record, before an id is assigned.
#[derive(Debug, Clone)]
pub struct NewVisit {
    pub website_id: Uuid,
    pub source: String,
    pub visit_type: VisitType,
    pub page_path: String,
    pub referrer: String,
    pub user_agent: String,
    pub language: Option<String>,
    pub screen_width: Option<i32>,
    pub screen_height: Option<i32>,
    pub observed_at: DateTime<Utc>,
}

/// The calendar unit used to bucket trend points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketGranularity {
    Hourly,
    Daily,
    Monthly,
}

/// A symbolic lookback period used to scope aggregation queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Last24Hours,
    Last7Days,
    Last30Days,
    Last90Days,
    All,
}

#[derive(Debug, thiserror::Error)]
#[error("'{0}' is not a valid time range")]
pub struct ParseTimeWindowError(String);

impl FromStr for TimeWindow {
    type Err = ParseTimeWindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "24h" => Ok(TimeWindow::Last24Hours),
            "7d" => Ok(TimeWindow::Last7Days),
            "30d" => Ok(TimeWindow::Last30Days),
            "90d" => Ok(TimeWindow::Last90Days),
            "all" => Ok(TimeWindow::All),
            other => Err(ParseTimeWindowError(other.to_string())),
        }
    }
}

impl TimeWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeWindow::Last24Hours => "24h",
            TimeWindow::Last7Days => "7d",
            TimeWindow::Last30Days => "30d",
            TimeWindow::Last90Days => "90d",
            TimeWindow::All => "all",
        }
    }

    /// The inclusive start of the window, relative to `now`.
    /// `All` floors at the Unix epoch.
    pub fn start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            TimeWindow::Last24Hours => now - Duration::hours(24),
            TimeWindow::Last7Days => now - Duration::days(7),
            TimeWindow::Last30Days => now - Duration::days(30),
            TimeWindow::Last90Days => now - Duration::days(90),
            TimeWindow::All => DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// Trend bucket size for this window: hourly for a day, daily for weeks,
    /// monthly for anything longer.
    pub fn granularity(&self) -> BucketGranularity {
        match self {
            TimeWindow::Last24Hours => BucketGranularity::Hourly,
            TimeWindow::Last7Days | TimeWindow::Last30Days => BucketGranularity::Daily,
            TimeWindow::Last90Days | TimeWindow::All => BucketGranularity::Monthly,
        }
    }
}

/// Normalizes a user-supplied domain for storage: strips the scheme, a
/// leading `www.`, and any path or query suffix, then lowercases.
/// Returns `None` when nothing usable remains.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let mut s = raw.trim().to_ascii_lowercase();
    for scheme in ["https://", "http://"] {
        if let Some(rest) = s.strip_prefix(scheme) {
            s = rest.to_string();
            break;
        }
    }
    if let Some(rest) = s.strip_prefix("www.") {
        s = rest.to_string();
    }
    if let Some(cut) = s.find(['/', '?', '#']) {
        s.truncate(cut);
    }
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn visit_type_round_trips() {
        for vt in [
            VisitType::Referral,
            VisitType::Crawler,
            VisitType::Direct,
            VisitType::Standard,
        ] {
            assert_eq!(vt.as_str().parse::<VisitType>().unwrap(), vt);
        }
        assert!("spider".parse::<VisitType>().is_err());
    }

    #[test]
    fn time_window_parses_known_tokens() {
        assert_eq!("24h".parse::<TimeWindow>().unwrap(), TimeWindow::Last24Hours);
        assert_eq!("7d".parse::<TimeWindow>().unwrap(), TimeWindow::Last7Days);
        assert_eq!("30d".parse::<TimeWindow>().unwrap(), TimeWindow::Last30Days);
        assert_eq!("90d".parse::<TimeWindow>().unwrap(), TimeWindow::Last90Days);
        assert_eq!("all".parse::<TimeWindow>().unwrap(), TimeWindow::All);
        assert!("1y".parse::<TimeWindow>().is_err());
    }

    #[test]
    fn window_start_is_now_minus_duration() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        assert_eq!(
            TimeWindow::Last7Days.start(now),
            Utc.with_ymd_and_hms(2024, 6, 8, 12, 0, 0).unwrap()
        );
        assert_eq!(TimeWindow::All.start(now), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn widening_the_window_never_moves_the_start_forward() {
        let now = Utc::now();
        assert!(TimeWindow::Last30Days.start(now) <= TimeWindow::Last7Days.start(now));
        assert!(TimeWindow::All.start(now) <= TimeWindow::Last90Days.start(now));
    }

    #[test]
    fn normalize_domain_strips_scheme_and_www() {
        assert_eq!(
            normalize_domain("https://www.Example.com/blog?x=1"),
            Some("example.com".to_string())
        );
        assert_eq!(normalize_domain("example.com/"), Some("example.com".to_string()));
        assert_eq!(normalize_domain("  www.foo.dev  "), Some("foo.dev".to_string()));
        assert_eq!(normalize_domain("https://"), None);
        assert_eq!(normalize_domain(""), None);
    }
}
