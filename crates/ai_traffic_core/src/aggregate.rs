//! crates/ai_traffic_core/src/aggregate.rs
//!
//! Derived dashboard views computed from raw visit rows. All functions are
//! pure over a slice of events already scoped to one website and one time
//! window; the caller filters with `observed_at >= window.start(now)`
//! (inclusive) before handing the rows over.
//!
//! Grouping preserves first-encounter order so results are deterministic for
//! identical input ordering, including on count ties.

use crate::domain::{BucketGranularity, TimeWindow, VisitEvent, VisitType};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// How many pages `top_pages` returns at most.
const TOP_PAGES_LIMIT: usize = 10;

/// Visit count for one source label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCount {
    pub source: String,
    pub count: u64,
}

/// Visit count for one page, with the source that drove most of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCount {
    pub page_path: String,
    pub count: u64,
    pub main_source: String,
}

/// Visit count for one calendar bucket. Bucket labels sort
/// lexicographically in chronological order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendPoint {
    pub bucket: String,
    pub count: u64,
}

/// Headline numbers for one website and window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficSummary {
    pub total: u64,
    pub referrals: u64,
    pub crawlers: u64,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Secondary trend stats shown alongside the series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendInsights {
    /// The first-encountered bucket with the highest count.
    pub peak: TrendPoint,
    /// Rounded average count per non-empty bucket.
    pub average: u64,
}

/// Counts occurrences of keys while preserving first-encounter order.
fn count_in_order<'a, I>(keys: I) -> Vec<(&'a str, u64)>
where
    I: Iterator<Item = &'a str>,
{
    let mut order: Vec<(&str, u64)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for key in keys {
        match index.get(key) {
            Some(&i) => order[i].1 += 1,
            None => {
                index.insert(key, order.len());
                order.push((key, 1));
            }
        }
    }
    order
}

/// Groups events by source, sorted by count descending. Ties keep
/// first-encounter order.
pub fn by_source(events: &[VisitEvent]) -> Vec<SourceCount> {
    let mut counts = count_in_order(events.iter().map(|e| e.source.as_str()));
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .map(|(source, count)| SourceCount {
            source: source.to_string(),
            count,
        })
        .collect()
}

/// The top pages by visit count, each with its dominant source.
pub fn top_pages(events: &[VisitEvent]) -> Vec<PageCount> {
    let mut page_counts = count_in_order(events.iter().map(|e| e.page_path.as_str()));
    page_counts.sort_by(|a, b| b.1.cmp(&a.1));
    page_counts.truncate(TOP_PAGES_LIMIT);

    page_counts
        .into_iter()
        .map(|(page_path, count)| {
            let sources = count_in_order(
                events
                    .iter()
                    .filter(|e| e.page_path == page_path)
                    .map(|e| e.source.as_str()),
            );
            // max_by_key returns the last maximum; iterate manually to keep
            // the first-encountered source on ties.
            let mut main_source = "";
            let mut best = 0;
            for (source, n) in &sources {
                if *n > best {
                    best = *n;
                    main_source = source;
                }
            }
            PageCount {
                page_path: page_path.to_string(),
                count,
                main_source: main_source.to_string(),
            }
        })
        .collect()
}

fn bucket_label(at: DateTime<Utc>, granularity: BucketGranularity) -> String {
    match granularity {
        BucketGranularity::Hourly => at.format("%Y-%m-%d %H:00").to_string(),
        BucketGranularity::Daily => at.format("%Y-%m-%d").to_string(),
        BucketGranularity::Monthly => at.format("%Y-%m").to_string(),
    }
}

/// Buckets events by the window's calendar unit, ascending by bucket label.
/// Only buckets with at least one event appear.
pub fn trend(events: &[VisitEvent], window: TimeWindow) -> Vec<TrendPoint> {
    let granularity = window.granularity();
    let labels: Vec<String> = events
        .iter()
        .map(|e| bucket_label(e.observed_at, granularity))
        .collect();
    let mut counts = count_in_order(labels.iter().map(|l| l.as_str()));
    counts.sort_by(|a, b| a.0.cmp(b.0));
    counts
        .into_iter()
        .map(|(bucket, count)| TrendPoint {
            bucket: bucket.to_string(),
            count,
        })
        .collect()
}

/// Totals and observation bounds for the included events.
pub fn summary(events: &[VisitEvent]) -> TrafficSummary {
    TrafficSummary {
        total: events.len() as u64,
        referrals: events
            .iter()
            .filter(|e| e.visit_type == VisitType::Referral)
            .count() as u64,
        crawlers: events
            .iter()
            .filter(|e| e.visit_type == VisitType::Crawler)
            .count() as u64,
        first_seen: events.iter().map(|e| e.observed_at).min(),
        last_seen: events.iter().map(|e| e.observed_at).max(),
    }
}

/// Share of `count` in `total` as a rounded whole percentage. Zero when
/// `total` is zero.
pub fn percentage(count: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (count as f64 / total as f64 * 100.0).round() as u32
}

/// Growth between the first and last trend bucket, in percent. `None` when
/// there are fewer than two points or the first bucket is empty (growth from
/// zero is undefined, reported downstream as not-applicable).
pub fn growth_rate(points: &[TrendPoint]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let first = points.first()?.count;
    let last = points.last()?.count;
    if first == 0 {
        return None;
    }
    Some((last as f64 - first as f64) / first as f64 * 100.0)
}

/// Peak bucket and rounded per-bucket average. `None` on an empty series.
pub fn trend_insights(points: &[TrendPoint]) -> Option<TrendInsights> {
    if points.is_empty() {
        return None;
    }
    let mut peak = &points[0];
    for p in points {
        if p.count > peak.count {
            peak = p;
        }
    }
    let total: u64 = points.iter().map(|p| p.count).sum();
    Some(TrendInsights {
        peak: peak.clone(),
        average: (total as f64 / points.len() as f64).round() as u64,
    })
}
