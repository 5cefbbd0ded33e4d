//! crates/ai_traffic_core/src/classify.rs
//!
//! The traffic-source classifier: turns the browsing context of a page load
//! (referrer, user agent, query parameters) into a `{source, visit_type}`
//! label. Pure function; the curated rule tables below are the only state.
//!
//! Matching is case-insensitive substring matching throughout, evaluated in
//! a fixed priority order: referrer-domain rules are the most trustworthy
//! signal, then AI-overview markers on search referrers, then crawler
//! user-agent signatures (crawlers rarely send referrers), and the
//! `utm_source` override last since it is trivially spoofed.

use crate::domain::VisitType;
use std::collections::HashMap;

/// Version marker for the curated rule tables. Bump when entries change so
/// stored classifications can be traced back to the table that produced them.
pub const RULES_VERSION: u32 = 2;

/// Sentinel emitted for a non-empty referrer that matched nothing.
pub const SOURCE_UNKNOWN: &str = "unknown";
/// Sentinel for a referrer that looks AI-adjacent but has no canonical rule.
pub const SOURCE_UNKNOWN_AI: &str = "unknown-ai";
/// Label for direct navigation (empty referrer).
pub const SOURCE_DIRECT: &str = "direct";
/// Label for search-engine referrals that came through an AI answer surface.
pub const SOURCE_SEARCH_AI_OVERVIEW: &str = "search-ai-overview";

/// Referrer substring -> canonical assistant name.
const REFERRER_RULES: &[(&str, &str)] = &[
    ("chat.openai.com", "chatgpt"),
    ("chatgpt.com", "chatgpt"),
    ("perplexity.ai", "perplexity"),
    ("bing.com/chat", "copilot"),
    ("copilot.microsoft.com", "copilot"),
    ("bard.google.com", "bard"),
    ("claude.ai", "claude"),
    ("gemini.google.com", "gemini"),
];

/// (search-engine substring, query marker) pairs identifying referrals from
/// an AI-generated answer block on an otherwise ordinary results page.
const SEARCH_AI_MARKERS: &[(&str, &str)] = &[
    ("google.", "udm=50"),
    ("google.", "aep=48"),
    ("bing.com", "showconv=1"),
];

/// User-agent substring -> crawler label.
const CRAWLER_RULES: &[(&str, &str)] = &[
    ("gptbot", "gptbot"),
    ("oai-searchbot", "gptbot"),
    ("chatgpt-user", "gptbot"),
    ("claudebot", "claude-crawler"),
    ("claude-web", "claude-crawler"),
    ("anthropic-ai", "claude-crawler"),
    ("google-extended", "google-ai"),
    ("googleother", "google-ai"),
    ("perplexitybot", "perplexitybot"),
    ("bytespider", "bytespider"),
    ("ccbot", "ccbot"),
];

/// Generic substrings marking a referrer as AI-like when no canonical rule
/// matched. These produce `unknown-ai`, never a named source.
const AI_HINTS: &[&str] = &["openai", "anthropic", "chatbot", "copilot", "gpt", ".ai/"];

/// Canonical names recognized inside the `utm_source` query value.
const UTM_SOURCES: &[&str] = &[
    "chatgpt",
    "perplexity",
    "copilot",
    "claude",
    "bard",
    "gemini",
];

/// The classifier's verdict for one page load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub source: String,
    pub visit_type: VisitType,
}

impl Classification {
    fn new(source: &str, visit_type: VisitType) -> Self {
        Self {
            source: source.to_string(),
            visit_type,
        }
    }

    /// True when the label points at an AI platform (named assistant,
    /// crawler, or the AI-like sentinel).
    pub fn is_ai(&self) -> bool {
        self.source != SOURCE_DIRECT && self.source != SOURCE_UNKNOWN
    }
}

/// Classifies one page load. First match wins:
///
/// 1. referrer matches a known AI-assistant domain;
/// 2. referrer is a search engine carrying an AI-answer marker;
/// 3. user agent matches a known AI-crawler signature;
/// 4. `utm_source` names a known platform;
/// 5. non-empty but unmatched referrer: `unknown-ai` if AI-like, else `unknown`;
/// 6. empty referrer: `direct`.
pub fn classify(
    referrer: &str,
    user_agent: &str,
    query: &HashMap<String, String>,
) -> Classification {
    let referrer_lc = referrer.trim().to_ascii_lowercase();
    let user_agent_lc = user_agent.to_ascii_lowercase();

    if !referrer_lc.is_empty() {
        for (pattern, source) in REFERRER_RULES {
            if referrer_lc.contains(pattern) {
                return Classification::new(source, VisitType::Referral);
            }
        }
        for (engine, marker) in SEARCH_AI_MARKERS {
            if referrer_lc.contains(engine) && referrer_lc.contains(marker) {
                return Classification::new(SOURCE_SEARCH_AI_OVERVIEW, VisitType::Referral);
            }
        }
    }

    for (pattern, label) in CRAWLER_RULES {
        if user_agent_lc.contains(pattern) {
            return Classification::new(label, VisitType::Crawler);
        }
    }

    if let Some(utm) = query.get("utm_source") {
        let utm_lc = utm.to_ascii_lowercase();
        for name in UTM_SOURCES {
            if utm_lc.contains(name) {
                return Classification::new(name, VisitType::Referral);
            }
        }
    }

    if !referrer_lc.is_empty() {
        if AI_HINTS.iter().any(|hint| referrer_lc.contains(hint)) {
            return Classification::new(SOURCE_UNKNOWN_AI, VisitType::Referral);
        }
        return Classification::new(SOURCE_UNKNOWN, VisitType::Standard);
    }

    Classification::new(SOURCE_DIRECT, VisitType::Direct)
}
