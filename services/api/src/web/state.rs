//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use ai_traffic_core::ports::TrafficStore;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers. The store is injected behind its port trait so handlers never
/// see the concrete database client.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TrafficStore>,
    pub config: Arc<Config>,
}
