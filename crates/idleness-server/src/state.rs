use chrono::{DateTime, Utc};
use idleness_collector::{CollectorContext, CollectorRegistry};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Read-only once the server is accepting requests.
    pub registry: Arc<CollectorRegistry>,
    pub context: CollectorContext,
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(registry: CollectorRegistry, context: CollectorContext) -> Self {
        Self {
            registry: Arc::new(registry),
            context,
            start_time: Utc::now(),
        }
    }
}
