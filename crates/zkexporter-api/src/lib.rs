//! zkexporter-api — HTTP surface of the ZooKeeper exporter.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Landing page linking to the metrics endpoint |
//! | GET | `<metrics_path>` | Prometheus exposition (default `/metrics`) |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use zkexporter_metrics::{MetricsCache, ScrapeCollector};

/// Where the metrics endpoint gets its samples.
#[derive(Clone)]
pub enum MetricsSource {
    /// Scrape the node on every request.
    OnDemand(Arc<ScrapeCollector>),
    /// Serve the set last published by the refresh loop.
    Cached(MetricsCache),
}

/// Shared state for handlers.
#[derive(Clone)]
pub struct ApiState {
    pub source: MetricsSource,
    pub metrics_path: String,
}

/// Build the exporter router.
pub fn build_router(state: ApiState) -> Router {
    let metrics_path = state.metrics_path.clone();
    Router::new()
        .route("/", get(handlers::root))
        .route(&metrics_path, get(handlers::metrics))
        .with_state(state)
}
