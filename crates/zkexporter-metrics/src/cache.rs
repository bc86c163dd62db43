//! Last-known sample set for background-refresh mode.
//!
//! A single refresh loop writes; HTTP handlers only read. Readers get an
//! `Arc` to a complete set, never a half-written one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use crate::collector::{SampleSet, ScrapeCollector};

#[derive(Debug, Clone, Default)]
pub struct MetricsCache {
    last: Arc<RwLock<Option<Arc<SampleSet>>>>,
}

impl MetricsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent published scrape, or `None` until a scrape has
    /// succeeded.
    pub async fn get(&self) -> Option<Arc<SampleSet>> {
        self.last.read().await.clone()
    }

    /// Scrape once and publish the result.
    ///
    /// Failed scrapes are not published until one has succeeded, so the
    /// cache stays empty while the node has never answered. After that a
    /// failure replaces the previous set.
    pub async fn refresh(&self, collector: &ScrapeCollector) -> Arc<SampleSet> {
        let set = Arc::new(collector.scrape().await);
        let mut last = self.last.write().await;
        if set.up() || last.is_some() {
            *last = Some(set.clone());
            debug!(up = set.up(), samples = set.len(), "metrics cache refreshed");
        } else {
            warn!("no successful scrape yet, metrics cache left empty");
        }
        set
    }

    /// Refresh immediately, then every `interval`, until shutdown.
    pub async fn run(
        &self,
        collector: ScrapeCollector,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(
            interval_secs = interval.as_secs_f64(),
            "metrics refresh loop started"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh(&collector).await;
                }
                _ = shutdown.changed() => {
                    info!("metrics refresh loop shutting down");
                    break;
                }
            }
        }
    }
}
