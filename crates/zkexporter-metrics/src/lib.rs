//! zkexporter-metrics — turns a ZooKeeper `mntr` reply into Prometheus
//! samples.
//!
//! # Architecture
//!
//! ```text
//! ScrapeCollector::scrape()
//!   ├── CommandClient::send(mntr) → raw reply
//!   ├── parse_reply() → SampleSet (Registry lookups, zk_up)
//!   └── CommandClient::send(srst)  (optional, best-effort)
//!
//! Prometheus exposition
//!   └── render_prometheus(&SampleSet) → text/plain for /metrics
//!
//! MetricsCache
//!   └── run() → periodic scrape into a shared last-known SampleSet
//! ```
//!
//! A scrape never fails: connectivity and format problems surface only
//! through the `zk_up` health sample.

pub mod cache;
pub mod collector;
pub mod prometheus;
pub mod registry;

pub use cache::MetricsCache;
pub use collector::{Sample, SampleSet, ScrapeCollector, parse_reply};
pub use prometheus::render_prometheus;
pub use registry::{MetricDescriptor, Registry, UP, ValueType};
