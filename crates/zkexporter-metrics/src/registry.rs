//! Static registry of known `mntr` keys.
//!
//! Every recognized key maps to a [`MetricDescriptor`] holding plain
//! function pointers for value and label extraction. The table is built
//! once and never mutated, so concurrent scrapes read it without locking.

use std::collections::HashMap;
use std::sync::LazyLock;

use tracing::warn;

/// Prometheus metric type of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Gauge,
    Counter,
    Untyped,
}

impl ValueType {
    /// Name used on `# TYPE` lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
            Self::Untyped => "untyped",
        }
    }
}

/// Description of one exported metric.
#[derive(Debug)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub value_type: ValueType,
    /// Label names, in the order `extract_labels` yields their values.
    pub label_names: &'static [&'static str],
    /// Converts the raw `mntr` value field into the sample value.
    pub extract_value: fn(&str) -> f64,
    /// Present only for categorical metrics carried as a label.
    pub extract_labels: Option<fn(&str) -> Vec<String>>,
}

/// Health indicator attached to every scrape.
pub static UP: MetricDescriptor = gauge("zk_up", "Exporter successful");

static DESCRIPTORS: [MetricDescriptor; 17] = [
    gauge("zk_avg_latency", "Average latency of requests"),
    gauge("zk_max_latency", "Maximum seen latency of requests"),
    gauge("zk_min_latency", "Minimum seen latency of requests"),
    counter("zk_packets_received", "Number of packets received"),
    counter("zk_packets_sent", "Number of packets sent"),
    gauge("zk_num_alive_connections", "Number of active connections"),
    gauge("zk_outstanding_requests", "Number of outstanding requests"),
    MetricDescriptor {
        name: "zk_server_state",
        help: "Server state (leader/follower)",
        value_type: ValueType::Untyped,
        label_names: &["state"],
        extract_value: always_one,
        extract_labels: Some(raw_label),
    },
    gauge("zk_znode_count", "Number of znodes"),
    gauge("zk_watch_count", "Number of watches"),
    gauge("zk_ephemerals_count", "Number of ephemeral nodes"),
    gauge("zk_approximate_data_size", "Approximate size of data set"),
    gauge(
        "zk_open_file_descriptor_count",
        "Number of open file descriptors",
    ),
    counter(
        "zk_max_file_descriptor_count",
        "Maximum number of open file descriptors",
    ),
    gauge("zk_followers", "Number of followers"),
    gauge("zk_synced_followers", "Number of followers in sync"),
    gauge(
        "zk_pending_syncs",
        "Number of followers with synchronizations pending",
    ),
];

static GLOBAL: LazyLock<Registry> = LazyLock::new(|| Registry {
    by_key: DESCRIPTORS.iter().map(|d| (d.name, d)).collect(),
});

const fn gauge(name: &'static str, help: &'static str) -> MetricDescriptor {
    numeric(name, help, ValueType::Gauge)
}

const fn counter(name: &'static str, help: &'static str) -> MetricDescriptor {
    numeric(name, help, ValueType::Counter)
}

const fn numeric(name: &'static str, help: &'static str, value_type: ValueType) -> MetricDescriptor {
    MetricDescriptor {
        name,
        help,
        value_type,
        label_names: &[],
        extract_value: parse_float_or_zero,
        extract_labels: None,
    }
}

/// Parse a value field, falling back to `0.0` on malformed input.
pub fn parse_float_or_zero(s: &str) -> f64 {
    match s.parse::<f64>() {
        Ok(v) => v,
        Err(e) => {
            warn!(value = %s, error = %e, "failed to parse value as float");
            0.0
        }
    }
}

fn always_one(_: &str) -> f64 {
    1.0
}

fn raw_label(s: &str) -> Vec<String> {
    vec![s.to_string()]
}

/// Lookup table from `mntr` key to descriptor.
#[derive(Debug)]
pub struct Registry {
    by_key: HashMap<&'static str, &'static MetricDescriptor>,
}

impl Registry {
    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    pub fn get(&self, key: &str) -> Option<&'static MetricDescriptor> {
        self.by_key.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// All descriptors in table order.
    pub fn descriptors(&self) -> impl Iterator<Item = &'static MetricDescriptor> {
        DESCRIPTORS.iter()
    }
}
