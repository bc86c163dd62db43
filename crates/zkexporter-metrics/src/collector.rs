//! Scrape collector — one `mntr` round trip per scrape.
//!
//! The collector holds no mutable state. Each call to
//! [`ScrapeCollector::scrape`] opens its own connection and produces an
//! independent [`SampleSet`].

use tracing::{debug, error, info, warn};

use zkexporter_client::{CommandClient, FourLetterWord};

use crate::registry::{MetricDescriptor, Registry};

/// One exported value.
#[derive(Debug, Clone)]
pub struct Sample {
    pub descriptor: &'static MetricDescriptor,
    pub value: f64,
    /// Values for `descriptor.label_names`, same order.
    pub label_values: Vec<String>,
}

/// Samples are equal when they share a descriptor, labels, and the exact
/// bit pattern of their value.
impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.descriptor, other.descriptor)
            && self.value.to_bits() == other.value.to_bits()
            && self.label_values == other.label_values
    }
}

/// Result of one scrape: samples in reply order plus the `zk_up` flag.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSet {
    samples: Vec<Sample>,
    up: bool,
}

impl SampleSet {
    /// The set reported when the node could not be queried at all.
    pub fn failed() -> Self {
        Self {
            samples: Vec::new(),
            up: false,
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Value of the health indicator.
    pub fn up(&self) -> bool {
        self.up
    }

    /// Total number of samples, health indicator included.
    pub fn len(&self) -> usize {
        self.samples.len() + 1
    }

    /// Always false: the health indicator is always present.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Look up the first sample for a metric name.
    pub fn get(&self, name: &str) -> Option<&Sample> {
        self.samples.iter().find(|s| s.descriptor.name == name)
    }
}

/// Map a raw `mntr` reply onto the registry.
///
/// Unknown keys are skipped. A line that is not exactly two
/// tab-separated fields is skipped and clears the health flag.
pub fn parse_reply(registry: &Registry, reply: &str) -> SampleSet {
    let mut samples = Vec::new();
    let mut up = true;

    for line in reply.trim_end().split('\n') {
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line
            .split_once('\t')
            .filter(|(_, value)| !value.contains('\t'))
        else {
            warn!(
                data = %line,
                "unexpected format of returned data, expected tab-separated key/value"
            );
            up = false;
            continue;
        };

        let Some(descriptor) = registry.get(key) else {
            continue;
        };

        debug!(metric = descriptor.name, %value, "sending metric");
        samples.push(Sample {
            descriptor,
            value: (descriptor.extract_value)(value),
            label_values: descriptor
                .extract_labels
                .map(|extract| extract(value))
                .unwrap_or_default(),
        });
    }

    SampleSet { samples, up }
}

/// Drives scrapes against one ZooKeeper node.
#[derive(Debug, Clone)]
pub struct ScrapeCollector {
    client: CommandClient,
    registry: &'static Registry,
    reset_on_scrape: bool,
}

impl ScrapeCollector {
    /// Create a collector using the global registry.
    pub fn new(client: CommandClient, reset_on_scrape: bool) -> Self {
        Self {
            client,
            registry: Registry::global(),
            reset_on_scrape,
        }
    }

    pub fn client(&self) -> &CommandClient {
        &self.client
    }

    pub fn reset_on_scrape(&self) -> bool {
        self.reset_on_scrape
    }

    /// Run one scrape. Never fails; see [`SampleSet::up`].
    pub async fn scrape(&self) -> SampleSet {
        info!(addr = %self.client.addr(), "fetching metrics from zookeeper");

        let reply = match self.client.send(FourLetterWord::Mntr).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(error = %e, "failed to fetch metrics");
                return SampleSet::failed();
            }
        };

        let set = parse_reply(self.registry, &reply);

        if self.reset_on_scrape {
            self.reset_statistics().await;
        }

        set
    }

    /// Best-effort `srst` on a fresh connection.
    async fn reset_statistics(&self) {
        info!("resetting zookeeper statistics");
        if let Err(e) = self.client.send(FourLetterWord::Srst).await {
            warn!(error = %e, "failed to reset statistics");
        }
    }
}
