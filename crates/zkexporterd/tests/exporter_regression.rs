//! Exporter regression tests.
//!
//! Drives the assembled router against a scripted ZooKeeper node and
//! checks the exposition a Prometheus server would see.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use zkexporter_api::{ApiState, MetricsSource, build_router};
use zkexporter_client::testing::{FakeZookeeper, Reply, unreachable_addr};
use zkexporter_client::{CommandClient, FourLetterWord};
use zkexporter_metrics::{MetricsCache, ScrapeCollector};

const MNTR_LEADER: &str = "zk_version\t3.5.9-83df9301aa5c2a5d284a9940177808c01bc35cef, built on 01/06/2021 20:03 GMT\n\
zk_avg_latency\t0\n\
zk_max_latency\t23\n\
zk_min_latency\t0\n\
zk_packets_received\t1240\n\
zk_packets_sent\t1239\n\
zk_num_alive_connections\t5\n\
zk_outstanding_requests\t0\n\
zk_server_state\tleader\n\
zk_znode_count\t31\n\
zk_watch_count\t6\n\
zk_ephemerals_count\t2\n\
zk_approximate_data_size\t1187\n\
zk_open_file_descriptor_count\t67\n\
zk_max_file_descriptor_count\t1048576\n\
zk_followers\t2\n\
zk_synced_followers\t2\n\
zk_pending_syncs\t0\n";

fn on_demand(zk_addr: String, reset_on_scrape: bool) -> ApiState {
    let collector = ScrapeCollector::new(CommandClient::new(zk_addr), reset_on_scrape);
    ApiState {
        source: MetricsSource::OnDemand(Arc::new(collector)),
        metrics_path: "/metrics".to_string(),
    }
}

async fn scrape(state: ApiState) -> (StatusCode, String) {
    let req = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let resp = build_router(state).oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn leader_exposition() {
    let zk = FakeZookeeper::start([
        (FourLetterWord::Mntr, Reply::text(MNTR_LEADER)),
        (FourLetterWord::Srst, Reply::text("Server stats reset.\n")),
    ])
    .await
    .unwrap();

    let (status, body) = scrape(on_demand(zk.addr(), true)).await;

    assert_eq!(status, StatusCode::OK);
    for expected in [
        "# TYPE zk_avg_latency gauge\nzk_avg_latency 0\n",
        "# TYPE zk_max_latency gauge\nzk_max_latency 23\n",
        "# TYPE zk_packets_received counter\nzk_packets_received 1240\n",
        "# TYPE zk_server_state untyped\nzk_server_state{state=\"leader\"} 1\n",
        "zk_max_file_descriptor_count 1048576\n",
        "zk_synced_followers 2\n",
        "# TYPE zk_up gauge\nzk_up 1\n",
    ] {
        assert!(body.contains(expected), "missing {expected:?} in:\n{body}");
    }
    assert!(!body.contains("zk_version"));
    assert_eq!(zk.commands(), vec!["mntr", "srst"]);
}

#[tokio::test]
async fn malformed_line_reports_down_but_keeps_metrics() {
    let zk = FakeZookeeper::start([(
        FourLetterWord::Mntr,
        Reply::text("zk_avg_latency\t4\ngarbage\nzk_znode_count\t31\n"),
    )])
    .await
    .unwrap();

    let (status, body) = scrape(on_demand(zk.addr(), false)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("zk_avg_latency 4\n"));
    assert!(body.contains("zk_znode_count 31\n"));
    assert!(body.contains("zk_up 0\n"));
}

#[tokio::test]
async fn unreachable_node_reports_only_down() {
    let addr = unreachable_addr().await.unwrap();

    let (status, body) = scrape(on_demand(addr, true)).await;

    assert_eq!(status, StatusCode::OK);
    let series: Vec<&str> = body
        .lines()
        .filter(|l| !l.starts_with('#'))
        .filter(|l| l.starts_with("zk_"))
        .collect();
    assert_eq!(series, vec!["zk_up 0"]);
}

#[tokio::test]
async fn failed_reset_leaves_exposition_untouched() {
    let zk = FakeZookeeper::start([
        (FourLetterWord::Mntr, Reply::text(MNTR_LEADER)),
        (FourLetterWord::Srst, Reply::Hang),
    ])
    .await
    .unwrap();
    let client = CommandClient::new(zk.addr()).with_timeout(Duration::from_millis(200));
    let state = ApiState {
        source: MetricsSource::OnDemand(Arc::new(ScrapeCollector::new(client, true))),
        metrics_path: "/metrics".to_string(),
    };

    let (status, body) = scrape(state).await;
    let (_, reference) = scrape(on_demand(zk.addr(), false)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, reference);
    assert!(body.contains("zk_up 1\n"));
}

#[tokio::test]
async fn concurrent_scrapes_are_independent() {
    let zk = FakeZookeeper::start([(FourLetterWord::Mntr, Reply::text(MNTR_LEADER))])
        .await
        .unwrap();
    let state = on_demand(zk.addr(), false);

    let scrapes: Vec<_> = (0..8).map(|_| tokio::spawn(scrape(state.clone()))).collect();
    let mut bodies = Vec::new();
    for handle in scrapes {
        let (status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        bodies.push(body);
    }

    assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(zk.connections(), 8);
}

#[tokio::test]
async fn cached_mode_serves_background_refresh() {
    let zk = FakeZookeeper::start([(FourLetterWord::Mntr, Reply::text(MNTR_LEADER))])
        .await
        .unwrap();
    let collector = ScrapeCollector::new(CommandClient::new(zk.addr()), false);
    let cache = MetricsCache::new();
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let refresher = {
        let cache = cache.clone();
        tokio::spawn(async move {
            cache
                .run(collector, Duration::from_secs(3600), shutdown_rx)
                .await;
        })
    };
    let state = ApiState {
        source: MetricsSource::Cached(cache.clone()),
        metrics_path: "/metrics".to_string(),
    };

    tokio::time::timeout(Duration::from_secs(5), async {
        while cache.get().await.is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let (status, body) = scrape(state.clone()).await;
    scrape(state).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("zk_server_state{state=\"leader\"} 1\n"));
    assert_eq!(zk.commands(), vec!["mntr"]);

    shutdown_tx.send(true).unwrap();
    refresher.await.unwrap();
}
