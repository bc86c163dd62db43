//! Axum handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use tracing::{debug, error};

use zkexporter_metrics::prometheus::CONTENT_TYPE;
use zkexporter_metrics::render_prometheus;

use crate::{ApiState, MetricsSource};

/// `GET /`
pub async fn root(State(state): State<ApiState>) -> Html<String> {
    debug!("incoming request to /");
    Html(format!(
        "<html>\n\
         <head><title>Zookeeper Exporter</title></head>\n\
         <body>\n\
         <h1>Zookeeper Exporter</h1>\n\
         <p><a href=\"{}\">Metrics</a></p>\n\
         </body>\n\
         </html>\n",
        state.metrics_path
    ))
}

/// `GET <metrics_path>`
pub async fn metrics(State(state): State<ApiState>) -> Response {
    debug!(path = %state.metrics_path, "incoming request to metrics endpoint");

    let body = match &state.source {
        MetricsSource::OnDemand(collector) => render_prometheus(&collector.scrape().await),
        MetricsSource::Cached(cache) => match cache.get().await {
            Some(set) => render_prometheus(&set),
            None => {
                error!("call to metrics endpoint before successfully collecting metrics from zookeeper");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        },
    };

    (StatusCode::OK, [("content-type", CONTENT_TYPE)], body).into_response()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use zkexporter_client::testing::{FakeZookeeper, Reply, unreachable_addr};
    use zkexporter_client::{CommandClient, FourLetterWord};
    use zkexporter_metrics::{MetricsCache, ScrapeCollector};

    use super::*;
    use crate::build_router;

    fn on_demand(addr: String, metrics_path: &str) -> ApiState {
        ApiState {
            source: MetricsSource::OnDemand(Arc::new(ScrapeCollector::new(
                CommandClient::new(addr),
                false,
            ))),
            metrics_path: metrics_path.to_string(),
        }
    }

    async fn get(state: ApiState, uri: &str) -> (StatusCode, String) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = build_router(state).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn root_links_to_metrics_path() {
        let addr = unreachable_addr().await.unwrap();
        let (status, body) = get(on_demand(addr, "/zk-metrics"), "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<a href=\"/zk-metrics\">Metrics</a>"));
    }

    #[tokio::test]
    async fn metrics_scrapes_on_demand() {
        let zk = FakeZookeeper::start([(
            FourLetterWord::Mntr,
            Reply::text("zk_avg_latency\t0\nzk_max_latency\t23\nzk_num_alive_connections\t5\n"),
        )])
        .await
        .unwrap();

        let (status, body) = get(on_demand(zk.addr(), "/metrics"), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("zk_max_latency 23\n"));
        assert!(body.contains("zk_num_alive_connections 5\n"));
        assert!(body.contains("zk_up 1\n"));
    }

    #[tokio::test]
    async fn metrics_content_type() {
        let addr = unreachable_addr().await.unwrap();
        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = build_router(on_demand(addr, "/metrics"))
            .oneshot(req)
            .await
            .unwrap();

        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("text/plain; version=0.0.4"));
    }

    #[tokio::test]
    async fn unreachable_node_is_still_200() {
        let addr = unreachable_addr().await.unwrap();
        let (status, body) = get(on_demand(addr, "/metrics"), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("zk_up 0\n"));
        assert!(!body.contains("zk_avg_latency"));
    }

    #[tokio::test]
    async fn each_request_is_a_fresh_scrape() {
        let zk = FakeZookeeper::start([(FourLetterWord::Mntr, Reply::text("zk_znode_count\t4\n"))])
            .await
            .unwrap();
        let state = on_demand(zk.addr(), "/metrics");

        get(state.clone(), "/metrics").await;
        get(state, "/metrics").await;

        assert_eq!(zk.commands(), vec!["mntr", "mntr"]);
    }

    #[tokio::test]
    async fn cached_mode_is_500_before_first_refresh() {
        let state = ApiState {
            source: MetricsSource::Cached(MetricsCache::new()),
            metrics_path: "/metrics".to_string(),
        };

        let (status, _) = get(state, "/metrics").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn cached_mode_is_500_after_failed_first_refresh() {
        let down = unreachable_addr().await.unwrap();
        let cache = MetricsCache::new();
        cache
            .refresh(&ScrapeCollector::new(CommandClient::new(down), false))
            .await;
        let state = ApiState {
            source: MetricsSource::Cached(cache),
            metrics_path: "/metrics".to_string(),
        };

        let (status, _) = get(state, "/metrics").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn cached_mode_serves_last_refresh_without_scraping() {
        let zk = FakeZookeeper::start([(FourLetterWord::Mntr, Reply::text("zk_server_state\tleader\n"))])
            .await
            .unwrap();
        let cache = MetricsCache::new();
        cache
            .refresh(&ScrapeCollector::new(CommandClient::new(zk.addr()), false))
            .await;
        let state = ApiState {
            source: MetricsSource::Cached(cache),
            metrics_path: "/metrics".to_string(),
        };

        let (status, body) = get(state.clone(), "/metrics").await;
        get(state, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("zk_server_state{state=\"leader\"} 1\n"));
        assert_eq!(zk.commands().len(), 1);
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let addr = unreachable_addr().await.unwrap();
        let (status, _) = get(on_demand(addr, "/metrics"), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
