//! zkexporterd — Prometheus exporter for ZooKeeper.
//!
//! Serves the `mntr` statistics of one ZooKeeper node as Prometheus
//! metrics. By default every request to the metrics endpoint scrapes
//! the node; with `--refresh-interval` a background loop scrapes instead
//! and requests get the last result.
//!
//! # Usage
//!
//! ```text
//! zkexporterd --zookeeper zk-1:2181 --bind-addr :9141
//! zkexporterd --config /etc/zkexporter.toml --log-json
//! ```

mod config;
mod server;
mod tls;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use zkexporter_api::{ApiState, MetricsSource, build_router};
use zkexporter_client::CommandClient;
use zkexporter_metrics::{MetricsCache, ScrapeCollector};

use crate::config::{ConfigOverrides, ExporterConfig};

#[derive(Parser)]
#[command(name = "zkexporterd", about = "Prometheus exporter for ZooKeeper", version)]
struct Cli {
    /// TOML config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ExporterConfig::load(cli.config.as_deref(), cli.overrides)
        .context("invalid configuration")?;

    init_tracing(&config)?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting zookeeper exporter");

    run(config).await
}

fn init_tracing(config: &ExporterConfig) -> anyhow::Result<()> {
    let level = config.log_level_filter()?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_json {
        builder.json().init();
    } else {
        builder.with_ansi(false).init();
    }
    Ok(())
}

async fn run(config: ExporterConfig) -> anyhow::Result<()> {
    let bind_addr = config.socket_addr()?;

    let tls = match (config.enable_tls, &config.cert, &config.cert_key) {
        (true, Some(cert), Some(key)) => {
            Some(tls::load_tls_config(cert, key).context("failed to load TLS material")?)
        }
        _ => None,
    };

    let collector = ScrapeCollector::new(
        CommandClient::new(config.zookeeper.clone()),
        config.reset_on_scrape,
    );
    info!(
        zookeeper = collector.client().addr(),
        timeout_ms = collector.client().timeout().as_millis() as u64,
        reset_on_scrape = collector.reset_on_scrape(),
        "scrape collector initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Metrics source ─────────────────────────────────────────

    let mut refresh_handle = None;
    let source = match config.refresh_interval() {
        Some(interval) => {
            let cache = MetricsCache::new();
            let refresher = cache.clone();
            let refresh_shutdown = shutdown_rx.clone();
            refresh_handle = Some(tokio::spawn(async move {
                refresher.run(collector, interval, refresh_shutdown).await;
            }));
            MetricsSource::Cached(cache)
        }
        None => MetricsSource::OnDemand(Arc::new(collector)),
    };

    // ── HTTP endpoint ──────────────────────────────────────────

    let router = build_router(ApiState {
        source,
        metrics_path: config.metrics_path.clone(),
    });
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    info!(
        addr = %bind_addr,
        metrics_path = %config.metrics_path,
        tls = tls.is_some(),
        "starting metric http endpoint"
    );

    let mut server = match tls {
        Some(tls) => tokio::spawn(server::serve_tls(listener, router, tls, shutdown_rx)),
        None => tokio::spawn(server::serve_plain(listener, router, shutdown_rx)),
    };

    tokio::select! {
        signal = shutdown_signal() => {
            let signal = signal.context("failed to install signal handlers")?;
            info!(%signal, "caught signal, exiting");
            let _ = shutdown_tx.send(true);
            server.await??;
        }
        result = &mut server => {
            let _ = shutdown_tx.send(true);
            result??;
        }
    }

    if let Some(handle) = refresh_handle {
        let _ = handle.await;
    }

    info!("zookeeper exporter stopped");
    Ok(())
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    Ok(tokio::select! {
        _ = interrupt.recv() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = quit.recv() => "SIGQUIT",
    })
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_flags_map_onto_config() {
        let cli = Cli::try_parse_from([
            "zkexporterd",
            "--zookeeper",
            "zk-1:2181",
            "--reset-on-scrape=false",
            "--log-json",
            "--refresh-interval",
            "30",
        ])
        .unwrap();

        let config = ExporterConfig::load(None, cli.overrides).unwrap();
        assert_eq!(config.zookeeper, "zk-1:2181");
        assert!(!config.reset_on_scrape);
        assert!(config.log_json);
        assert_eq!(config.refresh_interval, Some(30));
        assert_eq!(config.bind_addr, ":9141");
    }

    #[test]
    fn bare_tls_flag_is_fatal() {
        let cli = Cli::try_parse_from(["zkexporterd", "--enable-tls"]).unwrap();
        let err = ExporterConfig::load(None, cli.overrides).unwrap_err();
        assert!(matches!(err, config::ConfigError::MissingTlsMaterial));
    }

    #[test]
    fn defaults_without_flags() {
        let cli = Cli::try_parse_from(["zkexporterd"]).unwrap();
        assert!(cli.config.is_none());
        let config = ExporterConfig::load(None, cli.overrides).unwrap();
        assert_eq!(config, ExporterConfig::default());
    }
}
