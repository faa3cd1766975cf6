//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and a set of strongly-typed load metrics, and an async HTTP
//! exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};

/// Load-run Prometheus metrics.
///
/// Every handle is reference counted internally, so cloning `LoadMetrics`
/// and handing copies to each proposer and collector is cheap and all of
/// them feed the same series.
#[derive(Clone)]
pub struct LoadMetrics {
    /// Proposals handed to an endorser (one per send attempt).
    pub proposals_sent: IntCounter,
    /// Proposals the peer endorsed (status in `200..400`).
    pub proposals_endorsed: IntCounter,
    /// Proposals the peer answered with a rejecting status.
    pub proposals_rejected: IntCounter,
    /// Proposals lost to transport failures.
    pub proposals_failed: IntCounter,
    /// Proposals currently outstanding across all proposers.
    pub proposals_in_flight: IntGauge,
    /// Round-trip time of a single endorsement, in seconds.
    pub endorsement_seconds: Histogram,
    /// Distinct blocks that reached quorum.
    pub blocks_committed: IntCounter,
    /// Transactions carried by blocks that reached quorum.
    pub txs_committed: IntCounter,
    /// Blocks dropped by the verifier before being counted.
    pub blocks_rejected: IntCounter,
    /// Time from run start to the deciding report of each block, in seconds.
    pub commit_latency_seconds: Histogram,
}

impl LoadMetrics {
    /// Registers load metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let proposals_sent = IntCounter::with_opts(Opts::new(
            "proposals_sent_total",
            "Total number of proposals sent to endorsing peers",
        ))?;
        registry.register(Box::new(proposals_sent.clone()))?;

        let proposals_endorsed = IntCounter::with_opts(Opts::new(
            "proposals_endorsed_total",
            "Total number of proposals endorsed by peers",
        ))?;
        registry.register(Box::new(proposals_endorsed.clone()))?;

        let proposals_rejected = IntCounter::with_opts(Opts::new(
            "proposals_rejected_total",
            "Total number of proposals rejected by peers",
        ))?;
        registry.register(Box::new(proposals_rejected.clone()))?;

        let proposals_failed = IntCounter::with_opts(Opts::new(
            "proposals_failed_total",
            "Total number of proposals lost to transport failures",
        ))?;
        registry.register(Box::new(proposals_failed.clone()))?;

        let proposals_in_flight = IntGauge::with_opts(Opts::new(
            "proposals_in_flight",
            "Number of proposals currently awaiting an endorsement",
        ))?;
        registry.register(Box::new(proposals_in_flight.clone()))?;

        let endorsement_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "endorsement_seconds",
                "Round-trip time of a single endorsement in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
            ]),
        )?;
        registry.register(Box::new(endorsement_seconds.clone()))?;

        let blocks_committed = IntCounter::with_opts(Opts::new(
            "blocks_committed_total",
            "Total number of distinct blocks that reached observer quorum",
        ))?;
        registry.register(Box::new(blocks_committed.clone()))?;

        let txs_committed = IntCounter::with_opts(Opts::new(
            "txs_committed_total",
            "Total number of transactions in blocks that reached observer quorum",
        ))?;
        registry.register(Box::new(txs_committed.clone()))?;

        let blocks_rejected = IntCounter::with_opts(Opts::new(
            "blocks_rejected_total",
            "Total number of delivered blocks rejected by the block verifier",
        ))?;
        registry.register(Box::new(blocks_rejected.clone()))?;

        let commit_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "commit_latency_seconds",
                "Time from run start until a block reached observer quorum in seconds",
            )
            .buckets(vec![
                0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0,
            ]),
        )?;
        registry.register(Box::new(commit_latency_seconds.clone()))?;

        Ok(Self {
            proposals_sent,
            proposals_endorsed,
            proposals_rejected,
            proposals_failed,
            proposals_in_flight,
            endorsement_seconds,
            blocks_committed,
            txs_committed,
            blocks_rejected,
            commit_latency_seconds,
        })
    }
}

/// Wrapper around a Prometheus registry and the load metrics.
///
/// This is the main handle a driver passes around. It can be wrapped in
/// an [`Arc`] and shared across tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub load: LoadMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the load metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("tape".to_string()), None)?;
        let load = LoadMetrics::register(&registry)?;
        Ok(Self { registry, load })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics exporter listening");
    serve_prometheus(metrics, listener).await
}

/// Serves `/metrics` on an already bound listener until accepting fails.
pub async fn serve_prometheus(
    metrics: Arc<MetricsRegistry>,
    listener: TcpListener,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::debug!(error = %err, "prometheus HTTP connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let mut resp = Response::new(Full::new(Bytes::from(metrics.gather_text())));
            resp.headers_mut().insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            resp
        }
        _ => {
            let mut resp = Response::new(Full::new(Bytes::from("not found")));
            *resp.status_mut() = StatusCode::NOT_FOUND;
            resp
        }
    };
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn load_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = LoadMetrics::register(&registry).expect("register metrics");

        metrics.proposals_sent.inc();
        metrics.endorsement_seconds.observe(0.012);
        metrics.proposals_in_flight.set(3);
        metrics.blocks_committed.inc();
        metrics.commit_latency_seconds.observe(1.5);

        let metric_families = registry.gather();
        assert!(!metric_families.is_empty());
    }

    #[test]
    fn registering_twice_is_rejected() {
        let registry = Registry::new();
        LoadMetrics::register(&registry).expect("first registration");
        assert!(LoadMetrics::register(&registry).is_err());
    }

    #[tokio::test]
    async fn exporter_serves_metrics_and_404s_elsewhere() {
        let registry = Arc::new(MetricsRegistry::new().expect("create metrics registry"));
        registry.load.blocks_committed.inc_by(3);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_prometheus(registry.clone(), listener));

        let client = reqwest::Client::new();
        let resp = client
            .get(format!("http://{addr}/metrics"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body = resp.text().await.unwrap();
        assert!(body.contains("tape_blocks_committed_total 3"), "body: {body}");

        let missing = client
            .get(format!("http://{addr}/healthz"))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        let wrong_method = client
            .post(format!("http://{addr}/metrics"))
            .send()
            .await
            .unwrap();
        assert_eq!(wrong_method.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn exporter_reports_an_occupied_address() {
        let registry = Arc::new(MetricsRegistry::new().expect("create metrics registry"));
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        assert!(run_prometheus_http_server(registry, addr).await.is_err());
    }

    #[test]
    fn metrics_registry_gather_text_is_namespaced() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.load.blocks_committed.inc();
        let text = registry.gather_text();
        assert!(text.contains("tape_blocks_committed_total"));
    }
}
