//! Metrics and instrumentation for load runs.
//!
//! This module defines Prometheus-compatible metrics for the proposer
//! pipeline and the block collector, and exposes a small HTTP exporter
//! that serves `/metrics` in Prometheus text format.
//!
//! Typical usage in a driver:
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use tape::metrics::{MetricsRegistry, run_prometheus_http_server};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! let addr: SocketAddr = "127.0.0.1:9899".parse()?;
//!
//! // Spawn the HTTP exporter in the background:
//! tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
//!
//! // Hand the metrics to the components:
//! let collector = BlockCollector::new(2, 3)?.with_metrics(registry.load.clone());
//! ```

pub mod prometheus;

pub use self::prometheus::{
    LoadMetrics, MetricsRegistry, run_prometheus_http_server, serve_prometheus,
};
