//! Tape library crate.
//!
//! This crate provides the measurement core of a load generator for a
//! permissioned ledger:
//!
//! - domain types for proposals, responses and filtered blocks (`types`),
//! - the per-peer proposal pump (`proposer`),
//! - the quorum block collector (`collector`),
//! - an HTTP endorser transport (`transport`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level run configuration (`config`).
//!
//! A driver wires one [`Proposer`] per endorsing peer, all feeding one
//! outbound queue, and one [`BlockCollector`] fed by every delivery
//! stream. Signing proposals and subscribing to block events are left to
//! the driver.

pub mod collector;
pub mod config;
pub mod metrics;
pub mod proposer;
pub mod transport;
pub mod types;

// Re-export top-level configuration types.
pub use config::{CollectorConfig, EndorserConfig, MetricsConfig, ProposerConfig, TapeConfig};

// Re-export the two core components and their seams.
pub use collector::{
    AcceptAllVerifier, BlockCollector, BlockProgress, BlockVerifier, CollectorError,
    CollectorExit, CompletionSignal, Decision, ValidTxVerifier, VerifyError,
};
pub use proposer::{Endorser, Proposer, ProposerError, ProposerReport};

// Re-export the HTTP transport.
pub use transport::HttpEndorser;

// Re-export metrics registry and load metrics.
pub use metrics::{LoadMetrics, MetricsRegistry, run_prometheus_http_server, serve_prometheus};

// Re-export domain types at the crate root for convenience.
pub use types::*;
