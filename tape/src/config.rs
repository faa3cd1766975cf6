//! Top-level configuration for a load run.
//!
//! This module aggregates configuration for:
//!
//! - the proposer pipeline (in-flight limit, queue capacities),
//! - the block collector (quorum, observers, target, verification),
//! - the HTTP endorser client (timeouts, TLS),
//! - the metrics exporter (enable flag + listen address).
//!
//! Every section has sensible defaults. A driver can build a
//! [`TapeConfig`] in code or deserialize one from JSON; missing fields
//! fall back to their defaults.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::collector::{BlockCollector, CollectorError};

/// Settings for each [`crate::Proposer`] loop.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ProposerConfig {
    /// Maximum proposals outstanding per peer.
    pub in_flight: usize,
    /// Capacity of each per-peer inbound queue and the shared outbound queue.
    pub queue_capacity: usize,
}

impl Default for ProposerConfig {
    fn default() -> Self {
        Self {
            in_flight: 16,
            queue_capacity: 1_000,
        }
    }
}

/// Settings for the [`BlockCollector`].
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Observers that must report a block before it counts as committed.
    pub quorum: usize,
    /// Delivery streams expected to report each block.
    pub observers: usize,
    /// Distinct committed blocks after which the async loop completes.
    pub target_blocks: u64,
    /// Run the block verifier before counting an observation.
    pub verify: bool,
    /// Capacity of the shared block queue.
    pub queue_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            quorum: 1,
            observers: 1,
            target_blocks: 100,
            verify: false,
            queue_capacity: 100,
        }
    }
}

impl CollectorConfig {
    /// Builds a collector with this quorum and observer count.
    pub fn build(&self) -> Result<BlockCollector, CollectorError> {
        BlockCollector::new(self.quorum, self.observers)
    }
}

/// Settings for [`crate::transport::HttpEndorser`].
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EndorserConfig {
    /// Whole-request timeout, in milliseconds.
    pub timeout_ms: u64,
    /// TCP/TLS connect timeout, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Talk `https` instead of `http`.
    pub use_tls: bool,
}

impl EndorserConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for EndorserConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            connect_timeout_ms: 3_000,
            use_tls: false,
        }
    }
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9899)),
        }
    }
}

/// Top-level configuration for a load run.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct TapeConfig {
    pub proposer: ProposerConfig,
    pub collector: CollectorConfig,
    pub endorser: EndorserConfig,
    pub metrics: MetricsConfig,
}

impl TapeConfig {
    /// Parses a JSON document; absent sections and fields keep their
    /// defaults.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = TapeConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg.proposer.in_flight, ProposerConfig::default().in_flight);
        assert_eq!(cfg.collector.quorum, 1);
        assert_eq!(cfg.endorser.timeout(), Duration::from_secs(10));
        assert!(!cfg.metrics.enabled);
    }

    #[test]
    fn partial_sections_override_only_given_fields() {
        let cfg = TapeConfig::from_json_str(
            r#"{
                "collector": { "quorum": 2, "observers": 3, "verify": true },
                "endorser": { "timeout_ms": 250 },
                "metrics": { "enabled": true, "listen_addr": "0.0.0.0:9100" }
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.collector.quorum, 2);
        assert_eq!(cfg.collector.observers, 3);
        assert!(cfg.collector.verify);
        assert_eq!(cfg.collector.target_blocks, 100);
        assert_eq!(cfg.endorser.timeout(), Duration::from_millis(250));
        assert_eq!(cfg.endorser.connect_timeout_ms, 3_000);
        assert_eq!(cfg.metrics.listen_addr.port(), 9100);
    }

    #[test]
    fn collector_config_builds_or_rejects() {
        let cfg = CollectorConfig {
            quorum: 2,
            observers: 3,
            ..Default::default()
        };
        let collector = cfg.build().expect("valid collector config");
        assert_eq!(collector.quorum(), 2);
        assert_eq!(collector.observers(), 3);

        let bad = CollectorConfig {
            quorum: 0,
            ..Default::default()
        };
        assert!(bad.build().is_err());
    }

    #[test]
    fn unknown_types_are_reported() {
        assert!(TapeConfig::from_json_str(r#"{ "proposer": { "in_flight": "many" } }"#).is_err());
    }
}
