//! Proposal pump for a single endorsing peer.
//!
//! A [`Proposer`] reads [`Elements`] from its own inbound queue, sends each
//! signed proposal to its peer and publishes the endorsed item on an
//! outbound queue that is usually shared by every proposer in the run.
//! Fan-out to N peers is N proposers, each with its own inbound queue.
//!
//! Failures are handled best-effort: a proposal that fails to reach the
//! peer, or that the peer rejects, is logged, counted in the
//! [`ProposerReport`] and dropped. The loop keeps going.

pub mod endorser;
pub mod error;

pub use endorser::Endorser;
pub use error::ProposerError;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use prometheus::IntGauge;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info_span, warn};

use crate::config::EndorserConfig;
use crate::metrics::LoadMetrics;
use crate::transport::HttpEndorser;
use crate::types::{Elements, Node};

/// Counters for one proposer loop.
#[derive(Default)]
struct ProposerStats {
    sent: AtomicU64,
    endorsed: AtomicU64,
    rejected: AtomicU64,
    failed: AtomicU64,
}

/// Summary returned when [`Proposer::start`] exits.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProposerReport {
    /// Proposals handed to the endorser.
    pub sent: u64,
    /// Proposals endorsed and published on the outbound queue (or dropped
    /// because the run was shutting down).
    pub endorsed: u64,
    /// Proposals the peer answered with a rejecting status.
    pub rejected: u64,
    /// Proposals lost to connection or delivery failures.
    pub failed: u64,
    /// `true` if the loop stopped because of cancellation rather than
    /// running out of input.
    pub cancelled: bool,
}

/// Drives signed proposals at one endorsing peer.
pub struct Proposer<E = HttpEndorser> {
    node: Node,
    endorser: Arc<E>,
    span: Span,
    metrics: Option<LoadMetrics>,
}

impl Proposer<HttpEndorser> {
    /// Creates a proposer talking HTTP to `node`.
    ///
    /// The address is resolved up front, so an unknown host fails here
    /// with [`ProposerError::Connection`]. Connections are opened lazily;
    /// a peer that is down shows up as per-proposal failures once the
    /// loop runs.
    ///
    /// `logger` is the span proposer events are recorded under. With
    /// `None`, a span carrying the peer address is created.
    pub async fn connect(
        node: Node,
        logger: Option<Span>,
        cfg: &EndorserConfig,
    ) -> Result<Self, ProposerError> {
        let endorser = HttpEndorser::connect(&node, cfg).await?;
        Ok(Self::with_endorser(node, endorser, logger))
    }
}

impl<E: Endorser> Proposer<E> {
    /// Creates a proposer over an arbitrary transport.
    pub fn with_endorser(node: Node, endorser: E, logger: Option<Span>) -> Self {
        let span = logger.unwrap_or_else(|| info_span!("proposer", peer = %node.addr));
        Self {
            node,
            endorser: Arc::new(endorser),
            span,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: LoadMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Pumps proposals from `inbound` to the peer until `cancel` fires or
    /// `inbound` is closed and empty.
    ///
    /// At most `threshold` proposals are outstanding at once (a zero
    /// threshold is treated as one). When every slot is taken the loop
    /// stops dequeuing until a response comes back.
    ///
    /// On cancellation in-flight sends are abandoned and the loop returns
    /// promptly; when the input runs dry, in-flight sends are allowed to
    /// finish first. Either way the inbound receiver is dropped on return,
    /// so producers still feeding it see a closed channel.
    pub async fn start(
        self,
        cancel: CancellationToken,
        mut inbound: mpsc::Receiver<Elements>,
        outbound: mpsc::Sender<Elements>,
        threshold: usize,
    ) -> ProposerReport {
        let limit = threshold.max(1);
        let slots = Arc::new(Semaphore::new(limit));
        let stats = Arc::new(ProposerStats::default());
        let forwarder = Forwarder {
            endorser: self.endorser.clone(),
            outbound,
            cancel: cancel.clone(),
            stats: stats.clone(),
            metrics: self.metrics.clone(),
        };
        let mut in_flight = JoinSet::new();

        let span = self.span.clone();
        let cancelled = async {
            debug!(limit, "proposer started");

            loop {
                // Reap finished sends so the set only tracks live ones.
                while in_flight.try_join_next().is_some() {}

                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break true,
                    permit = slots.clone().acquire_owned() => match permit {
                        Ok(permit) => permit,
                        // The semaphore is never closed.
                        Err(_) => break false,
                    },
                };

                let elements = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break true,
                    maybe = inbound.recv() => match maybe {
                        Some(elements) => elements,
                        None => break false,
                    },
                };

                in_flight.spawn(
                    forwarder
                        .clone()
                        .forward(elements, permit)
                        .instrument(Span::current()),
                );
            }
        }
        .instrument(span.clone())
        .await;

        drop(inbound);

        // Input exhausted: let outstanding sends land, unless we are told
        // to stop while waiting.
        let cancelled = cancelled
            || loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break true,
                    joined = in_flight.join_next() => {
                        if joined.is_none() {
                            break false;
                        }
                    }
                }
            };

        if cancelled {
            // Aborted sends are only dropped once joined.
            in_flight.abort_all();
            while in_flight.join_next().await.is_some() {}
        }

        let report = ProposerReport {
            sent: stats.sent.load(Ordering::Relaxed),
            endorsed: stats.endorsed.load(Ordering::Relaxed),
            rejected: stats.rejected.load(Ordering::Relaxed),
            failed: stats.failed.load(Ordering::Relaxed),
            cancelled,
        };

        span.in_scope(|| {
            debug!(
                sent = report.sent,
                endorsed = report.endorsed,
                rejected = report.rejected,
                failed = report.failed,
                cancelled = report.cancelled,
                "proposer stopped"
            )
        });

        report
    }
}

/// Everything a single in-flight send needs, cloned per proposal.
struct Forwarder<E> {
    endorser: Arc<E>,
    outbound: mpsc::Sender<Elements>,
    cancel: CancellationToken,
    stats: Arc<ProposerStats>,
    metrics: Option<LoadMetrics>,
}

impl<E> Clone for Forwarder<E> {
    fn clone(&self) -> Self {
        Self {
            endorser: self.endorser.clone(),
            outbound: self.outbound.clone(),
            cancel: self.cancel.clone(),
            stats: self.stats.clone(),
            metrics: self.metrics.clone(),
        }
    }
}

impl<E: Endorser> Forwarder<E> {
    /// Sends one proposal and publishes the result. The slot is held
    /// until the processed item has been handed to the outbound queue.
    async fn forward(self, elements: Elements, _slot: OwnedSemaphorePermit) {
        self.stats.sent.fetch_add(1, Ordering::Relaxed);
        let in_flight = self.metrics.as_ref().map(|m| {
            m.proposals_sent.inc();
            InFlight::enter(m.proposals_in_flight.clone())
        });

        let start = Instant::now();
        let result = self
            .endorser
            .process_proposal(elements.signed_proposal())
            .await
            .and_then(|resp| {
                if resp.is_endorsed() {
                    Ok(resp)
                } else {
                    Err(ProposerError::Rejected {
                        status: resp.status,
                        message: resp.message,
                    })
                }
            });

        drop(in_flight);
        if let Some(m) = &self.metrics {
            m.endorsement_seconds.observe(start.elapsed().as_secs_f64());
        }

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_rejection() => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                if let Some(m) = &self.metrics {
                    m.proposals_rejected.inc();
                }
                warn!(error = %e, "peer rejected proposal");
                return;
            }
            Err(e) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                if let Some(m) = &self.metrics {
                    m.proposals_failed.inc();
                }
                warn!(error = %e, "failed to process proposal");
                return;
            }
        };

        self.stats.endorsed.fetch_add(1, Ordering::Relaxed);
        if let Some(m) = &self.metrics {
            m.proposals_endorsed.inc();
        }

        let processed = elements.with_response(response);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            sent = self.outbound.send(processed) => {
                if sent.is_err() {
                    debug!("outbound queue closed, dropping endorsed proposal");
                }
            }
        }
    }
}

/// Keeps the in-flight gauge raised while a send is outstanding, including
/// sends aborted on cancellation.
struct InFlight(IntGauge);

impl InFlight {
    fn enter(gauge: IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.dec();
    }
}
