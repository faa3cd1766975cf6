//! Quorum-based block commit collector.
//!
//! Every observing peer runs its own delivery stream, so the same block
//! arrives once per observer. The [`BlockCollector`] counts those reports
//! per block number and declares a block committed when the count first
//! reaches the configured quorum. Exactly one report per block number is
//! the deciding one, no matter how the reports interleave.
//!
//! Two operating modes share the same state:
//!
//! - [`BlockCollector::commit`]: synchronous, called directly by each
//!   delivery task;
//! - [`BlockCollector::start`]: an async loop draining a shared block
//!   queue until a target number of blocks has committed, then firing a
//!   [`CompletionSignal`].

pub mod error;
pub mod signal;
pub mod state;
pub mod verifier;

pub use error::{CollectorError, VerifyError};
pub use signal::CompletionSignal;
pub use state::{BlockProgress, Decision};
pub use verifier::{AcceptAllVerifier, BlockVerifier, ValidTxVerifier};

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::metrics::LoadMetrics;
use crate::types::FilteredBlock;

use self::state::QuorumState;

/// Why [`BlockCollector::start`] returned.
///
/// Each variant carries the number of blocks this loop decided.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CollectorExit {
    /// Target reached; the completion signal was fired.
    Completed { committed: u64 },
    /// Cancelled before the target was reached.
    Cancelled { committed: u64 },
    /// Every block sender went away before the target was reached.
    Exhausted { committed: u64 },
}

/// Concurrency-safe quorum counter over block observations.
///
/// Share it behind an `Arc`; all methods take `&self`.
pub struct BlockCollector {
    quorum: usize,
    observers: usize,
    state: Mutex<QuorumState>,
    verifier: Box<dyn BlockVerifier>,
    metrics: Option<LoadMetrics>,
}

impl BlockCollector {
    /// Creates a collector that commits a block once `quorum` of the
    /// `observers` delivery streams have reported it.
    pub fn new(quorum: usize, observers: usize) -> Result<Self, CollectorError> {
        if quorum == 0 || observers == 0 {
            return Err(CollectorError::Config(format!(
                "quorum ({quorum}) and observers ({observers}) must be greater than zero"
            )));
        }
        if quorum > observers {
            return Err(CollectorError::Config(format!(
                "quorum ({quorum}) must not exceed observers ({observers})"
            )));
        }

        Ok(Self {
            quorum,
            observers,
            state: Mutex::new(QuorumState::new(quorum)),
            verifier: Box::new(AcceptAllVerifier),
            metrics: None,
        })
    }

    /// Replaces the verifier consulted by [`start`](Self::start) when
    /// verification is enabled.
    pub fn with_verifier(mut self, verifier: impl BlockVerifier + 'static) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    pub fn with_metrics(mut self, metrics: LoadMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn observers(&self) -> usize {
        self.observers
    }

    /// Number of distinct blocks that reached quorum so far.
    pub fn committed(&self) -> u64 {
        self.lock().committed()
    }

    /// Transactions carried by the committed blocks.
    pub fn committed_txs(&self) -> u64 {
        self.lock().committed_txs()
    }

    /// Current progress of `number`, or `None` if it was never reported.
    pub fn progress(&self, number: u64) -> Option<BlockProgress> {
        self.lock().progress(number)
    }

    /// Records one observation of `block` and returns `true` if this call
    /// is the one that brought the block to quorum.
    ///
    /// Reports before quorum and any report after it return `false`.
    /// `started` marks the beginning of the run and is only used to
    /// measure commit latency.
    pub fn commit(&self, block: &FilteredBlock, started: Instant) -> bool {
        self.observe(block, started).is_decided()
    }

    /// Drains `blocks` until `target` distinct blocks have been decided
    /// by this loop, then fires `done` and returns.
    ///
    /// With `verify` set, each block goes through the configured
    /// [`BlockVerifier`] first; rejected blocks are not counted.
    ///
    /// The loop owns the receiver: once it returns, producers still
    /// sending get a closed-channel error instead of blocking forever.
    pub async fn start(
        &self,
        cancel: CancellationToken,
        mut blocks: mpsc::Receiver<FilteredBlock>,
        done: CompletionSignal,
        target: u64,
        started: Instant,
        verify: bool,
    ) -> CollectorExit {
        let mut committed = 0u64;

        if target == 0 {
            done.fire();
            return CollectorExit::Completed { committed };
        }

        loop {
            let block = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!(committed, target, "block collector cancelled");
                    return CollectorExit::Cancelled { committed };
                }

                maybe_block = blocks.recv() => match maybe_block {
                    Some(block) => block,
                    None => {
                        warn!(committed, target, "block queue closed before target was reached");
                        return CollectorExit::Exhausted { committed };
                    }
                },
            };

            if verify {
                if let Err(e) = self.verifier.verify(&block) {
                    warn!(block = block.number, error = %e, "dropping block that failed verification");
                    if let Some(m) = &self.metrics {
                        m.blocks_rejected.inc();
                    }
                    continue;
                }
            }

            if self.observe(&block, started).is_decided() {
                committed += 1;
                if committed == target {
                    done.fire();
                    info!(
                        committed,
                        elapsed_secs = started.elapsed().as_secs_f64(),
                        "block collector reached target"
                    );
                    return CollectorExit::Completed { committed };
                }
            }
        }
    }

    /// The single transition shared by both modes.
    fn observe(&self, block: &FilteredBlock, started: Instant) -> Decision {
        let decision = self.lock().report(block.number, block.tx_count());

        if decision.is_decided() {
            let elapsed = started.elapsed();
            info!(
                block = block.number,
                txs = block.tx_count(),
                elapsed_secs = elapsed.as_secs_f64(),
                "block committed"
            );
            if let Some(m) = &self.metrics {
                m.blocks_committed.inc();
                m.txs_committed.inc_by(block.tx_count() as u64);
                m.commit_latency_seconds.observe(elapsed.as_secs_f64());
            }
        }

        decision
    }

    fn lock(&self) -> MutexGuard<'_, QuorumState> {
        // Critical sections only bump integers; poisoned state is still whole.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
