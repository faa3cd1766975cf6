//! Per-block quorum bookkeeping.
//!
//! [`QuorumState`] is plain, single-threaded data. The collector wraps it in
//! a mutex and funnels every observation, from either operating mode,
//! through [`QuorumState::report`].

use std::collections::HashMap;

/// Progress of one block number towards quorum.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BlockProgress {
    /// Seen by `n` observers, `0 < n < quorum`.
    Counting(usize),
    /// Reached quorum. Terminal.
    Committed,
}

/// Outcome of recording a single observation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Decision {
    /// Still short of quorum; carries the post-increment count.
    Pending(usize),
    /// This observation brought the block to quorum.
    Decided,
    /// The block had already been decided; nothing changed.
    Late,
}

impl Decision {
    pub fn is_decided(&self) -> bool {
        matches!(self, Decision::Decided)
    }
}

#[derive(Debug)]
pub struct QuorumState {
    quorum: usize,
    blocks: HashMap<u64, BlockProgress>,
    committed: u64,
    committed_txs: u64,
}

impl QuorumState {
    /// `quorum` must be non-zero; the collector validates it.
    pub fn new(quorum: usize) -> Self {
        Self {
            quorum,
            blocks: HashMap::new(),
            committed: 0,
            committed_txs: 0,
        }
    }

    /// Records one observation of block `number` carrying `tx_count`
    /// transactions.
    pub fn report(&mut self, number: u64, tx_count: usize) -> Decision {
        let progress = self.blocks.entry(number).or_insert(BlockProgress::Counting(0));

        let seen = match *progress {
            BlockProgress::Committed => return Decision::Late,
            BlockProgress::Counting(n) => n + 1,
        };

        if seen < self.quorum {
            *progress = BlockProgress::Counting(seen);
            return Decision::Pending(seen);
        }

        *progress = BlockProgress::Committed;
        self.committed += 1;
        self.committed_txs += tx_count as u64;
        Decision::Decided
    }

    pub fn progress(&self, number: u64) -> Option<BlockProgress> {
        self.blocks.get(&number).copied()
    }

    pub fn committed(&self) -> u64 {
        self.committed
    }

    pub fn committed_txs(&self) -> u64 {
        self.committed_txs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn third_report_decides_with_quorum_three() {
        let mut state = QuorumState::new(3);

        assert_eq!(state.report(7, 10), Decision::Pending(1));
        assert_eq!(state.report(7, 10), Decision::Pending(2));
        assert_eq!(state.report(7, 10), Decision::Decided);
        assert_eq!(state.report(7, 10), Decision::Late);

        assert_eq!(state.committed(), 1);
        assert_eq!(state.committed_txs(), 10);
        assert_eq!(state.progress(7), Some(BlockProgress::Committed));
    }

    #[test]
    fn quorum_of_one_decides_on_first_report() {
        let mut state = QuorumState::new(1);
        assert!(state.report(0, 1).is_decided());
        assert_eq!(state.report(0, 1), Decision::Late);
        assert_eq!(state.committed(), 1);
    }

    #[test]
    fn block_numbers_are_counted_independently() {
        let mut state = QuorumState::new(2);

        state.report(1, 1);
        state.report(2, 5);
        assert_eq!(state.committed(), 0);

        assert!(state.report(2, 5).is_decided());
        assert_eq!(state.progress(1), Some(BlockProgress::Counting(1)));
        assert_eq!(state.progress(3), None);
        assert_eq!(state.committed(), 1);
        assert_eq!(state.committed_txs(), 5);
    }
}
