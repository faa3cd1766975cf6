//! Block verification hooks for the asynchronous collector loop.
//!
//! When the loop runs with verification enabled, every dequeued block is
//! passed through a [`BlockVerifier`] before it is counted as an
//! observation. Rejected blocks never move a quorum counter.

use crate::types::FilteredBlock;

use super::error::VerifyError;

/// Pluggable verification predicate for delivered blocks.
///
/// Implementations should be deterministic and cheap; they run inline in
/// the collector loop, so a slow verifier throttles block intake.
pub trait BlockVerifier: Send + Sync {
    fn verify(&self, block: &FilteredBlock) -> Result<(), VerifyError>;
}

/// A trivial verifier that accepts every block.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAllVerifier;

impl BlockVerifier for AcceptAllVerifier {
    fn verify(&self, _block: &FilteredBlock) -> Result<(), VerifyError> {
        Ok(())
    }
}

/// Rejects blocks that carry transactions the committer marked invalid.
///
/// Useful when a load run is only meaningful if every generated
/// transaction committed cleanly (no MVCC conflicts, no policy failures).
#[derive(Clone, Debug, Default)]
pub struct ValidTxVerifier {
    allow_empty: bool,
}

impl ValidTxVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept blocks with no transactions at all (e.g. config blocks).
    pub fn allow_empty(mut self, allow: bool) -> Self {
        self.allow_empty = allow;
        self
    }
}

impl BlockVerifier for ValidTxVerifier {
    fn verify(&self, block: &FilteredBlock) -> Result<(), VerifyError> {
        if block.transactions.is_empty() && !self.allow_empty {
            return Err(VerifyError::Invalid("block carries no transactions"));
        }

        if let Some(tx) = block
            .transactions
            .iter()
            .find(|tx| !tx.validation_code.is_valid())
        {
            return Err(VerifyError::Custom(format!(
                "tx {} in block {} has validation code {}",
                tx.tx_id, block.number, tx.validation_code
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FilteredTransaction, ValidationCode};

    #[test]
    fn accept_all_accepts_empty_blocks() {
        let block = FilteredBlock::new(1, Vec::new());
        assert!(AcceptAllVerifier.verify(&block).is_ok());
    }

    #[test]
    fn valid_tx_verifier_rejects_conflicts() {
        let mut block = FilteredBlock::with_valid_txs(9, 2);
        block.transactions.push(FilteredTransaction {
            tx_id: "bad".to_string(),
            validation_code: ValidationCode::MvccReadConflict,
        });

        let err = ValidTxVerifier::new().verify(&block).unwrap_err();
        match err {
            VerifyError::Custom(msg) => {
                assert!(msg.contains("MVCC_READ_CONFLICT"), "unexpected message: {msg}");
            }
            _ => panic!("unexpected error variant: {err:?}"),
        }
    }

    #[test]
    fn valid_tx_verifier_empty_block_policy() {
        let block = FilteredBlock::new(3, Vec::new());
        assert!(ValidTxVerifier::new().verify(&block).is_err());
        assert!(ValidTxVerifier::new().allow_empty(true).verify(&block).is_ok());
    }

    #[test]
    fn verifier_trait_is_object_safe() {
        let verifiers: Vec<Box<dyn BlockVerifier>> =
            vec![Box::new(AcceptAllVerifier), Box::new(ValidTxVerifier::new())];
        let block = FilteredBlock::with_valid_txs(1, 1);
        assert!(verifiers.iter().all(|v| v.verify(&block).is_ok()));
    }
}
