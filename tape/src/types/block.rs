// tape/src/types/block.rs

//! Filtered block types.
//!
//! A filtered block is the slim view a peer's delivery stream sends to
//! event listeners: the block number plus, per transaction, its id and
//! the validation code the committer assigned. No payloads, no
//! signatures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Validation outcome recorded by the committing peer for a transaction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    #[default]
    Valid,
    EndorsementPolicyFailure,
    MvccReadConflict,
    PhantomReadConflict,
    DuplicateTxid,
    BadPayload,
    /// Any code this crate does not name explicitly.
    Other(i32),
}

impl ValidationCode {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationCode::Valid)
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationCode::Valid => f.write_str("VALID"),
            ValidationCode::EndorsementPolicyFailure => f.write_str("ENDORSEMENT_POLICY_FAILURE"),
            ValidationCode::MvccReadConflict => f.write_str("MVCC_READ_CONFLICT"),
            ValidationCode::PhantomReadConflict => f.write_str("PHANTOM_READ_CONFLICT"),
            ValidationCode::DuplicateTxid => f.write_str("DUPLICATE_TXID"),
            ValidationCode::BadPayload => f.write_str("BAD_PAYLOAD"),
            ValidationCode::Other(code) => write!(f, "CODE_{code}"),
        }
    }
}

/// A transaction as it appears inside a [`FilteredBlock`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct FilteredTransaction {
    pub tx_id: String,
    pub validation_code: ValidationCode,
}

/// Block as delivered by one observing peer.
///
/// The collector only looks at [`FilteredBlock::number`] and the length
/// of [`FilteredBlock::transactions`]; verifiers may look deeper.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct FilteredBlock {
    /// Sequence number of the block in the channel.
    pub number: u64,
    /// Filtered transactions, in block order.
    pub transactions: Vec<FilteredTransaction>,
}

impl FilteredBlock {
    pub fn new(number: u64, transactions: Vec<FilteredTransaction>) -> Self {
        Self {
            number,
            transactions,
        }
    }

    /// Builds a block with `tx_count` valid transactions.
    ///
    /// Handy for driving the collector without a real delivery stream.
    pub fn with_valid_txs(number: u64, tx_count: usize) -> Self {
        let transactions = (0..tx_count)
            .map(|i| FilteredTransaction {
                tx_id: format!("{number}-{i}"),
                validation_code: ValidationCode::Valid,
            })
            .collect();
        Self::new(number, transactions)
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}
