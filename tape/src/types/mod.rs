//! Core domain types moved through the load pipeline.
//!
//! Proposals and responses are opaque byte payloads produced by external
//! signers and endorsers. The goal is to avoid "naked" byte buffers in
//! public APIs and instead pass domain-specific newtypes around, so a
//! proposal can never be confused with a response on its way through
//! the queues.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Filtered blocks as delivered by peer event streams.
pub mod block;

pub use block::{FilteredBlock, FilteredTransaction, ValidationCode};

/// Remote endorsing peer, identified by its network address.
///
/// The address is kept exactly as configured (`host:port`); resolution
/// happens when a proposer is constructed for it.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub addr: String,
}

impl Node {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr)
    }
}

/// A signed transaction proposal, ready to be sent for endorsement.
///
/// Both fields are treated as opaque: the encoding is whatever the
/// external signer produced and the endorsing peer expects.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SignedProposal {
    /// Canonical bytes of the proposal.
    pub proposal_bytes: Vec<u8>,
    /// Creator signature over `proposal_bytes`.
    pub signature: Vec<u8>,
}

impl SignedProposal {
    pub fn new(proposal_bytes: Vec<u8>, signature: Vec<u8>) -> Self {
        Self {
            proposal_bytes,
            signature,
        }
    }
}

/// Endorsement response returned by a peer.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProposalResponse {
    /// Status code reported by the peer (HTTP-like semantics).
    pub status: u16,
    /// Human-readable message; usually empty on success.
    pub message: String,
    /// Opaque endorsement payload.
    pub payload: Vec<u8>,
}

impl ProposalResponse {
    /// Returns `true` if the peer endorsed the proposal.
    ///
    /// Peers report rejection through the status code, so anything outside
    /// `200..400` counts as a rejected proposal.
    pub fn is_endorsed(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// One unit of work flowing through a proposer.
///
/// An `Elements` value starts out holding just the signed proposal. Once a
/// peer has answered, [`Elements::with_response`] produces the processed
/// value that is published on the outbound queue. The value itself is never
/// mutated in place; ownership moves with the queue that holds it.
#[derive(Clone, Debug, Default)]
pub struct Elements {
    signed: SignedProposal,
    response: Option<ProposalResponse>,
}

impl Elements {
    pub fn new(signed: SignedProposal) -> Self {
        Self {
            signed,
            response: None,
        }
    }

    pub fn signed_proposal(&self) -> &SignedProposal {
        &self.signed
    }

    /// Response attached by the proposer, if this item has been processed.
    pub fn response(&self) -> Option<&ProposalResponse> {
        self.response.as_ref()
    }

    pub fn is_processed(&self) -> bool {
        self.response.is_some()
    }

    /// Consumes the unprocessed item and returns it with `response` attached.
    pub fn with_response(self, response: ProposalResponse) -> Self {
        Self {
            signed: self.signed,
            response: Some(response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endorsement_status_window() {
        let mut resp = ProposalResponse {
            status: 200,
            ..Default::default()
        };
        assert!(resp.is_endorsed());

        resp.status = 399;
        assert!(resp.is_endorsed());

        resp.status = 400;
        assert!(!resp.is_endorsed());

        resp.status = 500;
        assert!(!resp.is_endorsed());

        resp.status = 0;
        assert!(!resp.is_endorsed());
    }

    #[test]
    fn with_response_keeps_the_proposal() {
        let signed = SignedProposal::new(vec![1, 2, 3], vec![9]);
        let elements = Elements::new(signed.clone());
        assert!(!elements.is_processed());

        let processed = elements.with_response(ProposalResponse {
            status: 200,
            message: String::new(),
            payload: vec![7],
        });

        assert!(processed.is_processed());
        assert_eq!(processed.signed_proposal(), &signed);
        assert_eq!(processed.response().map(|r| r.payload.clone()), Some(vec![7]));
    }

    #[test]
    fn node_displays_its_address() {
        let node = Node::new("peer0.org1.example.com:7051");
        assert_eq!(node.to_string(), "peer0.org1.example.com:7051");
    }
}
