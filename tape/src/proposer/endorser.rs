//! Transport seam between a proposer and its endorsing peer.

use async_trait::async_trait;

use crate::types::{ProposalResponse, SignedProposal};

use super::error::ProposerError;

/// Sends signed proposals to one endorsing peer.
///
/// Proposers only care that a proposal goes in and a response comes
/// out; how the bytes travel (HTTP, gRPC, in-process) is up to the
/// implementation. Implementations must be safe to call concurrently:
/// a proposer keeps up to its in-flight limit of calls outstanding.
///
/// Return [`ProposerError::Connection`] when the peer cannot be reached
/// and [`ProposerError::Delivery`] for failures on a live connection.
/// A response with a rejecting status should be returned as `Ok`; the
/// proposer classifies it.
#[async_trait]
pub trait Endorser: Send + Sync + 'static {
    async fn process_proposal(
        &self,
        proposal: &SignedProposal,
    ) -> Result<ProposalResponse, ProposerError>;
}
