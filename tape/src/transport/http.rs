//! HTTP-based endorser client.
//!
//! This implementation of [`crate::proposer::Endorser`] talks to an
//! endorsing peer (or a gateway in front of one) over HTTP. It assumes
//! the peer exposes a JSON API of the form:
//!
//! ```json
//! POST /v1/process_proposal
//! {
//!   "proposal_bytes": "hex-encoded-proposal",
//!   "signature": "hex-encoded-signature"
//! }
//!
//! Response:
//! {
//!   "status": 200,
//!   "message": "",
//!   "payload": "hex-encoded-endorsement"
//! }
//! ```

use std::net::SocketAddr;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EndorserConfig;
use crate::proposer::{Endorser, ProposerError};
use crate::types::{Node, ProposalResponse, SignedProposal};

/// HTTP endorser bound to a single peer.
///
/// The underlying `reqwest` client pools connections, so one instance can
/// serve every in-flight proposal of its proposer concurrently.
pub struct HttpEndorser {
    url: String,
    resolved: SocketAddr,
    client: Client,
}

impl HttpEndorser {
    /// Resolves `node` and prepares a client for it.
    ///
    /// Fails with [`ProposerError::Connection`] if the address does not
    /// resolve. No connection is opened yet.
    pub async fn connect(node: &Node, cfg: &EndorserConfig) -> Result<Self, ProposerError> {
        let resolved = tokio::net::lookup_host(node.addr.as_str())
            .await
            .map_err(|e| ProposerError::Connection(format!("cannot resolve {node}: {e}")))?
            .next()
            .ok_or_else(|| ProposerError::Connection(format!("{node} resolved to no address")))?;

        let client = Client::builder()
            .timeout(cfg.timeout())
            .connect_timeout(cfg.connect_timeout())
            .build()
            .map_err(|e| ProposerError::Config(format!("failed to build HTTP client: {e}")))?;

        let scheme = if cfg.use_tls { "https" } else { "http" };
        Ok(Self {
            url: format!("{scheme}://{}/v1/process_proposal", node.addr),
            resolved,
            client,
        })
    }

    /// First socket address the peer resolved to at construction time.
    pub fn resolved_addr(&self) -> SocketAddr {
        self.resolved
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Internal request payload sent to the peer.
#[derive(Debug, Serialize)]
struct ProcessProposalRequest {
    proposal_bytes: String,
    signature: String,
}

/// Internal response payload returned by the peer.
#[derive(Debug, Deserialize)]
struct ProcessProposalResponse {
    status: u16,
    #[serde(default)]
    message: String,
    #[serde(default)]
    payload: String,
}

impl From<&SignedProposal> for ProcessProposalRequest {
    fn from(p: &SignedProposal) -> Self {
        Self {
            proposal_bytes: hex::encode(&p.proposal_bytes),
            signature: hex::encode(&p.signature),
        }
    }
}

impl TryFrom<ProcessProposalResponse> for ProposalResponse {
    type Error = ProposerError;

    fn try_from(r: ProcessProposalResponse) -> Result<Self, Self::Error> {
        let payload = hex::decode(&r.payload)
            .map_err(|e| ProposerError::Delivery(format!("payload is not valid hex: {e}")))?;
        Ok(ProposalResponse {
            status: r.status,
            message: r.message,
            payload,
        })
    }
}

fn classify(url: &str, e: reqwest::Error) -> ProposerError {
    if e.is_connect() {
        ProposerError::Connection(format!("POST {url} failed: {e}"))
    } else {
        ProposerError::Delivery(format!("POST {url} failed: {e}"))
    }
}

#[async_trait]
impl Endorser for HttpEndorser {
    async fn process_proposal(
        &self,
        proposal: &SignedProposal,
    ) -> Result<ProposalResponse, ProposerError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&ProcessProposalRequest::from(proposal))
            .send()
            .await
            .map_err(|e| classify(&self.url, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProposerError::Delivery(format!(
                "peer returned HTTP status {status}"
            )));
        }

        let body = resp
            .json::<ProcessProposalResponse>()
            .await
            .map_err(|e| ProposerError::Delivery(format!("failed to parse JSON response: {e}")))?;

        ProposalResponse::try_from(body)
    }
}


#[cfg(test)]
mod tests {
    use super::test_peer::serve_fixed;
    use super::*;

    use tokio::net::TcpListener;

    fn test_config() -> EndorserConfig {
        EndorserConfig {
            timeout_ms: 1_000,
            connect_timeout_ms: 500,
            use_tls: false,
        }
    }

    #[test]
    fn request_is_hex_encoded() {
        let req = ProcessProposalRequest::from(&SignedProposal::new(vec![0xAB, 0x01], vec![0xFF]));
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"proposal_bytes":"ab01","signature":"ff"}"#);
    }

    #[test]
    fn response_can_be_deserialized() {
        let json = r#"{ "status": 500, "message": "chaincode error" }"#;
        let resp: ProcessProposalResponse = serde_json::from_str(json).unwrap();
        let resp = ProposalResponse::try_from(resp).unwrap();
        assert_eq!(resp.status, 500);
        assert_eq!(resp.message, "chaincode error");
        assert!(resp.payload.is_empty());
    }

    #[test]
    fn bad_payload_hex_is_a_delivery_error() {
        let resp = ProcessProposalResponse {
            status: 200,
            message: String::new(),
            payload: "zz".to_string(),
        };
        assert!(matches!(
            ProposalResponse::try_from(resp),
            Err(ProposerError::Delivery(_))
        ));
    }

    #[tokio::test]
    async fn connect_rejects_unresolvable_address() {
        let err = HttpEndorser::connect(&Node::new("missing-port"), &test_config())
            .await
            .err()
            .expect("address without a port must not resolve");
        assert!(matches!(err, ProposerError::Connection(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn round_trip_against_local_peer() {
        let addr = serve_fixed(r#"{"status":200,"message":"","payload":"c0ffee"}"#).await;
        let endorser = HttpEndorser::connect(&Node::new(addr.to_string()), &test_config())
            .await
            .unwrap();
        assert_eq!(endorser.resolved_addr(), addr);

        let resp = endorser
            .process_proposal(&SignedProposal::new(vec![1], vec![2]))
            .await
            .unwrap();
        assert!(resp.is_endorsed());
        assert_eq!(resp.payload, vec![0xC0, 0xFF, 0xEE]);
    }

    #[tokio::test]
    async fn refused_connection_is_a_connection_error() {
        // Grab a free port, then close it again.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let endorser = HttpEndorser::connect(&Node::new(addr.to_string()), &test_config())
            .await
            .unwrap();
        let err = endorser
            .process_proposal(&SignedProposal::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProposerError::Connection(_)), "got {err:?}");
    }
}
