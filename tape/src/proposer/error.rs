use std::fmt;

/// Errors raised while building a proposer or endorsing a proposal.
#[derive(Debug)]
pub enum ProposerError {
    /// Unusable construction arguments (e.g. a malformed address).
    Config(String),
    /// The endorsing node could not be resolved or reached.
    Connection(String),
    /// The send failed on an otherwise healthy connection (timeout,
    /// malformed answer, HTTP-level failure).
    Delivery(String),
    /// The peer answered but refused to endorse.
    Rejected { status: u16, message: String },
}

impl ProposerError {
    /// Whether the failure is the peer's verdict rather than a transport
    /// problem.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ProposerError::Rejected { .. })
    }
}

impl fmt::Display for ProposerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposerError::Config(msg) => write!(f, "invalid proposer config: {msg}"),
            ProposerError::Connection(msg) => write!(f, "connection error: {msg}"),
            ProposerError::Delivery(msg) => write!(f, "delivery error: {msg}"),
            ProposerError::Rejected { status, message } => {
                write!(f, "proposal rejected with status {status}: {message}")
            }
        }
    }
}

impl std::error::Error for ProposerError {}
