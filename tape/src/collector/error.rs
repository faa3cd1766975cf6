use std::fmt;

/// Errors produced while building a [`super::BlockCollector`].
#[derive(Debug)]
pub enum CollectorError {
    /// Quorum / observer arguments are unusable.
    Config(String),
}

/// Error returned when a block fails verification.
#[derive(Debug)]
pub enum VerifyError {
    /// Block is invalid according to a static rule.
    Invalid(&'static str),
    /// Block is invalid with a dynamic error message.
    Custom(String),
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectorError::Config(msg) => write!(f, "invalid collector config: {msg}"),
        }
    }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyError::Invalid(msg) => write!(f, "invalid block: {msg}"),
            VerifyError::Custom(msg) => write!(f, "invalid block: {msg}"),
        }
    }
}

impl std::error::Error for CollectorError {}
impl std::error::Error for VerifyError {}
