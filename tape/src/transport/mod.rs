//! Transports that implement [`crate::proposer::Endorser`].
//!
//! Only an HTTP/JSON client ships today; other wire protocols plug in by
//! implementing the same trait.

pub mod http;

pub use http::HttpEndorser;
