//! Error types for this library

use hyper::{StatusCode, Uri};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid metadata address {address}: {source}")]
    InvalidAddress {
        address: String,
        source: hyper::http::uri::InvalidUri,
    },
    #[error("Failed to build metadata request: {0}")]
    Request(#[from] hyper::http::Error),
    #[error("Metadata request failed: {0}")]
    Http(#[from] hyper::Error),
    #[error("Metadata service answered {status} for {uri}")]
    Status { status: StatusCode, uri: Uri },
    #[error("Failed to decode metadata response: {0}")]
    Decode(#[from] serde_json::Error),
}
