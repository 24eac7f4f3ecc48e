//! Error types for the to-do client.
//!
//! # Design
//! Three variants describe what the remote side did: the request never
//! completed (`Network`), the service said no (`ServiceRejected`), or the
//! service said yes with a body we cannot use (`MalformedResponse`). The
//! remaining variants are raised locally before any request is sent.

use crate::types::ItemId;

/// Errors returned by `TodoClient` parsers, transports and `ItemStore`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request could not be sent, or the response body was not JSON.
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with a non-2xx status.
    #[error("service rejected request: HTTP {status}: {body}")]
    ServiceRejected { status: u16, body: String },

    /// 2xx response whose body lacks a required field.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The id is not present in the local collection.
    #[error("unknown item: {0}")]
    UnknownItem(ItemId),

    /// Item text was empty after trimming.
    #[error("item text must not be empty")]
    EmptyText,
}

impl ApiError {
    /// Whether the same call might succeed if issued again unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::ServiceRejected { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
