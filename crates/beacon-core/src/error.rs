//! The non-fatal error taxonomy.
//!
//! Every variant is surfaced only to the triggering channel as an
//! `{event:"error"}` reply; none of them close the channel or interrupt
//! other channels' processing.

use beacon_protocol::ProtocolError;
use beacon_store::store::StoreError;
use thiserror::Error;

/// Hub errors, one variant per taxonomy kind.
#[derive(Debug, Error)]
pub enum HubError {
    /// Malformed frame or unknown event. No state change.
    #[error("{0}")]
    Protocol(#[from] ProtocolError),

    /// Missing or invalid token. Channel stays open, unauthenticated.
    #[error("{0}")]
    Authentication(String),

    /// Gated event without the required identity, membership, or authorship.
    #[error("{0}")]
    Authorization(String),

    /// Referenced session or room does not exist (or is terminal).
    #[error("{0}")]
    NotFound(String),

    /// Durable operation failed. Reported generically; channel stays usable.
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl HubError {
    /// Stable label for metrics and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            HubError::Protocol(_) => "protocol",
            HubError::Authentication(_) => "authentication",
            HubError::Authorization(_) => "authorization",
            HubError::NotFound(_) => "not_found",
            HubError::Store(_) => "store",
        }
    }

    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        HubError::Authentication(message.into())
    }

    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        HubError::Authorization(message.into())
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        HubError::NotFound(message.into())
    }
}
