use reqwest::StatusCode;
use shared::models::ErrorResponse;
use thiserror::Error;

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Failures surfaced by the client collaborators.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network, channel, or decoding failure talking to the server.
    #[error("transport failure while {context}: {message}")]
    TransportFailure {
        /// What the client was doing.
        context: String,
        /// Underlying failure.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("{context} rejected with {status}: {detail}")]
    Rejected {
        /// What the client was doing.
        context: String,
        /// HTTP status returned.
        status: StatusCode,
        /// Decoded error body.
        detail: ErrorResponse,
    },

    /// The stored session is no longer accepted by the server.
    #[error("session is no longer valid; sign in again")]
    AuthInvalid,

    /// A blank message was about to be sent.
    #[error("refusing to send an empty message")]
    EmptyInput,

    /// A send was attempted while the live channel is not connected.
    #[error("live connection is not established")]
    NotConnected,

    /// Required session identity is missing or expired.
    #[error("no active session ({field} missing); run `cli session set` first")]
    SessionMissing {
        /// First missing piece: `session`, `user`, `token` or `group`.
        field: &'static str,
    },

    /// The action is only allowed on the user's own messages.
    #[error("message {0} was not sent by you")]
    NotOwnMessage(shared::models::MessageId),

    /// Local file access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// Wraps a lower-level failure that happened while doing `context`.
    #[must_use]
    pub fn transport(context: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::TransportFailure {
            context: context.into(),
            message: error.to_string(),
        }
    }

    /// Builds a [`ClientError::Rejected`] from a status and raw body.
    #[must_use]
    pub fn rejected(context: impl Into<String>, status: StatusCode, body: &str) -> Self {
        Self::Rejected {
            context: context.into(),
            status,
            detail: ErrorResponse::from_body(body),
        }
    }

    /// Whether the failure means the session must be discarded: the server
    /// rejected the token, or the stored session is gone.
    #[must_use]
    pub fn is_auth_invalid(&self) -> bool {
        match self {
            Self::AuthInvalid | Self::SessionMissing { .. } => true,
            Self::Rejected { status, .. } => *status == StatusCode::UNAUTHORIZED,
            _ => false,
        }
    }
}
