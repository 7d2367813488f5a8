//! Error types for the IMAP engine.

use std::time::Duration;

use thiserror::Error;

use crate::types::{ResponseCode, Status};

/// Errors that can occur during IMAP operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error during network operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or encryption error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Socket closed before or during a command.
    #[error("No connection: {0}")]
    NoConnection(String),

    /// Parser failure, unexpected BYE or broken framing.
    ///
    /// Fatal: the connection is torn down and every in-flight request
    /// observes this error.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Tagged NO or BAD completion.
    #[error("Command failed ({status:?}): {text}")]
    Command {
        /// Completion status (`No` or `Bad`).
        status: Status,
        /// Human-readable server text.
        text: String,
        /// Bracket response code, when the server sent one.
        code: Option<ResponseCode>,
    },

    /// STATUS on a mailbox that a follow-up LIST confirmed missing.
    #[error("Mailbox doesn't exist: {0}")]
    NotFound(String),

    /// Server refused the operation with an access-related response code.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Message is larger than the advertised APPENDLIMIT.
    #[error("Message size {size} exceeds APPENDLIMIT {limit}")]
    AppendLimitExceeded {
        /// Message size in bytes.
        size: u64,
        /// Advertised limit in bytes.
        limit: u64,
    },

    /// Per-request deadline elapsed. The connection stays open.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid argument to the encoder or an illegal state transition.
    #[error("Programming error: {0}")]
    Programming(String),
}

impl Error {
    /// Builds a `Command` error from a tagged completion, upgrading
    /// access-related response codes to [`Error::PermissionDenied`].
    #[must_use]
    pub fn from_tagged(status: Status, text: String, code: Option<ResponseCode>) -> Self {
        if matches!(
            code,
            Some(
                ResponseCode::NoPerm
                    | ResponseCode::InUse
                    | ResponseCode::Limit
                    | ResponseCode::OverQuota
            )
        ) {
            return Self::PermissionDenied(text);
        }
        Self::Command { status, text, code }
    }

    /// Returns the bracket response code carried by a `Command` error.
    #[must_use]
    pub fn response_code(&self) -> Option<&ResponseCode> {
        match self {
            Self::Command { code, .. } => code.as_ref(),
            _ => None,
        }
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
