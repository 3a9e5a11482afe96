//! Error types for IMAP operations

use thiserror::Error;

/// Result type for IMAP operations
pub type ImapResult<T> = Result<T, ImapError>;

/// Errors that can occur during IMAP operations
#[derive(Debug, Error)]
pub enum ImapError {
    /// Connection failed
    #[error("Failed to connect to IMAP server {server}: {reason}")]
    ConnectionFailed { server: String, reason: String },

    /// TLS handshake failed
    #[error("TLS error with {server}: {reason}")]
    TlsError { server: String, reason: String },

    /// Authentication failed
    #[error("IMAP authentication failed for {identity}: {reason}")]
    AuthenticationFailed { identity: String, reason: String },

    /// LIST did not complete
    #[error("Failed to list mailboxes: {0}")]
    ListFailed(String),

    /// SELECT/EXAMINE was rejected
    #[error("Unable to select mailbox {mailbox}: {reason}")]
    SelectFailed { mailbox: String, reason: String },

    /// SEARCH did not complete
    #[error("Unable to find message {id}: {reason}")]
    SearchFailed { id: String, reason: String },

    /// FETCH did not complete
    #[error("Failed to fetch {target}: {reason}")]
    FetchFailed { target: String, reason: String },

    /// STORE did not complete
    #[error("Failed to update message {id}: {reason}")]
    StoreFailed { id: String, reason: String },

    /// No message carries the requested Message-ID
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// Server rejected a command
    #[error("Server error: {0}")]
    ServerError(String),

    /// Result stream ended without reporting a status
    #[error("Result stream closed before completion: {0}")]
    StreamClosed(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Session is not connected
    #[error("IMAP session is not connected")]
    NotConnected,

    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

impl ImapError {
    /// True when the target message does not exist, as opposed to a failed query
    pub fn is_not_found(&self) -> bool {
        matches!(self, ImapError::MessageNotFound(_))
    }
}
