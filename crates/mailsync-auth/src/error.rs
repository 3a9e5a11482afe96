//! Error types for the auth module

use thiserror::Error;

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur during authentication
#[derive(Debug, Error)]
pub enum AuthError {
    /// The provider redirected back with an error
    #[error("Authorization failed: {code}: {description}")]
    ProviderError { code: String, description: String },

    /// The redirect carried neither a token nor an error
    #[error("Authorization failed: missing token parameter")]
    MissingToken,

    /// External browser could not be started
    #[error("Failed to launch browser with {launcher}: {reason}")]
    BrowserLaunchFailed { launcher: String, reason: String },

    /// Failed to start local callback server
    #[error("Failed to start callback server: {0}")]
    CallbackServerFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No client is configured for the provider
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Token could not be stored
    #[error("Failed to store token: {0}")]
    StorageError(String),

    /// No stored token was found
    #[error("Unable to load auth token from {0}, use the auth command")]
    TokenNotFound(String),

    /// Stored token record could not be decoded
    #[error("Failed to parse auth token: {0}")]
    InvalidToken(String),

    /// Token is not usable for XOAUTH2
    #[error("Unsupported token type: {0}")]
    UnsupportedTokenType(String),

    /// Network error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
