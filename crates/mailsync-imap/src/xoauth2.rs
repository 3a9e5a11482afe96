//! XOAUTH2 SASL mechanism for async-imap
//!
//! Implements the XOAUTH2 authentication mechanism described at:
//! https://developers.google.com/workspace/gmail/imap/xoauth2-protocol
//!
//! The exchange has two steps. The first challenge is answered with the
//! initial response; any further challenge (servers send one carrying a JSON
//! error when they reject the token) is answered with an empty response so the
//! server can finish the exchange with a tagged NO.

/// SASL mechanism name
pub const MECHANISM: &str = "XOAUTH2";

/// Token type used when none is given
pub const BEARER: &str = "Bearer";

/// XOAUTH2 authenticator for async-imap
///
/// Single use: build one per connection attempt.
#[derive(Debug, Clone)]
pub struct XOAuth2Authenticator {
    /// Email address
    identity: String,
    /// OAuth2 access token
    access_token: String,
    /// Token type, normally "Bearer"
    token_type: String,
    /// Whether the initial response has been produced
    started: bool,
}

impl XOAuth2Authenticator {
    /// Create a new XOAUTH2 authenticator for a bearer token
    pub fn new(identity: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self::with_token_type(identity, access_token, BEARER)
    }

    /// Create an authenticator with an explicit token type
    pub fn with_token_type(
        identity: impl Into<String>,
        access_token: impl Into<String>,
        token_type: impl Into<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            access_token: access_token.into(),
            token_type: token_type.into(),
            started: false,
        }
    }

    /// Begin the exchange
    ///
    /// Returns the mechanism name and the raw initial response
    /// `user={identity}\x01auth={type} {token}\x01\x01`. The transport applies
    /// base64 before sending.
    pub fn start(&mut self) -> (&'static str, Vec<u8>) {
        self.started = true;
        let response = format!(
            "user={}\x01auth={} {}\x01\x01",
            self.identity, self.token_type, self.access_token
        );
        (MECHANISM, response.into_bytes())
    }

    /// Answer a further challenge
    ///
    /// Always an empty response; the challenge content is not inspected and a
    /// rejection surfaces as the server's tagged NO.
    pub fn next(&mut self, _challenge: &[u8]) -> Vec<u8> {
        Vec::new()
    }
}

impl async_imap::Authenticator for XOAuth2Authenticator {
    type Response = Vec<u8>;

    fn process(&mut self, challenge: &[u8]) -> Self::Response {
        if self.started {
            self.next(challenge)
        } else {
            self.start().1
        }
    }
}
