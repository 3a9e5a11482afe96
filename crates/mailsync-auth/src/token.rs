//! Captured access tokens and their stored record form

use crate::{AuthError, AuthResult};
use url::form_urlencoded;

/// Token type accepted for XOAUTH2
pub const BEARER: &str = "Bearer";

/// Access token taken from a provider redirect
#[derive(Clone, PartialEq, Eq)]
pub struct CapturedToken {
    pub access_token: String,
    pub token_type: String,
    /// Absolute expiry, Unix seconds
    pub expires_at: Option<i64>,
}

/// Stored record decoded back into a token
pub type StoredToken = CapturedToken;

impl CapturedToken {
    /// Build from redirect parameters received at `now` (Unix seconds)
    ///
    /// A missing token type means `Bearer`. An `expires_in` that is not an
    /// integer is ignored.
    pub fn from_redirect(
        access_token: &str,
        token_type: Option<&str>,
        expires_in: Option<&str>,
        now: i64,
    ) -> Self {
        let token_type = token_type
            .filter(|t| !t.is_empty())
            .unwrap_or(BEARER)
            .to_string();
        let expires_at = expires_in
            .and_then(|e| e.trim().parse::<i64>().ok())
            .map(|secs| now.saturating_add(secs));

        Self {
            access_token: access_token.to_string(),
            token_type,
            expires_at,
        }
    }

    /// Url-encoded record: `access_token`, `token_type` and `exp` when known
    pub fn encode(&self) -> String {
        let mut record = form_urlencoded::Serializer::new(String::new());
        record.append_pair("access_token", &self.access_token);
        if let Some(exp) = self.expires_at {
            record.append_pair("exp", &exp.to_string());
        }
        record.append_pair("token_type", &self.token_type);
        record.finish()
    }

    /// Decode a stored record
    ///
    /// A value without an `access_token` field is taken as a bare bearer token,
    /// which is the form printed for manual export.
    pub fn parse(raw: &str) -> AuthResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(AuthError::InvalidToken("empty token".to_string()));
        }

        let mut access_token = None;
        let mut token_type = None;
        let mut expires_at = None;
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "access_token" => access_token = Some(value.into_owned()),
                "token_type" => token_type = Some(value.into_owned()),
                "exp" => {
                    let exp = value.parse::<i64>().map_err(|e| {
                        AuthError::InvalidToken(format!("invalid exp {:?}: {}", value, e))
                    })?;
                    expires_at = Some(exp);
                }
                _ => {}
            }
        }

        match access_token {
            Some(access_token) if !access_token.is_empty() => Ok(Self {
                access_token,
                token_type: token_type.unwrap_or_else(|| BEARER.to_string()),
                expires_at,
            }),
            Some(_) => Err(AuthError::InvalidToken("empty access_token".to_string())),
            None => Ok(Self {
                access_token: raw.to_string(),
                token_type: BEARER.to_string(),
                expires_at: None,
            }),
        }
    }

    /// Fail unless the token can be used for XOAUTH2
    pub fn require_bearer(&self) -> AuthResult<&str> {
        if self.token_type == BEARER {
            Ok(&self.access_token)
        } else {
            Err(AuthError::UnsupportedTokenType(self.token_type.clone()))
        }
    }

    /// Check if the expiry has passed
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => exp <= chrono::Utc::now().timestamp(),
            None => false,
        }
    }
}

// Keep the secret out of logs
impl std::fmt::Debug for CapturedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
