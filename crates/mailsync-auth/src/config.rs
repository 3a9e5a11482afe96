//! OAuth2 client configuration
//!
//! Clients are read from a YAML file keyed by provider:
//!
//! ```yaml
//! clients:
//!   microsoft:
//!     client_id: 00000000-0000-0000-0000-000000000000
//!     scopes: [openid, email, https://outlook.office.com/IMAP.AccessAsUser.All]
//! ```
//!
//! Endpoints left out of the file fall back to the provider preset.

use crate::{AuthError, AuthResult};
use oauth2::{AuthUrl, TokenUrl};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// OAuth2 provider presets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuth2Provider {
    Microsoft,
    Google,
}

impl OAuth2Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuth2Provider::Microsoft => "microsoft",
            OAuth2Provider::Google => "google",
        }
    }

    pub fn auth_url(&self) -> &'static str {
        match self {
            OAuth2Provider::Microsoft => {
                "https://login.microsoftonline.com/common/oauth2/v2.0/authorize"
            }
            OAuth2Provider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
        }
    }

    pub fn token_url(&self) -> &'static str {
        match self {
            OAuth2Provider::Microsoft => "https://login.microsoftonline.com/common/oauth2/v2.0/token",
            OAuth2Provider::Google => "https://oauth2.googleapis.com/token",
        }
    }

    pub fn userinfo_url(&self) -> &'static str {
        match self {
            OAuth2Provider::Microsoft => "https://graph.microsoft.com/oidc/userinfo",
            OAuth2Provider::Google => "https://openidconnect.googleapis.com/v1/userinfo",
        }
    }

    /// IMAP endpoint as "host:port"
    pub fn imap_server(&self) -> &'static str {
        match self {
            OAuth2Provider::Microsoft => "outlook.office365.com:993",
            OAuth2Provider::Google => "imap.gmail.com:993",
        }
    }
}

impl fmt::Display for OAuth2Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuth2Provider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "microsoft" => Ok(OAuth2Provider::Microsoft),
            "google" => Ok(OAuth2Provider::Google),
            other => Err(AuthError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// One registered OAuth2 client
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientConfig {
    /// OAuth2 client ID
    pub client_id: String,
    /// OAuth2 client secret (unused by the implicit flow)
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Requested scopes
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Authorization endpoint URL
    #[serde(default)]
    pub auth_url: Option<String>,
    /// Token endpoint URL
    #[serde(default)]
    pub token_url: Option<String>,
    /// OpenID userinfo endpoint URL
    #[serde(default)]
    pub userinfo_url: Option<String>,
}

impl ClientConfig {
    /// Authorization endpoint, validated
    pub fn auth_url(&self, provider: &str) -> AuthResult<AuthUrl> {
        let raw = endpoint(self.auth_url.as_deref(), provider, OAuth2Provider::auth_url)?;
        AuthUrl::new(raw).map_err(|e| AuthError::InvalidConfig(format!("Invalid auth URL: {}", e)))
    }

    /// Token endpoint, validated
    pub fn token_url(&self, provider: &str) -> AuthResult<TokenUrl> {
        let raw = endpoint(self.token_url.as_deref(), provider, OAuth2Provider::token_url)?;
        TokenUrl::new(raw)
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid token URL: {}", e)))
    }

    /// Userinfo endpoint, validated
    pub fn userinfo_url(&self, provider: &str) -> AuthResult<url::Url> {
        let raw = endpoint(self.userinfo_url.as_deref(), provider, OAuth2Provider::userinfo_url)?;
        url::Url::parse(&raw)
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid userinfo URL: {}", e)))
    }
}

fn endpoint(
    configured: Option<&str>,
    provider: &str,
    preset: fn(&OAuth2Provider) -> &'static str,
) -> AuthResult<String> {
    match configured.filter(|u| !u.is_empty()) {
        Some(url) => Ok(url.to_string()),
        None => {
            let known = provider.parse::<OAuth2Provider>().map_err(|_| {
                AuthError::InvalidConfig(format!("No endpoint configured for {}", provider))
            })?;
            Ok(preset(&known).to_string())
        }
    }
}

/// Contents of the client configuration file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub clients: BTreeMap<String, ClientConfig>,
}

impl ProvidersConfig {
    /// Load from a YAML file; `~` is expanded
    pub fn load(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = expand_home(path.as_ref());
        let raw = std::fs::read_to_string(&path).map_err(|e| {
            AuthError::InvalidConfig(format!("Unable to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> AuthResult<Self> {
        serde_yaml::from_str(raw)
            .map_err(|e| AuthError::InvalidConfig(format!("Unable to parse OAuth config: {}", e)))
    }

    /// Client registered for `provider`
    pub fn client(&self, provider: &str) -> AuthResult<&ClientConfig> {
        self.clients
            .get(provider)
            .or_else(|| self.clients.get(&provider.to_ascii_lowercase()))
            .ok_or_else(|| AuthError::UnsupportedProvider(provider.to_string()))
    }
}

/// Replace a leading `~` with the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
