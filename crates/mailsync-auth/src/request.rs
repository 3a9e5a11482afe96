//! Authorization request for the implicit (form_post) flow

use crate::config::ClientConfig;
use crate::{AuthError, AuthResult};
use oauth2::{AuthUrl, ClientId, ClientSecret, RedirectUrl, Scope, TokenUrl};
use rand::distributions::Alphanumeric;
use rand::Rng;
use url::Url;

/// Local port the provider redirects to
pub const DEFAULT_CALLBACK_PORT: u16 = 38988;

/// Path receiving the provider redirect
pub const LANDING_PATH: &str = "/auth";

/// Path the browser lands on once the token is handled
pub const DONE_PATH: &str = "/auth/done";

const NONCE_LEN: usize = 8;

/// What the provider is asked to return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseType {
    #[default]
    Token,
    IdToken,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Token => "token",
            ResponseType::IdToken => "id_token",
        }
    }
}

/// Everything needed to build the authorization URL for one login attempt
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub provider: String,
    pub client_id: ClientId,
    pub client_secret: Option<ClientSecret>,
    pub scopes: Vec<Scope>,
    pub auth_url: AuthUrl,
    pub token_url: TokenUrl,
    pub redirect_url: RedirectUrl,
    pub response_type: ResponseType,
    pub nonce: String,
}

impl AuthorizationRequest {
    /// Build from a configured client with a fresh nonce
    pub fn new(
        provider: &str,
        client: &ClientConfig,
        port: u16,
        response_type: ResponseType,
    ) -> AuthResult<Self> {
        if client.client_id.is_empty() {
            return Err(AuthError::InvalidConfig(format!(
                "client_id is not set for {}",
                provider
            )));
        }

        Ok(Self {
            provider: provider.to_string(),
            client_id: ClientId::new(client.client_id.clone()),
            client_secret: client.client_secret.clone().map(ClientSecret::new),
            scopes: client.scopes.iter().cloned().map(Scope::new).collect(),
            auth_url: client.auth_url(provider)?,
            token_url: client.token_url(provider)?,
            redirect_url: redirect_url(port)?,
            response_type,
            nonce: random_nonce(),
        })
    }

    /// Point the redirect at another local port
    pub fn set_redirect_port(&mut self, port: u16) -> AuthResult<()> {
        self.redirect_url = redirect_url(port)?;
        Ok(())
    }

    /// Authorization URL to open in the browser
    pub fn authorize_url(&self) -> Url {
        let mut url = self.auth_url.url().clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", self.client_id.as_str());
            query.append_pair("redirect_uri", self.redirect_url.as_str());
            if !self.scopes.is_empty() {
                let scope = self
                    .scopes
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                query.append_pair("scope", &scope);
            }
            query.append_pair("response_type", self.response_type.as_str());
            query.append_pair("response_mode", "form_post");
            query.append_pair("nonce", &self.nonce);
            query.append_pair("provider", &self.provider);
        }
        url
    }
}

fn redirect_url(port: u16) -> AuthResult<RedirectUrl> {
    RedirectUrl::new(format!("http://localhost:{}{}", port, LANDING_PATH))
        .map_err(|e| AuthError::InvalidConfig(format!("Invalid redirect URL: {}", e)))
}

fn random_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LEN)
        .map(char::from)
        .collect()
}
