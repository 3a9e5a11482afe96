//! OpenID userinfo lookup

use crate::{AuthError, AuthResult};
use serde_json::{Map, Value};
use tracing::debug;

/// Claims returned by the userinfo endpoint
pub type UserClaims = Map<String, Value>;

/// GET the userinfo endpoint with the access token as bearer
pub async fn fetch_user_info(
    client: &reqwest::Client,
    userinfo_url: &url::Url,
    access_token: &str,
) -> AuthResult<UserClaims> {
    let response = client
        .get(userinfo_url.clone())
        .bearer_auth(access_token)
        .send()
        .await
        .map_err(|e| AuthError::NetworkError(format!("unable to get user info: {}", e)))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AuthError::NetworkError(format!("unable to read user info: {}", e)))?;
    debug!("userinfo {}: {} bytes", status, body.len());

    if !status.is_success() {
        return Err(AuthError::NetworkError(format!(
            "userinfo returned {}: {}",
            status,
            body.trim()
        )));
    }

    serde_json::from_str(&body)
        .map_err(|e| AuthError::NetworkError(format!("unable to decode user info: {}", e)))
}
