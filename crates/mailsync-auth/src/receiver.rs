//! Local HTTP receiver for the provider redirect
//!
//! Serves two routes for one login attempt. The landing path accepts the
//! provider's `form_post` (or a plain query) and either reports the error or
//! hands the token to the configured sink, then redirects the browser to the
//! completion path. The completion path fires the completion signal.

use crate::request::{DONE_PATH, LANDING_PATH};
use crate::signal::{CallbackFailure, Completion, CompletionSignal};
use crate::storage::TokenSink;
use crate::token::CapturedToken;
use crate::{AuthError, AuthResult};
use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn, Instrument, Span};

const DONE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>mailsync</title></head>
<body onload="window.close()" style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h2>Authenticated! You may close the browser now.</h2>
</body>
</html>"#;

/// Fields the provider may send back
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub expires_in: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    fn field(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|v| !v.is_empty())
    }
}

/// JSON error body sent to the browser
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

struct ReceiverState {
    sink: Arc<dyn TokenSink>,
    pending: Mutex<Option<CapturedToken>>,
    signal: CompletionSignal,
}

/// Running redirect receiver
pub struct CallbackReceiver {
    addrs: Vec<SocketAddr>,
    signal: CompletionSignal,
    stop: watch::Sender<bool>,
    servers: JoinSet<()>,
}

impl CallbackReceiver {
    /// Bind `addr` and start serving; port 0 picks a free port
    pub async fn start(addr: SocketAddr, sink: Arc<dyn TokenSink>, span: Span) -> AuthResult<Self> {
        let listener = bind(addr).await?;
        Self::serve(vec![listener], sink, span)
    }

    /// Serve on both loopback addresses at `port`
    ///
    /// Browsers may resolve `localhost` to either `127.0.0.1` or `::1`. The
    /// IPv4 listener is required; the IPv6 one shares its port and is skipped
    /// when the host cannot bind it.
    pub async fn start_loopback(port: u16, sink: Arc<dyn TokenSink>, span: Span) -> AuthResult<Self> {
        let v4 = bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port))).await?;
        let port = bound_addr(&v4)?.port();

        let mut listeners = vec![v4];
        match TcpListener::bind(SocketAddr::from((Ipv6Addr::LOCALHOST, port))).await {
            Ok(v6) => listeners.push(v6),
            Err(e) => warn!("Not listening on [::1]:{}: {}", port, e),
        }
        Self::serve(listeners, sink, span)
    }

    fn serve(listeners: Vec<TcpListener>, sink: Arc<dyn TokenSink>, span: Span) -> AuthResult<Self> {
        let addrs = listeners
            .iter()
            .map(bound_addr)
            .collect::<AuthResult<Vec<_>>>()?;
        if addrs.is_empty() {
            return Err(AuthError::CallbackServerFailed("no listening address".to_string()));
        }

        let signal = CompletionSignal::new();
        let state = Arc::new(ReceiverState {
            sink,
            pending: Mutex::new(None),
            signal: signal.clone(),
        });
        let app = router(state);

        let (stop, _) = watch::channel(false);
        let mut servers = JoinSet::new();
        for (listener, addr) in listeners.into_iter().zip(addrs.iter().copied()) {
            let mut stopped = stop.subscribe();
            let server = axum::serve(listener, app.clone()).with_graceful_shutdown(async move {
                // A dropped sender also ends the wait
                let _ = stopped.wait_for(|stop| *stop).await;
            });
            servers.spawn(
                async move {
                    if let Err(e) = server.await {
                        error!("Callback server on {} failed: {}", addr, e);
                    }
                    debug!("Callback server on {} stopped", addr);
                }
                .instrument(span.clone()),
            );
            info!("Listening for OAuth2 redirect on {}", addr);
        }

        Ok(Self {
            addrs,
            signal,
            stop,
            servers,
        })
    }

    /// Primary listening address
    pub fn local_addr(&self) -> SocketAddr {
        self.addrs[0]
    }

    /// Every address the receiver listens on
    pub fn addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    pub fn signal(&self) -> &CompletionSignal {
        &self.signal
    }

    /// Wait for the completion signal
    pub async fn wait(&self) -> Completion {
        self.signal.wait().await
    }

    /// Stop accepting connections and wait for in-flight responses
    pub async fn shutdown(mut self) {
        let _ = self.stop.send(true);
        while let Some(result) = self.servers.join_next().await {
            if let Err(e) = result {
                warn!("Callback server task ended abnormally: {}", e);
            }
        }
    }
}

async fn bind(addr: SocketAddr) -> AuthResult<TcpListener> {
    TcpListener::bind(addr).await.map_err(|e| {
        AuthError::CallbackServerFailed(format!(
            "unable to listen on {}: {}. Make sure no other process is using this port",
            addr, e
        ))
    })
}

fn bound_addr(listener: &TcpListener) -> AuthResult<SocketAddr> {
    listener
        .local_addr()
        .map_err(|e| AuthError::CallbackServerFailed(e.to_string()))
}

fn router(state: Arc<ReceiverState>) -> Router {
    Router::new()
        .route(LANDING_PATH, get(landing_query).post(landing_form))
        .route(DONE_PATH, get(done).post(done))
        .with_state(state)
}

async fn landing_query(
    State(state): State<Arc<ReceiverState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    handle_redirect(&state, params)
}

async fn landing_form(
    State(state): State<Arc<ReceiverState>>,
    form: Result<Form<CallbackParams>, FormRejection>,
) -> Response {
    match form {
        Ok(Form(params)) => handle_redirect(&state, params),
        Err(rejection) => {
            warn!("Unable to parse redirect body: {}", rejection);
            state
                .signal
                .fire(Completion::Failed(CallbackFailure::MissingToken));
            error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                "unable to parse response body",
            )
        }
    }
}

fn handle_redirect(state: &ReceiverState, params: CallbackParams) -> Response {
    if let Some(code) = CallbackParams::field(&params.error) {
        let description = CallbackParams::field(&params.error_description).unwrap_or_default();
        warn!("Provider returned error {}: {}", code, description);

        let response = error_response(StatusCode::INTERNAL_SERVER_ERROR, code, description);
        state.signal.fire(Completion::Failed(CallbackFailure::Provider {
            code: code.to_string(),
            description: description.to_string(),
        }));
        return response;
    }

    let Some(access_token) = CallbackParams::field(&params.access_token) else {
        warn!("Redirect carried no token");
        state
            .signal
            .fire(Completion::Failed(CallbackFailure::MissingToken));
        return error_response(
            StatusCode::BAD_REQUEST,
            "invalid_request",
            "missing token parameter",
        );
    };

    let token = CapturedToken::from_redirect(
        access_token,
        CallbackParams::field(&params.token_type),
        CallbackParams::field(&params.expires_in),
        chrono::Utc::now().timestamp(),
    );
    info!("Authenticated! You can close the browser now.");

    if let Err(e) = state.sink.deliver(&token) {
        // Reported, but the browser still gets the completion page
        error!("{}", e);
    }

    if let Ok(mut pending) = state.pending.lock() {
        *pending = Some(token);
    }
    Redirect::to(DONE_PATH).into_response()
}

async fn done(State(state): State<Arc<ReceiverState>>) -> Html<&'static str> {
    let token = state.pending.lock().ok().and_then(|mut p| p.take());
    let completion = match token {
        Some(token) => Completion::Captured(token),
        None => Completion::Closed,
    };
    if !state.signal.fire(completion) {
        debug!("Completion already signalled");
    }
    Html(DONE_PAGE)
}

fn error_response(status: StatusCode, code: &str, message: &str) -> Response {
    let body = ErrorBody {
        code: code.to_string(),
        message: message.to_string(),
    };
    (status, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TokenStore;
    use std::time::Duration;

    async fn start(store: TokenStore) -> CallbackReceiver {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        CallbackReceiver::start(addr, Arc::new(store), Span::none())
            .await
            .unwrap()
    }

    async fn completion(receiver: &CallbackReceiver) -> Completion {
        tokio::time::timeout(Duration::from_secs(5), receiver.wait())
            .await
            .expect("completion should fire")
    }

    #[tokio::test]
    async fn test_form_post_stores_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::new(dir.path());
        let receiver = start(store.clone()).await;
        let base = format!("http://{}", receiver.local_addr());

        let before = chrono::Utc::now().timestamp();
        let response = reqwest::Client::new()
            .post(format!("{}/auth", base))
            .form(&[
                ("access_token", "tok"),
                ("token_type", "Bearer"),
                ("expires_in", "3600"),
            ])
            .send()
            .await
            .unwrap();
        let after = chrono::Utc::now().timestamp();

        // Redirect followed to the completion page
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.url().path(), "/auth/done");
        assert!(response.text().await.unwrap().contains("Authenticated!"));

        let stored = store.load_with_override(None).unwrap();
        assert_eq!(stored.access_token, "tok");
        assert_eq!(stored.token_type, "Bearer");
        let exp = stored.expires_at.unwrap();
        assert!(exp >= before + 3600 && exp <= after + 3600);

        match completion(&receiver).await {
            Completion::Captured(token) => assert_eq!(token, stored),
            other => panic!("unexpected completion {:?}", other),
        }

        // A second visit does not fire again
        reqwest::get(format!("{}/auth/done", base)).await.unwrap();
        assert!(matches!(completion(&receiver).await, Completion::Captured(_)));

        receiver.shutdown().await;
    }

    #[tokio::test]
    async fn test_provider_error() {
        let dir = tempfile::tempdir().unwrap();
        let receiver = start(TokenStore::new(dir.path())).await;

        let response = reqwest::get(format!(
            "http://{}/auth?error=access_denied&error_description=user+cancelled",
            receiver.local_addr()
        ))
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorBody = response.json().await.unwrap();
        assert_eq!(
            body,
            ErrorBody {
                code: "access_denied".into(),
                message: "user cancelled".into(),
            }
        );

        assert_eq!(
            completion(&receiver).await,
            Completion::Failed(CallbackFailure::Provider {
                code: "access_denied".into(),
                description: "user cancelled".into(),
            })
        );
        assert!(!dir.path().join(".auth_token").exists());

        receiver.shutdown().await;
    }

    #[tokio::test]
    async fn test_missing_token() {
        let dir = tempfile::tempdir().unwrap();
        let receiver = start(TokenStore::new(dir.path())).await;

        let response = reqwest::get(format!("http://{}/auth?token_type=Bearer", receiver.local_addr()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = response.json().await.unwrap();
        assert_eq!(body.code, "invalid_request");
        assert_eq!(body.message, "missing token parameter");

        assert_eq!(
            completion(&receiver).await,
            Completion::Failed(CallbackFailure::MissingToken)
        );

        receiver.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let dir = tempfile::tempdir().unwrap();
        let receiver = start(TokenStore::new(dir.path())).await;

        let response = reqwest::Client::new()
            .post(format!("http://{}/auth", receiver.local_addr()))
            .header("content-type", "text/plain")
            .body("access_token=tok")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: ErrorBody = response.json().await.unwrap();
        assert_eq!(body.message, "unable to parse response body");

        assert_eq!(
            completion(&receiver).await,
            Completion::Failed(CallbackFailure::MissingToken)
        );

        receiver.shutdown().await;
    }

    #[tokio::test]
    async fn test_done_without_token() {
        let dir = tempfile::tempdir().unwrap();
        let receiver = start(TokenStore::new(dir.path())).await;

        let response = reqwest::get(format!("http://{}/auth/done", receiver.local_addr()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(completion(&receiver).await, Completion::Closed);

        receiver.shutdown().await;
    }

    #[tokio::test]
    async fn test_storage_failure_still_completes() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let receiver = start(TokenStore::new(blocker.join("sub"))).await;

        let response = reqwest::Client::new()
            .post(format!("http://{}/auth", receiver.local_addr()))
            .form(&[("access_token", "tok")])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(matches!(completion(&receiver).await, Completion::Captured(_)));

        receiver.shutdown().await;
    }

    #[tokio::test]
    async fn test_port_in_use() {
        let dir = tempfile::tempdir().unwrap();
        let first = start(TokenStore::new(dir.path())).await;

        let result = CallbackReceiver::start(
            first.local_addr(),
            Arc::new(TokenStore::new(dir.path())),
            Span::none(),
        )
        .await;
        assert!(matches!(result, Err(AuthError::CallbackServerFailed(_))));

        first.shutdown().await;
    }

    #[tokio::test]
    async fn test_loopback_serves_every_family() {
        let dir = tempfile::tempdir().unwrap();
        let receiver =
            CallbackReceiver::start_loopback(0, Arc::new(TokenStore::new(dir.path())), Span::none())
                .await
                .unwrap();

        let addrs = receiver.addrs().to_vec();
        assert!(addrs[0].ip().is_loopback() && addrs[0].is_ipv4());
        assert!(addrs.iter().all(|a| a.port() == addrs[0].port()));
        if let Some(v6) = addrs.get(1) {
            assert!(v6.is_ipv6() && v6.ip().is_loopback());
        }

        // Each address reaches the same receiver
        for addr in &addrs {
            let response = reqwest::get(format!("http://{}/auth", addr)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
        assert!(matches!(
            completion(&receiver).await,
            Completion::Failed(CallbackFailure::MissingToken)
        ));

        receiver.shutdown().await;
    }
}
