//! Browser consent flow
//!
//! Builds the authorization URL, starts the redirect receiver, opens the
//! browser and waits for the receiver to signal completion.

use crate::launcher::BrowserLauncher;
use crate::receiver::CallbackReceiver;
use crate::request::{AuthorizationRequest, DEFAULT_CALLBACK_PORT};
use crate::signal::Completion;
use crate::storage::TokenSink;
use crate::token::CapturedToken;
use crate::AuthResult;
use std::sync::Arc;
use tracing::{info, Instrument, Span};

/// Login settings
#[derive(Debug, Clone)]
pub struct LoginOptions {
    /// Return the URL instead of opening a browser
    pub no_browser: bool,
    /// Loopback port for the redirect receiver
    pub port: u16,
    /// Span the flow and its receiver log under
    pub span: Span,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            no_browser: false,
            port: DEFAULT_CALLBACK_PORT,
            span: Span::current(),
        }
    }
}

/// Result of a login attempt
#[derive(Debug)]
pub enum LoginOutcome {
    /// No browser was opened; the user has to visit the URL
    Manual { url: String },
    /// The browser reached the completion page after a token was captured
    Captured(CapturedToken),
    /// The browser reached the completion page without a token
    Closed,
}

/// One login attempt
pub struct AuthorizationFlow {
    request: AuthorizationRequest,
    options: LoginOptions,
}

impl AuthorizationFlow {
    pub fn new(request: AuthorizationRequest, options: LoginOptions) -> Self {
        Self { request, options }
    }

    pub fn request(&self) -> &AuthorizationRequest {
        &self.request
    }

    /// Run the flow, delivering the captured token to `sink`
    ///
    /// Blocks until the receiver signals completion. A provider error or a
    /// missing token is returned as an error after the browser was answered.
    pub async fn run(
        mut self,
        sink: Arc<dyn TokenSink>,
        launcher: &dyn BrowserLauncher,
    ) -> AuthResult<LoginOutcome> {
        let span = self.options.span.clone();

        if self.options.no_browser {
            let url = self.request.authorize_url().to_string();
            return Ok(LoginOutcome::Manual { url });
        }

        let receiver = CallbackReceiver::start_loopback(self.options.port, sink, span.clone()).await?;
        let port = receiver.local_addr().port();
        if port != self.options.port {
            self.request.set_redirect_port(port)?;
        }

        let url = self.request.authorize_url();
        info!(parent: &span, "Opening {} authorization page", self.request.provider);
        if let Err(e) = launcher.launch(url.as_str()) {
            receiver.shutdown().await;
            return Err(e);
        }

        let completion = receiver.wait().instrument(span.clone()).await;
        receiver.shutdown().await;

        match completion {
            Completion::Captured(token) => {
                info!(parent: &span, "Authorization completed");
                Ok(LoginOutcome::Captured(token))
            }
            Completion::Closed => Ok(LoginOutcome::Closed),
            Completion::Failed(failure) => Err(failure.into()),
        }
    }
}
