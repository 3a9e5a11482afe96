//! OAuth2 browser consent flow for mailsync
//!
//! Runs the implicit (`form_post`) authorization flow against a local
//! redirect receiver and keeps the captured bearer token for IMAP XOAUTH2.

mod config;
mod error;
mod flow;
mod launcher;
mod receiver;
mod request;
mod signal;
mod storage;
mod token;
mod userinfo;

pub use config::{expand_home, ClientConfig, OAuth2Provider, ProvidersConfig};
pub use error::{AuthError, AuthResult};
pub use flow::{AuthorizationFlow, LoginOptions, LoginOutcome};
pub use launcher::{select_launcher, BrowserLauncher, SystemBrowser};
pub use receiver::{CallbackParams, CallbackReceiver, ErrorBody};
pub use request::{AuthorizationRequest, ResponseType, DEFAULT_CALLBACK_PORT, DONE_PATH, LANDING_PATH};
pub use signal::{CallbackFailure, Completion, CompletionSignal};
pub use storage::{ExportHint, TokenSink, TokenStore, ENV_TOKEN, TOKEN_FILE};
pub use token::{CapturedToken, StoredToken, BEARER};
pub use userinfo::{fetch_user_info, UserClaims};
