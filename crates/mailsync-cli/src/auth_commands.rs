use crate::{output, Settings};
use anyhow::{Context, Result};
use clap::Subcommand;
use mailsync_auth::{
    fetch_user_info, AuthorizationFlow, AuthorizationRequest, ExportHint, LoginOptions,
    LoginOutcome, ProvidersConfig, ResponseType, SystemBrowser, TokenSink, DEFAULT_CALLBACK_PORT,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info_span;

#[derive(Subcommand)]
pub enum AuthAction {
    /// Log in through the provider's consent page.
    Login {
        /// Provider type: microsoft|google.
        provider: String,
        /// OAuth2 client configuration file.
        #[arg(long)]
        config: PathBuf,
        /// Print an export line instead of storing the token.
        #[arg(long, default_value_t = false)]
        no_store: bool,
        /// Request an id_token instead of an access token.
        #[arg(long, default_value_t = false)]
        id_token: bool,
        /// Print the authorization URL instead of opening a browser.
        #[arg(long, default_value_t = false)]
        no_browser: bool,
    },
    /// Show the claims of the stored token's user.
    Userinfo {
        /// Provider type: microsoft|google.
        provider: String,
        /// OAuth2 client configuration file.
        #[arg(long)]
        config: PathBuf,
    },
}

pub async fn handle_auth(action: AuthAction, settings: &Settings) -> Result<()> {
    match action {
        AuthAction::Login {
            provider,
            config,
            no_store,
            id_token,
            no_browser,
        } => login(settings, &provider, &config, no_store, id_token, no_browser).await,
        AuthAction::Userinfo { provider, config } => userinfo(settings, &provider, &config).await,
    }
}

fn load_config(path: &Path) -> Result<ProvidersConfig> {
    ProvidersConfig::load(path).context("unable to load OAuth config")
}

async fn login(
    settings: &Settings,
    provider: &str,
    config: &Path,
    no_store: bool,
    id_token: bool,
    no_browser: bool,
) -> Result<()> {
    let providers = load_config(config)?;
    let client = providers.client(provider)?;

    let response_type = if id_token {
        ResponseType::IdToken
    } else {
        ResponseType::Token
    };
    let request = AuthorizationRequest::new(provider, client, DEFAULT_CALLBACK_PORT, response_type)?;

    let sink: Arc<dyn TokenSink> = if no_store {
        Arc::new(ExportHint::stdout())
    } else {
        Arc::new(settings.token_store())
    };

    let options = LoginOptions {
        no_browser,
        port: DEFAULT_CALLBACK_PORT,
        span: info_span!("login", provider),
    };
    let launcher = SystemBrowser::detect();

    match AuthorizationFlow::new(request, options)
        .run(sink, &launcher)
        .await?
    {
        LoginOutcome::Manual { url } => println!("open auth URL in browser:\n{}", url),
        LoginOutcome::Captured(_) => println!("Authenticated! You can close the browser now."),
        LoginOutcome::Closed => println!("Browser closed before a token was received."),
    }
    Ok(())
}

async fn userinfo(settings: &Settings, provider: &str, config: &Path) -> Result<()> {
    let providers = load_config(config)?;
    let url = providers.client(provider)?.userinfo_url(provider)?;

    let token = settings
        .token_store()
        .load()
        .context("unable to load auth token, use auth command")?;
    let access_token = token.require_bearer()?;

    let claims = fetch_user_info(&reqwest::Client::new(), &url, access_token).await?;
    output::print(settings.format, &claims)
}
