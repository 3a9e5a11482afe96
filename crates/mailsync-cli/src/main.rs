mod auth_commands;
mod email_commands;
mod output;

use clap::{Parser, Subcommand};
use mailsync_auth::{expand_home, TokenStore};
use output::Format;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "mailsync", version, about = "Authorize and read a mailbox over IMAP with OAuth2")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long, global = true, default_value = "info")]
    log_level: String,

    /// Enable debug logging.
    #[arg(short = 'D', long, global = true, default_value_t = false)]
    debug: bool,

    /// IMAP server address.
    #[arg(long, global = true, default_value = mailsync_imap::DEFAULT_SERVER)]
    server: String,

    /// Folder holding the stored auth token.
    #[arg(long, global = true, default_value = "~/.mailsync/email")]
    storage: PathBuf,

    /// Timeout for email operations in seconds, 0 to disable.
    #[arg(long, global = true, default_value_t = 30)]
    timeout: u64,

    /// Output format for structured results.
    #[arg(long, global = true, value_enum, default_value_t = Format::Json)]
    format: Format,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorization with the mail provider.
    Auth {
        #[command(subcommand)]
        action: auth_commands::AuthAction,
    },
    /// Mailbox operations.
    Email {
        #[command(subcommand)]
        action: email_commands::EmailAction,
    },
}

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: String,
    pub storage: PathBuf,
    pub timeout: Option<Duration>,
    pub format: Format,
}

impl Settings {
    fn from_cli(cli: &Cli) -> Self {
        Self {
            server: cli.server.clone(),
            storage: expand_home(&cli.storage),
            timeout: (cli.timeout > 0).then(|| Duration::from_secs(cli.timeout)),
            format: cli.format,
        }
    }

    pub fn token_store(&self) -> TokenStore {
        TokenStore::new(&self.storage)
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.debug { "debug" } else { cli.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let settings = Settings::from_cli(&cli);
    debug!(?settings, "mailsync starting");

    match cli.command {
        Commands::Auth { action } => auth_commands::handle_auth(action, &settings).await,
        Commands::Email { action } => email_commands::handle_email(action, &settings).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["mailsync", "email", "mailboxes", "user@example.com"]);
        let settings = Settings::from_cli(&cli);
        assert_eq!(settings.server, "outlook.office365.com:993");
        assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.format, Format::Json);
        assert!(!settings.storage.starts_with("~"));
        assert!(settings.storage.ends_with(".mailsync/email"));
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from([
            "mailsync",
            "email",
            "messages",
            "user@example.com",
            "--from",
            "20",
            "--format",
            "yaml",
            "--timeout",
            "0",
            "--server",
            "imap.gmail.com:993",
        ]);
        let settings = Settings::from_cli(&cli);
        assert_eq!(settings.format, Format::Yaml);
        assert_eq!(settings.timeout, None);
        assert_eq!(settings.server, "imap.gmail.com:993");

        match cli.command {
            Commands::Email {
                action: email_commands::EmailAction::Messages { from, limit, .. },
            } => {
                assert_eq!(from, 20);
                assert_eq!(limit, 10);
            }
            _ => panic!("expected email messages"),
        }
    }

    #[test]
    fn test_login_flags() {
        let cli = Cli::parse_from([
            "mailsync",
            "auth",
            "login",
            "microsoft",
            "--config",
            "oauth.yaml",
            "--no-store",
            "--no-browser",
        ]);
        match cli.command {
            Commands::Auth {
                action:
                    auth_commands::AuthAction::Login {
                        provider,
                        no_store,
                        no_browser,
                        id_token,
                        ..
                    },
            } => {
                assert_eq!(provider, "microsoft");
                assert!(no_store && no_browser && !id_token);
            }
            _ => panic!("expected auth login"),
        }
    }
}
