use crate::{output, Settings};
use anyhow::{Context, Result};
use clap::Subcommand;
use mailsync_imap::{
    normalize_message_id, ImapResult, MailSession, Mailbox, SessionConfig, DOWNLOADED_LABEL,
};
use tracing::{info_span, warn};

/// Mailbox the email commands operate on
const INBOX: &str = "INBOX";

#[derive(Subcommand)]
pub enum EmailAction {
    /// Check that the stored token opens a session and lists mailboxes.
    Auth {
        /// Account email address.
        email: String,
    },
    /// List mailboxes.
    Mailboxes {
        /// Account email address.
        email: String,
    },
    /// List messages counted back from the newest.
    Messages {
        /// Account email address.
        email: String,
        /// Number of messages to skip back from the newest.
        #[arg(long, default_value_t = 0)]
        from: u32,
        /// Maximum number of messages.
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Get one message by Message-ID.
    Get {
        /// Account email address.
        email: String,
        /// Message-ID header value.
        #[arg(long)]
        id: String,
    },
    /// Mark a message as downloaded.
    Label {
        /// Account email address.
        email: String,
        /// Message-ID header value.
        #[arg(long)]
        id: String,
    },
}

pub async fn handle_email(action: EmailAction, settings: &Settings) -> Result<()> {
    match action {
        EmailAction::Auth { email } => {
            let mut session = connect(settings, &email).await?;
            let result = session.mailboxes().await;
            let mailboxes = close(&mut session, result).await?;
            println!("authenticated as {}", email);
            print!("{}", mailbox_listing(&mailboxes));
            Ok(())
        }
        EmailAction::Mailboxes { email } => {
            let mut session = connect(settings, &email).await?;
            let result = session.mailboxes().await;
            let mailboxes = close(&mut session, result).await?;
            print!("{}", mailbox_listing(&mailboxes));
            Ok(())
        }
        EmailAction::Messages { email, from, limit } => {
            let mut session = connect(settings, &email).await?;
            let result = session.messages(INBOX, from, limit).await;
            let messages = close(&mut session, result).await?;
            output::print(settings.format, &messages)
        }
        EmailAction::Get { email, id } => {
            let id = normalize_message_id(&id);
            let mut session = connect(settings, &email).await?;
            let result = session.get_message(INBOX, &id).await;
            let message = close(&mut session, result).await?;
            output::print(settings.format, &message)
        }
        EmailAction::Label { email, id } => {
            let id = normalize_message_id(&id);
            let mut session = connect(settings, &email).await?;
            let result = session.label_message(INBOX, &id, DOWNLOADED_LABEL).await;
            close(&mut session, result).await?;
            println!("updated");
            Ok(())
        }
    }
}

/// Open a session for `email` with the stored token
async fn connect(settings: &Settings, email: &str) -> Result<MailSession> {
    let token = settings
        .token_store()
        .load()
        .context("unable to load auth token, use auth command")?;
    let access_token = token.require_bearer()?;

    let mut config = SessionConfig::default().with_span(info_span!(
        "imap",
        server = %settings.server,
        identity = %email
    ));
    config.timeout = settings.timeout;

    MailSession::connect(&settings.server, email, access_token, config)
        .await
        .with_context(|| format!("unable to connect to {}", settings.server))
}

/// Log out whatever the operation returned, then hand its result back
async fn close<T>(session: &mut MailSession, result: ImapResult<T>) -> Result<T> {
    if let Err(e) = session.close().await {
        warn!("Failed to log out: {}", e);
    }
    Ok(result?)
}

fn mailbox_listing(mailboxes: &[Mailbox]) -> String {
    let mut listing = String::from("Mailboxes:\n");
    for mailbox in mailboxes {
        listing.push_str(&format!("* {}\n", mailbox.name));
    }
    listing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_listing() {
        let mailboxes = vec![
            Mailbox::new("INBOX", Some("/".into()), vec![]),
            Mailbox::new("Sent Items", Some("/".into()), vec!["\\Sent".into()]),
        ];
        assert_eq!(
            mailbox_listing(&mailboxes),
            "Mailboxes:\n* INBOX\n* Sent Items\n"
        );
        assert_eq!(mailbox_listing(&[]), "Mailboxes:\n");
    }
}
