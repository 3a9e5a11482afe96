//! IMAP mail sessions with XOAUTH2 authentication
//!
//! Opens a TLS connection to an IMAP server, authenticates with an OAuth2
//! access token and exposes mailbox listing, windowed message fetches,
//! lookup by Message-ID and flag labelling.

mod collector;
mod error;
mod mailbox;
mod message;
mod session;
mod window;
mod xoauth2;

pub use collector::{ItemSender, StreamCollector, DEFAULT_CAPACITY};
pub use error::{ImapError, ImapResult};
pub use mailbox::{Mailbox, MailboxKind};
pub use message::{normalize_message_id, BodySummary, EmailAddress, Envelope, Message, MessageFlags};
pub use session::{MailSession, SessionConfig, FETCH_ALL, FETCH_FULL};
pub use window::{MessageWindow, SequenceRange};
pub use xoauth2::XOAuth2Authenticator;

/// Default IMAP endpoint
pub const DEFAULT_SERVER: &str = "outlook.office365.com:993";

/// Flag recorded on messages that have been downloaded
pub const DOWNLOADED_LABEL: &str = "\\mailsync-downloaded";
