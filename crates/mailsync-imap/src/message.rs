//! IMAP message types

use chrono::{DateTime, FixedOffset};
use imap_proto::types::{Address, AttributeValue, BodyStructure};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeSet;

/// Email message flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageFlags {
    /// Message has been read
    pub seen: bool,
    /// Message has been answered
    pub answered: bool,
    /// Message is flagged/starred
    pub flagged: bool,
    /// Message is marked for deletion
    pub deleted: bool,
    /// Message is a draft
    pub draft: bool,
    /// Message arrived since the last session
    pub recent: bool,
    /// Keywords and labels
    pub custom: BTreeSet<String>,
}

impl MessageFlags {
    /// Parse flags from their IMAP wire names
    pub fn from_imap_flags(flags: &[&str]) -> Self {
        let mut result = MessageFlags::default();

        for flag in flags {
            match flag.to_lowercase().as_str() {
                "\\seen" => result.seen = true,
                "\\answered" => result.answered = true,
                "\\flagged" => result.flagged = true,
                "\\deleted" => result.deleted = true,
                "\\draft" => result.draft = true,
                "\\recent" => result.recent = true,
                _ => {
                    result.custom.insert(flag.to_string());
                }
            }
        }

        result
    }

    /// Check for a keyword or label, ignoring case
    pub fn has_custom(&self, label: &str) -> bool {
        self.custom.iter().any(|f| f.eq_ignore_ascii_case(label))
    }
}

/// INTERNALDATE format (RFC 3501 `date-time`)
const INTERNAL_DATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S %z";

/// Email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub address: String,
}

impl EmailAddress {
    pub fn new(name: Option<String>, address: String) -> Self {
        Self { name, address }
    }

    fn from_imap(addr: &Address<'_>) -> Self {
        let mailbox = addr.mailbox.as_ref().map(lossy).unwrap_or_default();
        let host = addr.host.as_ref().map(lossy).unwrap_or_default();
        let address = if host.is_empty() {
            // Some servers put the full address in the mailbox part
            mailbox
        } else {
            format!("{}@{}", mailbox, host)
        };
        let name = addr.name.as_ref().map(lossy).filter(|n| !n.is_empty());
        EmailAddress::new(name, address)
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// Envelope data from IMAP FETCH
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Envelope {
    /// Message-ID header
    pub message_id: Option<String>,
    /// Subject line
    pub subject: Option<String>,
    /// From addresses
    pub from: Vec<EmailAddress>,
    /// To addresses
    pub to: Vec<EmailAddress>,
    /// CC addresses
    pub cc: Vec<EmailAddress>,
    /// Reply-To addresses
    pub reply_to: Vec<EmailAddress>,
    /// Date sent
    pub date: Option<String>,
    /// In-Reply-To header
    pub in_reply_to: Option<String>,
}

impl Envelope {
    fn from_imap(env: &imap_proto::types::Envelope<'_>) -> Self {
        let addresses = |list: Option<&Vec<Address<'_>>>| -> Vec<EmailAddress> {
            list.map(|v| v.iter().map(EmailAddress::from_imap).collect())
                .unwrap_or_default()
        };

        Envelope {
            message_id: env.message_id.as_ref().map(lossy),
            subject: env.subject.as_ref().map(lossy),
            from: addresses(env.from.as_ref()),
            to: addresses(env.to.as_ref()),
            cc: addresses(env.cc.as_ref()),
            reply_to: addresses(env.reply_to.as_ref()),
            date: env.date.as_ref().map(lossy),
            in_reply_to: env.in_reply_to.as_ref().map(lossy),
        }
    }
}

/// Shape of the message body from BODYSTRUCTURE
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BodySummary {
    /// Top-level MIME type, e.g. "multipart/mixed"
    pub content_type: String,
    /// Number of leaf parts
    pub parts: usize,
    /// Whether any part is disposed as an attachment
    pub has_attachments: bool,
}

impl BodySummary {
    fn from_structure(bs: &BodyStructure<'_>) -> Self {
        let common = match bs {
            BodyStructure::Basic { common, .. }
            | BodyStructure::Text { common, .. }
            | BodyStructure::Message { common, .. }
            | BodyStructure::Multipart { common, .. } => common,
        };

        Self {
            content_type: format!("{}/{}", common.ty.ty, common.ty.subtype).to_ascii_lowercase(),
            parts: count_parts(bs),
            has_attachments: has_attachment(bs),
        }
    }
}

fn count_parts(bs: &BodyStructure<'_>) -> usize {
    match bs {
        BodyStructure::Multipart { bodies, .. } => bodies.iter().map(count_parts).sum(),
        _ => 1,
    }
}

fn has_attachment(bs: &BodyStructure<'_>) -> bool {
    match bs {
        BodyStructure::Multipart { bodies, .. } => bodies.iter().any(has_attachment),
        BodyStructure::Basic { common, .. }
        | BodyStructure::Text { common, .. }
        | BodyStructure::Message { common, .. } => common
            .disposition
            .as_ref()
            .map(|d| d.ty.eq_ignore_ascii_case("attachment"))
            .unwrap_or(false),
    }
}

/// One message from a FETCH response
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Message sequence number; only meaningful for the current selection
    pub seq: u32,
    /// Server-assigned UID, when requested
    pub uid: Option<u32>,
    /// Message flags
    pub flags: MessageFlags,
    /// Arrival time on the server
    pub internal_date: Option<DateTime<FixedOffset>>,
    /// Size in bytes
    pub size: Option<u32>,
    /// Envelope data
    pub envelope: Envelope,
    /// Body structure, when requested
    pub body: Option<BodySummary>,
}

impl Message {
    /// Build from the attributes of one untagged FETCH response
    pub fn from_attributes(seq: u32, attributes: &[AttributeValue<'_>]) -> Self {
        let mut message = Self {
            seq,
            uid: None,
            flags: MessageFlags::default(),
            internal_date: None,
            size: None,
            envelope: Envelope::default(),
            body: None,
        };

        for attribute in attributes {
            match attribute {
                AttributeValue::Uid(uid) => message.uid = Some(*uid),
                AttributeValue::Rfc822Size(size) => message.size = Some(*size),
                AttributeValue::Flags(flags) => {
                    let names: Vec<&str> = flags.iter().map(|f| &**f).collect();
                    message.flags = MessageFlags::from_imap_flags(&names);
                }
                AttributeValue::InternalDate(date) => {
                    message.internal_date =
                        DateTime::parse_from_str(date, INTERNAL_DATE_FORMAT).ok();
                }
                AttributeValue::Envelope(env) => message.envelope = Envelope::from_imap(env),
                AttributeValue::BodyStructure(bs) => {
                    message.body = Some(BodySummary::from_structure(bs));
                }
                _ => {}
            }
        }

        message
    }

    /// Get the subject, with a default for empty
    pub fn subject(&self) -> &str {
        self.envelope.subject.as_deref().unwrap_or("(No subject)")
    }
}

/// Restore angle brackets in a Message-ID that passed through a JSON encoder
///
/// Identifiers copied out of JSON output arrive as `<id@host>`;
/// searches need the literal `<id@host>` form.
pub fn normalize_message_id(id: &str) -> String {
    id.replace("\\u003c", "<").replace("\\u003e", ">")
}

fn lossy(bytes: &Cow<'_, [u8]>) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
