//! IMAP mailbox types

use async_imap::types::NameAttribute;
use serde::Serialize;

/// Role of a mailbox
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MailboxKind {
    /// Inbox folder
    Inbox,
    /// Sent messages
    Sent,
    /// Draft messages
    Drafts,
    /// Trash/deleted messages
    Trash,
    /// Spam/junk
    Spam,
    /// Archive
    Archive,
    /// User-created mailbox
    Other,
}

impl MailboxKind {
    /// Detect the role from IMAP special-use attributes only (RFC 6154)
    /// Also matches without backslash prefix (some servers send "Trash" instead of "\Trash")
    pub fn from_attributes(attributes: &[String]) -> Option<Self> {
        for attr in attributes {
            let lower = attr.to_lowercase();
            match lower.trim_start_matches('\\') {
                "inbox" => return Some(MailboxKind::Inbox),
                "sent" => return Some(MailboxKind::Sent),
                "drafts" => return Some(MailboxKind::Drafts),
                "trash" => return Some(MailboxKind::Trash),
                "junk" => return Some(MailboxKind::Spam),
                "archive" | "all" => return Some(MailboxKind::Archive),
                _ => {}
            }
        }
        None
    }

    /// Detect the role from the name (fallback when no attributes)
    pub fn from_name(name: &str) -> Self {
        let name_lower = name.to_lowercase();
        if name_lower == "inbox" {
            MailboxKind::Inbox
        } else if name_lower.contains("sent") {
            MailboxKind::Sent
        } else if name_lower.contains("draft") {
            MailboxKind::Drafts
        } else if name_lower.contains("trash") || name_lower.contains("deleted") {
            MailboxKind::Trash
        } else if name_lower.contains("spam") || name_lower.contains("junk") {
            MailboxKind::Spam
        } else if name_lower.contains("archive") || name_lower.contains("all mail") {
            MailboxKind::Archive
        } else {
            MailboxKind::Other
        }
    }

    /// Attributes first, then the name
    pub fn detect(attributes: &[String], name: &str) -> Self {
        Self::from_attributes(attributes).unwrap_or_else(|| Self::from_name(name))
    }
}

/// One entry of a LIST response
#[derive(Debug, Clone, Serialize)]
pub struct Mailbox {
    /// Full mailbox name including hierarchy
    pub name: String,
    /// Hierarchy delimiter (e.g. "/" for Gmail)
    pub delimiter: Option<String>,
    /// Name attributes as sent by the server
    pub attributes: Vec<String>,
    /// Detected role
    pub kind: MailboxKind,
}

impl Mailbox {
    pub fn new(name: impl Into<String>, delimiter: Option<String>, attributes: Vec<String>) -> Self {
        let name = name.into();
        let kind = MailboxKind::detect(&attributes, &name);
        Self {
            name,
            delimiter,
            attributes,
            kind,
        }
    }

    /// Build from the fields of an untagged LIST response
    pub fn from_list(name: &str, delimiter: Option<&str>, attributes: &[NameAttribute<'_>]) -> Self {
        Self::new(
            name,
            delimiter.map(|d| d.to_string()),
            attributes.iter().map(attribute_to_string).collect(),
        )
    }

    /// Check if this mailbox can be selected
    pub fn is_selectable(&self) -> bool {
        !self.attributes.iter().any(|a| {
            let lower = a.to_lowercase();
            lower == "\\noselect" || lower == "\\nonexistent"
        })
    }
}

fn attribute_to_string(attr: &NameAttribute<'_>) -> String {
    match attr {
        NameAttribute::NoInferiors => "\\Noinferiors".to_string(),
        NameAttribute::NoSelect => "\\Noselect".to_string(),
        NameAttribute::Marked => "\\Marked".to_string(),
        NameAttribute::Unmarked => "\\Unmarked".to_string(),
        // Special-use and extension attributes: `Sent` or `Extension("\\HasChildren")`
        other => debug_attribute(&format!("{:?}", other)),
    }
}

fn debug_attribute(debug: &str) -> String {
    match debug.split_once('(') {
        Some((_, inner)) => inner
            .trim_end_matches(')')
            .trim_matches('"')
            .replace("\\\\", "\\"),
        None => format!("\\{}", debug),
    }
}
