//! Translation of "offset from newest" windows into sequence ranges

use std::fmt;

/// Inclusive ascending range of message sequence numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRange {
    /// First sequence number
    pub lo: u32,
    /// Last sequence number
    pub hi: u32,
}

impl fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.lo, self.hi)
    }
}

/// Slice of a mailbox counted back from the newest message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageWindow {
    /// How far back from the newest message the window starts
    pub offset: u32,
    /// Requested number of messages
    pub limit: u32,
}

impl MessageWindow {
    pub fn new(offset: u32, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// Resolve against a mailbox holding `total` messages
    ///
    /// `None` when the offset reaches past the oldest message. Otherwise
    /// `lo = total - offset` and `hi = min(lo + limit, total)`. With offset 0
    /// this selects only the newest message.
    pub fn resolve(&self, total: u32) -> Option<SequenceRange> {
        if self.offset > total {
            return None;
        }

        let lo = total - self.offset;
        let hi = lo.saturating_add(self.limit).min(total);
        Some(SequenceRange { lo, hi })
    }
}
