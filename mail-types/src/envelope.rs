//! Envelope-related types.

use chrono::{DateTime, FixedOffset};

/// The envelope structure of a message, as reported by FETCH ENVELOPE.
///
/// Every field mirrors one of the ten positional slots of the wire form.
/// Absent (`NIL`) slots are `None` or the empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub date: Option<DateTime<FixedOffset>>,
    pub subject: Option<String>,
    pub from: Vec<Address>,
    pub sender: Vec<Address>,
    pub reply_to: Vec<Address>,
    pub to: Vec<Address>,
    pub cc: Vec<Address>,
    pub bcc: Vec<Address>,
    pub in_reply_to: Option<String>,
    pub message_id: Option<String>,
}

/// One element of an envelope address list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    Mailbox(MailboxAddress),
    Group(GroupAddress),
}

/// `(name adl mailbox host)` with a non-NIL host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxAddress {
    /// Display name, MIME-encoded-word encoded on the wire.
    pub name: Option<String>,
    /// Source route, obsolete but still delivered by some servers.
    pub route: Option<String>,
    /// Local part.
    pub local: Option<String>,
    pub host: Option<String>,
}

impl MailboxAddress {
    /// `local@host` when both halves are present.
    pub fn address(&self) -> Option<String> {
        match (&self.local, &self.host) {
            (Some(local), Some(host)) => Some(format!("{}@{}", local, host)),
            _ => None,
        }
    }
}

/// An RFC 2822 group: `name:members;`.
///
/// On the wire a group is framed by an address whose host is NIL (start,
/// mailbox slot carries the group name) and a second all-NIL address (end).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupAddress {
    pub name: Option<String>,
    pub members: Vec<MailboxAddress>,
}
