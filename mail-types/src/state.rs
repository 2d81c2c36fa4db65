//! Session state enums.

/// State of an IMAP connection as tracked by the client session.
///
/// Transitions follow RFC 3501 section 3: a greeting moves the session to
/// `Connected` (or straight to `Authenticated` on PREAUTH), a successful
/// LOGIN/AUTHENTICATE to `Authenticated`, SELECT/EXAMINE to `Selected`, and
/// LOGOUT or an untagged BYE to `Disconnected`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImapSessionState {
    Disconnected,
    Connected,
    Authenticating,
    Authenticated,
    /// The mailbox name is the raw (wire) form used in SELECT/EXAMINE.
    Selected(String),
}

impl ImapSessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Selected(_))
    }
}

/// State of a POP3 connection.
///
/// `Authenticating` is the half-open USER/PASS state: USER was accepted and
/// the server is waiting for PASS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pop3SessionState {
    Disconnected,
    Connected,
    Authenticating,
    Authenticated,
}
