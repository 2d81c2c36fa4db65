//! The crate-wide error taxonomy.

use thiserror::Error;

use mail_types::{error::ValidationError, mailbox::Utf7Error, response::RespStatus};

#[derive(Debug, Error)]
pub enum Error {
    /// The underlying stream failed or closed. Not recovered here; the
    /// caller may reconnect.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A malformed greeting or a malformed reply to an in-flight command.
    /// (Malformed untagged traffic is absorbed, not surfaced.)
    #[error("Protocol parse failure: {0}")]
    Parse(String),

    /// The server rejected a command: tagged NO/BAD, or POP3 `-ERR`.
    #[error("Command failed{}: {text}", status_suffix(.status))]
    Command {
        status: Option<RespStatus>,
        text: String,
    },

    /// An operation was invoked in a state that does not allow it.
    #[error("Invalid state: {0}")]
    State(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Utf7(#[from] Utf7Error),

    /// The server never advertised a capability the command requires.
    /// Raised before any byte is written.
    #[error("Server does not advertise {0}")]
    Capability(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out")]
    Timeout,
}

impl Error {
    pub(crate) fn command(status: Option<RespStatus>, text: impl Into<String>) -> Self {
        Self::Command {
            status,
            text: text.into(),
        }
    }

    pub(crate) fn state(text: impl Into<String>) -> Self {
        Self::State(text.into())
    }
}

fn status_suffix(status: &Option<RespStatus>) -> String {
    match status {
        Some(status) => format!(" ({})", status),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let error = Error::command(Some(RespStatus::No), "over quota");
        assert_eq!("Command failed (NO): over quota", error.to_string());

        let error = Error::command(None, "no such message");
        assert_eq!("Command failed: no such message", error.to_string());
    }
}
