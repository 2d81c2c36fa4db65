#![deny(missing_debug_implementations)]

//! # Value types for IMAP4rev1 and POP3 clients
//!
//! This crate contains the data model shared by the `mail-codec` parsers and
//! sessions: message attributes, envelopes, body structures, mailbox names
//! (including the Modified UTF-7 codec), sequence and UID sets, capability
//! sets, header sets, and the session state enums.
//!
//! Everything here is a plain owned value. Construction validates, so a value
//! that exists is a value that can be put on the wire.

pub mod body;
pub mod capability;
pub mod envelope;
pub mod error;
pub mod fetch;
pub mod flag;
pub mod headers;
pub mod mailbox;
pub mod response;
pub mod secret;
pub mod sequence;
pub mod state;
pub mod utils;
