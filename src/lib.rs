#![deny(missing_debug_implementations)]

//! # mail-codec
//!
//! Client-side wire formats, response state machines, and command pipelines
//! for IMAP4rev1 and POP3.
//!
//! The crate is layered bottom-up:
//!
//! * [`token`] — the incremental IMAP lexer, literal-aware.
//! * [`decode`] — reassembles response records (line + literal payloads).
//! * [`reader`] — token reader over one assembled line, used by every parser.
//! * [`parse`] — typed parsers for the untagged response shapes.
//! * [`command`] — command kinds, the argument quoter, and the tag generator.
//! * [`mailbox_state`] — the selected-mailbox reducer and its deltas.
//! * [`session`] — the IMAP session core with cooperative (tokio) and
//!   synchronous drivers.
//! * [`pop3`] — the POP3 decoders and session.
//! * [`sasl`], [`redact`] — authentication mechanisms and wire-log redaction.
//! * [`store`] — the mail-store façade over either protocol.
//!
//! Transports are consumed, not provided: anything that can move bytes can
//! drive a session (see [`transport`]).

pub mod cache;
pub mod command;
pub mod config;
pub mod decode;
pub mod error;
pub mod line;
pub mod mailbox_state;
pub mod parse;
pub mod pop3;
pub mod reader;
pub mod redact;
pub mod sasl;
pub mod session;
pub mod store;
pub mod text;
pub mod token;
pub mod transport;

pub use error::{Error, Result};
pub use mail_types as types;
