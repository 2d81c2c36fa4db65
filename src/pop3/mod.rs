//! The POP3 side of the crate: line and multiline decoders, the session
//! core, and its cooperative and synchronous drivers.
//!
//! POP3 is strictly sequential, so there is no tag matching here: one
//! command goes out, one response (optionally with a dot-terminated body)
//! comes back. Commands that return bodies arm the multiline decoder
//! explicitly before sending.

mod response;
mod session;

pub use response::{Pop3Core, Pop3Event, Pop3Response, Pop3Status};
pub use session::{Pop3Session, SyncPop3Session};
