//! The IMAP session.
//!
//! One parse-and-state core ([`ImapCore`]) carries everything both
//! scheduling shapes share: the literal decoder, tag bookkeeping, the
//! capability cache, the selected-mailbox state, connection state
//! transitions, and outbound secret redaction. The drivers stay thin:
//! [`imap::ImapSession`] suspends on a tokio stream, [`sync::SyncImapSession`]
//! polls a [`Transport`](crate::transport::Transport) with bounded reads.

pub mod imap;
pub mod sync;

use std::collections::HashMap;

use log::{debug, trace};

use mail_types::{
    capability::CapabilitySet,
    mailbox::Mailbox,
    response::{RecordKind, RespStatus, ResponseCode, Skeleton},
    state::ImapSessionState,
};

use crate::{
    command::{CommandBody, TagGenerator},
    decode::{LiteralDecoder, ResponseRecord},
    error::{Error, Result},
    mailbox_state::{apply, SelectedState, StateDelta},
    parse::{parse_codes, parse_untagged, UntaggedResponse},
    reader::LineReader,
    redact::{Protocol, SecretDetector, Span},
};

/// What a pending tag was issued for; drives the state transition when its
/// completion arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingKind {
    Login,
    Authenticate,
    Select(Mailbox),
    Examine(Mailbox),
    Close,
    Logout,
    Idle,
    Other,
}

impl PendingKind {
    pub fn of(body: &CommandBody) -> Self {
        match body {
            CommandBody::Login { .. } => Self::Login,
            CommandBody::Authenticate { .. } => Self::Authenticate,
            CommandBody::Select { mailbox, .. } => Self::Select(mailbox.clone()),
            CommandBody::Examine { mailbox } => Self::Examine(mailbox.clone()),
            CommandBody::Close | CommandBody::Unselect => Self::Close,
            CommandBody::Logout => Self::Logout,
            CommandBody::Idle => Self::Idle,
            _ => Self::Other,
        }
    }
}

/// A completed tagged response.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedResponse {
    pub tag: String,
    pub status: RespStatus,
    pub codes: Vec<ResponseCode>,
    pub text: String,
}

impl TaggedResponse {
    /// NO/BAD become command errors; OK passes through.
    pub fn into_result(self) -> Result<TaggedResponse> {
        match self.status {
            RespStatus::Ok => Ok(self),
            status => Err(Error::command(Some(status), self.text)),
        }
    }
}

/// One classified inbound record.
#[derive(Debug, Clone, PartialEq)]
pub enum Processed {
    Greeting {
        status: RespStatus,
        text: String,
    },
    Tagged(TaggedResponse),
    Continuation {
        text: String,
    },
    Untagged(UntaggedResponse),
    /// Malformed or unknown; absorbed.
    Ignored,
}

/// Everything a command run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub tagged: TaggedResponse,
    pub untagged: Vec<UntaggedResponse>,
    pub delta: StateDelta,
}

/// The shared IMAP session state machine.
#[derive(Debug)]
pub struct ImapCore {
    decoder: LiteralDecoder,
    tags: TagGenerator,
    pub state: ImapSessionState,
    pub capabilities: CapabilitySet,
    pub selected: SelectedState,
    pending: HashMap<String, PendingKind>,
    detector: SecretDetector,
    greeted: bool,
}

impl ImapCore {
    pub fn new() -> Self {
        Self {
            decoder: LiteralDecoder::new(),
            tags: TagGenerator::new(),
            state: ImapSessionState::Disconnected,
            capabilities: CapabilitySet::new(),
            selected: SelectedState::new(),
            pending: HashMap::new(),
            detector: SecretDetector::new(Protocol::Imap),
            greeted: false,
        }
    }

    pub fn next_tag(&mut self) -> String {
        self.tags.next_tag()
    }

    /// Records an issued command so its completion can be routed.
    pub fn register(&mut self, tag: &str, kind: PendingKind) {
        self.pending.insert(tag.to_owned(), kind);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn set_authenticating(&mut self, on: bool) {
        self.detector.set_authenticating(on);
    }

    pub fn scan_outbound(&mut self, bytes: &[u8]) -> Vec<Span> {
        self.detector.scan(bytes)
    }

    /// Refuses commands whose extension the server never advertised.
    pub fn check_capability(&self, body: &CommandBody) -> Result<()> {
        if let Some(required) = body.required_capability() {
            let spellings: Vec<&str> = required.to_vec();
            if !self.capabilities.has_any(&spellings) {
                return Err(Error::Capability(required.join("/")));
            }
        }
        Ok(())
    }

    /// Feeds inbound bytes through the literal decoder.
    pub fn absorb(&mut self, bytes: &[u8]) -> Vec<ResponseRecord> {
        self.decoder.push(bytes)
    }

    /// Applies the selected-mailbox reducer over a batch, in receive order.
    pub fn reduce(&mut self, records: &[ResponseRecord]) -> StateDelta {
        let (next, delta) = apply(&self.selected, records);
        self.selected = next;
        delta
    }

    /// Classifies one record, updating capabilities and session state.
    pub fn process(&mut self, record: &ResponseRecord) -> Processed {
        let Some(skeleton) = &record.skeleton else {
            return Processed::Ignored;
        };

        match &skeleton.kind {
            RecordKind::Continuation => Processed::Continuation {
                text: skeleton.text.clone(),
            },
            RecordKind::Untagged => self.process_untagged(record, skeleton),
            RecordKind::Tagged(tag) => self.process_tagged(tag.clone(), skeleton),
        }
    }

    fn process_untagged(&mut self, record: &ResponseRecord, skeleton: &Skeleton) -> Processed {
        if !self.greeted {
            return self.process_greeting(skeleton);
        }

        let Some(response) = parse_untagged(record) else {
            trace!("unclassified untagged record: {:?}", record.line_text());
            return Processed::Ignored;
        };

        match &response {
            UntaggedResponse::Capability(capabilities) => {
                self.capabilities = capabilities.clone();
            }
            UntaggedResponse::Cond { status, codes, .. } => {
                self.apply_codes(codes);
                if *status == RespStatus::Bye {
                    debug!("untagged BYE, session disconnecting");
                    self.state = ImapSessionState::Disconnected;
                }
            }
            _ => {}
        }

        Processed::Untagged(response)
    }

    fn process_greeting(&mut self, skeleton: &Skeleton) -> Processed {
        self.greeted = true;

        let mut reader = LineReader::for_text(&skeleton.text);
        let (codes, text) = parse_codes(&mut reader);
        self.apply_codes(&codes);

        let status = skeleton.status.unwrap_or(RespStatus::Ok);
        self.state = match status {
            RespStatus::PreAuth => ImapSessionState::Authenticated,
            RespStatus::Bye => ImapSessionState::Disconnected,
            _ => ImapSessionState::Connected,
        };

        Processed::Greeting { status, text }
    }

    fn process_tagged(&mut self, tag: String, skeleton: &Skeleton) -> Processed {
        let mut reader = LineReader::for_text(&skeleton.text);
        let (codes, text) = parse_codes(&mut reader);
        self.apply_codes(&codes);

        let Some(status) = skeleton.status else {
            debug!("tagged response without a status: {:?}", skeleton.text);
            return Processed::Ignored;
        };

        if let Some(kind) = self.pending.remove(&tag) {
            self.transition(&kind, status);
        }

        Processed::Tagged(TaggedResponse {
            tag,
            status,
            codes,
            text,
        })
    }

    fn transition(&mut self, kind: &PendingKind, status: RespStatus) {
        let ok = status == RespStatus::Ok;

        match kind {
            PendingKind::Login | PendingKind::Authenticate => {
                self.state = if ok {
                    ImapSessionState::Authenticated
                } else {
                    ImapSessionState::Connected
                };
                self.detector.set_authenticating(false);
            }
            PendingKind::Select(mailbox) | PendingKind::Examine(mailbox) => {
                if ok {
                    self.state = ImapSessionState::Selected(mailbox.encoded());
                }
            }
            PendingKind::Close => {
                if ok {
                    self.state = ImapSessionState::Authenticated;
                    self.selected = SelectedState::new();
                }
            }
            PendingKind::Logout => {
                self.state = ImapSessionState::Disconnected;
            }
            PendingKind::Idle | PendingKind::Other => {}
        }
    }

    fn apply_codes(&mut self, codes: &[ResponseCode]) {
        for code in codes {
            if let ResponseCode::Capability(tokens) = code {
                self.capabilities = CapabilitySet::from_tokens(tokens);
            }
        }
    }

    /// The session considers LOGIN/AUTHENTICATE to be in flight.
    pub fn begin_authentication(&mut self) {
        self.state = ImapSessionState::Authenticating;
        self.detector.set_authenticating(true);
    }
}

impl Default for ImapCore {
    fn default() -> Self {
        Self::new()
    }
}
