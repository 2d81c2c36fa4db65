//! POP3 response decoding.

use log::debug;

use mail_types::{capability::CapabilitySet, state::Pop3SessionState};

use crate::{
    line::LineBuffer,
    redact::{Protocol, SecretDetector, Span},
    text::decode_text,
};

/// The status indicator of a POP3 response line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pop3Status {
    Ok,
    Err,
    /// `+ ` alone: the server wants more SASL data.
    Continuation,
}

/// One single-line response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pop3Response {
    pub status: Pop3Status,
    pub message: String,
}

impl Pop3Response {
    /// Parses `+OK ...`, `-ERR ...`, or `+ ...`.
    pub fn parse(line: &[u8]) -> Option<Self> {
        let text = decode_text(line);
        let text = text.as_ref();

        if let Some(rest) = text.strip_prefix("+OK") {
            return Some(Self {
                status: Pop3Status::Ok,
                message: rest.trim_start().to_owned(),
            });
        }
        if let Some(rest) = text.strip_prefix("-ERR") {
            return Some(Self {
                status: Pop3Status::Err,
                message: rest.trim_start().to_owned(),
            });
        }
        if let Some(rest) = text.strip_prefix('+') {
            return Some(Self {
                status: Pop3Status::Continuation,
                message: rest.trim_start().to_owned(),
            });
        }

        None
    }

    pub fn is_ok(&self) -> bool {
        self.status == Pop3Status::Ok
    }

    /// The `<...>` timestamp an APOP-capable greeting embeds.
    pub fn apop_challenge(&self) -> Option<String> {
        let start = self.message.find('<')?;
        let end = self.message[start..].find('>')? + start;
        Some(self.message[start..=end].to_owned())
    }
}

/// A decoded server event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pop3Event {
    Response(Pop3Response),
    /// A dot-unstuffed text body, one entry per line.
    Multiline {
        response: Pop3Response,
        lines: Vec<String>,
    },
    /// The byte-preserving variant for RETR/TOP: embedded CRLFs intact, for
    /// a MIME parser downstream.
    MultilineBytes {
        response: Pop3Response,
        data: Vec<u8>,
    },
}

#[derive(Debug)]
enum DecodeMode {
    SingleLine,
    AwaitStatus { preserve: bool },
    Collect {
        response: Pop3Response,
        lines: Vec<String>,
        data: Vec<u8>,
        preserve: bool,
    },
}

/// The protocol state shared by both POP3 drivers: line framing, multiline
/// accumulation, session state, capabilities, and outbound redaction.
#[derive(Debug)]
pub struct Pop3Core {
    buffer: LineBuffer,
    mode: DecodeMode,
    pub state: Pop3SessionState,
    pub capabilities: CapabilitySet,
    pub apop_challenge: Option<String>,
    detector: SecretDetector,
}

impl Pop3Core {
    pub fn new() -> Self {
        Self {
            buffer: LineBuffer::new(),
            mode: DecodeMode::SingleLine,
            state: Pop3SessionState::Disconnected,
            capabilities: CapabilitySet::new(),
            apop_challenge: None,
            detector: SecretDetector::new(Protocol::Pop3),
        }
    }

    /// Arms the multiline decoder for the next command's response.
    pub fn expect_multiline(&mut self, preserve_bytes: bool) {
        self.mode = DecodeMode::AwaitStatus {
            preserve: preserve_bytes,
        };
    }

    pub fn set_authenticating(&mut self, on: bool) {
        self.detector.set_authenticating(on);
    }

    /// Spans of an outbound batch the logger must redact.
    pub fn scan_outbound(&mut self, bytes: &[u8]) -> Vec<Span> {
        self.detector.scan(bytes)
    }

    /// Records the greeting's APOP timestamp and moves to `Connected`.
    pub fn accept_greeting(&mut self, response: &Pop3Response) {
        self.apop_challenge = response.apop_challenge();
        self.state = Pop3SessionState::Connected;
    }

    /// Feeds server bytes and returns every completed event.
    pub fn absorb(&mut self, bytes: &[u8]) -> Vec<Pop3Event> {
        let mut events = Vec::new();

        for line in self.buffer.push(bytes) {
            if let Some(event) = self.absorb_line(line) {
                events.push(event);
            }
        }

        events
    }

    fn absorb_line(&mut self, line: Vec<u8>) -> Option<Pop3Event> {
        match &mut self.mode {
            DecodeMode::SingleLine => match Pop3Response::parse(&line) {
                Some(response) => Some(Pop3Event::Response(response)),
                None => {
                    debug!("unparseable POP3 line dropped: {:?}", decode_text(&line));
                    None
                }
            },

            DecodeMode::AwaitStatus { preserve } => {
                let preserve = *preserve;
                let response = match Pop3Response::parse(&line) {
                    Some(response) => response,
                    None => {
                        debug!("unparseable POP3 status dropped: {:?}", decode_text(&line));
                        self.mode = DecodeMode::SingleLine;
                        return None;
                    }
                };

                if response.is_ok() {
                    self.mode = DecodeMode::Collect {
                        response,
                        lines: Vec::new(),
                        data: Vec::new(),
                        preserve,
                    };
                    None
                } else {
                    // No body follows a rejection.
                    self.mode = DecodeMode::SingleLine;
                    Some(Pop3Event::Response(response))
                }
            }

            DecodeMode::Collect {
                response,
                lines,
                data,
                preserve,
            } => {
                if line == b"." {
                    let event = if *preserve {
                        Pop3Event::MultilineBytes {
                            response: response.clone(),
                            data: std::mem::take(data),
                        }
                    } else {
                        Pop3Event::Multiline {
                            response: response.clone(),
                            lines: std::mem::take(lines),
                        }
                    };
                    self.mode = DecodeMode::SingleLine;
                    return Some(event);
                }

                // Reverse dot-stuffing.
                let payload: &[u8] = if line.starts_with(b"..") {
                    &line[1..]
                } else {
                    &line
                };

                if *preserve {
                    data.extend_from_slice(payload);
                    data.extend_from_slice(b"\r\n");
                } else {
                    lines.push(decode_text(payload).into_owned());
                }
                None
            }
        }
    }
}

impl Default for Pop3Core {
    fn default() -> Self {
        Self::new()
    }
}
