//! The authentication-secret detector.
//!
//! A byte-level state machine run over every outbound batch while an
//! authentication command is in flight. It marks the spans the protocol
//! logger must replace before anything reaches a log sink. Byte-level,
//! because LOGIN's password may arrive as an atom, a quoted string, or a
//! synchronizing literal whose payload is split across batches; a detector
//! that waited for a complete line would already have leaked the bytes.
//!
//! On malformed input the detector latches into an error state and marks
//! nothing further until authentication ends. Over-redaction is harmless;
//! under-redaction is not, which is why the keyword path errs on marking
//! whole argument spans.

/// A half-open byte range relative to one `scan` batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub length: usize,
}

/// Which command vocabulary the detector listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Imap,
    Pop3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// IMAP: reading the tag. POP3: reading the keyword directly.
    LineStart,
    /// IMAP only: reading the keyword after the tag's space.
    Keyword,
    /// Between arguments; `remaining == u8::MAX` means "rest of line".
    ArgGap { remaining: u8 },
    AtomArg { remaining: u8 },
    QuotedArg { remaining: u8, escaped: bool },
    /// Inside `{...}` of a literal argument.
    LiteralLen { length: usize, remaining: u8, plus: bool },
    /// After `}`, waiting for the LF that starts the payload.
    LiteralEol { length: usize, remaining: u8 },
    LiteralPayload { left: usize, remaining: u8 },
    /// AUTHENTICATE/AUTH: skipping the mechanism name.
    Mechanism,
    /// Redacting the rest of the line (initial responses, PASS, APOP).
    RestOfLine,
    /// An uninteresting command: wait out the line without marking.
    SkipLine,
    /// A full continuation line is a SASL payload: redact it entirely.
    ContinuationLine,
    Error,
}

#[derive(Debug)]
pub struct SecretDetector {
    protocol: Protocol,
    authenticating: bool,
    state: State,
    /// Set once an AUTHENTICATE/AUTH command line completes: every following
    /// outbound line is a SASL exchange step.
    continuations_armed: bool,
    keyword: String,
}

impl SecretDetector {
    pub fn new(protocol: Protocol) -> Self {
        Self {
            protocol,
            authenticating: false,
            state: State::LineStart,
            continuations_armed: false,
            keyword: String::new(),
        }
    }

    pub fn is_authenticating(&self) -> bool {
        self.authenticating
    }

    /// Arms or clears the detector. Clearing resets any error latch and the
    /// continuation mode.
    pub fn set_authenticating(&mut self, on: bool) {
        self.authenticating = on;
        self.state = State::LineStart;
        self.continuations_armed = false;
        self.keyword.clear();
    }

    /// Scans one outbound batch and returns the spans to redact, relative to
    /// this batch.
    pub fn scan(&mut self, bytes: &[u8]) -> Vec<Span> {
        if !self.authenticating {
            return Vec::new();
        }

        let mut spans = SpanBuilder::new();

        for (at, byte) in bytes.iter().copied().enumerate() {
            self.step(at, byte, &mut spans);
        }

        spans.finish()
    }

    fn step(&mut self, at: usize, byte: u8, spans: &mut SpanBuilder) {
        match &mut self.state {
            State::Error => {}

            State::LineStart => {
                if self.continuations_armed {
                    self.state = State::ContinuationLine;
                    self.step(at, byte, spans);
                    return;
                }

                match self.protocol {
                    Protocol::Imap => {
                        // The tag runs to the first space.
                        if byte == b' ' {
                            self.keyword.clear();
                            self.state = State::Keyword;
                        } else if byte == b'\n' {
                            // Stray newline; stay at line start.
                        } else if !byte.is_ascii_graphic() {
                            self.state = State::Error;
                        }
                    }
                    Protocol::Pop3 => {
                        self.keyword.clear();
                        self.state = State::Keyword;
                        self.step(at, byte, spans);
                    }
                }
            }

            State::Keyword => match byte {
                b' ' => self.dispatch_keyword(false),
                b'\r' => {}
                b'\n' => self.dispatch_keyword(true),
                _ => {
                    if self.keyword.len() > 16 {
                        self.state = State::Error;
                    } else {
                        self.keyword.push(byte.to_ascii_uppercase() as char);
                    }
                }
            },

            State::ArgGap { remaining } => {
                let remaining = *remaining;
                match byte {
                    b' ' => {}
                    b'\r' => {}
                    b'\n' => self.end_line(),
                    b'"' => self.state = State::QuotedArg { remaining, escaped: false },
                    b'{' => {
                        self.state = State::LiteralLen {
                            length: 0,
                            remaining,
                            plus: false,
                        }
                    }
                    _ => {
                        spans.mark(at);
                        self.state = State::AtomArg { remaining };
                    }
                }
            }

            State::AtomArg { remaining } => {
                let remaining = *remaining;
                match byte {
                    b' ' => self.next_arg(remaining),
                    b'\r' => {}
                    b'\n' => self.end_line(),
                    _ => spans.mark(at),
                }
            }

            State::QuotedArg { remaining, escaped } => {
                if *escaped {
                    *escaped = false;
                    spans.mark(at);
                    return;
                }

                let remaining = *remaining;
                match byte {
                    b'"' => self.next_arg(remaining),
                    b'\\' => {
                        spans.mark(at);
                        if let State::QuotedArg { escaped, .. } = &mut self.state {
                            *escaped = true;
                        }
                    }
                    b'\r' | b'\n' => self.state = State::Error,
                    _ => spans.mark(at),
                }
            }

            State::LiteralLen {
                length,
                remaining,
                plus,
            } => match byte {
                b'0'..=b'9' if !*plus => {
                    *length = length
                        .saturating_mul(10)
                        .saturating_add(usize::from(byte - b'0'));
                }
                b'+' => *plus = true,
                b'}' => {
                    let (length, remaining) = (*length, *remaining);
                    self.state = State::LiteralEol { length, remaining };
                }
                _ => self.state = State::Error,
            },

            State::LiteralEol { length, remaining } => match byte {
                b'\r' => {}
                b'\n' => {
                    let (length, remaining) = (*length, *remaining);
                    if length == 0 {
                        self.next_arg(remaining);
                    } else {
                        self.state = State::LiteralPayload {
                            left: length,
                            remaining,
                        };
                    }
                }
                _ => self.state = State::Error,
            },

            State::LiteralPayload { left, remaining } => {
                spans.mark(at);
                *left -= 1;
                if *left == 0 {
                    let remaining = *remaining;
                    self.next_arg(remaining);
                }
            }

            State::Mechanism => match byte {
                b' ' => self.state = State::RestOfLine,
                b'\r' => {}
                b'\n' => self.end_line(),
                _ => {}
            },

            State::RestOfLine => match byte {
                b'\r' => {}
                b'\n' => self.end_line(),
                _ => spans.mark(at),
            },

            State::SkipLine => {
                if byte == b'\n' {
                    self.state = State::LineStart;
                }
            }

            State::ContinuationLine => match byte {
                b'\r' => {}
                b'\n' => self.state = State::LineStart,
                _ => spans.mark(at),
            },
        }
    }

    fn dispatch_keyword(&mut self, line_ended: bool) {
        let keyword = self.keyword.as_str();
        let next = match (self.protocol, keyword) {
            // Two arguments, each atom/quoted/literal, both marked.
            (Protocol::Imap, "LOGIN") => State::ArgGap { remaining: 2 },
            (Protocol::Imap, "AUTHENTICATE") => {
                self.continuations_armed = true;
                State::Mechanism
            }
            (Protocol::Pop3, "USER") => State::ArgGap { remaining: 1 },
            (Protocol::Pop3, "PASS") => State::RestOfLine,
            (Protocol::Pop3, "APOP") => State::RestOfLine,
            (Protocol::Pop3, "AUTH") => {
                self.continuations_armed = true;
                State::Mechanism
            }
            _ => State::SkipLine,
        };

        self.state = if line_ended { State::LineStart } else { next };
    }

    /// One argument finished; either expect the next or wait for the line
    /// end.
    fn next_arg(&mut self, remaining: u8) {
        self.state = if remaining == u8::MAX {
            State::ArgGap { remaining }
        } else if remaining > 1 {
            State::ArgGap {
                remaining: remaining - 1,
            }
        } else {
            State::SkipLine
        };
    }

    fn end_line(&mut self) {
        self.state = State::LineStart;
    }
}

/// Coalesces consecutive marked offsets into spans.
struct SpanBuilder {
    spans: Vec<Span>,
    open: Option<(usize, usize)>,
}

impl SpanBuilder {
    fn new() -> Self {
        Self {
            spans: Vec::new(),
            open: None,
        }
    }

    fn mark(&mut self, at: usize) {
        match &mut self.open {
            Some((_, end)) if *end == at => *end = at + 1,
            Some((start, end)) => {
                self.spans.push(Span {
                    start: *start,
                    length: *end - *start,
                });
                self.open = Some((at, at + 1));
            }
            None => self.open = Some((at, at + 1)),
        }
    }

    fn finish(mut self) -> Vec<Span> {
        if let Some((start, end)) = self.open.take() {
            self.spans.push(Span {
                start,
                length: end - start,
            });
        }
        self.spans
    }
}

/// Replaces the marked spans for logging.
pub fn redact(bytes: &[u8], spans: &[Span], replacement: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut at = 0;

    for span in spans {
        if span.start > at {
            out.extend_from_slice(&bytes[at..span.start]);
        }
        out.extend_from_slice(replacement.as_bytes());
        at = span.start + span.length;
    }
    if at < bytes.len() {
        out.extend_from_slice(&bytes[at..]);
    }

    out
}
