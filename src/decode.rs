//! The literal decoder: bytes in, response records out.
//!
//! Drives the [`TokenStream`] over incoming chunks and reassembles complete
//! response records, each carrying the line (with `{n}` markers left in
//! place), the ordered literal payloads, and a parsed skeleton when the line
//! has a recognizable shape. A record is emitted only once every literal it
//! declares has been fully received, so chunk boundaries never show through
//! to the parsers.

use log::debug;

use mail_types::response::{RecordKind, RespStatus, Skeleton};

use crate::{
    text::decode_text,
    token::{Token, TokenError, TokenStream},
};

/// One complete response as delivered by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRecord {
    /// The response line, trimmed, with literal markers in place of their
    /// payloads.
    pub line: Vec<u8>,
    /// Literal payloads in wire order; `line`'s markers index into this.
    pub literals: Vec<Vec<u8>>,
    pub skeleton: Option<Skeleton>,
}

impl ResponseRecord {
    pub fn line_text(&self) -> String {
        decode_text(&self.line).into_owned()
    }

    /// The tag of a tagged record.
    pub fn tag(&self) -> Option<&str> {
        match &self.skeleton {
            Some(Skeleton {
                kind: RecordKind::Tagged(tag),
                ..
            }) => Some(tag),
            _ => None,
        }
    }

    pub fn is_continuation(&self) -> bool {
        matches!(
            &self.skeleton,
            Some(Skeleton {
                kind: RecordKind::Continuation,
                ..
            })
        )
    }

    pub fn is_untagged(&self) -> bool {
        matches!(
            &self.skeleton,
            Some(Skeleton {
                kind: RecordKind::Untagged,
                ..
            })
        )
    }

    pub fn status(&self) -> Option<RespStatus> {
        self.skeleton.as_ref().and_then(|skeleton| skeleton.status)
    }
}

#[derive(Debug, Default)]
pub struct LiteralDecoder {
    stream: TokenStream,
    line: Vec<u8>,
    literals: Vec<Vec<u8>>,
    /// Payload collection state of the in-progress literal.
    current: Option<(usize, Vec<u8>)>,
}

impl LiteralDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and collect every record it completes.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<ResponseRecord> {
        self.stream.push(bytes);
        self.drain()
    }

    /// True while a partially received line or literal is buffered.
    pub fn has_pending_data(&self) -> bool {
        !self.line.is_empty() || self.current.is_some() || self.stream.unconsumed() > 0
    }

    fn drain(&mut self) -> Vec<ResponseRecord> {
        let mut records = Vec::new();

        loop {
            if let Some((remaining, mut payload)) = self.current.take() {
                let chunk = self.stream.read_literal_chunk(remaining);
                let taken = chunk.len();
                payload.extend_from_slice(chunk);

                if taken < remaining {
                    // Payload split across chunks; wait for more bytes.
                    self.current = Some((remaining - taken, payload));
                    break;
                }

                self.literals.push(payload);
            }

            match self.stream.read_token() {
                Ok(None) => break,
                Ok(Some(scanned)) => {
                    let src = self.stream.source_of_last(scanned.consumed);
                    match scanned.token {
                        Token::Eol => {
                            if let Some(record) = self.flush() {
                                records.push(record);
                            }
                        }
                        Token::Literal { length, .. } => {
                            self.line.extend_from_slice(&src);
                            self.current = Some((length as usize, Vec::new()));
                        }
                        _ => self.line.extend_from_slice(&src),
                    }
                }
                Err(TokenError::LiteralPending { remaining }) => {
                    // Re-arm collection; the loop head drains it.
                    self.current = Some((remaining, Vec::new()));
                }
                Err(TokenError::Malformed) => {
                    debug!(
                        "malformed response line dropped: {:?}",
                        decode_text(&self.line)
                    );
                    self.line.clear();
                    self.literals.clear();
                    self.stream.resync();
                }
            }
        }

        records
    }

    fn flush(&mut self) -> Option<ResponseRecord> {
        trim_ascii(&mut self.line);
        if self.line.is_empty() {
            self.literals.clear();
            return None;
        }

        let line = std::mem::take(&mut self.line);
        let literals = std::mem::take(&mut self.literals);
        let skeleton = parse_skeleton(&line);

        Some(ResponseRecord {
            line,
            literals,
            skeleton,
        })
    }
}

fn trim_ascii(line: &mut Vec<u8>) {
    while line.last().is_some_and(|b| b.is_ascii_whitespace()) {
        line.pop();
    }
    let leading = line
        .iter()
        .take_while(|b| b.is_ascii_whitespace())
        .count();
    line.drain(..leading);
}

/// Classifies a line as untagged, tagged, or continuation, and extracts the
/// status condition and free-form trailer.
fn parse_skeleton(line: &[u8]) -> Option<Skeleton> {
    let text = decode_text(line);
    let text = text.as_ref();

    if let Some(rest) = text.strip_prefix('*') {
        let rest = rest.trim_start();
        let (status, trailer) = split_status(rest);
        return Some(Skeleton {
            kind: RecordKind::Untagged,
            status,
            text: trailer.to_owned(),
        });
    }

    if let Some(rest) = text.strip_prefix('+') {
        return Some(Skeleton {
            kind: RecordKind::Continuation,
            status: None,
            text: rest.trim_start().to_owned(),
        });
    }

    let (tag, rest) = text.split_once(' ')?;
    if tag.is_empty() || !tag.bytes().all(|b| b.is_ascii_graphic()) {
        return None;
    }

    let (status, trailer) = split_status(rest.trim_start());
    Some(Skeleton {
        kind: RecordKind::Tagged(tag.to_owned()),
        status,
        text: trailer.to_owned(),
    })
}

fn split_status(rest: &str) -> (Option<RespStatus>, &str) {
    let word = rest.split(' ').next().unwrap_or("");
    match RespStatus::parse(word) {
        Some(status) => (Some(status), rest[word.len()..].trim_start()),
        None => (None, rest),
    }
}
