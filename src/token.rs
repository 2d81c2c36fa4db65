//! The IMAP lexical stream.
//!
//! One nom streaming lexer core is shared by the incremental tokenizer and
//! the line reader, so "not enough data yet" falls out as
//! [`nom::Err::Incomplete`] rather than a failure. [`TokenStream`] wraps it
//! into the incremental tokenizer the literal decoder drives: bytes go in
//! via [`TokenStream::push`], tokens come out one
//! [`TokenStream::read_token`] at a time, and after a literal header `{n}`
//! exactly `n` raw payload bytes must be pulled through
//! [`TokenStream::read_literal_chunk`] before tokenizing resumes.

use std::str::from_utf8;

use nom::{
    branch::alt,
    bytes::streaming::{take_while, take_while1},
    character::streaming::char,
    combinator::{map, opt, value},
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

use crate::text::decode_text;

/// One lexical element of a response line.
///
/// Atoms, quoted strings, and flags carry decoded text. A literal carries
/// only its declared length and the index of its payload within the
/// enclosing line, so binary payloads never force a text decoding decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Atom(String),
    Quoted(String),
    /// `\Name`; the name is stored without the backslash. `\*` is
    /// `Flag("*")`.
    Flag(String),
    Literal {
        index: usize,
        length: u32,
        /// `false` for a non-synchronizing `{n+}` header.
        sync: bool,
    },
    Nil,
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Asterisk,
    /// LF (or CRLF) terminated the line.
    Eol,
}

impl Token {
    /// The decoded text of an atom, quoted string, or flag.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Atom(text) | Self::Quoted(text) | Self::Flag(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum TokenError {
    #[error("Malformed token")]
    Malformed,
    #[error("A literal payload of {remaining} bytes must be consumed first")]
    LiteralPending { remaining: usize },
}

/// Atom bytes: printable ASCII minus the specials `()[]{%*"\`.
///
/// Both brackets are specials here so `BODY[HEADER]` splits into an atom
/// and explicit bracket tokens, and response codes close on a bare `]`.
fn is_atom_byte(b: u8) -> bool {
    matches!(b, 0x21..=0x7e)
        && !matches!(
            b,
            b'(' | b')' | b'{' | b'%' | b'*' | b'"' | b'\\' | b'[' | b']'
        )
}

/// A lexed token plus the byte count consumed from the input, leading
/// whitespace included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scanned {
    pub token: Token,
    pub consumed: usize,
}

/// Raw output of the lexer core, before literal indices are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RawToken {
    Atom(String),
    Quoted(String),
    Flag(String),
    LiteralHeader { length: u32, sync: bool },
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    Asterisk,
    Eol,
}

fn atom(input: &[u8]) -> IResult<&[u8], RawToken> {
    map(take_while1(is_atom_byte), |bytes: &[u8]| {
        // Safety: `unwrap` can't panic, atom bytes are ASCII.
        RawToken::Atom(from_utf8(bytes).unwrap().to_owned())
    })(input)
}

fn quoted(input: &[u8]) -> IResult<&[u8], RawToken> {
    map(
        delimited(char('"'), quoted_inner, char('"')),
        RawToken::Quoted,
    )(input)
}

/// The characters between the quotes, unescaped.
fn quoted_inner(input: &[u8]) -> IResult<&[u8], String> {
    let mut out = Vec::new();
    let mut rest = input;

    loop {
        match rest.first() {
            None => {
                return Err(nom::Err::Incomplete(nom::Needed::new(1)));
            }
            Some(b'"') => break,
            Some(b'\\') => match rest.get(1) {
                None => return Err(nom::Err::Incomplete(nom::Needed::new(1))),
                Some(b @ (b'\\' | b'"')) => {
                    out.push(*b);
                    rest = &rest[2..];
                }
                Some(_) => {
                    return Err(nom::Err::Error(nom::error::Error::new(
                        rest,
                        nom::error::ErrorKind::Escaped,
                    )));
                }
            },
            Some(b'\r' | b'\n') => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    rest,
                    nom::error::ErrorKind::Char,
                )));
            }
            Some(b) => {
                out.push(*b);
                rest = &rest[1..];
            }
        }
    }

    Ok((rest, decode_text(&out).into_owned()))
}

/// `{n}` or `{n+}`, the marker alone.
fn literal_marker(input: &[u8]) -> IResult<&[u8], RawToken> {
    map(
        delimited(
            char('{'),
            tuple((nom::character::streaming::u32, opt(char('+')))),
            char('}'),
        ),
        |(length, plus)| RawToken::LiteralHeader {
            length,
            sync: plus.is_none(),
        },
    )(input)
}

/// The on-wire form: the marker must be followed by exactly one line break
/// (CR optional) before the payload starts.
fn literal_header(input: &[u8]) -> IResult<&[u8], RawToken> {
    terminated(literal_marker, tuple((opt(char('\r')), char('\n'))))(input)
}

fn flag(input: &[u8]) -> IResult<&[u8], RawToken> {
    preceded(
        char('\\'),
        alt((
            value(RawToken::Flag(String::from("*")), char('*')),
            map(take_while1(is_atom_byte), |bytes: &[u8]| {
                // Safety: `unwrap` can't panic, atom bytes are ASCII.
                RawToken::Flag(from_utf8(bytes).unwrap().to_owned())
            }),
        )),
    )(input)
}

/// The lexer core: leading `SP`/`CR` padding, then one token.
///
/// The streaming variant requires a literal marker to be followed by its
/// CRLF (the payload comes next on the wire); the line variant lexes bare
/// markers, since a reassembled line keeps markers but not payloads.
fn lex_with(
    literal: fn(&[u8]) -> IResult<&[u8], RawToken>,
) -> impl Fn(&[u8]) -> IResult<&[u8], RawToken> {
    move |input| {
        preceded(
            take_while(|b| b == b' ' || b == b'\r'),
            alt((
                value(RawToken::Eol, char('\n')),
                value(RawToken::OpenParen, char('(')),
                value(RawToken::CloseParen, char(')')),
                value(RawToken::OpenBracket, char('[')),
                value(RawToken::CloseBracket, char(']')),
                value(RawToken::Asterisk, char('*')),
                literal,
                flag,
                quoted,
                atom,
            )),
        )(input)
    }
}

fn lex_stream(input: &[u8]) -> IResult<&[u8], RawToken> {
    lex_with(literal_header)(input)
}

fn lex_line(input: &[u8]) -> IResult<&[u8], RawToken> {
    lex_with(literal_marker)(input)
}

fn finish(raw: RawToken, literal_count: &mut usize) -> Token {
    match raw {
        RawToken::Atom(text) => {
            if text.eq_ignore_ascii_case("NIL") {
                Token::Nil
            } else {
                Token::Atom(text)
            }
        }
        RawToken::Quoted(text) => Token::Quoted(text),
        RawToken::Flag(name) => Token::Flag(name),
        RawToken::LiteralHeader { length, sync } => {
            let index = *literal_count;
            *literal_count += 1;
            Token::Literal {
                index,
                length,
                sync,
            }
        }
        RawToken::OpenParen => Token::OpenParen,
        RawToken::CloseParen => Token::CloseParen,
        RawToken::OpenBracket => Token::OpenBracket,
        RawToken::CloseBracket => Token::CloseBracket,
        RawToken::Asterisk => Token::Asterisk,
        RawToken::Eol => Token::Eol,
    }
}

/// Lexes one token of an assembled line at `pos`. Returns the token and the
/// position after it, or `None` at a malformed tail.
pub(crate) fn lex_line_at(
    buf: &[u8],
    pos: usize,
    literal_count: &mut usize,
) -> Option<(Token, usize)> {
    let input = &buf[pos..];
    match lex_line(input) {
        Ok((rest, raw)) => {
            let next = pos + (input.len() - rest.len());
            Some((finish(raw, literal_count), next))
        }
        Err(_) => None,
    }
}

/// The incremental token stream.
///
/// Owns a growing byte buffer. `push` appends network bytes; `read_token`
/// lexes from the current position and returns `Ok(None)` while the buffer
/// holds no complete token. Literal payload bytes are not tokenized: after a
/// literal header token the caller drains them via `read_literal_chunk`.
#[derive(Debug, Default)]
pub struct TokenStream {
    buf: Vec<u8>,
    pos: usize,
    /// Remaining payload bytes of the literal whose header was returned last.
    pending_literal: Option<usize>,
    /// Index the next literal on this line will get.
    literal_count: usize,
    /// Set after a malformed token: discard input until the next LF.
    skipping: bool,
}

/// Compact once this many consumed bytes accumulate at the buffer front.
const COMPACT_THRESHOLD: usize = 8 * 1024;

impl TokenStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.compact();
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes that have been pushed but not yet consumed.
    pub fn unconsumed(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Remaining byte count of the in-progress literal, if any.
    pub fn pending_literal(&self) -> Option<usize> {
        self.pending_literal
    }

    /// Lex the next token. `Ok(None)` means more input is needed.
    pub fn read_token(&mut self) -> Result<Option<Scanned>, TokenError> {
        if let Some(remaining) = self.pending_literal {
            if remaining > 0 {
                return Err(TokenError::LiteralPending { remaining });
            }
            self.pending_literal = None;
        }

        if self.skipping && !self.skip_to_line() {
            return Ok(None);
        }

        let input = &self.buf[self.pos..];
        match lex_stream(input) {
            Ok((rest, raw)) => {
                let consumed = input.len() - rest.len();
                self.pos += consumed;

                let token = finish(raw, &mut self.literal_count);
                match token {
                    Token::Literal { length, .. } => {
                        self.pending_literal = Some(length as usize);
                    }
                    Token::Eol => {
                        self.literal_count = 0;
                    }
                    _ => {}
                }

                Ok(Some(Scanned { token, consumed }))
            }
            Err(nom::Err::Incomplete(_)) => Ok(None),
            Err(_) => Err(TokenError::Malformed),
        }
    }

    /// The source bytes of the most recent `read_token` result.
    ///
    /// `consumed` is the `Scanned::consumed` count; CR and LF bytes are
    /// stripped so a reassembled line never embeds line breaks.
    pub fn source_of_last(&self, consumed: usize) -> Vec<u8> {
        self.buf[self.pos - consumed..self.pos]
            .iter()
            .copied()
            .filter(|b| *b != b'\r' && *b != b'\n')
            .collect()
    }

    /// Drain up to `max` bytes of the pending literal payload.
    ///
    /// Returns the empty slice when no buffered payload bytes are available
    /// yet; the caller re-enters after the next `push`.
    pub fn read_literal_chunk(&mut self, max: usize) -> &[u8] {
        let Some(remaining) = self.pending_literal else {
            return &[];
        };

        let available = self.buf.len() - self.pos;
        let take = remaining.min(max).min(available);

        let start = self.pos;
        self.pos += take;
        self.pending_literal = Some(remaining - take);

        &self.buf[start..start + take]
    }

    /// Enter resync mode: drop everything up to and including the next LF.
    pub fn resync(&mut self) {
        self.skipping = true;
        self.pending_literal = None;
        self.literal_count = 0;
    }

    fn skip_to_line(&mut self) -> bool {
        match self.buf[self.pos..].iter().position(|b| *b == b'\n') {
            Some(at) => {
                self.pos += at + 1;
                self.skipping = false;
                true
            }
            None => {
                self.pos = self.buf.len();
                false
            }
        }
    }

    fn compact(&mut self) {
        if self.pos > COMPACT_THRESHOLD {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(stream: &mut TokenStream) -> Vec<Token> {
        let mut out = Vec::new();
        loop {
            match stream.read_token() {
                Ok(Some(scanned)) => out.push(scanned.token),
                Ok(None) => break,
                Err(TokenError::LiteralPending { remaining }) => {
                    let mut left = remaining;
                    while left > 0 {
                        let chunk = stream.read_literal_chunk(left).to_vec();
                        if chunk.is_empty() {
                            return out;
                        }
                        left -= chunk.len();
                    }
                }
                Err(TokenError::Malformed) => {
                    stream.resync();
                }
            }
        }
        out
    }

    #[test]
    fn test_basic_tokens() {
        let mut stream = TokenStream::new();
        stream.push(b"* 1 FETCH (FLAGS (\\Seen \\*) UID 42)\r\n");

        let got = drain(&mut stream);
        let expected = vec![
            Token::Asterisk,
            Token::Atom("1".into()),
            Token::Atom("FETCH".into()),
            Token::OpenParen,
            Token::Atom("FLAGS".into()),
            Token::OpenParen,
            Token::Flag("Seen".into()),
            Token::Flag("*".into()),
            Token::CloseParen,
            Token::Atom("UID".into()),
            Token::Atom("42".into()),
            Token::CloseParen,
            Token::Eol,
        ];
        assert_eq!(expected, got);
    }

    #[test]
    fn test_quoted_with_escapes() {
        let mut stream = TokenStream::new();
        stream.push(b"\"p@ss w\\\"ord\" \"a\\\\b\"\r\n");

        let got = drain(&mut stream);
        assert_eq!(
            vec![
                Token::Quoted("p@ss w\"ord".into()),
                Token::Quoted("a\\b".into()),
                Token::Eol,
            ],
            got
        );
    }

    #[test]
    fn test_nil_and_brackets() {
        let mut stream = TokenStream::new();
        stream.push(b"BODY[HEADER.FIELDS (FROM)] nil NIL\r\n");

        let got = drain(&mut stream);
        assert_eq!(
            vec![
                Token::Atom("BODY".into()),
                Token::OpenBracket,
                Token::Atom("HEADER.FIELDS".into()),
                Token::OpenParen,
                Token::Atom("FROM".into()),
                Token::CloseParen,
                Token::CloseBracket,
                Token::Nil,
                Token::Nil,
                Token::Eol,
            ],
            got
        );
    }

    #[test]
    fn test_literal_suspension() {
        let mut stream = TokenStream::new();
        stream.push(b"a {5}\r\nHE");

        assert_eq!(
            Token::Atom("a".into()),
            stream.read_token().unwrap().unwrap().token
        );
        let literal = stream.read_token().unwrap().unwrap().token;
        assert_eq!(
            Token::Literal {
                index: 0,
                length: 5,
                sync: true
            },
            literal
        );

        // Only two payload bytes are buffered.
        assert_eq!(b"HE", stream.read_literal_chunk(5));
        assert_eq!(
            Err(TokenError::LiteralPending { remaining: 3 }),
            stream.read_token()
        );

        stream.push(b"LLO b\r\n");
        assert_eq!(b"LLO", stream.read_literal_chunk(5));
        assert_eq!(
            Token::Atom("b".into()),
            stream.read_token().unwrap().unwrap().token
        );
    }

    #[test]
    fn test_non_sync_literal_and_zero_length() {
        let mut stream = TokenStream::new();
        stream.push(b"{3+}\r\nabc {0}\r\n x\r\n");

        assert_eq!(
            Token::Literal {
                index: 0,
                length: 3,
                sync: false
            },
            stream.read_token().unwrap().unwrap().token
        );
        assert_eq!(b"abc", stream.read_literal_chunk(3));
        assert_eq!(
            Token::Literal {
                index: 1,
                length: 0,
                sync: true
            },
            stream.read_token().unwrap().unwrap().token
        );
        // A {0} literal never blocks.
        assert_eq!(
            Token::Atom("x".into()),
            stream.read_token().unwrap().unwrap().token
        );
    }

    #[test]
    fn test_incomplete_atom_waits_for_more() {
        let mut stream = TokenStream::new();
        stream.push(b"FET");

        // The atom may continue in the next chunk.
        assert_eq!(Ok(None), stream.read_token());

        stream.push(b"CH \r\n");
        assert_eq!(
            Token::Atom("FETCH".into()),
            stream.read_token().unwrap().unwrap().token
        );
    }

    #[test]
    fn test_malformed_then_resync() {
        let mut stream = TokenStream::new();
        stream.push(b"\"unterminated\r\ngood\r\n");

        assert_eq!(Err(TokenError::Malformed), stream.read_token());
        stream.resync();
        assert_eq!(
            Token::Atom("good".into()),
            stream.read_token().unwrap().unwrap().token
        );
    }

    #[test]
    fn test_compaction_keeps_lexing() {
        let mut stream = TokenStream::new();

        for _ in 0..2_000 {
            stream.push(b"ATOM1 ATOM2\r\n");
            while let Ok(Some(_)) = stream.read_token() {}
        }

        // The consumed prefix must have been dropped along the way.
        assert!(stream.buf.len() < 16 * 1024);
    }
}
