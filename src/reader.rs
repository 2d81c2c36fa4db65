//! A non-incremental token reader over one assembled response line.
//!
//! Built on the same lexer core as the streaming tokenizer, but fed a
//! complete line plus the record's literal payloads, so every read either
//! yields a token or hits the end of the line. All response parsers consume
//! this reader; none of them re-implement quoting or literal handling.

use std::str::FromStr;

use mail_types::utils::escape_quoted;

use crate::{
    decode::ResponseRecord,
    text::decode_text,
    token::{lex_line_at, Token},
};

#[derive(Debug)]
pub struct LineReader<'a> {
    /// The line with a CRLF appended, so the streaming lexer always
    /// terminates.
    buf: Vec<u8>,
    pos: usize,
    literals: &'a [Vec<u8>],
    literal_count: usize,
}

impl<'a> LineReader<'a> {
    pub fn new(line: &[u8], literals: &'a [Vec<u8>]) -> Self {
        let mut buf = Vec::with_capacity(line.len() + 2);
        buf.extend_from_slice(line);
        buf.extend_from_slice(b"\r\n");

        Self {
            buf,
            pos: 0,
            literals,
            literal_count: 0,
        }
    }

    pub fn for_record(record: &'a ResponseRecord) -> Self {
        Self::new(&record.line, &record.literals)
    }

    /// For re-parsing canonical text that holds no literal references.
    pub fn for_text(text: &str) -> LineReader<'static> {
        LineReader::new(text.as_bytes(), &[])
    }

    /// The payload a literal token refers to.
    pub fn literal(&self, index: usize) -> Option<&'a [u8]> {
        self.literals.get(index).map(|payload| payload.as_slice())
    }

    /// Reads the next token. `None` once the line is exhausted or on a
    /// malformed tail; parsers treat both as "absent".
    pub fn read_token(&mut self) -> Option<Token> {
        let (token, next) = lex_line_at(&self.buf, self.pos, &mut self.literal_count)?;
        if token == Token::Eol {
            // Stay put so repeated reads keep reporting the end.
            return None;
        }

        self.pos = next;
        Some(token)
    }

    pub fn peek_token(&mut self) -> Option<Token> {
        let mut count = self.literal_count;
        let (token, _) = lex_line_at(&self.buf, self.pos, &mut count)?;
        if token == Token::Eol {
            return None;
        }

        Some(token)
    }

    pub fn at_end(&mut self) -> bool {
        self.peek_token().is_none()
    }

    /// A number from an atom or quoted string; NIL reads as absent.
    pub fn read_number<N: FromStr>(&mut self) -> Option<N> {
        match self.read_token()? {
            Token::Atom(text) | Token::Quoted(text) => text.parse().ok(),
            _ => None,
        }
    }

    /// The string form of an atom, quoted string, flag, or literal; NIL
    /// reads as absent.
    pub fn read_nstring(&mut self) -> Option<String> {
        match self.read_token()? {
            Token::Atom(text) | Token::Quoted(text) => Some(text),
            Token::Flag(name) => Some(format!("\\{}", name)),
            Token::Literal { index, .. } => self
                .literal(index)
                .map(|payload| decode_text(payload).into_owned()),
            _ => None,
        }
    }

    /// Like [`read_nstring`](Self::read_nstring) but keeps literal payloads
    /// as raw bytes.
    pub fn read_nstring_bytes(&mut self) -> Option<Vec<u8>> {
        match self.read_token()? {
            Token::Atom(text) | Token::Quoted(text) => Some(text.into_bytes()),
            Token::Flag(name) => Some(format!("\\{}", name).into_bytes()),
            Token::Literal { index, .. } => self.literal(index).map(|payload| payload.to_vec()),
            _ => None,
        }
    }

    /// Serializes the next value back to canonical IMAP syntax. A value is
    /// one token, or a whole balanced `(...)` / `[...]` subtree.
    ///
    /// With `materialize_literals`, a literal reference is replaced by its
    /// payload re-quoted as a `"..."` string; otherwise the `{n}` marker is
    /// kept.
    pub fn read_value_string(&mut self, materialize_literals: bool) -> Option<String> {
        let token = self.read_token()?;
        self.serialize_value(token, materialize_literals)
    }

    fn serialize_value(&mut self, token: Token, materialize: bool) -> Option<String> {
        match token {
            Token::OpenParen => self.serialize_group(Token::CloseParen, "(", ")", materialize),
            Token::OpenBracket => self.serialize_group(Token::CloseBracket, "[", "]", materialize),
            other => Some(self.serialize_single(&other, materialize)),
        }
    }

    fn serialize_group(
        &mut self,
        close: Token,
        open_text: &str,
        close_text: &str,
        materialize: bool,
    ) -> Option<String> {
        let mut out = String::from(open_text);
        let mut first = true;

        loop {
            let token = self.read_token()?;
            if token == close {
                out.push_str(close_text);
                return Some(out);
            }

            let item = self.serialize_value(token, materialize)?;
            if !first && !out.ends_with('(') && !out.ends_with('[') {
                out.push(' ');
            }
            out.push_str(&item);
            first = false;
        }
    }

    fn serialize_single(&mut self, token: &Token, materialize: bool) -> String {
        match token {
            Token::Atom(text) => text.clone(),
            Token::Quoted(text) => format!("\"{}\"", escape_quoted(text)),
            Token::Flag(name) => format!("\\{}", name),
            Token::Nil => String::from("NIL"),
            Token::Asterisk => String::from("*"),
            Token::Literal { index, length, .. } => {
                if materialize {
                    let payload = self.literal(*index).unwrap_or(&[]);
                    format!("\"{}\"", escape_quoted(&decode_text(payload)))
                } else {
                    format!("{{{}}}", length)
                }
            }
            // Structural tokens are handled by `serialize_value`.
            Token::OpenParen => String::from("("),
            Token::CloseParen => String::from(")"),
            Token::OpenBracket => String::from("["),
            Token::CloseBracket => String::from("]"),
            Token::Eol => String::new(),
        }
    }

    /// Consumes a `[...]` region and returns its inner canonical text.
    pub fn read_bracketed_content(&mut self) -> Option<String> {
        match self.read_token()? {
            Token::OpenBracket => {
                let full = self.serialize_group(Token::CloseBracket, "[", "]", false)?;
                Some(full[1..full.len() - 1].to_owned())
            }
            _ => None,
        }
    }

    /// Discards one value, including a whole balanced subtree.
    pub fn skip_value(&mut self) -> bool {
        self.read_value_string(false).is_some()
    }

    /// The rest of the line as text, leading whitespace trimmed.
    pub fn remaining_string(&mut self) -> String {
        let end = self.buf.len() - 2; // appended CRLF
        if self.pos >= end {
            return String::new();
        }

        let rest = decode_text(&self.buf[self.pos..end]).into_owned();
        self.pos = end;
        rest.trim().to_owned()
    }
}
