//! FETCH attribute parsing.

use chrono::DateTime;
use log::trace;

use mail_types::{
    fetch::{BodySection, FlagChange, MessageAttributes, SectionPath, SectionSpec},
    flag::Flag,
    headers::HeaderSet,
};

use crate::{reader::LineReader, token::Token};

/// Parses the attribute list of `* <N> FETCH (...)`.
///
/// The reader is positioned after the FETCH keyword. Unknown keys skip
/// exactly one value, so servers may interleave extensions freely.
pub fn parse_fetch(sequence: u32, reader: &mut LineReader) -> Option<MessageAttributes> {
    match reader.read_token()? {
        Token::OpenParen => {}
        _ => return None,
    }

    let mut attributes = MessageAttributes {
        sequence,
        ..Default::default()
    };

    loop {
        let key = match reader.read_token()? {
            Token::CloseParen => break,
            Token::Atom(key) => key.to_ascii_uppercase(),
            _ => return None,
        };

        match key.as_str() {
            "FLAGS" => attributes.flags = Some(parse_flag_list(reader)?),
            "UID" => attributes.uid = reader.read_number(),
            "RFC822.SIZE" => attributes.size = reader.read_number(),
            "INTERNALDATE" => {
                attributes.internal_date =
                    reader.read_nstring().and_then(|text| parse_internal_date(&text));
            }
            "MODSEQ" => {
                // `MODSEQ (<number>)`
                match reader.read_token()? {
                    Token::OpenParen => {}
                    _ => return None,
                }
                attributes.mod_seq = reader.read_number();
                match reader.read_token()? {
                    Token::CloseParen => {}
                    _ => return None,
                }
            }
            "ENVELOPE" => attributes.envelope_raw = reader.read_value_string(true),
            "BODYSTRUCTURE" => {
                attributes.body_structure_raw = reader.read_value_string(true);
            }
            "BODY" | "BODY.PEEK" => {
                if matches!(reader.peek_token(), Some(Token::OpenBracket)) {
                    let section = parse_body_section(key == "BODY.PEEK", reader)?;
                    attributes.sections.push(section);
                } else {
                    // BODY without a section is the non-extensible
                    // BODYSTRUCTURE form.
                    attributes.body_structure_raw = reader.read_value_string(true);
                }
            }
            other => {
                trace!("skipping unknown fetch key {}", other);
                reader.skip_value();
            }
        }
    }

    Some(attributes)
}

/// A parenthesized flag list.
pub(crate) fn parse_flag_list(reader: &mut LineReader) -> Option<Vec<Flag>> {
    match reader.read_token()? {
        Token::OpenParen => {}
        _ => return None,
    }

    let mut flags = Vec::new();
    loop {
        match reader.read_token()? {
            Token::CloseParen => break,
            Token::Flag(name) => flags.push(Flag::system(&name)),
            Token::Atom(name) => flags.push(Flag::keyword(name)),
            _ => return None,
        }
    }

    Some(flags)
}

/// `[section]<partial>` plus the delivered payload.
fn parse_body_section(peek: bool, reader: &mut LineReader) -> Option<BodySection> {
    match reader.read_token()? {
        Token::OpenBracket => {}
        _ => return None,
    }

    let mut section = BodySection {
        peek,
        ..Default::default()
    };
    let mut path = SectionPath::default();
    let mut saw_section = false;

    loop {
        match reader.read_token()? {
            Token::CloseBracket => break,
            Token::Atom(text) => {
                saw_section = true;
                parse_section_atom(&text, &mut path)?;

                // HEADER.FIELDS [.NOT] carries its header list inline.
                if matches!(
                    path.spec,
                    Some(SectionSpec::HeaderFields(_)) | Some(SectionSpec::HeaderFieldsNot(_))
                ) && matches!(reader.peek_token(), Some(Token::OpenParen))
                {
                    let headers = parse_header_list(reader)?;
                    path.spec = Some(match path.spec.take()? {
                        SectionSpec::HeaderFieldsNot(_) => SectionSpec::HeaderFieldsNot(headers),
                        _ => SectionSpec::HeaderFields(headers),
                    });
                }
            }
            _ => return None,
        }
    }

    if saw_section {
        section.section = Some(path);
    }

    // `<origin>` or `<origin.size>` glued to the closing bracket.
    if let Some(Token::Atom(text)) = reader.peek_token() {
        if text.starts_with('<') && text.ends_with('>') {
            reader.read_token();
            section.partial = parse_partial(&text);
        }
    }

    section.data = reader.read_nstring_bytes();
    Some(section)
}

/// Splits a dotted section atom like `1.2.HEADER.FIELDS` into the numeric
/// path and the trailing specifier.
fn parse_section_atom(text: &str, path: &mut SectionPath) -> Option<()> {
    let mut pieces = text.split('.').peekable();

    while let Some(piece) = pieces.peek() {
        if let Ok(number) = piece.parse::<u32>() {
            if number == 0 {
                return None;
            }
            path.part.push(number);
            pieces.next();
        } else {
            break;
        }
    }

    let rest: Vec<&str> = pieces.collect();
    if rest.is_empty() {
        return Some(());
    }

    path.spec = Some(match rest.join(".").to_ascii_uppercase().as_str() {
        "HEADER" => SectionSpec::Header,
        "HEADER.FIELDS" => SectionSpec::HeaderFields(HeaderSet::new()),
        "HEADER.FIELDS.NOT" => SectionSpec::HeaderFieldsNot(HeaderSet::new()),
        "TEXT" => SectionSpec::Text,
        "MIME" => SectionSpec::Mime,
        _ => return None,
    });

    Some(())
}

fn parse_header_list(reader: &mut LineReader) -> Option<HeaderSet> {
    match reader.read_token()? {
        Token::OpenParen => {}
        _ => return None,
    }

    let mut headers = HeaderSet::new();
    loop {
        match reader.read_token()? {
            Token::CloseParen => break,
            Token::Atom(name) | Token::Quoted(name) => {
                // The server echoed these; a name it invented that fails
                // validation is not worth dropping the payload over.
                let _ = headers.add(&name);
            }
            _ => return None,
        }
    }

    Some(headers.into_read_only())
}

fn parse_partial(text: &str) -> Option<(u32, Option<u32>)> {
    let inner = &text[1..text.len() - 1];
    match inner.split_once('.') {
        None => inner.parse().ok().map(|origin| (origin, None)),
        Some((origin, size)) => Some((origin.parse().ok()?, Some(size.parse().ok()?))),
    }
}

/// IMAP INTERNALDATE: `17-Jul-1996 02:44:25 -0700`, day possibly
/// space-padded.
fn parse_internal_date(text: &str) -> Option<DateTime<chrono::FixedOffset>> {
    DateTime::parse_from_str(text.trim(), "%d-%b-%Y %H:%M:%S %z")
        .or_else(|_| DateTime::parse_from_str(text.trim(), "%e-%b-%Y %H:%M:%S %z"))
        .ok()
}

/// Lifts a FETCH that mentioned FLAGS into the reducer's flag-change shape.
pub fn flag_change(attributes: &MessageAttributes) -> Option<FlagChange> {
    attributes.flags.as_ref().map(|flags| FlagChange {
        sequence: attributes.sequence,
        uid: attributes.uid,
        flags: flags.clone(),
        mod_seq: attributes.mod_seq,
    })
}
