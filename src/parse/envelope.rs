//! Structured ENVELOPE parsing.

use chrono::DateTime;

use mail_types::envelope::{Address, Envelope, GroupAddress, MailboxAddress};

use crate::{reader::LineReader, token::Token};

/// Parses the canonical ten-slot envelope form:
///
/// ```text
/// (date subject from sender reply-to to cc bcc in-reply-to message-id)
/// ```
///
/// The input is the re-serialized value captured by the FETCH parser, so
/// literals are already materialized as quoted strings.
pub fn parse_envelope(raw: &str) -> Option<Envelope> {
    let mut reader = LineReader::for_text(raw);
    parse_envelope_at(&mut reader)
}

pub(crate) fn parse_envelope_at(reader: &mut LineReader) -> Option<Envelope> {
    match reader.read_token()? {
        Token::OpenParen => {}
        _ => return None,
    }

    let date = reader.read_nstring().and_then(|text| parse_date(&text));
    let subject = reader.read_nstring();
    let from = parse_address_list(reader)?;
    let sender = parse_address_list(reader)?;
    let reply_to = parse_address_list(reader)?;
    let to = parse_address_list(reader)?;
    let cc = parse_address_list(reader)?;
    let bcc = parse_address_list(reader)?;
    let in_reply_to = reader.read_nstring();
    let message_id = reader.read_nstring();

    match reader.read_token() {
        Some(Token::CloseParen) | None => {}
        // Tolerate servers that append extra slots.
        Some(_) => loop {
            match reader.read_token() {
                Some(Token::CloseParen) | None => break,
                Some(_) => {}
            }
        },
    }

    Some(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
    })
}

/// RFC 2822 date with some leniency: comments and weekday are handled by
/// chrono, a missing seconds field is not worth rejecting a message over.
fn parse_date(text: &str) -> Option<DateTime<chrono::FixedOffset>> {
    let trimmed = text.trim();

    DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| {
            // Some agents emit "Wed, 1 Jan 2025 12:00 +0000".
            DateTime::parse_from_str(trimmed, "%a, %d %b %Y %H:%M %z")
        })
        .ok()
}

/// `NIL` or `( address* )` where a NIL-host address brackets a group.
fn parse_address_list(reader: &mut LineReader) -> Option<Vec<Address>> {
    match reader.read_token()? {
        Token::Nil => Some(Vec::new()),
        Token::OpenParen => {
            let mut out = Vec::new();
            let mut group: Option<GroupAddress> = None;

            loop {
                match reader.read_token()? {
                    Token::CloseParen => break,
                    Token::OpenParen => {
                        let address = parse_address(reader)?;
                        if address.host.is_none() {
                            match (&mut group, address.local) {
                                // `(name NIL "group-name" NIL)` opens a group.
                                (None, Some(name)) => {
                                    group = Some(GroupAddress {
                                        name: Some(name),
                                        members: Vec::new(),
                                    });
                                }
                                // `(NIL NIL NIL NIL)` closes it.
                                (Some(_), _) => {
                                    // Safety: `unwrap` can't panic, the group
                                    // was just matched.
                                    out.push(Address::Group(group.take().unwrap()));
                                }
                                (None, None) => {
                                    // A stray terminator; ignore.
                                }
                            }
                        } else {
                            match &mut group {
                                Some(group) => group.members.push(address),
                                None => out.push(Address::Mailbox(address)),
                            }
                        }
                    }
                    _ => return None,
                }
            }

            // An unterminated group still surfaces.
            if let Some(group) = group {
                out.push(Address::Group(group));
            }

            Some(out)
        }
        _ => None,
    }
}

/// `(name route local host)`.
fn parse_address(reader: &mut LineReader) -> Option<MailboxAddress> {
    let name = reader.read_nstring();
    let route = reader.read_nstring();
    let local = reader.read_nstring();
    let host = reader.read_nstring();

    match reader.read_token()? {
        Token::CloseParen => {}
        _ => return None,
    }

    Some(MailboxAddress {
        name,
        route,
        local,
        host,
    })
}
