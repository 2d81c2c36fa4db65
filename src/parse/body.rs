//! Structured BODYSTRUCTURE parsing.

use mail_types::body::{BodyStructure, Disposition, MultiPart, SinglePart};

use crate::{reader::LineReader, token::Token};

/// Parses the canonical BODYSTRUCTURE form captured by the FETCH parser.
///
/// A list whose first element is itself a list is a multipart; anything else
/// is a single part. Both forms carry optional trailing extension data which
/// is consumed slot by slot until the closing parenthesis.
pub fn parse_body_structure(raw: &str) -> Option<BodyStructure> {
    let mut reader = LineReader::for_text(raw);
    parse_structure_at(&mut reader)
}

fn parse_structure_at(reader: &mut LineReader) -> Option<BodyStructure> {
    match reader.read_token()? {
        Token::OpenParen => {}
        _ => return None,
    }

    if matches!(reader.peek_token(), Some(Token::OpenParen)) {
        parse_multipart(reader).map(BodyStructure::Multipart)
    } else {
        parse_single(reader).map(BodyStructure::Single)
    }
}

/// Called after the opening parenthesis, with nested part lists pending.
fn parse_multipart(reader: &mut LineReader) -> Option<MultiPart> {
    let mut multi = MultiPart::default();

    while matches!(reader.peek_token(), Some(Token::OpenParen)) {
        multi.parts.push(parse_structure_at(reader)?);
    }

    multi.subtype = reader.read_nstring()?;

    // Extension data: parameters, disposition, language, location, rest.
    if !at_close(reader) {
        multi.parameters = parse_parameters(reader)?;
    }
    if !at_close(reader) {
        multi.disposition = parse_disposition(reader)?;
    }
    if !at_close(reader) {
        multi.language = parse_language(reader)?;
    }
    if !at_close(reader) {
        multi.location = reader.read_nstring();
    }
    multi.extensions = drain_extensions(reader)?;

    Some(multi)
}

/// Called after the opening parenthesis of a non-multipart.
fn parse_single(reader: &mut LineReader) -> Option<SinglePart> {
    let mut part = SinglePart {
        content_type: reader.read_nstring()?,
        subtype: reader.read_nstring()?,
        ..Default::default()
    };

    part.parameters = parse_parameters(reader)?;
    part.id = reader.read_nstring();
    part.description = reader.read_nstring();
    part.encoding = reader.read_nstring();
    part.size = reader.read_number();

    if part.is_message_rfc822() {
        // Envelope, embedded structure, then the line count.
        part.envelope_raw = reader.read_value_string(true);
        part.embedded = parse_structure_at(reader).map(Box::new);
        part.lines = reader.read_number();
    } else if part.is_text() {
        part.lines = reader.read_number();
    }

    // Extension data: md5, disposition, language, location, rest.
    if !at_close(reader) {
        part.md5 = reader.read_nstring();
    }
    if !at_close(reader) {
        part.disposition = parse_disposition(reader)?;
    }
    if !at_close(reader) {
        part.language = parse_language(reader)?;
    }
    if !at_close(reader) {
        part.location = reader.read_nstring();
    }
    part.extensions = drain_extensions(reader)?;

    Some(part)
}

fn at_close(reader: &mut LineReader) -> bool {
    matches!(reader.peek_token(), Some(Token::CloseParen) | None)
}

/// `NIL` or `("name" "value" ...)`.
fn parse_parameters(reader: &mut LineReader) -> Option<Vec<(String, String)>> {
    match reader.read_token()? {
        Token::Nil => Some(Vec::new()),
        Token::OpenParen => {
            let mut parameters = Vec::new();
            loop {
                match reader.read_token()? {
                    Token::CloseParen => break,
                    Token::Atom(name) | Token::Quoted(name) => {
                        let value = reader.read_nstring().unwrap_or_default();
                        parameters.push((name, value));
                    }
                    _ => return None,
                }
            }
            Some(parameters)
        }
        _ => None,
    }
}

/// `NIL` or `("inline" ("name" "value" ...))`.
fn parse_disposition(reader: &mut LineReader) -> Option<Option<Disposition>> {
    match reader.read_token()? {
        Token::Nil => Some(None),
        Token::OpenParen => {
            let kind = reader.read_nstring()?;
            let parameters = parse_parameters(reader)?;
            match reader.read_token()? {
                Token::CloseParen => {}
                _ => return None,
            }
            Some(Some(Disposition { kind, parameters }))
        }
        _ => None,
    }
}

/// A string, a string list, or NIL.
fn parse_language(reader: &mut LineReader) -> Option<Vec<String>> {
    match reader.read_token()? {
        Token::Nil => Some(Vec::new()),
        Token::Atom(language) | Token::Quoted(language) => Some(vec![language]),
        Token::Literal { index, .. } => {
            let text = reader
                .literal(index)
                .map(|payload| crate::text::decode_text(payload).into_owned())?;
            Some(vec![text])
        }
        Token::OpenParen => {
            let mut languages = Vec::new();
            loop {
                match reader.read_token()? {
                    Token::CloseParen => break,
                    Token::Atom(language) | Token::Quoted(language) => languages.push(language),
                    _ => return None,
                }
            }
            Some(languages)
        }
        _ => None,
    }
}

/// Whatever follows the known extension slots, re-serialized verbatim until
/// the closing parenthesis.
fn drain_extensions(reader: &mut LineReader) -> Option<Vec<String>> {
    let mut extensions = Vec::new();

    loop {
        match reader.peek_token() {
            Some(Token::CloseParen) => {
                reader.read_token();
                return Some(extensions);
            }
            None => return Some(extensions),
            Some(_) => {
                extensions.push(reader.read_value_string(true)?);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_text_part() {
        let raw = "(\"TEXT\" \"PLAIN\" (\"CHARSET\" \"US-ASCII\") NIL NIL \"7BIT\" 2279 48)";
        let BodyStructure::Single(part) = parse_body_structure(raw).unwrap() else {
            panic!("expected single part");
        };

        assert_eq!("TEXT", part.content_type);
        assert_eq!("PLAIN", part.subtype);
        assert_eq!(vec![("CHARSET".to_owned(), "US-ASCII".to_owned())], part.parameters);
        assert_eq!(Some("7BIT".to_owned()), part.encoding);
        assert_eq!(Some(2279), part.size);
        assert_eq!(Some(48), part.lines);
        assert_eq!(None, part.id);
    }

    #[test]
    fn test_alternative_enumeration() {
        let raw = concat!(
            "((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"UTF-8\") NIL NIL \"7BIT\" 10 1) ",
            "(\"TEXT\" \"HTML\" (\"CHARSET\" \"UTF-8\") NIL NIL \"7BIT\" 20 1) ",
            "\"ALTERNATIVE\")"
        );

        let tree = parse_body_structure(raw).unwrap();
        let parts = tree.enumerate_parts();

        assert_eq!(2, parts.len());
        assert_eq!("1", parts[0].0);
        assert_eq!("PLAIN", parts[0].1.subtype);
        assert_eq!("2", parts[1].0);
        assert_eq!("HTML", parts[1].1.subtype);
    }

    #[test]
    fn test_multipart_extension_data() {
        let raw = concat!(
            "((\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 5 1) ",
            "\"MIXED\" (\"BOUNDARY\" \"xyz\") (\"inline\" (\"FILENAME\" \"a.txt\")) \"en\" \"fish.example\")"
        );

        let BodyStructure::Multipart(multi) = parse_body_structure(raw).unwrap() else {
            panic!("expected multipart");
        };

        assert_eq!("MIXED", multi.subtype);
        assert_eq!(vec![("BOUNDARY".to_owned(), "xyz".to_owned())], multi.parameters);
        let disposition = multi.disposition.unwrap();
        assert_eq!("inline", disposition.kind);
        assert_eq!(vec!["en".to_owned()], multi.language);
        assert_eq!(Some("fish.example".to_owned()), multi.location);
    }

    #[test]
    fn test_message_rfc822() {
        let raw = concat!(
            "(\"MESSAGE\" \"RFC822\" NIL NIL NIL \"7BIT\" 423 ",
            "(NIL \"inner\" NIL NIL NIL NIL NIL NIL NIL NIL) ",
            "(\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 31 2) ",
            "6)"
        );

        let BodyStructure::Single(part) = parse_body_structure(raw).unwrap() else {
            panic!("expected single part");
        };

        assert!(part.is_message_rfc822());
        assert_eq!(Some(423), part.size);
        assert_eq!(Some(6), part.lines);
        assert!(part.envelope_raw.as_ref().unwrap().contains("\"inner\""));

        let embedded = part.embedded.as_deref().unwrap();
        let ids: Vec<_> = BodyStructure::Single(part.clone())
            .enumerate_parts()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(vec!["1", "1.1"], ids);
        assert!(matches!(embedded, BodyStructure::Single(_)));
    }

    #[test]
    fn test_single_extension_data_with_md5() {
        let raw = concat!(
            "(\"APPLICATION\" \"PDF\" (\"NAME\" \"x.pdf\") \"<id1>\" \"desc\" \"BASE64\" 5000 ",
            "\"Q2hlY2sgSW50ZWdyaXR5IQ==\" (\"attachment\" (\"FILENAME\" \"x.pdf\")) NIL NIL \"extra\")"
        );

        let BodyStructure::Single(part) = parse_body_structure(raw).unwrap() else {
            panic!("expected single part");
        };

        assert_eq!(Some("<id1>".to_owned()), part.id);
        assert_eq!(Some("desc".to_owned()), part.description);
        assert_eq!(Some("Q2hlY2sgSW50ZWdyaXR5IQ==".to_owned()), part.md5);
        assert_eq!("attachment", part.disposition.unwrap().kind);
        assert!(part.language.is_empty());
        assert_eq!(None, part.location);
        assert_eq!(vec!["\"extra\"".to_owned()], part.extensions);
    }

    #[test]
    fn test_malformed_is_none() {
        assert_eq!(None, parse_body_structure("\"TEXT\""));
        assert_eq!(None, parse_body_structure("("));
    }
}
