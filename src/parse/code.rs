//! Bracketed response codes.

use mail_types::{response::ResponseCode, sequence::UidSet};

use crate::{reader::LineReader, token::Token};

/// Scans the `[CODE args]` prefixes of a status response, then returns the
/// remaining free-form text. All leading codes are collected.
pub fn parse_codes(reader: &mut LineReader) -> (Vec<ResponseCode>, String) {
    let mut codes = Vec::new();

    while matches!(reader.peek_token(), Some(Token::OpenBracket)) {
        let Some(content) = reader.read_bracketed_content() else {
            break;
        };

        if let Some(code) = parse_one_code(&content) {
            codes.push(code);
        }
    }

    (codes, reader.remaining_string())
}

fn parse_one_code(content: &str) -> Option<ResponseCode> {
    let mut reader = LineReader::for_text(content);

    let name = match reader.read_token()? {
        Token::Atom(name) => name.to_ascii_uppercase(),
        _ => return None,
    };

    let code = match name.as_str() {
        "ALERT" => ResponseCode::Alert,
        "PARSE" => ResponseCode::Parse,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "UIDNEXT" => ResponseCode::UidNext(reader.read_number()?),
        "UIDVALIDITY" => ResponseCode::UidValidity(reader.read_number()?),
        "UNSEEN" => ResponseCode::Unseen(reader.read_number()?),
        "HIGHESTMODSEQ" => ResponseCode::HighestModSeq(reader.read_number()?),
        "CAPABILITY" => {
            let mut tokens = Vec::new();
            while let Some(Token::Atom(token)) = reader.read_token() {
                tokens.push(token);
            }
            ResponseCode::Capability(tokens)
        }
        "PERMANENTFLAGS" => {
            let mut flags = Vec::new();
            if let Some(Token::OpenParen) = reader.read_token() {
                loop {
                    match reader.read_token() {
                        Some(Token::CloseParen) | None => break,
                        Some(Token::Flag(name)) => flags.push(format!("\\{}", name)),
                        Some(Token::Atom(name)) => flags.push(name),
                        Some(_) => {}
                    }
                }
            }
            ResponseCode::PermanentFlags(flags)
        }
        "APPENDUID" => {
            let uid_validity = reader.read_number()?;
            let uids = read_uid_set(&mut reader)?;
            ResponseCode::AppendUid { uid_validity, uids }
        }
        "COPYUID" => {
            let uid_validity = reader.read_number()?;
            let source = read_uid_set(&mut reader)?;
            let destination = read_uid_set(&mut reader)?;
            ResponseCode::CopyUid {
                uid_validity,
                source,
                destination,
            }
        }
        _ => {
            let arguments = {
                let rest = reader.remaining_string();
                (!rest.is_empty()).then_some(rest)
            };
            ResponseCode::Other { name, arguments }
        }
    };

    Some(code)
}

fn read_uid_set(reader: &mut LineReader) -> Option<UidSet> {
    match reader.read_token()? {
        Token::Atom(text) => text.parse().ok(),
        _ => None,
    }
}
