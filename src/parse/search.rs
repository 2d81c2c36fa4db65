//! SEARCH, SORT, and ESEARCH responses.

use mail_types::response::{Esearch, SearchResults};

use crate::{reader::LineReader, token::Token};

/// `* SEARCH 2 3 5` (and `* SORT ...`, which is ordered the same way).
pub fn parse_search(reader: &mut LineReader) -> SearchResults {
    let mut ids = Vec::new();

    while let Some(token) = reader.read_token() {
        if let Token::Atom(text) = token {
            if let Ok(id) = text.parse::<u32>() {
                ids.push(id);
                continue;
            }
        }
        break;
    }

    SearchResults { ids }
}

/// `* ESEARCH [(TAG "A001")] [UID] (<key> <value>)*` per RFC 4731.
///
/// Unknown keys skip one value, so extensions to the result set stay
/// harmless.
pub fn parse_esearch(reader: &mut LineReader) -> Esearch {
    let mut esearch = Esearch::default();

    // Optional correlator: `(TAG "A001")`.
    if matches!(reader.peek_token(), Some(Token::OpenParen)) {
        reader.read_token();
        loop {
            match reader.read_token() {
                Some(Token::CloseParen) | None => break,
                Some(Token::Atom(key)) if key.eq_ignore_ascii_case("TAG") => {
                    esearch.tag = reader.read_nstring();
                }
                Some(_) => {}
            }
        }
    }

    while let Some(token) = reader.read_token() {
        let Token::Atom(key) = token else {
            break;
        };

        match key.to_ascii_uppercase().as_str() {
            "UID" => esearch.is_uid = true,
            "MIN" => esearch.min = reader.read_number(),
            "MAX" => esearch.max = reader.read_number(),
            "COUNT" => esearch.count = reader.read_number(),
            "ALL" => {
                esearch.ids = match reader.read_token() {
                    Some(Token::Atom(text)) => text.parse().ok(),
                    _ => None,
                };
            }
            _ => {
                reader.skip_value();
            }
        }
    }

    esearch
}
