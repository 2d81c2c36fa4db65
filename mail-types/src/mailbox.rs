//! Mailbox names, folder listings, and the Modified UTF-7 codec.

use std::fmt::{Display, Formatter};

use base64::{alphabet::Alphabet, engine::general_purpose::NO_PAD, engine::GeneralPurpose, Engine};
use thiserror::Error;

/// A mailbox name in decoded (Unicode) form.
///
/// `INBOX` is special-cased per RFC 3501: any case spelling names the same
/// mailbox.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Mailbox {
    Inbox,
    Other(String),
}

impl Mailbox {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Inbox => "INBOX",
            Self::Other(name) => name,
        }
    }

    /// The wire form: Modified UTF-7 encoded.
    pub fn encoded(&self) -> String {
        encode_utf7(self.as_str())
    }
}

impl From<&str> for Mailbox {
    fn from(value: &str) -> Self {
        if value.eq_ignore_ascii_case("inbox") {
            Self::Inbox
        } else {
            Self::Other(value.to_owned())
        }
    }
}

impl From<String> for Mailbox {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl Display for Mailbox {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a LIST/LSUB response, decoded for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// The wire name, Modified UTF-7 encoded. This is what SELECT wants.
    pub raw: String,
    /// The decoded display name.
    pub name: String,
    pub delimiter: Option<char>,
    pub attributes: Vec<FolderAttribute>,
    /// LIST-STATUS items, when the listing asked for them.
    pub status: Vec<(String, u64)>,
}

impl Folder {
    pub fn has(&self, attribute: FolderAttribute) -> bool {
        self.attributes.contains(&attribute)
    }

    pub fn is_selectable(&self) -> bool {
        !self.has(FolderAttribute::NoSelect)
    }
}

/// Mailbox name attributes from `\Atom` (or bareword) tokens, including the
/// RFC 6154 special uses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FolderAttribute {
    HasChildren,
    HasNoChildren,
    NoSelect,
    NoInferiors,
    Marked,
    Unmarked,
    Subscribed,
    NonExistent,
    All,
    Archive,
    Drafts,
    Flagged,
    Junk,
    Sent,
    Trash,
    Important,
    Extension(String),
}

impl FolderAttribute {
    /// Parse the attribute token, with or without the leading backslash.
    pub fn parse(token: &str) -> Self {
        let name = token.strip_prefix('\\').unwrap_or(token);

        match name.to_ascii_lowercase().as_str() {
            "haschildren" => Self::HasChildren,
            "hasnochildren" => Self::HasNoChildren,
            "noselect" => Self::NoSelect,
            "noinferiors" => Self::NoInferiors,
            "marked" => Self::Marked,
            "unmarked" => Self::Unmarked,
            "subscribed" => Self::Subscribed,
            "nonexistent" => Self::NonExistent,
            "all" => Self::All,
            "archive" => Self::Archive,
            "drafts" => Self::Drafts,
            "flagged" => Self::Flagged,
            "junk" => Self::Junk,
            "sent" => Self::Sent,
            "trash" => Self::Trash,
            "important" => Self::Important,
            _ => Self::Extension(name.to_owned()),
        }
    }
}

#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum Utf7Error {
    #[error("Unterminated shift sequence")]
    UnterminatedShift,
    #[error("Invalid base64 in shift sequence")]
    InvalidBase64,
    #[error("Shift sequence decodes to a malformed UTF-16 string")]
    InvalidUtf16,
}

// RFC 3501 base64 variant: "," replaces "/", no padding.
const UTF7_ALPHABET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+,";

fn utf7_engine() -> GeneralPurpose {
    // Safety: `unwrap` can't panic, the alphabet is 64 unique ASCII bytes.
    GeneralPurpose::new(&Alphabet::new(UTF7_ALPHABET).unwrap(), NO_PAD)
}

/// Encodes a mailbox name with Modified UTF-7 (RFC 3501 section 5.1.3).
///
/// Printable ASCII passes through, `&` becomes `&-`, and every maximal run
/// of other characters becomes `&<base64 of UTF-16BE>-`.
pub fn encode_utf7(name: &str) -> String {
    let engine = utf7_engine();
    let mut out = String::with_capacity(name.len());
    let mut run: Vec<u8> = Vec::new();

    let mut flush = |out: &mut String, run: &mut Vec<u8>| {
        if !run.is_empty() {
            out.push('&');
            out.push_str(&engine.encode(&run));
            out.push('-');
            run.clear();
        }
    };

    for ch in name.chars() {
        if (' '..='~').contains(&ch) {
            flush(&mut out, &mut run);
            if ch == '&' {
                out.push_str("&-");
            } else {
                out.push(ch);
            }
        } else {
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                run.extend_from_slice(&unit.to_be_bytes());
            }
        }
    }

    flush(&mut out, &mut run);
    out
}

/// Decodes a Modified UTF-7 mailbox name.
pub fn decode_utf7(encoded: &str) -> Result<String, Utf7Error> {
    let engine = utf7_engine();
    let mut out = String::with_capacity(encoded.len());
    let mut chars = encoded.chars();

    while let Some(ch) = chars.next() {
        if ch != '&' {
            out.push(ch);
            continue;
        }

        let mut shifted = String::new();
        loop {
            match chars.next() {
                Some('-') => break,
                Some(inner) => shifted.push(inner),
                None => return Err(Utf7Error::UnterminatedShift),
            }
        }

        if shifted.is_empty() {
            out.push('&');
            continue;
        }

        let bytes = engine
            .decode(shifted.as_bytes())
            .map_err(|_| Utf7Error::InvalidBase64)?;
        if bytes.len() % 2 != 0 {
            return Err(Utf7Error::InvalidUtf16);
        }

        let units: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        out.push_str(&String::from_utf16(&units).map_err(|_| Utf7Error::InvalidUtf16)?);
    }

    Ok(out)
}
