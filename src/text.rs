//! Text decoding at the wire boundary.

use std::borrow::Cow;

/// Decodes response bytes as UTF-8, falling back to ISO-8859-1.
///
/// The fallback can never fail: every byte maps to a code point. It is only
/// applied when a payload has to be materialized as text; binary payloads
/// stay as bytes.
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => encoding_rs::mem::decode_latin1(bytes),
    }
}
