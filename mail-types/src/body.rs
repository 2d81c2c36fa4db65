//! Body structure types and section enumeration.

/// A parsed BODYSTRUCTURE tree.
///
/// ```text
/// ("TEXT" "PLAIN" ("CHARSET" "UTF-8") NIL NIL "7BIT" 2279 48 ...)     single part
/// ((...)(...) "ALTERNATIVE" ("BOUNDARY" "x") ...)                     multipart
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    Single(SinglePart),
    Multipart(MultiPart),
}

/// A non-multipart body part with its optional extension data.
///
/// For MESSAGE/RFC822 parts `envelope_raw` and `embedded` carry the
/// encapsulated message; for TEXT/* parts `lines` is present. Raw envelope
/// text is kept in canonical wire form for the structured envelope parser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinglePart {
    pub content_type: String,
    pub subtype: String,
    pub parameters: Vec<(String, String)>,
    pub id: Option<String>,
    pub description: Option<String>,
    pub encoding: Option<String>,
    pub size: Option<u32>,
    pub lines: Option<u32>,
    pub md5: Option<String>,
    pub envelope_raw: Option<String>,
    pub embedded: Option<Box<BodyStructure>>,
    pub disposition: Option<Disposition>,
    pub language: Vec<String>,
    pub location: Option<String>,
    /// Unrecognized trailing extension data, re-serialized.
    pub extensions: Vec<String>,
}

impl SinglePart {
    pub fn is_message_rfc822(&self) -> bool {
        self.content_type.eq_ignore_ascii_case("MESSAGE")
            && self.subtype.eq_ignore_ascii_case("RFC822")
    }

    pub fn is_text(&self) -> bool {
        self.content_type.eq_ignore_ascii_case("TEXT")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiPart {
    pub parts: Vec<BodyStructure>,
    pub subtype: String,
    pub parameters: Vec<(String, String)>,
    pub disposition: Option<Disposition>,
    pub language: Vec<String>,
    pub location: Option<String>,
    pub extensions: Vec<String>,
}

/// `("attachment" ("FILENAME" "x.pdf"))`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disposition {
    pub kind: String,
    pub parameters: Vec<(String, String)>,
}

impl BodyStructure {
    /// Enumerates the fetchable leaf parts with their dotted IMAP section
    /// identifiers, in wire order.
    ///
    /// Multipart children use 1-based indices. The content of a
    /// MESSAGE/RFC822 part is addressed below the host part: a single-part
    /// embedded message gets the host id plus `.1`, an embedded multipart
    /// numbers its children under the host id.
    pub fn enumerate_parts(&self) -> Vec<(String, &SinglePart)> {
        let mut out = Vec::new();

        match self {
            BodyStructure::Single(part) => {
                collect_single("1", part, &mut out);
            }
            BodyStructure::Multipart(multi) => {
                collect_multi("", multi, &mut out);
            }
        }

        out
    }
}

fn collect_single<'a>(id: &str, part: &'a SinglePart, out: &mut Vec<(String, &'a SinglePart)>) {
    out.push((id.to_owned(), part));

    if let Some(embedded) = &part.embedded {
        match embedded.as_ref() {
            BodyStructure::Single(inner) => {
                collect_single(&format!("{}.1", id), inner, out);
            }
            BodyStructure::Multipart(multi) => {
                collect_multi(id, multi, out);
            }
        }
    }
}

fn collect_multi<'a>(prefix: &str, multi: &'a MultiPart, out: &mut Vec<(String, &'a SinglePart)>) {
    for (index, child) in multi.parts.iter().enumerate() {
        let id = if prefix.is_empty() {
            format!("{}", index + 1)
        } else {
            format!("{}.{}", prefix, index + 1)
        };

        match child {
            BodyStructure::Single(part) => collect_single(&id, part, out),
            BodyStructure::Multipart(inner) => collect_multi(&id, inner, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_part(subtype: &str) -> SinglePart {
        SinglePart {
            content_type: "TEXT".into(),
            subtype: subtype.into(),
            encoding: Some("7BIT".into()),
            size: Some(10),
            lines: Some(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_enumerate_single() {
        let tree = BodyStructure::Single(text_part("PLAIN"));
        let parts = tree.enumerate_parts();

        assert_eq!(1, parts.len());
        assert_eq!("1", parts[0].0);
    }

    #[test]
    fn test_enumerate_alternative() {
        let tree = BodyStructure::Multipart(MultiPart {
            parts: vec![
                BodyStructure::Single(text_part("PLAIN")),
                BodyStructure::Single(text_part("HTML")),
            ],
            subtype: "ALTERNATIVE".into(),
            ..Default::default()
        });

        let parts = tree.enumerate_parts();
        assert_eq!(2, parts.len());
        assert_eq!(("1", "PLAIN"), (parts[0].0.as_str(), parts[0].1.subtype.as_str()));
        assert_eq!(("2", "HTML"), (parts[1].0.as_str(), parts[1].1.subtype.as_str()));
    }

    #[test]
    fn test_enumerate_nested_message() {
        let embedded = BodyStructure::Multipart(MultiPart {
            parts: vec![
                BodyStructure::Single(text_part("PLAIN")),
                BodyStructure::Single(text_part("HTML")),
            ],
            subtype: "ALTERNATIVE".into(),
            ..Default::default()
        });

        let host = SinglePart {
            content_type: "MESSAGE".into(),
            subtype: "RFC822".into(),
            embedded: Some(Box::new(embedded)),
            ..Default::default()
        };

        let tree = BodyStructure::Multipart(MultiPart {
            parts: vec![
                BodyStructure::Single(text_part("PLAIN")),
                BodyStructure::Single(host),
            ],
            subtype: "MIXED".into(),
            ..Default::default()
        });

        let ids: Vec<_> = tree
            .enumerate_parts()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(vec!["1", "2", "2.1", "2.2"], ids);
    }

    #[test]
    fn test_enumerate_message_with_single_body() {
        let host = SinglePart {
            content_type: "MESSAGE".into(),
            subtype: "RFC822".into(),
            embedded: Some(Box::new(BodyStructure::Single(text_part("PLAIN")))),
            ..Default::default()
        };

        let tree = BodyStructure::Single(host);
        let ids: Vec<_> = tree
            .enumerate_parts()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(vec!["1", "1.1"], ids);
    }
}
