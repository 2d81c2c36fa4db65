//! Fetch attribute types.

use chrono::{DateTime, FixedOffset};

use crate::{flag::Flag, headers::HeaderSet};

/// The attributes delivered by one `* N FETCH (...)` response.
///
/// ENVELOPE and BODYSTRUCTURE values are captured as canonical re-serialized
/// text (literals materialized) and parsed structurally on demand; this is
/// what lets them be cached and diffed as plain strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageAttributes {
    /// Message sequence number the response was delivered for.
    pub sequence: u32,
    pub flags: Option<Vec<Flag>>,
    pub uid: Option<u32>,
    /// RFC822.SIZE
    pub size: Option<u32>,
    pub internal_date: Option<DateTime<FixedOffset>>,
    pub mod_seq: Option<u64>,
    pub envelope_raw: Option<String>,
    pub body_structure_raw: Option<String>,
    /// One entry per BODY[...] item in the response.
    pub sections: Vec<BodySection>,
}

impl MessageAttributes {
    /// The payload of the whole-message section (`BODY[]`), if present.
    pub fn body(&self) -> Option<&[u8]> {
        self.sections
            .iter()
            .find(|section| section.section.is_none())
            .and_then(|section| section.data.as_deref())
    }
}

/// One `BODY[section]<partial>` item with its delivered payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodySection {
    /// `None` is the whole message, `BODY[]`.
    pub section: Option<SectionPath>,
    pub peek: bool,
    /// `<origin.size>` partial window as requested.
    pub partial: Option<(u32, Option<u32>)>,
    pub data: Option<Vec<u8>>,
}

/// A dotted part path plus an optional trailing subsection specifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionPath {
    /// 1-based part numbers; empty when the specifier applies to the whole
    /// message (e.g. `BODY[HEADER]`).
    pub part: Vec<u32>,
    pub spec: Option<SectionSpec>,
}

impl SectionPath {
    pub fn text(&self) -> String {
        let mut out = String::new();
        for (i, part) in self.part.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(&part.to_string());
        }

        if let Some(spec) = &self.spec {
            if !self.part.is_empty() {
                out.push('.');
            }
            out.push_str(&spec.text());
        }

        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionSpec {
    Header,
    HeaderFields(HeaderSet),
    HeaderFieldsNot(HeaderSet),
    Text,
    Mime,
}

impl SectionSpec {
    pub fn text(&self) -> String {
        match self {
            Self::Header => "HEADER".into(),
            Self::HeaderFields(headers) => format!("HEADER.FIELDS {}", headers),
            Self::HeaderFieldsNot(headers) => format!("HEADER.FIELDS.NOT {}", headers),
            Self::Text => "TEXT".into(),
            Self::Mime => "MIME".into(),
        }
    }
}

/// A FETCH response that touched FLAGS, lifted for the selected-mailbox
/// reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagChange {
    pub sequence: u32,
    pub uid: Option<u32>,
    pub flags: Vec<Flag>,
    pub mod_seq: Option<u64>,
}
