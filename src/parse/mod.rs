//! Typed parsers for the untagged response shapes.
//!
//! Every parser here is a pure function over a [`LineReader`]: it either
//! yields a value or `None`, and never panics on hostile input. A response
//! the dispatcher cannot classify is simply dropped by higher layers, per
//! the "total reducer" rule.

mod body;
mod code;
mod envelope;
mod fetch;
mod search;
mod status;

pub use body::parse_body_structure;
pub use code::parse_codes;
pub use envelope::parse_envelope;
pub use fetch::{flag_change, parse_fetch};
pub use search::{parse_esearch, parse_search};
pub use status::{
    parse_acl, parse_annotation, parse_capability, parse_id, parse_list, parse_list_rights,
    parse_metadata, parse_my_rights, parse_namespaces, parse_quota, parse_quota_root,
    parse_status, parse_vanished,
};

use mail_types::{
    capability::CapabilitySet,
    fetch::MessageAttributes,
    flag::Flag,
    mailbox::Folder,
    response::{
        Acl, Annotation, Esearch, IdParams, ListRights, Metadata, MyRights, Namespaces, Quota,
        QuotaRoot, RespStatus, ResponseCode, SearchResults, StatusItems, Vanished,
    },
};

use crate::{decode::ResponseRecord, reader::LineReader, token::Token};

/// One classified untagged response.
#[derive(Debug, Clone, PartialEq)]
pub enum UntaggedResponse {
    /// `* OK/NO/BAD/BYE/PREAUTH [CODE] text`, including the greeting.
    Cond {
        status: RespStatus,
        codes: Vec<ResponseCode>,
        text: String,
    },
    Capability(CapabilitySet),
    Enabled(Vec<String>),
    List(Folder),
    Lsub(Folder),
    Status(StatusItems),
    Search(SearchResults),
    Sort(SearchResults),
    Esearch(Esearch),
    Flags(Vec<Flag>),
    Exists(u32),
    Recent(u32),
    Expunge(u32),
    Fetch(MessageAttributes),
    Quota(Quota),
    QuotaRoot(QuotaRoot),
    Acl(Acl),
    ListRights(ListRights),
    MyRights(MyRights),
    Metadata(Metadata),
    Annotation(Annotation),
    Id(IdParams),
    Vanished(Vanished),
    Namespace(Namespaces),
}

/// Classifies one record. `None` for tagged records, continuations, and
/// shapes this client does not understand.
pub fn parse_untagged(record: &ResponseRecord) -> Option<UntaggedResponse> {
    if !record.is_untagged() {
        return None;
    }

    let mut reader = LineReader::for_record(record);
    match reader.read_token()? {
        Token::Asterisk => {}
        _ => return None,
    }

    let word = match reader.read_token()? {
        Token::Atom(word) => word,
        _ => return None,
    };

    // `* <N> EXISTS|RECENT|EXPUNGE|FETCH`
    if let Ok(number) = word.parse::<u32>() {
        let keyword = match reader.read_token()? {
            Token::Atom(keyword) => keyword.to_ascii_uppercase(),
            _ => return None,
        };

        return match keyword.as_str() {
            "EXISTS" => Some(UntaggedResponse::Exists(number)),
            "RECENT" => Some(UntaggedResponse::Recent(number)),
            "EXPUNGE" => Some(UntaggedResponse::Expunge(number)),
            "FETCH" => parse_fetch(number, &mut reader).map(UntaggedResponse::Fetch),
            _ => None,
        };
    }

    if let Some(condition) = RespStatus::parse(&word) {
        let (codes, text) = parse_codes(&mut reader);
        return Some(UntaggedResponse::Cond {
            status: condition,
            codes,
            text,
        });
    }

    match word.to_ascii_uppercase().as_str() {
        "CAPABILITY" => Some(UntaggedResponse::Capability(parse_capability(&mut reader))),
        "ENABLED" => {
            let mut extensions = Vec::new();
            while let Some(Token::Atom(token)) = reader.read_token() {
                extensions.push(token);
            }
            Some(UntaggedResponse::Enabled(extensions))
        }
        "LIST" | "XLIST" => parse_list(&mut reader).map(UntaggedResponse::List),
        "LSUB" => parse_list(&mut reader).map(UntaggedResponse::Lsub),
        "STATUS" => parse_status(&mut reader).map(UntaggedResponse::Status),
        "SEARCH" => Some(UntaggedResponse::Search(parse_search(&mut reader))),
        "SORT" => Some(UntaggedResponse::Sort(parse_search(&mut reader))),
        "ESEARCH" => Some(UntaggedResponse::Esearch(parse_esearch(&mut reader))),
        "FLAGS" => {
            let flags = fetch::parse_flag_list(&mut reader)?;
            Some(UntaggedResponse::Flags(flags))
        }
        "QUOTA" => parse_quota(&mut reader).map(UntaggedResponse::Quota),
        "QUOTAROOT" => parse_quota_root(&mut reader).map(UntaggedResponse::QuotaRoot),
        "ACL" => parse_acl(&mut reader).map(UntaggedResponse::Acl),
        "LISTRIGHTS" => parse_list_rights(&mut reader).map(UntaggedResponse::ListRights),
        "MYRIGHTS" => parse_my_rights(&mut reader).map(UntaggedResponse::MyRights),
        "METADATA" => parse_metadata(&mut reader).map(UntaggedResponse::Metadata),
        "ANNOTATION" => parse_annotation(&mut reader).map(UntaggedResponse::Annotation),
        "ID" => parse_id(&mut reader).map(UntaggedResponse::Id),
        "VANISHED" => parse_vanished(&mut reader).map(UntaggedResponse::Vanished),
        "NAMESPACE" => parse_namespaces(&mut reader).map(UntaggedResponse::Namespace),
        _ => None,
    }
}
