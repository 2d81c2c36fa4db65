//! Response-related types.
//!
//! These are the *shapes* of parsed server data. The parsers that produce
//! them live in `mail-codec`; everything here is a plain value.

use std::fmt::{Display, Formatter};

use crate::sequence::UidSet;

/// How a response line is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// `* ...`
    Untagged,
    /// `A0001 OK ...`
    Tagged(String),
    /// `+ ...`
    Continuation,
}

/// The condition of a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RespStatus {
    Ok,
    No,
    Bad,
    PreAuth,
    Bye,
}

impl RespStatus {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }
}

impl Display for RespStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ok => "OK",
            Self::No => "NO",
            Self::Bad => "BAD",
            Self::PreAuth => "PREAUTH",
            Self::Bye => "BYE",
        })
    }
}

/// The parsed skeleton of a response line: its addressing, its status (when
/// the second token is a condition), and the free-form trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton {
    pub kind: RecordKind,
    pub status: Option<RespStatus>,
    pub text: String,
}

/// One bracketed `[CODE args]` prefix of a status response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    Alert,
    Capability(Vec<String>),
    HighestModSeq(u64),
    Parse,
    PermanentFlags(Vec<String>),
    ReadOnly,
    ReadWrite,
    TryCreate,
    UidNext(u32),
    UidValidity(u32),
    Unseen(u32),
    /// UIDPLUS: `[APPENDUID uidvalidity uid]`
    AppendUid { uid_validity: u32, uids: UidSet },
    /// UIDPLUS: `[COPYUID uidvalidity source-uids dest-uids]`
    CopyUid {
        uid_validity: u32,
        source: UidSet,
        destination: UidSet,
    },
    /// Anything else, kept verbatim.
    Other { name: String, arguments: Option<String> },
}

/// `* STATUS <mailbox> (...)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusItems {
    pub mailbox: String,
    /// Key/value pairs with the key folded to upper case (MESSAGES, RECENT,
    /// UIDNEXT, UIDVALIDITY, UNSEEN, HIGHESTMODSEQ, ...).
    pub items: Vec<(String, u64)>,
}

impl StatusItems {
    pub fn get(&self, key: &str) -> Option<u64> {
        let key = key.to_ascii_uppercase();
        self.items
            .iter()
            .find(|(known, _)| *known == key)
            .map(|(_, value)| *value)
    }
}

/// `* SEARCH 2 3 5` (also used for SORT, which is ordered).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub ids: Vec<u32>,
}

/// `* ESEARCH (TAG "A001") UID COUNT 2 MIN 7 MAX 9 ALL 7,9` (RFC 4731).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Esearch {
    pub tag: Option<String>,
    pub is_uid: bool,
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub count: Option<u32>,
    pub ids: Option<UidSet>,
}

/// `* QUOTA <root> (STORAGE 10 512 ...)` (RFC 2087).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Quota {
    pub root: String,
    pub resources: Vec<QuotaResource>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaResource {
    pub name: String,
    pub usage: u64,
    pub limit: u64,
}

/// `* QUOTAROOT <mailbox> <root>*`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaRoot {
    pub mailbox: String,
    pub roots: Vec<String>,
}

/// `* ACL <mailbox> (<identifier> <rights>)*`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Acl {
    pub mailbox: String,
    pub entries: Vec<(String, String)>,
}

/// `* LISTRIGHTS <mailbox> <identifier> <required> <optional>*`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRights {
    pub mailbox: String,
    pub identifier: String,
    pub required: String,
    pub optional: Vec<String>,
}

/// `* MYRIGHTS <mailbox> <rights>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MyRights {
    pub mailbox: String,
    pub rights: String,
}

/// `* METADATA <mailbox> (<entry> <value-or-NIL> ...)` (RFC 5464).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub mailbox: String,
    pub entries: Vec<(String, Option<Vec<u8>>)>,
}

/// `* ANNOTATION <mailbox> <entry> (<attribute> <value-or-NIL> ...)`
/// (ANNOTATE-EXPERIMENT-1).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    pub mailbox: String,
    pub entry: String,
    pub attributes: Vec<(String, Option<String>)>,
}

/// `* ID ("name" "server" ...)` or `* ID NIL` (RFC 2971).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdParams {
    pub params: Vec<(String, Option<String>)>,
}

/// `* VANISHED [(EARLIER)] <uid-set>` (RFC 7162).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vanished {
    pub earlier: bool,
    pub uids: UidSet,
}

/// One namespace level of a `* NAMESPACE` response (RFC 2342).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    pub prefix: String,
    pub delimiter: Option<char>,
}

/// The full `* NAMESPACE personal other shared` triple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespaces {
    pub personal: Vec<Namespace>,
    pub other_users: Vec<Namespace>,
    pub shared: Vec<Namespace>,
}
