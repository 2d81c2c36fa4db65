//! STATUS, LIST, and the smaller extension response shapes.

use mail_types::{
    capability::CapabilitySet,
    mailbox::{decode_utf7, Folder, FolderAttribute},
    response::{
        Acl, Annotation, IdParams, ListRights, Metadata, MyRights, Namespace, Namespaces, Quota,
        QuotaResource, QuotaRoot, StatusItems, Vanished,
    },
};

use crate::{reader::LineReader, token::Token};

/// `* STATUS <mailbox> (<key> <number> ...)`; keys fold to upper case.
pub fn parse_status(reader: &mut LineReader) -> Option<StatusItems> {
    let mailbox = reader.read_nstring()?;

    match reader.read_token()? {
        Token::OpenParen => {}
        _ => return None,
    }

    let mut items = Vec::new();
    loop {
        match reader.read_token()? {
            Token::CloseParen => break,
            Token::Atom(key) => {
                let value = reader.read_number()?;
                items.push((key.to_ascii_uppercase(), value));
            }
            _ => return None,
        }
    }

    Some(StatusItems { mailbox, items })
}

/// `* LIST (\Attributes) "/" name [extended items]`.
pub fn parse_list(reader: &mut LineReader) -> Option<Folder> {
    match reader.read_token()? {
        Token::OpenParen => {}
        _ => return None,
    }

    let mut attributes = Vec::new();
    loop {
        match reader.read_token()? {
            Token::CloseParen => break,
            Token::Flag(name) => attributes.push(FolderAttribute::parse(&name)),
            Token::Atom(name) => attributes.push(FolderAttribute::parse(&name)),
            _ => return None,
        }
    }

    let delimiter = reader
        .read_nstring()
        .and_then(|text| text.chars().next());
    let raw = reader.read_nstring()?;
    let name = decode_utf7(&raw).unwrap_or_else(|_| raw.clone());

    Some(Folder {
        raw,
        name,
        delimiter,
        attributes,
        status: Vec::new(),
    })
}

pub fn parse_capability(reader: &mut LineReader) -> CapabilitySet {
    let mut tokens = Vec::new();
    while let Some(Token::Atom(token)) = reader.read_token() {
        tokens.push(token);
    }

    CapabilitySet::from_tokens(tokens)
}

/// `* QUOTA <root> (<name> <usage> <limit> ...)`.
pub fn parse_quota(reader: &mut LineReader) -> Option<Quota> {
    let root = reader.read_nstring()?;

    match reader.read_token()? {
        Token::OpenParen => {}
        _ => return None,
    }

    let mut resources = Vec::new();
    loop {
        match reader.read_token()? {
            Token::CloseParen => break,
            Token::Atom(name) | Token::Quoted(name) => {
                let usage = reader.read_number()?;
                let limit = reader.read_number()?;
                resources.push(QuotaResource {
                    name: name.to_ascii_uppercase(),
                    usage,
                    limit,
                });
            }
            _ => return None,
        }
    }

    Some(Quota { root, resources })
}

/// `* QUOTAROOT <mailbox> <root>*`.
pub fn parse_quota_root(reader: &mut LineReader) -> Option<QuotaRoot> {
    let mailbox = reader.read_nstring()?;

    let mut roots = Vec::new();
    while let Some(root) = reader.read_nstring() {
        roots.push(root);
    }

    Some(QuotaRoot { mailbox, roots })
}

/// `* ACL <mailbox> (<identifier> <rights>)*`.
pub fn parse_acl(reader: &mut LineReader) -> Option<Acl> {
    let mailbox = reader.read_nstring()?;

    let mut entries = Vec::new();
    while let Some(identifier) = reader.read_nstring() {
        let rights = reader.read_nstring()?;
        entries.push((identifier, rights));
    }

    Some(Acl { mailbox, entries })
}

/// `* LISTRIGHTS <mailbox> <identifier> <required> <optional>*`.
pub fn parse_list_rights(reader: &mut LineReader) -> Option<ListRights> {
    let mailbox = reader.read_nstring()?;
    let identifier = reader.read_nstring()?;
    let required = reader.read_nstring()?;

    let mut optional = Vec::new();
    while let Some(rights) = reader.read_nstring() {
        optional.push(rights);
    }

    Some(ListRights {
        mailbox,
        identifier,
        required,
        optional,
    })
}

/// `* MYRIGHTS <mailbox> <rights>`.
pub fn parse_my_rights(reader: &mut LineReader) -> Option<MyRights> {
    let mailbox = reader.read_nstring()?;
    let rights = reader.read_nstring()?;

    Some(MyRights { mailbox, rights })
}

/// `* METADATA <mailbox> (<entry> <value-or-NIL> ...)`.
///
/// Values stay as bytes: RFC 5464 allows binary content.
pub fn parse_metadata(reader: &mut LineReader) -> Option<Metadata> {
    let mailbox = reader.read_nstring()?;

    match reader.read_token()? {
        Token::OpenParen => {}
        _ => return None,
    }

    let mut entries = Vec::new();
    loop {
        let entry = match reader.read_token()? {
            Token::CloseParen => break,
            Token::Atom(entry) | Token::Quoted(entry) => entry,
            Token::Literal { index, .. } => {
                crate::text::decode_text(reader.literal(index)?).into_owned()
            }
            _ => return None,
        };

        let value = match reader.peek_token()? {
            Token::Nil => {
                reader.read_token();
                None
            }
            _ => reader.read_nstring_bytes(),
        };

        entries.push((entry, value));
    }

    Some(Metadata { mailbox, entries })
}

/// `* ANNOTATION <mailbox> <entry> (<attribute> <value-or-NIL> ...)`.
pub fn parse_annotation(reader: &mut LineReader) -> Option<Annotation> {
    let mailbox = reader.read_nstring()?;
    let entry = reader.read_nstring()?;

    match reader.read_token()? {
        Token::OpenParen => {}
        _ => return None,
    }

    let mut attributes = Vec::new();
    loop {
        let attribute = match reader.read_token()? {
            Token::CloseParen => break,
            Token::Atom(attribute) | Token::Quoted(attribute) => attribute,
            _ => return None,
        };

        let value = match reader.peek_token()? {
            Token::Nil => {
                reader.read_token();
                None
            }
            _ => reader.read_nstring(),
        };

        attributes.push((attribute, value));
    }

    Some(Annotation {
        mailbox,
        entry,
        attributes,
    })
}

/// `* ID NIL` or `* ID (<key> <value-or-NIL> ...)`.
pub fn parse_id(reader: &mut LineReader) -> Option<IdParams> {
    match reader.read_token()? {
        Token::Nil => Some(IdParams::default()),
        Token::OpenParen => {
            let mut params = Vec::new();
            loop {
                let key = match reader.read_token()? {
                    Token::CloseParen => break,
                    Token::Atom(key) | Token::Quoted(key) => key,
                    _ => return None,
                };

                let value = match reader.peek_token()? {
                    Token::Nil => {
                        reader.read_token();
                        None
                    }
                    _ => reader.read_nstring(),
                };

                params.push((key, value));
            }
            Some(IdParams { params })
        }
        _ => None,
    }
}

/// `* VANISHED [(EARLIER)] <uid-set>`.
pub fn parse_vanished(reader: &mut LineReader) -> Option<Vanished> {
    let mut earlier = false;

    if matches!(reader.peek_token(), Some(Token::OpenParen)) {
        reader.read_token();
        loop {
            match reader.read_token()? {
                Token::CloseParen => break,
                Token::Atom(word) if word.eq_ignore_ascii_case("EARLIER") => earlier = true,
                _ => {}
            }
        }
    }

    let uids = match reader.read_token()? {
        Token::Atom(text) => text.parse().ok()?,
        _ => return None,
    };

    Some(Vanished { earlier, uids })
}

/// `* NAMESPACE <personal> <other-users> <shared>`.
pub fn parse_namespaces(reader: &mut LineReader) -> Option<Namespaces> {
    let personal = parse_namespace_list(reader)?;
    let other_users = parse_namespace_list(reader)?;
    let shared = parse_namespace_list(reader)?;

    Some(Namespaces {
        personal,
        other_users,
        shared,
    })
}

/// `NIL` or `((prefix delimiter [extensions])...)`.
fn parse_namespace_list(reader: &mut LineReader) -> Option<Vec<Namespace>> {
    match reader.read_token()? {
        Token::Nil => Some(Vec::new()),
        Token::OpenParen => {
            let mut namespaces = Vec::new();
            loop {
                match reader.read_token()? {
                    Token::CloseParen => break,
                    Token::OpenParen => {
                        let prefix = reader.read_nstring().unwrap_or_default();
                        let delimiter = reader
                            .read_nstring()
                            .and_then(|text| text.chars().next());

                        // Namespace extensions are skipped.
                        loop {
                            match reader.peek_token()? {
                                Token::CloseParen => {
                                    reader.read_token();
                                    break;
                                }
                                _ => {
                                    reader.skip_value();
                                }
                            }
                        }

                        namespaces.push(Namespace { prefix, delimiter });
                    }
                    _ => return None,
                }
            }
            Some(namespaces)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status() {
        let mut reader =
            LineReader::for_text("\"INBOX\" (MESSAGES 231 uidnext 44292 UNSEEN 3)");
        let status = parse_status(&mut reader).unwrap();

        assert_eq!("INBOX", status.mailbox);
        assert_eq!(Some(231), status.get("MESSAGES"));
        assert_eq!(Some(44292), status.get("UIDNEXT"));
        assert_eq!(Some(3), status.get("unseen"));
    }

    #[test]
    fn test_list_with_special_use() {
        let mut reader =
            LineReader::for_text("(\\HasNoChildren \\Trash) \"/\" \"Deleted Items\"");
        let folder = parse_list(&mut reader).unwrap();

        assert_eq!("Deleted Items", folder.name);
        assert_eq!(Some('/'), folder.delimiter);
        assert!(folder.has(FolderAttribute::Trash));
        assert!(folder.has(FolderAttribute::HasNoChildren));
        assert!(folder.is_selectable());
    }

    #[test]
    fn test_list_decodes_utf7_names() {
        let mut reader = LineReader::for_text("(\\NoSelect) \"/\" Entw&APw-rfe");
        let folder = parse_list(&mut reader).unwrap();

        assert_eq!("Entw&APw-rfe", folder.raw);
        assert_eq!("Entwürfe", folder.name);
        assert!(!folder.is_selectable());
    }

    #[test]
    fn test_list_nil_delimiter() {
        let mut reader = LineReader::for_text("() NIL inbox-alias");
        let folder = parse_list(&mut reader).unwrap();
        assert_eq!(None, folder.delimiter);
    }

    #[test]
    fn test_quota_and_root() {
        let mut reader = LineReader::for_text("\"\" (STORAGE 10 512 MESSAGE 5 1000)");
        let quota = parse_quota(&mut reader).unwrap();

        assert_eq!("", quota.root);
        assert_eq!(
            vec![
                QuotaResource {
                    name: "STORAGE".into(),
                    usage: 10,
                    limit: 512
                },
                QuotaResource {
                    name: "MESSAGE".into(),
                    usage: 5,
                    limit: 1000
                },
            ],
            quota.resources
        );

        let mut reader = LineReader::for_text("INBOX \"\" shared");
        let root = parse_quota_root(&mut reader).unwrap();
        assert_eq!("INBOX", root.mailbox);
        assert_eq!(vec!["".to_owned(), "shared".to_owned()], root.roots);
    }

    #[test]
    fn test_acl_family() {
        let mut reader = LineReader::for_text("INBOX alice lrswi bob lrs");
        let acl = parse_acl(&mut reader).unwrap();
        assert_eq!(
            vec![
                ("alice".to_owned(), "lrswi".to_owned()),
                ("bob".to_owned(), "lrs".to_owned())
            ],
            acl.entries
        );

        let mut reader = LineReader::for_text("INBOX alice l r s w");
        let rights = parse_list_rights(&mut reader).unwrap();
        assert_eq!("l", rights.required);
        assert_eq!(vec!["r", "s", "w"], rights.optional);

        let mut reader = LineReader::for_text("INBOX lrswipkxte");
        let mine = parse_my_rights(&mut reader).unwrap();
        assert_eq!("lrswipkxte", mine.rights);
    }

    #[test]
    fn test_metadata_values_stay_bytes() {
        let literals = vec![b"\x00\x01binary".to_vec()];
        let mut reader = LineReader::new(
            b"INBOX (/private/comment {8} /shared/comment NIL)",
            &literals,
        );
        let metadata = parse_metadata(&mut reader).unwrap();

        assert_eq!("INBOX", metadata.mailbox);
        assert_eq!(
            vec![
                (
                    "/private/comment".to_owned(),
                    Some(b"\x00\x01binary".to_vec())
                ),
                ("/shared/comment".to_owned(), None),
            ],
            metadata.entries
        );
    }

    #[test]
    fn test_annotation() {
        let mut reader = LineReader::for_text(
            "INBOX /comment (\"value.priv\" \"my note\" \"value.shared\" NIL)",
        );
        let annotation = parse_annotation(&mut reader).unwrap();

        assert_eq!("/comment", annotation.entry);
        assert_eq!(
            vec![
                ("value.priv".to_owned(), Some("my note".to_owned())),
                ("value.shared".to_owned(), None),
            ],
            annotation.attributes
        );
    }

    #[test]
    fn test_id() {
        let mut reader = LineReader::for_text("(\"name\" \"Dovecot\" \"version\" NIL)");
        let id = parse_id(&mut reader).unwrap();
        assert_eq!(
            vec![
                ("name".to_owned(), Some("Dovecot".to_owned())),
                ("version".to_owned(), None),
            ],
            id.params
        );

        let mut reader = LineReader::for_text("NIL");
        assert_eq!(IdParams::default(), parse_id(&mut reader).unwrap());
    }

    #[test]
    fn test_vanished() {
        let mut reader = LineReader::for_text("(EARLIER) 1:3,5");
        let vanished = parse_vanished(&mut reader).unwrap();
        assert!(vanished.earlier);
        assert_eq!(vec![1, 2, 3, 5], vanished.uids.iter().collect::<Vec<_>>());

        let mut reader = LineReader::for_text("44");
        let vanished = parse_vanished(&mut reader).unwrap();
        assert!(!vanished.earlier);
        assert_eq!(vec![44], vanished.uids.iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_namespaces() {
        let mut reader =
            LineReader::for_text("((\"\" \"/\")) NIL ((\"#shared/\" \"/\"))");
        let namespaces = parse_namespaces(&mut reader).unwrap();

        assert_eq!(1, namespaces.personal.len());
        assert_eq!("", namespaces.personal[0].prefix);
        assert_eq!(Some('/'), namespaces.personal[0].delimiter);
        assert!(namespaces.other_users.is_empty());
        assert_eq!("#shared/", namespaces.shared[0].prefix);
    }
}
