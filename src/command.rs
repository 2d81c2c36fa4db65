//! Command construction: kinds, the argument quoter, and the tag generator.
//!
//! A command serializes to one or more byte segments. Segment boundaries sit
//! immediately after each synchronizing literal header: the session sends one
//! segment, waits for the server's `+` continuation, then sends the next.
//! When the server advertises LITERAL+, the quoter emits non-synchronizing
//! headers instead and the whole command collapses into one segment.

use std::fmt::Write;

use mail_types::{
    flag::{Flag, StoreAction},
    headers::HeaderSet,
    mailbox::{encode_utf7, Mailbox},
    sequence::SequenceSet,
    utils::{escape_quoted, indicators::is_atom_char},
};

/// Generates `A0001`, `A0002`, ... Tags never repeat within a session.
#[derive(Debug, Default)]
pub struct TagGenerator {
    counter: u32,
}

impl TagGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_tag(&mut self) -> String {
        self.counter += 1;
        format!("A{:04}", self.counter)
    }
}

/// One pre-quoted command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Atom(String),
    Quoted(String),
    Literal(Vec<u8>),
    /// Pre-rendered wire text: sequence sets, item lists, numbers.
    Raw(String),
}

/// Picks the narrowest safe form for a value: empty becomes `""`, atom bytes
/// become an atom, printable text becomes a quoted string, anything else a
/// literal.
pub fn quote_value(bytes: &[u8]) -> Argument {
    if bytes.is_empty() {
        return Argument::Quoted(String::new());
    }

    if bytes.iter().all(|b| is_atom_char(*b)) {
        // Safety: `unwrap` can't panic, atom bytes are ASCII.
        return Argument::Atom(std::str::from_utf8(bytes).unwrap().to_owned());
    }

    let quotable = bytes
        .iter()
        .all(|b| matches!(b, 0x20..=0x7e));
    if quotable {
        // Safety: `unwrap` can't panic, printable bytes are ASCII.
        return Argument::Quoted(std::str::from_utf8(bytes).unwrap().to_owned());
    }

    Argument::Literal(bytes.to_vec())
}

pub fn quote_text(text: &str) -> Argument {
    quote_value(text.as_bytes())
}

/// Quotes a mailbox name: Modified UTF-7 first, then the narrowest form.
pub fn quote_mailbox(mailbox: &Mailbox) -> Argument {
    quote_text(&encode_utf7(mailbox.as_str()))
}

/// Every command this client emits.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandBody {
    Capability,
    Noop,
    Logout,
    StartTls,
    Login {
        username: String,
        password: String,
    },
    Authenticate {
        mechanism: String,
        /// SASL-IR initial response, already base64.
        initial: Option<String>,
    },
    Select {
        mailbox: Mailbox,
        /// `(QRESYNC (uidvalidity modseq))` when resuming a known mailbox.
        qresync: Option<(u32, u64)>,
    },
    Examine {
        mailbox: Mailbox,
    },
    Create {
        mailbox: Mailbox,
    },
    Delete {
        mailbox: Mailbox,
    },
    Rename {
        from: Mailbox,
        to: Mailbox,
    },
    Subscribe {
        mailbox: Mailbox,
    },
    Unsubscribe {
        mailbox: Mailbox,
    },
    List {
        reference: String,
        pattern: String,
        /// LIST-STATUS items to return, e.g. `MESSAGES UIDNEXT`.
        return_status: Option<Vec<String>>,
    },
    Lsub {
        reference: String,
        pattern: String,
    },
    Status {
        mailbox: Mailbox,
        items: Vec<String>,
    },
    Append {
        mailbox: Mailbox,
        flags: Vec<Flag>,
        /// Pre-rendered INTERNALDATE, quoted by the caller.
        date: Option<String>,
        message: Vec<u8>,
    },
    Check,
    Close,
    Unselect,
    Expunge,
    UidExpunge {
        set: SequenceSet,
    },
    Search {
        /// Pre-rendered criteria, e.g. `UNSEEN SINCE 1-Jan-2025`.
        criteria: String,
        uid: bool,
        /// ESEARCH result options, e.g. `MIN MAX COUNT`.
        return_options: Option<Vec<String>>,
    },
    Sort {
        program: Vec<String>,
        charset: String,
        criteria: String,
        uid: bool,
    },
    Fetch {
        set: SequenceSet,
        /// Pre-rendered item list, e.g. `(UID FLAGS BODY.PEEK[])`.
        items: String,
        uid: bool,
        changed_since: Option<u64>,
    },
    Store {
        set: SequenceSet,
        action: StoreAction,
        silent: bool,
        flags: Vec<Flag>,
        uid: bool,
        unchanged_since: Option<u64>,
    },
    Copy {
        set: SequenceSet,
        mailbox: Mailbox,
        uid: bool,
    },
    Move {
        set: SequenceSet,
        mailbox: Mailbox,
        uid: bool,
    },
    Idle,
    Enable {
        capabilities: Vec<String>,
    },
    Id {
        params: Vec<(String, Option<String>)>,
    },
    Namespace,
    GetQuota {
        root: String,
    },
    GetQuotaRoot {
        mailbox: Mailbox,
    },
    SetQuota {
        root: String,
        limits: Vec<(String, u64)>,
    },
    GetAcl {
        mailbox: Mailbox,
    },
    SetAcl {
        mailbox: Mailbox,
        identifier: String,
        rights: String,
    },
    DeleteAcl {
        mailbox: Mailbox,
        identifier: String,
    },
    ListRights {
        mailbox: Mailbox,
        identifier: String,
    },
    MyRights {
        mailbox: Mailbox,
    },
    GetMetadata {
        mailbox: Mailbox,
        entries: Vec<String>,
    },
    SetMetadata {
        mailbox: Mailbox,
        entries: Vec<(String, Option<Vec<u8>>)>,
    },
    GetAnnotation {
        mailbox: Mailbox,
        entry: String,
        attribute: String,
    },
    SetAnnotation {
        mailbox: Mailbox,
        entry: String,
        attributes: Vec<(String, Option<String>)>,
    },
}

impl CommandBody {
    /// The capability (spellings) a command requires before any byte is
    /// written, if any.
    pub fn required_capability(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Sort { .. } => Some(&["SORT"]),
            Self::UidExpunge { .. } => Some(&["UIDPLUS"]),
            Self::Move { .. } => Some(&["MOVE"]),
            Self::Idle => Some(&["IDLE"]),
            Self::Enable { .. } => Some(&["ENABLE"]),
            Self::Id { .. } => Some(&["ID"]),
            Self::Namespace => Some(&["NAMESPACE"]),
            Self::GetQuota { .. } | Self::GetQuotaRoot { .. } | Self::SetQuota { .. } => {
                Some(&["QUOTA"])
            }
            Self::GetAcl { .. }
            | Self::SetAcl { .. }
            | Self::DeleteAcl { .. }
            | Self::ListRights { .. }
            | Self::MyRights { .. } => Some(&["ACL"]),
            Self::GetMetadata { .. } | Self::SetMetadata { .. } => Some(&["METADATA"]),
            Self::GetAnnotation { .. } | Self::SetAnnotation { .. } => {
                Some(&["ANNOTATE", "ANNOTATION"])
            }
            Self::Unselect => Some(&["UNSELECT"]),
            _ => None,
        }
    }

    /// True for LOGIN/AUTHENTICATE, which arm the secret detector.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Login { .. } | Self::Authenticate { .. })
    }
}

/// A command ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub tag: String,
    pub body: CommandBody,
}

impl Command {
    pub fn new(tag: impl Into<String>, body: CommandBody) -> Self {
        Self {
            tag: tag.into(),
            body,
        }
    }

    /// Serializes to wire segments. Every segment but the last ends with a
    /// synchronizing literal header; the session must observe a continuation
    /// before sending the next. With `literal_plus` the result is always a
    /// single segment.
    pub fn serialize(&self, literal_plus: bool) -> Vec<Vec<u8>> {
        let mut writer = Writer::new(literal_plus);
        writer.text(&self.tag);

        render(&self.body, &mut writer);

        writer.finish()
    }
}

struct Writer {
    segments: Vec<Vec<u8>>,
    current: Vec<u8>,
    literal_plus: bool,
}

impl Writer {
    fn new(literal_plus: bool) -> Self {
        Self {
            segments: Vec::new(),
            current: Vec::new(),
            literal_plus,
        }
    }

    fn text(&mut self, text: &str) {
        self.current.extend_from_slice(text.as_bytes());
    }

    fn sp_text(&mut self, text: &str) {
        self.current.push(b' ');
        self.text(text);
    }

    fn argument(&mut self, argument: &Argument) {
        self.current.push(b' ');
        match argument {
            Argument::Atom(text) | Argument::Raw(text) => self.text(text),
            Argument::Quoted(text) => {
                let mut quoted = String::with_capacity(text.len() + 2);
                quoted.push('"');
                quoted.push_str(&escape_quoted(text));
                quoted.push('"');
                self.text(&quoted);
            }
            Argument::Literal(data) => self.literal(data),
        }
    }

    fn literal(&mut self, data: &[u8]) {
        let mut header = String::new();
        // Safety: `unwrap` can't panic, writing to a String is infallible.
        write!(
            header,
            "{{{}{}}}",
            data.len(),
            if self.literal_plus { "+" } else { "" }
        )
        .unwrap();
        self.text(&header);
        self.current.extend_from_slice(b"\r\n");

        if !self.literal_plus {
            // Synchronizing: the payload opens the next segment.
            self.segments.push(std::mem::take(&mut self.current));
        }

        self.current.extend_from_slice(data);
    }

    fn finish(mut self) -> Vec<Vec<u8>> {
        self.current.extend_from_slice(b"\r\n");
        self.segments.push(self.current);
        self.segments
    }
}

fn render(body: &CommandBody, w: &mut Writer) {
    match body {
        CommandBody::Capability => w.sp_text("CAPABILITY"),
        CommandBody::Noop => w.sp_text("NOOP"),
        CommandBody::Logout => w.sp_text("LOGOUT"),
        CommandBody::StartTls => w.sp_text("STARTTLS"),
        CommandBody::Check => w.sp_text("CHECK"),
        CommandBody::Close => w.sp_text("CLOSE"),
        CommandBody::Unselect => w.sp_text("UNSELECT"),
        CommandBody::Expunge => w.sp_text("EXPUNGE"),
        CommandBody::Idle => w.sp_text("IDLE"),
        CommandBody::Namespace => w.sp_text("NAMESPACE"),

        CommandBody::Login { username, password } => {
            w.sp_text("LOGIN");
            w.argument(&quote_text(username));
            w.argument(&quote_text(password));
        }
        CommandBody::Authenticate { mechanism, initial } => {
            w.sp_text("AUTHENTICATE");
            w.sp_text(mechanism);
            if let Some(initial) = initial {
                w.sp_text(initial);
            }
        }

        CommandBody::Select { mailbox, qresync } => {
            w.sp_text("SELECT");
            w.argument(&quote_mailbox(mailbox));
            if let Some((uid_validity, mod_seq)) = qresync {
                w.sp_text(&format!("(QRESYNC ({} {}))", uid_validity, mod_seq));
            }
        }
        CommandBody::Examine { mailbox } => {
            w.sp_text("EXAMINE");
            w.argument(&quote_mailbox(mailbox));
        }
        CommandBody::Create { mailbox } => {
            w.sp_text("CREATE");
            w.argument(&quote_mailbox(mailbox));
        }
        CommandBody::Delete { mailbox } => {
            w.sp_text("DELETE");
            w.argument(&quote_mailbox(mailbox));
        }
        CommandBody::Rename { from, to } => {
            w.sp_text("RENAME");
            w.argument(&quote_mailbox(from));
            w.argument(&quote_mailbox(to));
        }
        CommandBody::Subscribe { mailbox } => {
            w.sp_text("SUBSCRIBE");
            w.argument(&quote_mailbox(mailbox));
        }
        CommandBody::Unsubscribe { mailbox } => {
            w.sp_text("UNSUBSCRIBE");
            w.argument(&quote_mailbox(mailbox));
        }

        CommandBody::List {
            reference,
            pattern,
            return_status,
        } => {
            w.sp_text("LIST");
            w.argument(&quote_text(reference));
            w.argument(&quote_text(pattern));
            if let Some(items) = return_status {
                w.sp_text(&format!("RETURN (STATUS ({}))", items.join(" ")));
            }
        }
        CommandBody::Lsub { reference, pattern } => {
            w.sp_text("LSUB");
            w.argument(&quote_text(reference));
            w.argument(&quote_text(pattern));
        }
        CommandBody::Status { mailbox, items } => {
            w.sp_text("STATUS");
            w.argument(&quote_mailbox(mailbox));
            w.sp_text(&format!("({})", items.join(" ")));
        }

        CommandBody::Append {
            mailbox,
            flags,
            date,
            message,
        } => {
            w.sp_text("APPEND");
            w.argument(&quote_mailbox(mailbox));
            if !flags.is_empty() {
                w.sp_text(&format!("({})", join_flags(flags)));
            }
            if let Some(date) = date {
                w.sp_text(date);
            }
            w.current.push(b' ');
            w.literal(message);
        }

        CommandBody::UidExpunge { set } => {
            w.sp_text("UID EXPUNGE");
            w.sp_text(&set.to_string());
        }

        CommandBody::Search {
            criteria,
            uid,
            return_options,
        } => {
            w.sp_text(if *uid { "UID SEARCH" } else { "SEARCH" });
            if let Some(options) = return_options {
                w.sp_text(&format!("RETURN ({})", options.join(" ")));
            }
            w.sp_text(criteria);
        }
        CommandBody::Sort {
            program,
            charset,
            criteria,
            uid,
        } => {
            w.sp_text(if *uid { "UID SORT" } else { "SORT" });
            w.sp_text(&format!("({})", program.join(" ")));
            w.sp_text(charset);
            w.sp_text(criteria);
        }

        CommandBody::Fetch {
            set,
            items,
            uid,
            changed_since,
        } => {
            w.sp_text(if *uid { "UID FETCH" } else { "FETCH" });
            w.sp_text(&set.to_string());
            w.sp_text(items);
            if let Some(mod_seq) = changed_since {
                w.sp_text(&format!("(CHANGEDSINCE {})", mod_seq));
            }
        }
        CommandBody::Store {
            set,
            action,
            silent,
            flags,
            uid,
            unchanged_since,
        } => {
            w.sp_text(if *uid { "UID STORE" } else { "STORE" });
            w.sp_text(&set.to_string());
            if let Some(mod_seq) = unchanged_since {
                w.sp_text(&format!("(UNCHANGEDSINCE {})", mod_seq));
            }
            w.sp_text(action.item(*silent));
            w.sp_text(&format!("({})", join_flags(flags)));
        }
        CommandBody::Copy { set, mailbox, uid } => {
            w.sp_text(if *uid { "UID COPY" } else { "COPY" });
            w.sp_text(&set.to_string());
            w.argument(&quote_mailbox(mailbox));
        }
        CommandBody::Move { set, mailbox, uid } => {
            w.sp_text(if *uid { "UID MOVE" } else { "MOVE" });
            w.sp_text(&set.to_string());
            w.argument(&quote_mailbox(mailbox));
        }

        CommandBody::Enable { capabilities } => {
            w.sp_text("ENABLE");
            w.sp_text(&capabilities.join(" "));
        }
        CommandBody::Id { params } => {
            w.sp_text("ID");
            if params.is_empty() {
                w.sp_text("NIL");
            } else {
                let rendered: Vec<String> = params
                    .iter()
                    .flat_map(|(key, value)| {
                        [
                            format!("\"{}\"", escape_quoted(key)),
                            match value {
                                Some(value) => format!("\"{}\"", escape_quoted(value)),
                                None => String::from("NIL"),
                            },
                        ]
                    })
                    .collect();
                w.sp_text(&format!("({})", rendered.join(" ")));
            }
        }

        CommandBody::GetQuota { root } => {
            w.sp_text("GETQUOTA");
            w.argument(&quote_text(root));
        }
        CommandBody::GetQuotaRoot { mailbox } => {
            w.sp_text("GETQUOTAROOT");
            w.argument(&quote_mailbox(mailbox));
        }
        CommandBody::SetQuota { root, limits } => {
            w.sp_text("SETQUOTA");
            w.argument(&quote_text(root));
            let rendered: Vec<String> = limits
                .iter()
                .map(|(name, limit)| format!("{} {}", name, limit))
                .collect();
            w.sp_text(&format!("({})", rendered.join(" ")));
        }

        CommandBody::GetAcl { mailbox } => {
            w.sp_text("GETACL");
            w.argument(&quote_mailbox(mailbox));
        }
        CommandBody::SetAcl {
            mailbox,
            identifier,
            rights,
        } => {
            w.sp_text("SETACL");
            w.argument(&quote_mailbox(mailbox));
            w.argument(&quote_text(identifier));
            w.argument(&quote_text(rights));
        }
        CommandBody::DeleteAcl {
            mailbox,
            identifier,
        } => {
            w.sp_text("DELETEACL");
            w.argument(&quote_mailbox(mailbox));
            w.argument(&quote_text(identifier));
        }
        CommandBody::ListRights {
            mailbox,
            identifier,
        } => {
            w.sp_text("LISTRIGHTS");
            w.argument(&quote_mailbox(mailbox));
            w.argument(&quote_text(identifier));
        }
        CommandBody::MyRights { mailbox } => {
            w.sp_text("MYRIGHTS");
            w.argument(&quote_mailbox(mailbox));
        }

        CommandBody::GetMetadata { mailbox, entries } => {
            w.sp_text("GETMETADATA");
            w.argument(&quote_mailbox(mailbox));
            let rendered: Vec<String> = entries
                .iter()
                .map(|entry| format!("\"{}\"", escape_quoted(entry)))
                .collect();
            w.sp_text(&format!("({})", rendered.join(" ")));
        }
        CommandBody::SetMetadata { mailbox, entries } => {
            w.sp_text("SETMETADATA");
            w.argument(&quote_mailbox(mailbox));
            w.text(" (");
            for (i, (entry, value)) in entries.iter().enumerate() {
                if i > 0 {
                    w.text(" ");
                }
                w.text(&format!("\"{}\" ", escape_quoted(entry)));
                match value {
                    None => w.text("NIL"),
                    Some(value) => match quote_value(value) {
                        Argument::Literal(data) => w.literal(&data),
                        Argument::Atom(text) | Argument::Raw(text) => w.text(&text),
                        Argument::Quoted(text) => {
                            w.text(&format!("\"{}\"", escape_quoted(&text)))
                        }
                    },
                }
            }
            w.text(")");
        }

        CommandBody::GetAnnotation {
            mailbox,
            entry,
            attribute,
        } => {
            w.sp_text("GETANNOTATION");
            w.argument(&quote_mailbox(mailbox));
            w.argument(&quote_text(entry));
            w.argument(&quote_text(attribute));
        }
        CommandBody::SetAnnotation {
            mailbox,
            entry,
            attributes,
        } => {
            w.sp_text("SETANNOTATION");
            w.argument(&quote_mailbox(mailbox));
            w.argument(&quote_text(entry));
            let rendered: Vec<String> = attributes
                .iter()
                .flat_map(|(attribute, value)| {
                    [
                        format!("\"{}\"", escape_quoted(attribute)),
                        match value {
                            Some(value) => format!("\"{}\"", escape_quoted(value)),
                            None => String::from("NIL"),
                        },
                    ]
                })
                .collect();
            w.sp_text(&format!("({})", rendered.join(" ")));
        }
    }
}

fn join_flags(flags: &[Flag]) -> String {
    flags
        .iter()
        .map(|flag| flag.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A FETCH item list for the common attribute combinations.
pub fn fetch_items(envelope: bool, body_structure: bool, headers: Option<&HeaderSet>) -> String {
    let mut items = vec!["UID", "FLAGS", "RFC822.SIZE", "INTERNALDATE"];
    if envelope {
        items.push("ENVELOPE");
    }
    if body_structure {
        items.push("BODYSTRUCTURE");
    }

    let mut out = format!("({}", items.join(" "));
    if let Some(headers) = headers {
        let spec = if headers.is_exclude() {
            "HEADER.FIELDS.NOT"
        } else {
            "HEADER.FIELDS"
        };
        out.push_str(&format!(" BODY.PEEK[{} {}]", spec, headers));
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_segment(command: &Command) -> String {
        let segments = command.serialize(false);
        assert_eq!(1, segments.len());
        String::from_utf8(segments.into_iter().next().unwrap()).unwrap()
    }

    #[test]
    fn test_tag_generator_format() {
        let mut tags = TagGenerator::new();
        assert_eq!("A0001", tags.next_tag());
        assert_eq!("A0002", tags.next_tag());
        for _ in 0..9_998 {
            tags.next_tag();
        }
        assert_eq!("A10001", tags.next_tag());
    }

    #[test]
    fn test_quoter_forms() {
        let tests = [
            (&b""[..], Argument::Quoted("".into())),
            (b"INBOX", Argument::Atom("INBOX".into())),
            (b"box name", Argument::Quoted("box name".into())),
            (b"quo\"te", Argument::Quoted("quo\"te".into())),
            (b"back\\slash", Argument::Quoted("back\\slash".into())),
            (b"line\r\nbreak", Argument::Literal(b"line\r\nbreak".to_vec())),
            (b"\xc3\xa9", Argument::Literal(b"\xc3\xa9".to_vec())),
        ];

        for (input, expected) in tests {
            assert_eq!(expected, quote_value(input), "{:?}", input);
        }
    }

    #[test]
    fn test_simple_commands() {
        let tests = [
            (CommandBody::Capability, "A1 CAPABILITY\r\n"),
            (CommandBody::Noop, "A1 NOOP\r\n"),
            (CommandBody::Close, "A1 CLOSE\r\n"),
            (CommandBody::Idle, "A1 IDLE\r\n"),
        ];

        for (body, expected) in tests {
            assert_eq!(expected, one_segment(&Command::new("A1", body)));
        }
    }

    #[test]
    fn test_login_quoting() {
        let command = Command::new(
            "A1",
            CommandBody::Login {
                username: "alice".into(),
                password: "p@ss w\"ord".into(),
            },
        );

        assert_eq!(
            "A1 LOGIN alice \"p@ss w\\\"ord\"\r\n",
            one_segment(&command)
        );
    }

    #[test]
    fn test_select_encodes_mailbox() {
        let command = Command::new(
            "A2",
            CommandBody::Select {
                mailbox: Mailbox::from("Entwürfe"),
                qresync: None,
            },
        );

        assert_eq!("A2 SELECT Entw&APw-rfe\r\n", one_segment(&command));
    }

    #[test]
    fn test_select_qresync() {
        let command = Command::new(
            "A2",
            CommandBody::Select {
                mailbox: Mailbox::Inbox,
                qresync: Some((100, 715_194)),
            },
        );

        assert_eq!(
            "A2 SELECT INBOX (QRESYNC (100 715194))\r\n",
            one_segment(&command)
        );
    }

    #[test]
    fn test_sync_literal_splits_segments() {
        let command = Command::new(
            "A3",
            CommandBody::Login {
                username: "alice".into(),
                password: "pa\nss".into(),
            },
        );

        let segments = command.serialize(false);
        assert_eq!(2, segments.len());
        assert_eq!(b"A3 LOGIN alice {5}\r\n".to_vec(), segments[0]);
        assert_eq!(b"pa\nss\r\n".to_vec(), segments[1]);
    }

    #[test]
    fn test_literal_plus_stays_single_segment() {
        let command = Command::new(
            "A3",
            CommandBody::Login {
                username: "alice".into(),
                password: "pa\nss".into(),
            },
        );

        let segments = command.serialize(true);
        assert_eq!(1, segments.len());
        assert_eq!(b"A3 LOGIN alice {5+}\r\npa\nss\r\n".to_vec(), segments[0]);
    }

    #[test]
    fn test_append_with_flags_and_literal() {
        let command = Command::new(
            "A4",
            CommandBody::Append {
                mailbox: Mailbox::Inbox,
                flags: vec![Flag::Seen],
                date: None,
                message: b"From: a\r\n\r\nhi".to_vec(),
            },
        );

        let segments = command.serialize(false);
        assert_eq!(2, segments.len());
        assert_eq!(b"A4 APPEND INBOX (\\Seen) {13}\r\n".to_vec(), segments[0]);
        assert_eq!(b"From: a\r\n\r\nhi\r\n".to_vec(), segments[1]);
    }

    #[test]
    fn test_uid_fetch_changedsince() {
        let command = Command::new(
            "A5",
            CommandBody::Fetch {
                set: "1:*".parse().unwrap(),
                items: "(UID FLAGS)".into(),
                uid: true,
                changed_since: Some(715_194),
            },
        );

        assert_eq!(
            "A5 UID FETCH 1:* (UID FLAGS) (CHANGEDSINCE 715194)\r\n",
            one_segment(&command)
        );
    }

    #[test]
    fn test_store_silent() {
        let command = Command::new(
            "A6",
            CommandBody::Store {
                set: "7".parse().unwrap(),
                action: StoreAction::Add,
                silent: true,
                flags: vec![Flag::Deleted],
                uid: true,
                unchanged_since: None,
            },
        );

        assert_eq!(
            "A6 UID STORE 7 +FLAGS.SILENT (\\Deleted)\r\n",
            one_segment(&command)
        );
    }

    #[test]
    fn test_status_and_list_status() {
        let command = Command::new(
            "A7",
            CommandBody::Status {
                mailbox: Mailbox::Inbox,
                items: vec!["MESSAGES".into(), "UIDNEXT".into()],
            },
        );
        assert_eq!("A7 STATUS INBOX (MESSAGES UIDNEXT)\r\n", one_segment(&command));

        let command = Command::new(
            "A8",
            CommandBody::List {
                reference: "".into(),
                pattern: "*".into(),
                return_status: Some(vec!["MESSAGES".into()]),
            },
        );
        assert_eq!(
            "A8 LIST \"\" \"*\" RETURN (STATUS (MESSAGES))\r\n",
            one_segment(&command)
        );
    }

    #[test]
    fn test_roundtrip_through_lexer() {
        // Serialization must tokenize back to the same shape.
        use crate::reader::LineReader;
        use crate::token::Token;

        let command = Command::new(
            "A9",
            CommandBody::Login {
                username: "alice".into(),
                password: "p@ss w\"ord".into(),
            },
        );
        let wire = one_segment(&command);
        let line = wire.trim_end();

        let mut reader = LineReader::new(line.as_bytes(), &[]);
        assert_eq!(Some(Token::Atom("A9".into())), reader.read_token());
        assert_eq!(Some(Token::Atom("LOGIN".into())), reader.read_token());
        assert_eq!(Some(Token::Atom("alice".into())), reader.read_token());
        assert_eq!(Some(Token::Quoted("p@ss w\"ord".into())), reader.read_token());
        assert_eq!(None, reader.read_token());
    }

    #[test]
    fn test_required_capabilities() {
        assert_eq!(
            Some(&["SORT"][..]),
            CommandBody::Sort {
                program: vec!["DATE".into()],
                charset: "UTF-8".into(),
                criteria: "ALL".into(),
                uid: false,
            }
            .required_capability()
        );
        assert_eq!(None, CommandBody::Noop.required_capability());
    }

    #[test]
    fn test_fetch_items_builder() {
        let headers = HeaderSet::try_from_names(["From", "Subject"]).unwrap();
        let items = fetch_items(true, false, Some(&headers));
        assert_eq!(
            "(UID FLAGS RFC822.SIZE INTERNALDATE ENVELOPE BODY.PEEK[HEADER.FIELDS (FROM SUBJECT)])",
            items
        );
    }
}
