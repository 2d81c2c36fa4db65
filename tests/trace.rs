//! Replays annotated protocol traces through the decoder and the command
//! serializer, line by line. Server lines must decode into exactly one
//! record and survive reclassification; client lines must tokenize cleanly
//! after serialization.

use mail_codec::command::{Command, CommandBody};
use mail_codec::decode::LiteralDecoder;
use mail_codec::parse::{parse_untagged, UntaggedResponse};
use mail_codec::reader::LineReader;
use mail_codec::token::Token;
use mail_types::mailbox::Mailbox;

enum Who {
    Client,
    Server,
}

struct TraceLines<'a> {
    trace: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for TraceLines<'a> {
    type Item = (Who, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let input = &self.trace[self.offset..];

        if let Some(pos) = input.iter().position(|b| *b == b'\n') {
            let who = match &input[..3] {
                b"C: " => Who::Client,
                b"S: " => Who::Server,
                _ => panic!("Line must begin with \"C: \" or \"S: \"."),
            };

            self.offset += pos + 1;

            Some((who, &input[3..pos]))
        } else {
            None
        }
    }
}

fn split_trace(trace: &[u8]) -> impl Iterator<Item = (Who, &[u8])> {
    TraceLines { trace, offset: 0 }
}

/// Every server line must come out of the decoder as one record; tagged and
/// continuation lines need a skeleton, untagged data lines must classify.
fn test_server_lines_of_trace(trace: &[u8]) {
    for (who, line) in split_trace(trace) {
        let Who::Server = who else { continue };

        let mut wire = line.to_vec();
        wire.extend_from_slice(b"\r\n");

        let mut decoder = LiteralDecoder::new();
        let records = decoder.push(&wire);
        assert_eq!(1, records.len(), "{:?}", String::from_utf8_lossy(line));

        let record = &records[0];
        assert!(
            record.skeleton.is_some(),
            "no skeleton for {:?}",
            String::from_utf8_lossy(line)
        );

        if record.is_untagged() {
            // Status lines classify as Cond; data lines as their own shape.
            let classified = parse_untagged(record);
            assert!(
                classified.is_some(),
                "unclassified: {:?}",
                String::from_utf8_lossy(line)
            );
        }
    }
}

#[test]
fn test_select_trace() {
    let trace = br#"S: * 172 EXISTS
S: * 1 RECENT
S: * OK [UNSEEN 12] Message 12 is first unseen
S: * OK [UIDVALIDITY 3857529045] UIDs valid
S: * OK [UIDNEXT 4392] Predicted next UID
S: * FLAGS (\Answered \Flagged \Deleted \Seen \Draft)
S: * OK [PERMANENTFLAGS (\Deleted \Seen \*)] Limited
S: a142 OK [READ-WRITE] SELECT completed
"#;

    test_server_lines_of_trace(trace);
}

#[test]
fn test_fetch_trace() {
    let trace = br#"S: * 12 FETCH (FLAGS (\Seen) INTERNALDATE "17-Jul-1996 02:44:25 -0700" RFC822.SIZE 4286 ENVELOPE ("Wed, 17 Jul 1996 02:23:25 -0700 (PDT)" "IMAP4rev1 WG mtg summary and minutes" (("Terry Gray" NIL "gray" "cac.washington.edu")) (("Terry Gray" NIL "gray" "cac.washington.edu")) (("Terry Gray" NIL "gray" "cac.washington.edu")) ((NIL NIL "imap" "cac.washington.edu")) ((NIL NIL "minutes" "CNRI.Reston.VA.US") ("John Klensin" NIL "KLENSIN" "MIT.EDU")) NIL NIL "<B27397-0100000@cac.washington.edu>") BODY ("TEXT" "PLAIN" ("CHARSET" "US-ASCII") NIL NIL "7BIT" 3028 92))
S: a003 OK FETCH completed
S: * 23 EXISTS
S: * 3 RECENT
S: * 14 FETCH (FLAGS (\Seen \Deleted))
S: a047 OK NOOP completed
"#;

    test_server_lines_of_trace(trace);
}

#[test]
fn test_extension_trace() {
    let trace = br#"S: * ESEARCH (TAG "A282") MIN 2 COUNT 3
S: * QUOTA "" (STORAGE 10 512)
S: * QUOTAROOT INBOX ""
S: * ACL INBOX alice lrswipkxte bob lrs
S: * MYRIGHTS INBOX lrswipkxte
S: * METADATA INBOX (/shared/comment "Shared comment")
S: * VANISHED (EARLIER) 300:310,405,411
S: * STATUS blurdybloop (MESSAGES 231 UIDNEXT 44292)
S: * NAMESPACE (("" "/")) NIL NIL
S: * ID ("name" "Cyrus" "version" "1.5")
S: * ENABLED CONDSTORE QRESYNC
S: A001 OK done
"#;

    test_server_lines_of_trace(trace);
}

/// Client side: serialized commands must re-tokenize without loss.
#[test]
fn test_command_serialization_tokenizes() {
    let bodies = vec![
        CommandBody::Capability,
        CommandBody::Noop,
        CommandBody::Login {
            username: "alice".into(),
            password: "p@ss w\"ord".into(),
        },
        CommandBody::Select {
            mailbox: Mailbox::from("Entwürfe"),
            qresync: None,
        },
        CommandBody::Status {
            mailbox: Mailbox::Inbox,
            items: vec!["MESSAGES".into(), "UIDNEXT".into()],
        },
        CommandBody::Fetch {
            set: "1:*".parse().unwrap(),
            items: "(UID FLAGS BODY.PEEK[HEADER.FIELDS (FROM TO)])".into(),
            uid: true,
            changed_since: Some(715_194),
        },
        CommandBody::List {
            reference: String::new(),
            pattern: "%".into(),
            return_status: None,
        },
    ];

    for body in bodies {
        let segments = Command::new("A0007", body).serialize(true);
        assert_eq!(1, segments.len());
        let wire = &segments[0];
        assert!(wire.ends_with(b"\r\n"));

        let line = &wire[..wire.len() - 2];
        let mut reader = LineReader::new(line, &[]);

        // The tag always tokenizes first; the rest of the line must consume
        // without a lexical error.
        assert_eq!(Some(Token::Atom("A0007".into())), reader.read_token());
        let mut tokens = 0;
        while reader.read_token().is_some() {
            tokens += 1;
        }
        assert!(tokens > 0, "{:?}", String::from_utf8_lossy(line));
        assert!(reader.at_end(), "{:?}", String::from_utf8_lossy(line));
    }
}

/// An untagged FLAGS line and its PERMANENTFLAGS cousin carry different
/// payloads through the same reader.
#[test]
fn test_flags_classification() {
    let mut decoder = LiteralDecoder::new();
    let records = decoder.push(b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n");

    let Some(UntaggedResponse::Flags(flags)) = parse_untagged(&records[0]) else {
        panic!("expected FLAGS");
    };
    assert_eq!(5, flags.len());
}
