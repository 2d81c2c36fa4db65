//! End-to-end scenarios across the decoder, parsers, reducer, and the
//! secret detector.

use mail_codec::decode::LiteralDecoder;
use mail_codec::mailbox_state::{apply, QresyncEvent, SelectedState};
use mail_codec::parse::{parse_body_structure, parse_envelope, parse_untagged, UntaggedResponse};
use mail_codec::pop3::{Pop3Core, Pop3Event};
use mail_codec::redact::{redact, Protocol, SecretDetector};
use mail_types::envelope::Address;
use mail_types::fetch::SectionSpec;
use mail_types::headers::HeaderSet;
use mail_types::mailbox::{decode_utf7, encode_utf7};

#[test]
fn literal_reassembly_across_chunks() {
    let mut decoder = LiteralDecoder::new();

    assert!(decoder
        .push(b"* 1 FETCH (UID 42 BODY[TEXT] {11}\r\nHello")
        .is_empty());
    let records = decoder.push(b" World\r\n)\r\n");

    assert_eq!(1, records.len());
    let record = &records[0];
    assert_eq!(vec![b"Hello World".to_vec()], record.literals);

    let Some(UntaggedResponse::Fetch(attributes)) = parse_untagged(record) else {
        panic!("expected FETCH");
    };
    assert_eq!(1, attributes.sequence);
    assert_eq!(Some(42), attributes.uid);
    assert_eq!(
        Some(SectionSpec::Text),
        attributes.sections[0]
            .section
            .as_ref()
            .and_then(|path| path.spec.clone())
    );
    assert_eq!(Some(b"Hello World".to_vec()), attributes.sections[0].data);
}

#[test]
fn envelope_scenario() {
    let line = concat!(
        "* 1 FETCH (ENVELOPE (\"Wed, 1 Jan 2025 12:00:00 +0000\" \"Hi\" ",
        "((\"A\" NIL \"a\" \"x.test\")) ((\"A\" NIL \"a\" \"x.test\")) ",
        "((\"A\" NIL \"a\" \"x.test\")) ((\"B\" NIL \"b\" \"x.test\")) ",
        "NIL NIL \"<ref@x.test>\" \"<msg@x.test>\"))\r\n"
    );

    let mut decoder = LiteralDecoder::new();
    let records = decoder.push(line.as_bytes());
    let Some(UntaggedResponse::Fetch(attributes)) = parse_untagged(&records[0]) else {
        panic!("expected FETCH");
    };

    let envelope = parse_envelope(attributes.envelope_raw.as_ref().unwrap()).unwrap();
    assert_eq!(
        "2025-01-01T12:00:00+00:00",
        envelope.date.unwrap().to_rfc3339()
    );
    assert_eq!(Some("Hi".to_owned()), envelope.subject);
    assert_eq!(Some("<msg@x.test>".to_owned()), envelope.message_id);
    assert_eq!(Some("<ref@x.test>".to_owned()), envelope.in_reply_to);

    let Address::Mailbox(from) = &envelope.from[0] else {
        panic!("expected a mailbox address");
    };
    assert_eq!(Some("a@x.test".to_owned()), from.address());
    assert!(envelope.cc.is_empty());
    assert!(envelope.bcc.is_empty());
}

#[test]
fn body_structure_enumeration_scenario() {
    let raw = concat!(
        "((\"TEXT\" \"PLAIN\" (\"CHARSET\" \"UTF-8\") NIL NIL \"7BIT\" 10 1) ",
        "(\"TEXT\" \"HTML\" (\"CHARSET\" \"UTF-8\") NIL NIL \"7BIT\" 20 1) ",
        "\"ALTERNATIVE\")"
    );

    let tree = parse_body_structure(raw).unwrap();
    let parts: Vec<(String, String)> = tree
        .enumerate_parts()
        .into_iter()
        .map(|(id, part)| (id, format!("{}/{}", part.content_type, part.subtype)))
        .collect();

    assert_eq!(
        vec![
            ("1".to_owned(), "TEXT/PLAIN".to_owned()),
            ("2".to_owned(), "TEXT/HTML".to_owned())
        ],
        parts
    );
}

#[test]
fn qresync_vanished_scenario() {
    let mut state = SelectedState::new();
    state.uid_validity = Some(100);
    state.uid_next = Some(7);
    state.uids = "1:6".parse().unwrap();

    let mut decoder = LiteralDecoder::new();
    let records = decoder.push(b"* VANISHED (EARLIER) 1:3,5\r\n");
    let (next, delta) = apply(&state, &records);

    assert_eq!(1, delta.qresync_events.len());
    let QresyncEvent::Vanished(vanished) = &delta.qresync_events[0] else {
        panic!("expected VANISHED");
    };
    assert!(vanished.earlier);
    assert_eq!(vec![1, 2, 3, 5], vanished.uids.iter().collect::<Vec<_>>());

    assert_eq!(Some(7), next.uid_next);
    assert_eq!(vec![1, 2, 3, 5], delta.removed_uids);
}

#[test]
fn esearch_scenario() {
    let mut decoder = LiteralDecoder::new();
    let records = decoder.push(b"* ESEARCH (TAG \"A001\") UID COUNT 2 MIN 7 MAX 9 ALL 7,9\r\n");

    let Some(UntaggedResponse::Esearch(esearch)) = parse_untagged(&records[0]) else {
        panic!("expected ESEARCH");
    };
    assert!(esearch.is_uid);
    assert_eq!(Some(2), esearch.count);
    assert_eq!(Some(7), esearch.min);
    assert_eq!(Some(9), esearch.max);
    assert_eq!(
        vec![7, 9],
        esearch.ids.unwrap().iter().collect::<Vec<_>>()
    );
}

#[test]
fn secret_redaction_scenario() {
    let mut detector = SecretDetector::new(Protocol::Imap);
    detector.set_authenticating(true);

    let wire = b"A001 LOGIN alice \"p@ss w\\\"ord\"\r\n";
    let spans = detector.scan(wire);
    let logged = String::from_utf8_lossy(&redact(wire, &spans, "****")).into_owned();
    assert_eq!("A001 LOGIN **** \"****\"\r\n", logged);

    // Stronger form: no password byte survives anywhere.
    let stripped = String::from_utf8_lossy(&redact(wire, &spans, "")).into_owned();
    assert!(!stripped.contains("alice"));
    assert!(!stripped.contains("p@ss"));

    detector.set_authenticating(true);
    let wire = b"A001 LOGIN alice {10+}\r\npassword12\r\n";
    let spans = detector.scan(wire);
    let logged = String::from_utf8_lossy(&redact(wire, &spans, "****")).into_owned();
    assert_eq!("A001 LOGIN **** {10+}\r\n****\r\n", logged);
}

#[test]
fn pop3_multiline_scenario() {
    let mut core = Pop3Core::new();
    core.expect_multiline(false);

    let events = core.absorb(b"+OK 5 octets\r\nhi\r\n..dot\r\n.\r\n");
    assert_eq!(1, events.len());

    let Pop3Event::Multiline { response, lines } = &events[0] else {
        panic!("expected a multiline event");
    };
    assert!(response.is_ok());
    assert_eq!(vec!["hi".to_owned(), ".dot".to_owned()], *lines);
}

// --- Boundary behaviours ---------------------------------------------------

#[test]
fn zero_length_literal_does_not_block() {
    let mut decoder = LiteralDecoder::new();
    let records = decoder.push(b"* 1 FETCH (BODY[] {0}\r\n)\r\nA1 OK done\r\n");

    assert_eq!(2, records.len());
    assert_eq!(vec![Vec::<u8>::new()], records[0].literals);
}

#[test]
fn header_set_validation() {
    assert!(HeaderSet::verify("X-FOO").is_ok());
    assert!(HeaderSet::verify("From:").is_err());
    assert!(HeaderSet::verify("").is_err());
}

#[test]
fn utf7_roundtrips() {
    let names = ["INBOX", "Entwürfe", "日本語", "Lost & Found", "a&b&c"];
    for name in names {
        assert_eq!(name, decode_utf7(&encode_utf7(name)).unwrap(), "{:?}", name);
    }

    let encoded = ["INBOX", "Entw&APw-rfe", "&ZeVnLIqe-", "Lost &- Found"];
    for text in encoded {
        assert_eq!(text, encode_utf7(&decode_utf7(text).unwrap()), "{:?}", text);
    }
}

#[test]
fn pop3_greeting_challenge() {
    use mail_codec::pop3::Pop3Response;

    let with = Pop3Response::parse(b"+OK ready <nonce@host>").unwrap();
    assert_eq!(Some("<nonce@host>".to_owned()), with.apop_challenge());

    let without = Pop3Response::parse(b"+OK ready nonce at host").unwrap();
    assert_eq!(None, without.apop_challenge());
}

#[test]
fn chunk_boundary_independence_holds() {
    let wire: &[u8] = concat!(
        "* OK [CAPABILITY IMAP4rev1 QRESYNC] ready\r\n",
        "* 2 FETCH (UID 5 BODY[1] {4}\r\nab\r\n BODY[2] {0}\r\n)\r\n",
        "A1 OK done\r\n",
    )
    .as_bytes();

    let mut whole = LiteralDecoder::new();
    let expected = whole.push(wire);
    assert_eq!(3, expected.len());

    for split in 0..wire.len() {
        let mut decoder = LiteralDecoder::new();
        let mut got = decoder.push(&wire[..split]);
        got.extend(decoder.push(&wire[split..]));
        assert_eq!(expected, got, "split at {}", split);
    }
}
