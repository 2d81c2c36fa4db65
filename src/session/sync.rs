//! The synchronous IMAP driver.
//!
//! The caller pumps the transport explicitly: `send_command` writes the
//! first segment, `wait_for_continuation` and `wait_for_tagged` poll the
//! transport up to a bounded number of reads. Useful where no async runtime
//! exists, and for scripted tests.

use std::collections::VecDeque;

use mail_types::{mailbox::Mailbox, state::ImapSessionState};

use crate::{
    command::{Command, CommandBody},
    decode::ResponseRecord,
    error::{Error, Result},
    redact::redact,
    session::{CommandOutcome, ImapCore, PendingKind, Processed},
    transport::{ProtocolLogger, Transport, REDACTION},
};

const READ_CHUNK: usize = 8 * 1024;

pub struct SyncImapSession<T> {
    transport: T,
    core: ImapCore,
    /// Decoded but not yet classified records, in receive order.
    incoming: VecDeque<ResponseRecord>,
    /// Classified records a previous wait stepped over.
    backlog: VecDeque<(ResponseRecord, Processed)>,
    logger: Option<Box<dyn ProtocolLogger>>,
}

impl<T> std::fmt::Debug for SyncImapSession<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncImapSession")
            .field("state", &self.core.state)
            .finish_non_exhaustive()
    }
}

/// Pending segments of a command whose synchronizing literals are still
/// waiting on continuations.
#[derive(Debug)]
pub struct InFlight {
    pub tag: String,
    segments: VecDeque<Vec<u8>>,
}

impl InFlight {
    pub fn needs_continuation(&self) -> bool {
        !self.segments.is_empty()
    }
}

impl<T: Transport> SyncImapSession<T> {
    /// Starts the transport and polls for the greeting.
    pub fn connect(
        mut transport: T,
        logger: Option<Box<dyn ProtocolLogger>>,
        max_reads: usize,
    ) -> Result<Self> {
        transport.start()?;

        let mut session = Self {
            transport,
            core: ImapCore::new(),
            incoming: VecDeque::new(),
            backlog: VecDeque::new(),
            logger,
        };

        for _ in 0..max_reads.max(1) {
            while let Some((_, processed)) = session.next_processed() {
                if let Processed::Greeting { .. } = processed {
                    return Ok(session);
                }
            }
            session.fetch_more()?;
        }

        Err(Error::Timeout)
    }

    pub fn state(&self) -> &ImapSessionState {
        &self.core.state
    }

    pub fn capabilities(&self) -> &mail_types::capability::CapabilitySet {
        &self.core.capabilities
    }

    /// Serializes and sends a command's first segment. When the command
    /// carries synchronizing literals the remaining segments are returned in
    /// the handle; feed them with
    /// [`send_next_segment`](Self::send_next_segment) after each
    /// continuation.
    pub fn send_command(&mut self, body: CommandBody) -> Result<InFlight> {
        self.core.check_capability(&body)?;

        if body.is_authentication() {
            self.core.begin_authentication();
        }

        let tag = self.core.next_tag();
        self.core.register(&tag, PendingKind::of(&body));

        let literal_plus = self.core.capabilities.has("LITERAL+");
        let mut segments: VecDeque<Vec<u8>> =
            Command::new(tag.clone(), body).serialize(literal_plus).into();

        // Safety: `unwrap` can't panic, serialization yields at least one
        // segment.
        let first = segments.pop_front().unwrap();
        self.send(&first)?;

        Ok(InFlight { tag, segments })
    }

    /// Sends the next pending segment, after a continuation was observed.
    pub fn send_next_segment(&mut self, in_flight: &mut InFlight) -> Result<()> {
        match in_flight.segments.pop_front() {
            Some(segment) => self.send(&segment),
            None => Err(Error::state("no pending segment")),
        }
    }

    /// Polls until a `+` continuation arrives, reading at most `max_reads`
    /// times. Records stepped over stay queued for the tagged wait.
    pub fn wait_for_continuation(&mut self, max_reads: usize) -> Result<String> {
        let mut deferred = Vec::new();
        let mut reads = 0;

        let result = loop {
            match self.next_processed() {
                Some((_, Processed::Continuation { text })) => break Ok(text),
                Some(pair) => deferred.push(pair),
                None => {
                    if reads >= max_reads {
                        break Err(Error::Timeout);
                    }
                    reads += 1;
                    self.fetch_more()?;
                }
            }
        };

        for pair in deferred.into_iter().rev() {
            self.backlog.push_front(pair);
        }
        result
    }

    /// Polls until the tagged completion for `tag` arrives, reading at most
    /// `max_reads` times, then reduces the collected batch.
    pub fn wait_for_tagged(&mut self, tag: &str, max_reads: usize) -> Result<CommandOutcome> {
        let mut batch: Vec<(ResponseRecord, Processed)> = Vec::new();
        let mut reads = 0;

        let tagged = loop {
            match self.next_processed() {
                Some((record, processed)) => {
                    let found = match &processed {
                        Processed::Tagged(candidate) if candidate.tag == tag => {
                            Some(candidate.clone())
                        }
                        _ => None,
                    };
                    batch.push((record, processed));
                    if let Some(tagged) = found {
                        break tagged;
                    }
                }
                None => {
                    if reads >= max_reads {
                        // Keep the partial batch observable on the next wait.
                        for pair in batch.into_iter().rev() {
                            self.backlog.push_front(pair);
                        }
                        return Err(Error::Timeout);
                    }
                    reads += 1;
                    self.fetch_more()?;
                }
            }
        };

        let untagged = batch
            .iter()
            .filter_map(|(_, processed)| match processed {
                Processed::Untagged(response) => Some(response.clone()),
                _ => None,
            })
            .collect();

        let records: Vec<ResponseRecord> = batch.into_iter().map(|(record, _)| record).collect();
        let delta = self.core.reduce(&records);

        Ok(CommandOutcome {
            tagged: tagged.into_result()?,
            untagged,
            delta,
        })
    }

    /// One command, driven to completion: segments, continuations, tagged
    /// wait.
    pub fn run(&mut self, body: CommandBody, max_reads: usize) -> Result<CommandOutcome> {
        let mut in_flight = self.send_command(body)?;
        while in_flight.needs_continuation() {
            self.wait_for_continuation(max_reads)?;
            self.send_next_segment(&mut in_flight)?;
        }
        self.wait_for_tagged(&in_flight.tag, max_reads)
    }

    pub fn login(
        &mut self,
        username: &str,
        password: &str,
        max_reads: usize,
    ) -> Result<CommandOutcome> {
        self.run(
            CommandBody::Login {
                username: username.into(),
                password: password.into(),
            },
            max_reads,
        )
    }

    pub fn select(&mut self, mailbox: Mailbox, max_reads: usize) -> Result<CommandOutcome> {
        self.run(
            CommandBody::Select {
                mailbox,
                qresync: None,
            },
            max_reads,
        )
    }

    pub fn logout(mut self, max_reads: usize) -> Result<T> {
        let _ = self.run(CommandBody::Logout, max_reads);
        self.transport.stop();
        Ok(self.transport)
    }

    /// The next record in receive order: the backlog first, then freshly
    /// decoded input, classified exactly once.
    fn next_processed(&mut self) -> Option<(ResponseRecord, Processed)> {
        if let Some(pair) = self.backlog.pop_front() {
            return Some(pair);
        }

        let record = self.incoming.pop_front()?;
        let processed = self.core.process(&record);
        Some((record, processed))
    }

    fn fetch_more(&mut self) -> Result<()> {
        let chunk = self.transport.read_available(READ_CHUNK)?;
        if chunk.is_empty() {
            return Ok(());
        }

        if let Some(logger) = self.logger.as_mut() {
            logger.log_server(&chunk);
        }
        self.incoming.extend(self.core.absorb(&chunk));
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let spans = self.core.scan_outbound(bytes);
        if let Some(logger) = self.logger.as_mut() {
            logger.log_client(&redact(bytes, &spans, REDACTION));
        }
        self.transport.send(bytes).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;
    use mail_types::response::RespStatus;

    #[test]
    fn test_connect_login_select() {
        let mut transport = ScriptedTransport::new();
        transport.feed(b"* OK [CAPABILITY IMAP4rev1] ready\r\n");
        transport.feed(b"A0001 OK logged in\r\n");
        transport.feed(b"* 2 EXISTS\r\n* OK [UIDVALIDITY 7] .\r\nA0002 OK [READ-WRITE] done\r\n");

        let mut session = SyncImapSession::connect(transport, None, 4).unwrap();
        assert_eq!(ImapSessionState::Connected, *session.state());
        assert!(session.capabilities().has("IMAP4rev1"));

        let outcome = session.login("alice", "pw", 8).unwrap();
        assert_eq!(RespStatus::Ok, outcome.tagged.status);
        assert_eq!(ImapSessionState::Authenticated, *session.state());

        let outcome = session.select(Mailbox::Inbox, 8).unwrap();
        assert_eq!(Some(7), outcome.delta.current.uid_validity);
        assert_eq!(ImapSessionState::Selected("INBOX".into()), *session.state());
    }

    #[test]
    fn test_wait_for_tagged_bounded() {
        let mut transport = ScriptedTransport::new();
        transport.feed(b"* OK ready\r\n");

        let mut session = SyncImapSession::connect(transport, None, 4).unwrap();
        let in_flight = session.send_command(CommandBody::Noop).unwrap();

        // Nothing queued: the bounded wait gives up.
        assert!(matches!(
            session.wait_for_tagged(&in_flight.tag, 3),
            Err(Error::Timeout)
        ));
    }

    #[test]
    fn test_sync_literal_continuation_flow() {
        let mut transport = ScriptedTransport::new();
        transport.feed(b"* OK ready\r\n");
        transport.feed(b"+ send literal\r\n");
        transport.feed(b"A0001 OK appended\r\n");

        let mut session = SyncImapSession::connect(transport, None, 4).unwrap();
        let mut in_flight = session
            .send_command(CommandBody::Append {
                mailbox: Mailbox::Inbox,
                flags: vec![],
                date: None,
                message: b"Subject: s\r\n\r\nhello".to_vec(),
            })
            .unwrap();

        assert!(in_flight.needs_continuation());
        session.wait_for_continuation(8).unwrap();
        session.send_next_segment(&mut in_flight).unwrap();
        assert!(!in_flight.needs_continuation());

        let outcome = session.wait_for_tagged(&in_flight.tag, 8).unwrap();
        assert_eq!(RespStatus::Ok, outcome.tagged.status);

        // The wire carried both segments.
        let sent = String::from_utf8_lossy(&session.transport.sent).into_owned();
        assert!(sent.contains("APPEND INBOX {19}\r\n"));
        assert!(sent.ends_with("Subject: s\r\n\r\nhello\r\n"));
    }

    #[test]
    fn test_untagged_before_greeting_consumed_in_order() {
        let mut transport = ScriptedTransport::new();
        // Greeting and follow-up traffic land in one chunk.
        transport.feed(b"* OK ready\r\n* 3 EXISTS\r\nA0001 OK noop\r\n");

        let mut session = SyncImapSession::connect(transport, None, 4).unwrap();
        let in_flight = session.send_command(CommandBody::Noop).unwrap();
        let outcome = session.wait_for_tagged(&in_flight.tag, 4).unwrap();

        // The EXISTS that rode the greeting chunk still reaches the batch.
        assert_eq!(1, outcome.untagged.len());
    }
}
