//! The cooperative IMAP driver.
//!
//! Owns a tokio byte stream exclusively for the life of the session. Every
//! public operation is bounded by the session timeout and the cancellation
//! token; cancellation never tears the transport down, the caller decides
//! between LOGOUT and dropping the stream.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use mail_types::{
    capability::CapabilitySet,
    mailbox::{Folder, Mailbox},
    response::RespStatus,
    state::ImapSessionState,
};

use crate::{
    command::{Command, CommandBody},
    config::ClientConfig,
    decode::ResponseRecord,
    error::{Error, Result},
    mailbox_state::StateDelta,
    parse::UntaggedResponse,
    redact::redact,
    sasl::{Credentials, Mechanism, SaslExchange},
    session::{CommandOutcome, ImapCore, PendingKind, Processed, TaggedResponse},
    transport::{ProtocolLogger, REDACTION},
};

const READ_CHUNK: usize = 8 * 1024;

pub struct ImapSession<S> {
    stream: S,
    core: ImapCore,
    records: VecDeque<ResponseRecord>,
    logger: Option<Box<dyn ProtocolLogger>>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl<S> std::fmt::Debug for ImapSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapSession")
            .field("state", &self.core.state)
            .finish_non_exhaustive()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> ImapSession<S> {
    /// Takes a connected stream and consumes the greeting. A PREAUTH
    /// greeting lands the session directly in `Authenticated`; BYE fails the
    /// connect.
    pub async fn connect(
        stream: S,
        config: &ClientConfig,
        mut logger: Option<Box<dyn ProtocolLogger>>,
    ) -> Result<Self> {
        if let Some(logger) = logger.as_mut() {
            logger.log_connect(&config.uri("imap"));
        }

        let mut session = Self {
            stream,
            core: ImapCore::new(),
            records: VecDeque::new(),
            logger,
            timeout: config.timeout,
            cancel: CancellationToken::new(),
        };

        let timeout = session.timeout;
        let greeting = tokio::time::timeout(timeout, session.read_greeting())
            .await
            .map_err(|_| Error::Timeout)??;

        match greeting {
            RespStatus::Bye => Err(Error::command(Some(RespStatus::Bye), "server said BYE")),
            _ => Ok(session),
        }
    }

    async fn read_greeting(&mut self) -> Result<RespStatus> {
        loop {
            let record = self.next_record().await?;
            match self.core.process(&record) {
                Processed::Greeting { status, .. } => return Ok(status),
                Processed::Ignored => {
                    return Err(Error::Parse(format!(
                        "malformed greeting: {:?}",
                        record.line_text()
                    )))
                }
                _ => continue,
            }
        }
    }

    pub fn state(&self) -> &ImapSessionState {
        &self.core.state
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.core.capabilities
    }

    pub fn selected(&self) -> &crate::mailbox_state::SelectedState {
        &self.core.selected
    }

    /// A token that aborts pending operations without closing the stream.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Runs one command to its tagged completion, collecting interleaved
    /// untagged traffic and folding it through the selected-state reducer.
    pub async fn run(&mut self, body: CommandBody) -> Result<CommandOutcome> {
        self.core.check_capability(&body)?;

        let timeout = self.timeout;
        let cancel = self.cancel.clone();
        let work = self.run_inner(body);
        tokio::pin!(work);

        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            outcome = tokio::time::timeout(timeout, &mut work) => {
                outcome.map_err(|_| Error::Timeout)?
            }
        }
    }

    async fn run_inner(&mut self, body: CommandBody) -> Result<CommandOutcome> {
        if body.is_authentication() {
            self.core.begin_authentication();
        }

        let tag = self.core.next_tag();
        self.core.register(&tag, PendingKind::of(&body));

        let literal_plus = self.core.capabilities.has("LITERAL+");
        let segments = Command::new(tag.clone(), body).serialize(literal_plus);
        let mut batch: Vec<(ResponseRecord, Processed)> = Vec::new();

        let last = segments.len() - 1;
        for (i, segment) in segments.into_iter().enumerate() {
            self.send(&segment).await?;
            if i < last {
                self.await_continuation(&tag, &mut batch).await?;
            }
        }

        self.finish_command(&tag, batch).await
    }

    /// Collects records until the tagged completion for `tag` arrives.
    async fn finish_command(
        &mut self,
        tag: &str,
        mut batch: Vec<(ResponseRecord, Processed)>,
    ) -> Result<CommandOutcome> {
        let tagged = loop {
            let record = self.next_record().await?;
            let processed = self.core.process(&record);

            if let Processed::Tagged(tagged) = &processed {
                if tagged.tag == tag {
                    let tagged = tagged.clone();
                    batch.push((record, processed));
                    break tagged;
                }
                log::debug!("completion for unknown tag {}", tagged.tag);
            }
            batch.push((record, processed));
        };

        let untagged = batch
            .iter()
            .filter_map(|(_, processed)| match processed {
                Processed::Untagged(response) => Some(response.clone()),
                _ => None,
            })
            .collect();

        let records: Vec<ResponseRecord> =
            batch.into_iter().map(|(record, _)| record).collect();
        let delta = self.core.reduce(&records);
        let tagged = tagged.into_result()?;

        Ok(CommandOutcome {
            tagged,
            untagged,
            delta,
        })
    }

    /// Waits for a `+` continuation; a premature tagged NO/BAD for `tag`
    /// surfaces as the command error instead.
    async fn await_continuation(
        &mut self,
        tag: &str,
        batch: &mut Vec<(ResponseRecord, Processed)>,
    ) -> Result<()> {
        loop {
            let record = self.next_record().await?;
            let processed = self.core.process(&record);
            match processed {
                Processed::Continuation { .. } => return Ok(()),
                Processed::Tagged(tagged) if tagged.tag == tag => {
                    return tagged.into_result().map(|_| ());
                }
                _ => batch.push((record, processed)),
            }
        }
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let spans = self.core.scan_outbound(bytes);
        if let Some(logger) = self.logger.as_mut() {
            logger.log_client(&redact(bytes, &spans, REDACTION));
        }

        self.stream.write_all(bytes).await.map_err(Error::from)?;
        self.stream.flush().await.map_err(Error::from)
    }

    async fn next_record(&mut self) -> Result<ResponseRecord> {
        loop {
            if let Some(record) = self.records.pop_front() {
                return Ok(record);
            }

            let mut buf = [0u8; READ_CHUNK];
            let n = self.stream.read(&mut buf).await.map_err(Error::from)?;
            if n == 0 {
                return Err(Error::Transport(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }

            if let Some(logger) = self.logger.as_mut() {
                logger.log_server(&buf[..n]);
            }
            self.records.extend(self.core.absorb(&buf[..n]));
        }
    }

    // --- Convenience operations -------------------------------------------

    pub async fn login(&mut self, username: &str, password: &str) -> Result<CommandOutcome> {
        self.run(CommandBody::Login {
            username: username.into(),
            password: password.into(),
        })
        .await
    }

    /// SASL AUTHENTICATE. The initial response rides the command line only
    /// when the server advertises SASL-IR; otherwise every step flows
    /// through `+` continuations.
    pub async fn authenticate(
        &mut self,
        mechanism: Mechanism,
        credentials: Credentials,
    ) -> Result<CommandOutcome> {
        let mut exchange = SaslExchange::new(mechanism, credentials)
            .map_err(|error| Error::state(error.to_string()))?;

        let timeout = self.timeout;
        let cancel = self.cancel.clone();
        let work = self.authenticate_inner(&mut exchange);
        tokio::pin!(work);

        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            outcome = tokio::time::timeout(timeout, &mut work) => {
                outcome.map_err(|_| Error::Timeout)?
            }
        }
    }

    async fn authenticate_inner(
        &mut self,
        exchange: &mut SaslExchange,
    ) -> Result<CommandOutcome> {
        self.core.begin_authentication();

        let tag = self.core.next_tag();
        self.core.register(&tag, PendingKind::Authenticate);

        let initial = if self.core.capabilities.has("SASL-IR") {
            exchange.initial_response()
        } else {
            None
        };

        let command = Command::new(
            tag.clone(),
            CommandBody::Authenticate {
                mechanism: exchange.mechanism().name().into(),
                initial,
            },
        );
        // AUTHENTICATE never carries literals.
        let segment = command.serialize(false).remove(0);
        self.send(&segment).await?;

        let mut untagged = Vec::new();
        let mut batch = Vec::new();

        let tagged = loop {
            let record = self.next_record().await?;
            let processed = self.core.process(&record);
            batch.push(record);

            match processed {
                Processed::Continuation { text } => {
                    let reply = exchange
                        .respond(&text)
                        .map_err(|error| Error::Parse(error.to_string()))?;
                    self.send(format!("{}\r\n", reply).as_bytes()).await?;
                }
                Processed::Untagged(response) => untagged.push(response),
                Processed::Tagged(tagged) if tagged.tag == tag => break tagged,
                _ => {}
            }
        };

        let delta = self.core.reduce(&batch);
        Ok(CommandOutcome {
            tagged: tagged.into_result()?,
            untagged,
            delta,
        })
    }

    pub async fn select(&mut self, mailbox: Mailbox) -> Result<CommandOutcome> {
        self.run(CommandBody::Select {
            mailbox,
            qresync: None,
        })
        .await
    }

    /// SELECT with QRESYNC resumption; requires the extension enabled.
    pub async fn select_qresync(
        &mut self,
        mailbox: Mailbox,
        uid_validity: u32,
        mod_seq: u64,
    ) -> Result<CommandOutcome> {
        if !self.core.capabilities.has("QRESYNC") {
            return Err(Error::Capability("QRESYNC".into()));
        }
        self.run(CommandBody::Select {
            mailbox,
            qresync: Some((uid_validity, mod_seq)),
        })
        .await
    }

    pub async fn examine(&mut self, mailbox: Mailbox) -> Result<CommandOutcome> {
        self.run(CommandBody::Examine { mailbox }).await
    }

    pub async fn close(&mut self) -> Result<CommandOutcome> {
        self.run(CommandBody::Close).await
    }

    pub async fn logout(mut self) -> Result<S> {
        let _ = self.run(CommandBody::Logout).await;
        Ok(self.stream)
    }

    pub async fn noop(&mut self) -> Result<CommandOutcome> {
        self.run(CommandBody::Noop).await
    }

    /// LIST, folding any interleaved LIST-STATUS lines onto their folders.
    pub async fn list_folders(&mut self, pattern: &str) -> Result<Vec<Folder>> {
        let with_status = self.core.capabilities.has("LIST-STATUS");
        let outcome = self
            .run(CommandBody::List {
                reference: String::new(),
                pattern: pattern.into(),
                return_status: with_status
                    .then(|| vec!["MESSAGES".into(), "UIDNEXT".into(), "UNSEEN".into()]),
            })
            .await?;

        let mut folders = Vec::new();
        let mut statuses = Vec::new();
        for response in outcome.untagged {
            match response {
                UntaggedResponse::List(folder) => folders.push(folder),
                UntaggedResponse::Status(status) => statuses.push(status),
                _ => {}
            }
        }

        for status in statuses {
            if let Some(folder) = folders.iter_mut().find(|folder| folder.raw == status.mailbox)
            {
                folder.status = status
                    .items
                    .iter()
                    .map(|(key, value)| (key.clone(), *value))
                    .collect();
            }
        }

        Ok(folders)
    }

    /// Starts IDLE: sends the command, waits for the continuation, and hands
    /// back a handle that observes deltas until `done`.
    pub async fn idle(&mut self) -> Result<IdleHandle<'_, S>> {
        self.core.check_capability(&CommandBody::Idle)?;

        let tag = self.core.next_tag();
        self.core.register(&tag, PendingKind::Idle);

        let segment = Command::new(tag.clone(), CommandBody::Idle)
            .serialize(false)
            .remove(0);
        self.send(&segment).await?;

        // Wait for the `+` that opens the idle window.
        loop {
            let record = self.next_record().await?;
            match self.core.process(&record) {
                Processed::Continuation { .. } => break,
                Processed::Tagged(tagged) if tagged.tag == tag => {
                    tagged.into_result()?;
                    return Err(Error::Parse("IDLE ended before it began".into()));
                }
                _ => {
                    let _ = self.core.reduce(&[record]);
                }
            }
        }

        Ok(IdleHandle { session: self, tag })
    }
}

/// An open IDLE window.
///
/// Dropping the handle without calling [`IdleHandle::done`] leaves the
/// server idling; the next command would be misrouted. Always finish with
/// `done`, including after cancellation.
pub struct IdleHandle<'a, S> {
    session: &'a mut ImapSession<S>,
    tag: String,
}

impl<S> std::fmt::Debug for IdleHandle<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleHandle").field("tag", &self.tag).finish()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> IdleHandle<'_, S> {
    /// Waits for the next burst of untagged traffic and returns the reducer
    /// delta it produced. Suspends between records indefinitely; bound it
    /// with the cancellation token if needed.
    pub async fn next_delta(&mut self) -> Result<StateDelta> {
        let cancel = self.session.cancel.clone();

        let record = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            record = self.session.next_record() => record?,
        };

        let _ = self.session.core.process(&record);
        Ok(self.session.core.reduce(&[record]))
    }

    /// Sends `DONE` and drains to the tagged completion. Must run even after
    /// a cancelled `next_delta`, or the connection is misaligned for every
    /// later command.
    pub async fn done(mut self) -> Result<TaggedResponse> {
        self.session.send(b"DONE\r\n").await?;

        loop {
            let record = self.session.next_record().await?;
            let processed = self.session.core.process(&record);
            let _ = self.session.core.reduce(&[record]);

            if let Processed::Tagged(tagged) = processed {
                if tagged.tag == self.tag {
                    return tagged.into_result();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    async fn server_script(
        mut server: tokio::io::DuplexStream,
        script: Vec<(&'static str, &'static str)>,
    ) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        for (expect, reply) in script {
            if !expect.is_empty() {
                let mut collected = Vec::new();
                while !collected.ends_with(b"\r\n") {
                    let mut byte = [0u8; 1];
                    if server.read_exact(&mut byte).await.is_err() {
                        return;
                    }
                    collected.push(byte[0]);
                }
                let got = String::from_utf8_lossy(&collected);
                assert!(
                    got.contains(expect),
                    "expected {:?} in {:?}",
                    expect,
                    got
                );
            }
            server.write_all(reply.as_bytes()).await.unwrap();
        }
    }

    fn config() -> ClientConfig {
        ClientConfig::new("test", 143).timeout(std::time::Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_connect_login_select() {
        let (client, server) = duplex(64 * 1024);
        let script = tokio::spawn(server_script(
            server,
            vec![
                ("", "* OK [CAPABILITY IMAP4rev1 IDLE] ready\r\n"),
                ("LOGIN", "A0001 OK [CAPABILITY IMAP4rev1 IDLE MOVE] done\r\n"),
                (
                    "SELECT INBOX",
                    "* 3 EXISTS\r\n* OK [UIDVALIDITY 100] .\r\n* OK [UIDNEXT 44] .\r\nA0002 OK [READ-WRITE] selected\r\n",
                ),
            ],
        ));

        let mut session = ImapSession::connect(client, &config(), None).await.unwrap();
        assert_eq!(ImapSessionState::Connected, *session.state());

        session.login("alice", "pw").await.unwrap();
        assert_eq!(ImapSessionState::Authenticated, *session.state());
        assert!(session.capabilities().has("MOVE"));

        let outcome = session.select(Mailbox::Inbox).await.unwrap();
        assert_eq!(ImapSessionState::Selected("INBOX".into()), *session.state());
        assert_eq!(Some(100), outcome.delta.current.uid_validity);
        assert_eq!(Some(44), outcome.delta.current.uid_next);

        script.await.unwrap();
    }

    #[tokio::test]
    async fn test_command_error_surfaces() {
        let (client, server) = duplex(64 * 1024);
        tokio::spawn(server_script(
            server,
            vec![
                ("", "* OK ready\r\n"),
                ("LOGIN", "A0001 NO [AUTHENTICATIONFAILED] bad credentials\r\n"),
            ],
        ));

        let mut session = ImapSession::connect(client, &config(), None).await.unwrap();
        let error = session.login("alice", "wrong").await.unwrap_err();

        let Error::Command { status, text } = error else {
            panic!("expected a command error");
        };
        assert_eq!(Some(RespStatus::No), status);
        assert_eq!("bad credentials", text);
        assert_eq!(ImapSessionState::Connected, *session.state());
    }

    #[tokio::test]
    async fn test_fetch_with_literal_payload() {
        let (client, server) = duplex(64 * 1024);
        tokio::spawn(server_script(
            server,
            vec![
                ("", "* PREAUTH ready\r\n"),
                (
                    "SELECT",
                    "* OK [UIDVALIDITY 1] .\r\nA0001 OK selected\r\n",
                ),
                (
                    "FETCH",
                    "* 1 FETCH (UID 42 BODY[TEXT] {11}\r\nHello World)\r\nA0002 OK fetched\r\n",
                ),
            ],
        ));

        let mut session = ImapSession::connect(client, &config(), None).await.unwrap();
        session.select(Mailbox::Inbox).await.unwrap();

        let outcome = session
            .run(CommandBody::Fetch {
                set: "1".parse().unwrap(),
                items: "(UID BODY.PEEK[TEXT])".into(),
                uid: false,
                changed_since: None,
            })
            .await
            .unwrap();

        let fetch = outcome
            .untagged
            .iter()
            .find_map(|response| match response {
                UntaggedResponse::Fetch(attributes) => Some(attributes),
                _ => None,
            })
            .unwrap();
        assert_eq!(Some(42), fetch.uid);
        assert_eq!(
            Some(b"Hello World".to_vec()),
            fetch.sections[0].data
        );
    }

    #[tokio::test]
    async fn test_sync_literal_waits_for_continuation() {
        let (client, server) = duplex(64 * 1024);
        tokio::spawn(server_script(
            server,
            vec![
                ("", "* PREAUTH ready\r\n"),
                ("APPEND", "+ go ahead\r\n"),
                ("", "A0001 OK [APPENDUID 100 7] appended\r\n"),
            ],
        ));

        let mut session = ImapSession::connect(client, &config(), None).await.unwrap();
        let outcome = session
            .run(CommandBody::Append {
                mailbox: Mailbox::Inbox,
                flags: vec![],
                date: None,
                message: b"Subject: x\r\n\r\nbody".to_vec(),
            })
            .await
            .unwrap();

        assert!(outcome
            .tagged
            .codes
            .iter()
            .any(|code| matches!(code, mail_types::response::ResponseCode::AppendUid { .. })));
    }

    #[tokio::test]
    async fn test_idle_window() {
        let (client, server) = duplex(64 * 1024);
        tokio::spawn(server_script(
            server,
            vec![
                ("", "* PREAUTH [CAPABILITY IMAP4rev1 IDLE] ready\r\n"),
                ("SELECT", "* OK [UIDVALIDITY 1] .\r\nA0001 OK selected\r\n"),
                ("IDLE", "+ idling\r\n* 4 EXISTS\r\n"),
                ("DONE", "A0002 OK idle finished\r\n"),
            ],
        ));

        let mut session = ImapSession::connect(client, &config(), None).await.unwrap();
        session.select(Mailbox::Inbox).await.unwrap();

        let mut idle = session.idle().await.unwrap();
        let delta = idle.next_delta().await.unwrap();
        assert_eq!(
            vec![crate::mailbox_state::IdleEvent::Exists(4)],
            delta.idle_events
        );

        idle.done().await.unwrap();
    }
}
