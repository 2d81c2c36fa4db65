//! The POP3 session drivers.
//!
//! [`Pop3Session`] is the cooperative driver over a tokio stream;
//! [`SyncPop3Session`] is the synchronous driver over a [`Transport`],
//! polling with an explicit read bound. Both are thin: every protocol
//! decision lives in [`Pop3Core`].

use std::collections::VecDeque;
use std::time::Duration;

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use mail_types::{capability::CapabilitySet, state::Pop3SessionState};

use crate::{
    config::ClientConfig,
    error::{Error, Result},
    pop3::{Pop3Core, Pop3Event, Pop3Response, Pop3Status},
    redact::redact,
    sasl::{hex, Credentials, Mechanism, SaslExchange},
    transport::{ProtocolLogger, Transport, REDACTION},
};

const READ_CHUNK: usize = 4096;

/// The cooperative POP3 session.
pub struct Pop3Session<S> {
    stream: S,
    core: Pop3Core,
    events: VecDeque<Pop3Event>,
    logger: Option<Box<dyn ProtocolLogger>>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl<S> std::fmt::Debug for Pop3Session<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pop3Session")
            .field("state", &self.core.state)
            .finish_non_exhaustive()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Pop3Session<S> {
    /// Takes ownership of a connected stream and waits for the greeting.
    pub async fn connect(
        stream: S,
        config: &ClientConfig,
        mut logger: Option<Box<dyn ProtocolLogger>>,
    ) -> Result<Self> {
        if let Some(logger) = logger.as_mut() {
            logger.log_connect(&config.uri("pop3"));
        }

        let mut session = Self {
            stream,
            core: Pop3Core::new(),
            events: VecDeque::new(),
            logger,
            timeout: config.timeout,
            cancel: CancellationToken::new(),
        };

        match session.await_event().await? {
            Pop3Event::Response(greeting) if greeting.is_ok() => {
                session.core.accept_greeting(&greeting);
                Ok(session)
            }
            Pop3Event::Response(greeting) => {
                Err(Error::command(None, greeting.message))
            }
            other => Err(Error::Parse(format!("unexpected greeting {:?}", other))),
        }
    }

    /// A token that cancels every pending operation when triggered. The
    /// transport stays open; the caller decides whether to QUIT.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> Pop3SessionState {
        self.core.state
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.core.capabilities
    }

    pub fn apop_challenge(&self) -> Option<&str> {
        self.core.apop_challenge.as_deref()
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        let mut bytes = line.as_bytes().to_vec();
        bytes.extend_from_slice(b"\r\n");

        let spans = self.core.scan_outbound(&bytes);
        if let Some(logger) = self.logger.as_mut() {
            logger.log_client(&redact(&bytes, &spans, REDACTION));
        }

        self.stream.write_all(&bytes).await.map_err(Error::from)?;
        self.stream.flush().await.map_err(Error::from)
    }

    async fn await_event(&mut self) -> Result<Pop3Event> {
        let cancel = self.cancel.clone();
        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            if let Some(event) = self.events.pop_front() {
                return Ok(event);
            }

            let mut buf = [0u8; READ_CHUNK];
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = &mut deadline => return Err(Error::Timeout),
                read = self.stream.read(&mut buf) => {
                    let n = read.map_err(Error::from)?;
                    if n == 0 {
                        return Err(Error::Transport(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "connection closed",
                        )));
                    }

                    if let Some(logger) = self.logger.as_mut() {
                        logger.log_server(&buf[..n]);
                    }
                    self.events.extend(self.core.absorb(&buf[..n]));
                }
            }
        }
    }

    /// Sends one command. `multiline` arms the body decoder;
    /// `Some(true)` preserves bytes for RETR/TOP.
    pub async fn command(&mut self, line: &str, multiline: Option<bool>) -> Result<Pop3Event> {
        if let Some(preserve) = multiline {
            self.core.expect_multiline(preserve);
        }

        self.send_line(line).await?;
        self.await_event().await
    }

    async fn simple(&mut self, line: &str) -> Result<Pop3Response> {
        match self.command(line, None).await? {
            Pop3Event::Response(response) if response.is_ok() => Ok(response),
            Pop3Event::Response(response) => Err(Error::command(None, response.message)),
            other => Err(Error::Parse(format!("unexpected reply {:?}", other))),
        }
    }

    /// USER/PASS authentication. USER success parks the session in the
    /// half-open `Authenticating` state until PASS resolves it.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.require_state(Pop3SessionState::Connected, "LOGIN")?;

        self.core.set_authenticating(true);
        let result = self.login_inner(username, password).await;
        self.core.set_authenticating(false);
        result
    }

    async fn login_inner(&mut self, username: &str, password: &str) -> Result<()> {
        match self.simple(&format!("USER {}", username)).await {
            Ok(_) => self.core.state = Pop3SessionState::Authenticating,
            Err(error) => {
                self.core.state = Pop3SessionState::Connected;
                return Err(error);
            }
        }

        match self.simple(&format!("PASS {}", password)).await {
            Ok(_) => {
                self.core.state = Pop3SessionState::Authenticated;
                Ok(())
            }
            Err(error) => {
                self.core.state = Pop3SessionState::Connected;
                Err(error)
            }
        }
    }

    /// STLS (RFC 2595). On `+OK` the caller upgrades the underlying stream
    /// to TLS before authenticating; this session keeps running on top.
    pub async fn stls(&mut self) -> Result<()> {
        self.require_state(Pop3SessionState::Connected, "STLS")?;
        self.simple("STLS").await.map(|_| ())
    }

    /// APOP digest authentication; requires a timestamp in the greeting.
    pub async fn apop(&mut self, username: &str, password: &str) -> Result<()> {
        self.require_state(Pop3SessionState::Connected, "APOP")?;
        let challenge = self
            .core
            .apop_challenge
            .clone()
            .ok_or_else(|| Error::state("greeting carried no APOP timestamp"))?;

        let digest = hex(&md5::compute(format!("{}{}", challenge, password)).0);

        self.core.set_authenticating(true);
        let result = self.simple(&format!("APOP {} {}", username, digest)).await;
        self.core.set_authenticating(false);

        result.map(|_| self.core.state = Pop3SessionState::Authenticated)
    }

    /// SASL authentication (RFC 5034). Multi-step mechanisms receive each
    /// base64 challenge through the exchange until the server concludes.
    pub async fn authenticate(
        &mut self,
        mechanism: Mechanism,
        credentials: Credentials,
    ) -> Result<()> {
        self.require_state(Pop3SessionState::Connected, "AUTH")?;

        let mut exchange =
            SaslExchange::new(mechanism, credentials).map_err(|error| Error::state(error.to_string()))?;

        self.core.set_authenticating(true);
        let result = self.authenticate_inner(&mut exchange).await;
        self.core.set_authenticating(false);

        result.map(|_| self.core.state = Pop3SessionState::Authenticated)
    }

    async fn authenticate_inner(&mut self, exchange: &mut SaslExchange) -> Result<()> {
        let first = match exchange.initial_response() {
            Some(initial) => format!("AUTH {} {}", exchange.mechanism().name(), initial),
            None => format!("AUTH {}", exchange.mechanism().name()),
        };
        self.send_line(&first).await?;

        loop {
            match self.await_event().await? {
                Pop3Event::Response(response) => match response.status {
                    Pop3Status::Ok => return Ok(()),
                    Pop3Status::Err => return Err(Error::command(None, response.message)),
                    Pop3Status::Continuation => {
                        let reply = exchange
                            .respond(&response.message)
                            .map_err(|error| Error::Parse(error.to_string()))?;
                        self.send_line(&reply).await?;
                    }
                },
                other => return Err(Error::Parse(format!("unexpected reply {:?}", other))),
            }
        }
    }

    /// CAPA; updates the cached capability set.
    pub async fn fetch_capabilities(&mut self) -> Result<CapabilitySet> {
        let event = self.command("CAPA", Some(false)).await?;
        let lines = match event {
            Pop3Event::Multiline { lines, .. } => lines,
            Pop3Event::Response(response) => {
                return Err(Error::command(None, response.message))
            }
            other => return Err(Error::Parse(format!("unexpected reply {:?}", other))),
        };

        // Each line is `NAME [arg ...]`; arguments (e.g. SASL mechanisms)
        // are folded into compound tokens the way IMAP capabilities look.
        let mut tokens = Vec::new();
        for line in &lines {
            let mut words = line.split_whitespace();
            let Some(name) = words.next() else { continue };
            tokens.push(name.to_owned());
            for word in words {
                tokens.push(format!("{}={}", name, word));
            }
        }

        self.core.capabilities = CapabilitySet::from_tokens(&tokens);
        Ok(self.core.capabilities.clone())
    }

    pub async fn stat(&mut self) -> Result<(u32, u64)> {
        self.require_transaction("STAT")?;
        let response = self.simple("STAT").await?;

        let mut words = response.message.split_whitespace();
        let count = words.next().and_then(|word| word.parse().ok());
        let size = words.next().and_then(|word| word.parse().ok());
        match (count, size) {
            (Some(count), Some(size)) => Ok((count, size)),
            _ => Err(Error::Parse(format!("malformed STAT reply: {}", response.message))),
        }
    }

    /// LIST without an index: every scan listing.
    pub async fn list(&mut self) -> Result<Vec<(u32, u64)>> {
        self.require_transaction("LIST")?;
        let lines = self.multiline_body("LIST").await?;

        Ok(lines
            .iter()
            .filter_map(|line| {
                let mut words = line.split_whitespace();
                let index = words.next()?.parse().ok()?;
                let size = words.next()?.parse().ok()?;
                Some((index, size))
            })
            .collect())
    }

    /// UIDL without an index: every unique-id listing.
    pub async fn uidl(&mut self) -> Result<Vec<(u32, String)>> {
        self.require_transaction("UIDL")?;
        let lines = self.multiline_body("UIDL").await?;

        Ok(lines
            .iter()
            .filter_map(|line| {
                let mut words = line.split_whitespace();
                let index = words.next()?.parse().ok()?;
                let uid = words.next()?.to_owned();
                Some((index, uid))
            })
            .collect())
    }

    /// RETR: the full message, bytes preserved for MIME parsing.
    pub async fn retrieve(&mut self, index: u32) -> Result<Vec<u8>> {
        self.require_index(index)?;
        self.require_transaction("RETR")?;
        self.byte_body(&format!("RETR {}", index)).await
    }

    /// TOP: headers plus the first `lines` body lines.
    pub async fn top(&mut self, index: u32, lines: u32) -> Result<Vec<u8>> {
        self.require_index(index)?;
        self.require_transaction("TOP")?;
        self.byte_body(&format!("TOP {} {}", index, lines)).await
    }

    pub async fn delete(&mut self, index: u32) -> Result<()> {
        self.require_index(index)?;
        self.require_transaction("DELE")?;
        self.simple(&format!("DELE {}", index)).await.map(|_| ())
    }

    pub async fn noop(&mut self) -> Result<()> {
        self.simple("NOOP").await.map(|_| ())
    }

    pub async fn reset(&mut self) -> Result<()> {
        self.require_transaction("RSET")?;
        self.simple("RSET").await.map(|_| ())
    }

    /// QUIT and hand the stream back.
    pub async fn quit(mut self) -> Result<S> {
        let result = self.simple("QUIT").await;
        self.core.state = Pop3SessionState::Disconnected;
        match result {
            Ok(_) => Ok(self.stream),
            Err(Error::Command { text, .. }) => {
                debug!("QUIT rejected: {}", text);
                Ok(self.stream)
            }
            Err(error) => Err(error),
        }
    }

    async fn multiline_body(&mut self, line: &str) -> Result<Vec<String>> {
        match self.command(line, Some(false)).await? {
            Pop3Event::Multiline { lines, .. } => Ok(lines),
            Pop3Event::Response(response) => Err(Error::command(None, response.message)),
            other => Err(Error::Parse(format!("unexpected reply {:?}", other))),
        }
    }

    async fn byte_body(&mut self, line: &str) -> Result<Vec<u8>> {
        match self.command(line, Some(true)).await? {
            Pop3Event::MultilineBytes { data, .. } => Ok(data),
            Pop3Event::Response(response) => Err(Error::command(None, response.message)),
            other => Err(Error::Parse(format!("unexpected reply {:?}", other))),
        }
    }

    fn require_state(&self, expected: Pop3SessionState, what: &str) -> Result<()> {
        if self.core.state == expected {
            Ok(())
        } else {
            Err(Error::state(format!(
                "{} requires the {:?} state, session is {:?}",
                what, expected, self.core.state
            )))
        }
    }

    fn require_transaction(&self, what: &str) -> Result<()> {
        self.require_state(Pop3SessionState::Authenticated, what)
    }

    fn require_index(&self, index: u32) -> Result<()> {
        if index == 0 {
            Err(Error::state("message indices are 1-based"))
        } else {
            Ok(())
        }
    }
}

/// The synchronous POP3 driver: the caller pumps the transport with bounded
/// read loops.
pub struct SyncPop3Session<T> {
    transport: T,
    core: Pop3Core,
    events: VecDeque<Pop3Event>,
    logger: Option<Box<dyn ProtocolLogger>>,
}

impl<T> std::fmt::Debug for SyncPop3Session<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncPop3Session")
            .field("state", &self.core.state)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> SyncPop3Session<T> {
    /// Starts the transport and consumes the greeting, polling at most
    /// `max_reads` times.
    pub fn connect(
        mut transport: T,
        logger: Option<Box<dyn ProtocolLogger>>,
        max_reads: usize,
    ) -> Result<Self> {
        transport.start()?;

        let mut session = Self {
            transport,
            core: Pop3Core::new(),
            events: VecDeque::new(),
            logger,
        };

        match session.wait_event(max_reads)? {
            Pop3Event::Response(greeting) if greeting.is_ok() => {
                session.core.accept_greeting(&greeting);
                Ok(session)
            }
            Pop3Event::Response(greeting) => Err(Error::command(None, greeting.message)),
            other => Err(Error::Parse(format!("unexpected greeting {:?}", other))),
        }
    }

    pub fn state(&self) -> Pop3SessionState {
        self.core.state
    }

    pub fn apop_challenge(&self) -> Option<&str> {
        self.core.apop_challenge.as_deref()
    }

    /// Sends one command and polls for its reply.
    pub fn command(
        &mut self,
        line: &str,
        multiline: Option<bool>,
        max_reads: usize,
    ) -> Result<Pop3Event> {
        if let Some(preserve) = multiline {
            self.core.expect_multiline(preserve);
        }

        let mut bytes = line.as_bytes().to_vec();
        bytes.extend_from_slice(b"\r\n");
        let spans = self.core.scan_outbound(&bytes);
        if let Some(logger) = self.logger.as_mut() {
            logger.log_client(&redact(&bytes, &spans, REDACTION));
        }
        self.transport.send(&bytes)?;

        self.wait_event(max_reads)
    }

    /// USER/PASS over the polling driver.
    pub fn login(&mut self, username: &str, password: &str, max_reads: usize) -> Result<()> {
        if self.core.state != Pop3SessionState::Connected {
            return Err(Error::state("LOGIN requires the Connected state"));
        }

        self.core.set_authenticating(true);
        let result = (|| {
            self.expect_ok(&format!("USER {}", username), max_reads)?;
            self.core.state = Pop3SessionState::Authenticating;
            self.expect_ok(&format!("PASS {}", password), max_reads).map(|_| ())
        })();
        self.core.set_authenticating(false);

        match result {
            Ok(()) => {
                self.core.state = Pop3SessionState::Authenticated;
                Ok(())
            }
            Err(error) => {
                self.core.state = Pop3SessionState::Connected;
                Err(error)
            }
        }
    }

    pub fn stat(&mut self, max_reads: usize) -> Result<(u32, u64)> {
        if self.core.state != Pop3SessionState::Authenticated {
            return Err(Error::state("STAT requires authentication"));
        }

        match self.command("STAT", None, max_reads)? {
            Pop3Event::Response(response) if response.is_ok() => {
                let mut words = response.message.split_whitespace();
                let count = words.next().and_then(|word| word.parse().ok());
                let size = words.next().and_then(|word| word.parse().ok());
                match (count, size) {
                    (Some(count), Some(size)) => Ok((count, size)),
                    _ => Err(Error::Parse(format!(
                        "malformed STAT reply: {}",
                        response.message
                    ))),
                }
            }
            Pop3Event::Response(response) => Err(Error::command(None, response.message)),
            other => Err(Error::Parse(format!("unexpected reply {:?}", other))),
        }
    }

    /// RETR over the polling driver, bytes preserved.
    pub fn retrieve(&mut self, index: u32, max_reads: usize) -> Result<Vec<u8>> {
        if index == 0 {
            return Err(Error::state("message indices are 1-based"));
        }
        if self.core.state != Pop3SessionState::Authenticated {
            return Err(Error::state("RETR requires authentication"));
        }

        match self.command(&format!("RETR {}", index), Some(true), max_reads)? {
            Pop3Event::MultilineBytes { data, .. } => Ok(data),
            Pop3Event::Response(response) => Err(Error::command(None, response.message)),
            other => Err(Error::Parse(format!("unexpected reply {:?}", other))),
        }
    }

    pub fn quit(mut self, max_reads: usize) -> Result<T> {
        let _ = self.command("QUIT", None, max_reads)?;
        self.core.state = Pop3SessionState::Disconnected;
        self.transport.stop();
        Ok(self.transport)
    }

    fn expect_ok(&mut self, line: &str, max_reads: usize) -> Result<Pop3Response> {
        match self.command(line, None, max_reads)? {
            Pop3Event::Response(response) if response.is_ok() => Ok(response),
            Pop3Event::Response(response) => Err(Error::command(None, response.message)),
            other => Err(Error::Parse(format!("unexpected reply {:?}", other))),
        }
    }

    fn wait_event(&mut self, max_reads: usize) -> Result<Pop3Event> {
        for _ in 0..max_reads.max(1) {
            if let Some(event) = self.events.pop_front() {
                return Ok(event);
            }

            let chunk = self.transport.read_available(READ_CHUNK)?;
            if chunk.is_empty() {
                continue;
            }

            if let Some(logger) = self.logger.as_mut() {
                logger.log_server(&chunk);
            }
            self.events.extend(self.core.absorb(&chunk));
        }

        self.events.pop_front().ok_or(Error::Timeout)
    }
}
