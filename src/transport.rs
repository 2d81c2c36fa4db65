//! Consumed interfaces: byte transports and the protocol logger.
//!
//! The crate never opens sockets. A synchronous caller hands the session
//! anything implementing [`Transport`]; the cooperative drivers take a tokio
//! `AsyncRead + AsyncWrite` stream directly. TLS, STARTTLS upgrades, and
//! proxy traversal (HTTP CONNECT, SOCKS4, SOCKS5) all live behind these
//! seams.

use std::io;

/// A synchronous duplex byte stream.
pub trait Transport: Send {
    fn start(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    /// Writes the whole buffer or fails.
    fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Returns whatever is available, up to `max` bytes. An empty result
    /// means nothing arrived yet; `Err` means the stream is gone.
    fn read_available(&mut self, max: usize) -> io::Result<Vec<u8>>;
}

/// Wire-level logging hook. Outbound bytes pass the secret detector before
/// reaching `log_client`, so credentials never hit a sink.
pub trait ProtocolLogger: Send {
    fn log_connect(&mut self, uri: &str);
    fn log_client(&mut self, bytes: &[u8]);
    fn log_server(&mut self, bytes: &[u8]);
}

/// The replacement the logger substitutes for redacted spans.
pub const REDACTION: &str = "********";

/// A logger that forwards to the `log` crate at trace level.
#[derive(Debug, Default)]
pub struct TraceLogger;

impl ProtocolLogger for TraceLogger {
    fn log_connect(&mut self, uri: &str) {
        log::trace!("connect {}", uri);
    }

    fn log_client(&mut self, bytes: &[u8]) {
        log::trace!("C: {}", mail_types::utils::escape_byte_string(bytes));
    }

    fn log_server(&mut self, bytes: &[u8]) {
        log::trace!("S: {}", mail_types::utils::escape_byte_string(bytes));
    }
}

/// An in-memory transport for tests and scripted sessions: reads come from
/// a pre-seeded script, writes accumulate.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    incoming: std::collections::VecDeque<Vec<u8>>,
    pub sent: Vec<u8>,
    pub closed: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one chunk the next `read_available` calls will drain.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.incoming.push_back(bytes.to_vec());
    }
}

impl Transport for ScriptedTransport {
    fn stop(&mut self) {
        self.closed = true;
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "closed"));
        }
        self.sent.extend_from_slice(bytes);
        Ok(())
    }

    fn read_available(&mut self, max: usize) -> io::Result<Vec<u8>> {
        match self.incoming.front_mut() {
            None => Ok(Vec::new()),
            Some(chunk) => {
                let take = chunk.len().min(max);
                let out: Vec<u8> = chunk.drain(..take).collect();
                if chunk.is_empty() {
                    self.incoming.pop_front();
                }
                Ok(out)
            }
        }
    }
}
