//! Client configuration.

use std::time::Duration;

/// How the connection is secured. `StartTls` connects in the clear and
/// upgrades via the protocol's STARTTLS/STLS command before authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSecurity {
    Plain,
    Tls,
    StartTls,
}

/// Optional proxy traversal, performed by the transport implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Proxy {
    HttpConnect { host: String, port: u16 },
    Socks4 { host: String, port: u16 },
    Socks5 { host: String, port: u16 },
}

/// Whether message previews are populated when listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PreviewOptions {
    #[default]
    None,
    Lazy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub security: TransportSecurity,
    pub proxy: Option<Proxy>,
    /// Per-operation timeout. POP3's RFC-recommended inactivity floor is the
    /// default here for both protocols.
    pub timeout: Duration,
    pub envelope_cache_capacity: usize,
    pub preview: PreviewOptions,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            security: TransportSecurity::Tls,
            proxy: None,
            timeout: Duration::from_millis(120_000),
            envelope_cache_capacity: 128,
            preview: PreviewOptions::None,
        }
    }

    pub fn security(mut self, security: TransportSecurity) -> Self {
        self.security = security;
        self
    }

    pub fn proxy(mut self, proxy: Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn envelope_cache_capacity(mut self, capacity: usize) -> Self {
        self.envelope_cache_capacity = capacity;
        self
    }

    pub fn preview(mut self, preview: PreviewOptions) -> Self {
        self.preview = preview;
        self
    }

    /// `imap://host:port` style URI for the connect log line.
    pub fn uri(&self, scheme: &str) -> String {
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}
