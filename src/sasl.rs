//! SASL mechanisms: PLAIN, LOGIN, CRAM-MD5, XOAUTH2.
//!
//! Every mechanism serializes to base64 on the wire. A mechanism either
//! offers an initial response (sent inline when the server supports it) or
//! answers challenges step by step; both IMAP `AUTHENTICATE` and POP3 `AUTH`
//! drive the same implementation.

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

use mail_types::secret::Secret;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mechanism {
    Plain,
    Login,
    CramMd5,
    XOAuth2,
}

impl Mechanism {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            "XOAUTH2" => Some(Self::XOAuth2),
            _ => None,
        }
    }
}

/// What the client authenticates with.
#[derive(Clone)]
pub enum Credentials {
    Password {
        username: String,
        secret: Secret<String>,
    },
    OAuth {
        username: String,
        token: Secret<String>,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::OAuth { username, .. } => f
                .debug_struct("OAuth")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

impl Credentials {
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Password {
            username: username.into(),
            secret: Secret::new(password.into()),
        }
    }

    pub fn oauth(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self::OAuth {
            username: username.into(),
            token: Secret::new(token.into()),
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Self::Password { username, .. } | Self::OAuth { username, .. } => username,
        }
    }

    /// The mechanism to use when the caller did not pick one.
    pub fn preferred_mechanism(&self, advertised: &[Mechanism]) -> Option<Mechanism> {
        match self {
            Self::OAuth { .. } => advertised
                .contains(&Mechanism::XOAuth2)
                .then_some(Mechanism::XOAuth2),
            Self::Password { .. } => [Mechanism::CramMd5, Mechanism::Plain, Mechanism::Login]
                .into_iter()
                .find(|mechanism| advertised.contains(mechanism)),
        }
    }
}

#[derive(Clone, Debug, Eq, Error, Hash, PartialEq)]
pub enum SaslError {
    #[error("Challenge is not valid base64")]
    BadChallenge,
    #[error("Mechanism does not fit the credentials")]
    WrongCredentials,
}

/// One in-flight SASL exchange.
#[derive(Debug)]
pub struct SaslExchange {
    mechanism: Mechanism,
    credentials: Credentials,
    step: usize,
}

impl SaslExchange {
    pub fn new(mechanism: Mechanism, credentials: Credentials) -> Result<Self, SaslError> {
        match (mechanism, &credentials) {
            (Mechanism::XOAuth2, Credentials::Password { .. }) => Err(SaslError::WrongCredentials),
            (Mechanism::CramMd5, Credentials::OAuth { .. }) => Err(SaslError::WrongCredentials),
            _ => Ok(Self {
                mechanism,
                credentials,
                step: 0,
            }),
        }
    }

    pub fn mechanism(&self) -> Mechanism {
        self.mechanism
    }

    /// The base64 initial response, for servers accepting SASL-IR. PLAIN,
    /// LOGIN, and XOAUTH2 front-load their first step; CRAM-MD5 cannot, it
    /// needs the server's challenge.
    pub fn initial_response(&mut self) -> Option<String> {
        let response = match (&self.mechanism, &self.credentials) {
            (Mechanism::Plain, Credentials::Password { username, secret }) => {
                Some(plain_response(username, secret.declassify()))
            }
            (Mechanism::Login, Credentials::Password { username, .. }) => {
                Some(STANDARD.encode(username))
            }
            (Mechanism::XOAuth2, Credentials::OAuth { username, token }) => {
                Some(xoauth2_response(username, token.declassify()))
            }
            _ => None,
        };

        if response.is_some() {
            self.step += 1;
        }
        response
    }

    /// Answers one server challenge (base64 in, base64 out).
    pub fn respond(&mut self, challenge_b64: &str) -> Result<String, SaslError> {
        let challenge = STANDARD
            .decode(challenge_b64.trim())
            .map_err(|_| SaslError::BadChallenge)?;

        let response = match (&self.mechanism, &self.credentials) {
            (Mechanism::Plain, Credentials::Password { username, secret }) => {
                plain_response(username, secret.declassify())
            }
            (Mechanism::Login, Credentials::Password { username, secret }) => {
                // Step order: username, then password, whatever the prompt
                // text says.
                if self.step == 0 {
                    STANDARD.encode(username)
                } else {
                    STANDARD.encode(secret.declassify())
                }
            }
            (Mechanism::CramMd5, Credentials::Password { username, secret }) => {
                let digest = hmac_md5(secret.declassify().as_bytes(), &challenge);
                STANDARD.encode(format!("{} {}", username, hex(&digest)))
            }
            (Mechanism::XOAuth2, Credentials::OAuth { username, token }) => {
                // An error challenge arrives as base64 JSON; the reply is an
                // empty line, then the server fails the command.
                if self.step == 0 {
                    xoauth2_response(username, token.declassify())
                } else {
                    String::new()
                }
            }
            _ => return Err(SaslError::WrongCredentials),
        };

        self.step += 1;
        Ok(response)
    }
}

fn plain_response(username: &str, password: &str) -> String {
    STANDARD.encode(format!("\x00{}\x00{}", username, password))
}

fn xoauth2_response(username: &str, token: &str) -> String {
    STANDARD.encode(format!("user={}\x01auth=Bearer {}\x01\x01", username, token))
}

/// HMAC-MD5 (RFC 2104), the keyed digest CRAM-MD5 is built on.
pub fn hmac_md5(key: &[u8], message: &[u8]) -> [u8; 16] {
    const BLOCK: usize = 64;

    let mut key_block = [0u8; BLOCK];
    if key.len() > BLOCK {
        key_block[..16].copy_from_slice(&md5::compute(key).0);
    } else {
        key_block[..key.len()].copy_from_slice(key);
    }

    let mut inner = Vec::with_capacity(BLOCK + message.len());
    inner.extend(key_block.iter().map(|b| b ^ 0x36));
    inner.extend_from_slice(message);
    let inner_digest = md5::compute(&inner);

    let mut outer = Vec::with_capacity(BLOCK + 16);
    outer.extend(key_block.iter().map(|b| b ^ 0x5c));
    outer.extend_from_slice(&inner_digest.0);
    md5::compute(&outer).0
}

pub fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_initial_response() {
        let mut exchange =
            SaslExchange::new(Mechanism::Plain, Credentials::password("tim", "tanstaaftanstaaf"))
                .unwrap();

        // base64("\0tim\0tanstaaftanstaaf")
        assert_eq!(
            Some("AHRpbQB0YW5zdGFhZnRhbnN0YWFm".to_owned()),
            exchange.initial_response()
        );
    }

    #[test]
    fn test_login_two_steps() {
        let mut exchange =
            SaslExchange::new(Mechanism::Login, Credentials::password("alice", "secret")).unwrap();

        // "Username:" / "Password:" prompts, base64.
        assert_eq!("YWxpY2U=", exchange.respond("VXNlcm5hbWU6").unwrap());
        assert_eq!("c2VjcmV0", exchange.respond("UGFzc3dvcmQ6").unwrap());
    }

    #[test]
    fn test_cram_md5_rfc2195_vector() {
        // RFC 2195 section 2 example.
        let mut exchange =
            SaslExchange::new(Mechanism::CramMd5, Credentials::password("tim", "tanstaaftanstaaf"))
                .unwrap();

        assert_eq!(None, exchange.initial_response());

        let challenge =
            STANDARD.encode("<1896.697170952@postoffice.reston.mci.net>");
        let response = exchange.respond(&challenge).unwrap();
        let decoded = String::from_utf8(STANDARD.decode(response).unwrap()).unwrap();
        assert_eq!("tim b913a602c7eda7a495b4e6e7334d3890", decoded);
    }

    #[test]
    fn test_xoauth2_shape() {
        let mut exchange =
            SaslExchange::new(Mechanism::XOAuth2, Credentials::oauth("u@x.test", "token123"))
                .unwrap();

        let decoded = String::from_utf8(
            STANDARD
                .decode(exchange.initial_response().unwrap())
                .unwrap(),
        )
        .unwrap();
        assert_eq!("user=u@x.test\x01auth=Bearer token123\x01\x01", decoded);

        // Error challenge: empty reply.
        assert_eq!("", exchange.respond(&STANDARD.encode("{}")).unwrap());
    }

    #[test]
    fn test_mechanism_credential_mismatch() {
        assert_eq!(
            Err(SaslError::WrongCredentials),
            SaslExchange::new(Mechanism::XOAuth2, Credentials::password("a", "b")).map(|_| ())
        );
    }

    #[test]
    fn test_preferred_mechanism() {
        let password = Credentials::password("a", "b");
        let advertised = [Mechanism::Login, Mechanism::Plain, Mechanism::CramMd5];
        assert_eq!(
            Some(Mechanism::CramMd5),
            password.preferred_mechanism(&advertised)
        );

        let oauth = Credentials::oauth("a", "t");
        assert_eq!(None, oauth.preferred_mechanism(&advertised));
        assert_eq!(
            Some(Mechanism::XOAuth2),
            oauth.preferred_mechanism(&[Mechanism::XOAuth2])
        );
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let credentials = Credentials::password("alice", "hunter2");
        let debug = format!("{:?}", credentials);
        assert!(!debug.contains("hunter2"));
    }
}
