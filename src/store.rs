//! The mail-store façade.
//!
//! Thin, protocol-shaped wrappers over the sessions: open a mailbox, list
//! folders, pull messages. IMAP gets the full folder hierarchy; POP3 knows
//! exactly one folder and says so.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use mail_types::{
    envelope::Envelope,
    mailbox::{Folder, FolderAttribute, Mailbox},
    sequence::SequenceSet,
};

use crate::{
    cache::EnvelopeCache,
    command::{fetch_items, CommandBody},
    config::ClientConfig,
    error::{Error, Result},
    mailbox_state::SelectedSnapshot,
    parse::UntaggedResponse,
    pop3::Pop3Session,
    sasl::{Credentials, Mechanism},
    session::imap::ImapSession,
    transport::ProtocolLogger,
};

/// An IMAP-backed mail store.
pub struct ImapStore<S> {
    session: ImapSession<S>,
    cache: EnvelopeCache,
}

impl<S> std::fmt::Debug for ImapStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapStore").finish_non_exhaustive()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> ImapStore<S> {
    pub async fn connect(
        stream: S,
        config: &ClientConfig,
        logger: Option<Box<dyn ProtocolLogger>>,
    ) -> Result<Self> {
        let cache = EnvelopeCache::new(config.envelope_cache_capacity);
        let session = ImapSession::connect(stream, config, logger).await?;

        Ok(Self { session, cache })
    }

    /// Password credentials use LOGIN unless a mechanism is given; OAuth
    /// always uses XOAUTH2. Pass an explicit mechanism when the server
    /// offers several and the choice matters.
    pub async fn authenticate(
        &mut self,
        credentials: Credentials,
        mechanism: Option<Mechanism>,
    ) -> Result<()> {
        match mechanism {
            Some(mechanism) => {
                self.session.authenticate(mechanism, credentials).await?;
            }
            None => match credentials {
                Credentials::OAuth { .. } => {
                    self.session
                        .authenticate(Mechanism::XOAuth2, credentials)
                        .await?;
                }
                Credentials::Password {
                    ref username,
                    ref secret,
                } => {
                    let (username, password) = (username.clone(), secret.declassify().clone());
                    self.session.login(&username, &password).await?;
                }
            },
        }
        Ok(())
    }

    pub async fn open_inbox(&mut self) -> Result<SelectedSnapshot> {
        self.open_folder("INBOX").await
    }

    pub async fn open_folder(&mut self, name: &str) -> Result<SelectedSnapshot> {
        let outcome = self.session.select(Mailbox::from(name)).await?;
        Ok(outcome.delta.current)
    }

    pub async fn list_folders(&mut self) -> Result<Vec<Folder>> {
        self.session.list_folders("*").await
    }

    /// The envelope of one message, via the read-through cache.
    pub async fn fetch_envelope(&mut self, uid: u32) -> Result<Arc<Envelope>> {
        let uid_validity = self.session.selected().uid_validity.unwrap_or(0);
        if let Some(envelope) = self.cache.get(uid_validity, uid) {
            return Ok(envelope);
        }

        let outcome = self
            .session
            .run(CommandBody::Fetch {
                set: SequenceSet::try_from(&[uid][..])?,
                items: fetch_items(true, false, None),
                uid: true,
                changed_since: None,
            })
            .await?;

        let raw = outcome
            .untagged
            .iter()
            .find_map(|response| match response {
                UntaggedResponse::Fetch(attributes) if attributes.uid == Some(uid) => {
                    attributes.envelope_raw.as_deref()
                }
                _ => None,
            })
            .ok_or_else(|| Error::Parse(format!("no envelope for UID {}", uid)))?;

        self.cache
            .get_or_parse(uid_validity, uid, raw)
            .ok_or_else(|| Error::Parse(format!("malformed envelope for UID {}", uid)))
    }

    /// The whole RFC 822 message, raw.
    pub async fn fetch_message(&mut self, uid: u32) -> Result<Vec<u8>> {
        let outcome = self
            .session
            .run(CommandBody::Fetch {
                set: SequenceSet::try_from(&[uid][..])?,
                items: "(UID BODY.PEEK[])".into(),
                uid: true,
                changed_since: None,
            })
            .await?;

        outcome
            .untagged
            .into_iter()
            .find_map(|response| match response {
                UntaggedResponse::Fetch(attributes) if attributes.uid == Some(uid) => attributes
                    .sections
                    .into_iter()
                    .find(|section| section.section.is_none())
                    .and_then(|section| section.data),
                _ => None,
            })
            .ok_or_else(|| Error::Parse(format!("no body for UID {}", uid)))
    }

    pub fn session(&mut self) -> &mut ImapSession<S> {
        &mut self.session
    }

    pub async fn disconnect(self) -> Result<S> {
        self.session.logout().await
    }
}

/// A POP3-backed mail store. Only INBOX exists.
pub struct Pop3Store<S> {
    session: Pop3Session<S>,
}

impl<S> std::fmt::Debug for Pop3Store<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pop3Store").finish_non_exhaustive()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Pop3Store<S> {
    pub async fn connect(
        stream: S,
        config: &ClientConfig,
        logger: Option<Box<dyn ProtocolLogger>>,
    ) -> Result<Self> {
        let session = Pop3Session::connect(stream, config, logger).await?;
        Ok(Self { session })
    }

    /// Password credentials use USER/PASS; OAuth and explicit mechanisms go
    /// through AUTH. APOP is available on the session directly.
    pub async fn authenticate(
        &mut self,
        credentials: Credentials,
        mechanism: Option<Mechanism>,
    ) -> Result<()> {
        match mechanism {
            Some(mechanism) => self.session.authenticate(mechanism, credentials).await,
            None => match credentials {
                Credentials::OAuth { .. } => {
                    self.session
                        .authenticate(Mechanism::XOAuth2, credentials)
                        .await
                }
                Credentials::Password {
                    ref username,
                    ref secret,
                } => {
                    let (username, password) = (username.clone(), secret.declassify().clone());
                    self.session.login(&username, &password).await
                }
            },
        }
    }

    /// Opens INBOX: for POP3 that is a STAT, returning the message count.
    pub async fn open_inbox(&mut self) -> Result<u32> {
        let (count, _) = self.session.stat().await?;
        Ok(count)
    }

    /// Any folder other than INBOX does not exist in POP3.
    pub async fn open_folder(&mut self, name: &str) -> Result<u32> {
        if !name.eq_ignore_ascii_case("INBOX") {
            return Err(Error::state(format!("unsupported folder: {}", name)));
        }
        self.open_inbox().await
    }

    pub async fn list_folders(&mut self) -> Result<Vec<Folder>> {
        Ok(vec![Folder {
            raw: "INBOX".into(),
            name: "INBOX".into(),
            delimiter: None,
            attributes: vec![FolderAttribute::NoInferiors],
            status: Vec::new(),
        }])
    }

    /// One message by 1-based index, bytes preserved.
    pub async fn fetch_message(&mut self, index: u32) -> Result<Vec<u8>> {
        self.session.retrieve(index).await
    }

    pub fn session(&mut self) -> &mut Pop3Session<S> {
        &mut self.session
    }

    pub async fn disconnect(self) -> Result<S> {
        self.session.quit().await
    }
}
