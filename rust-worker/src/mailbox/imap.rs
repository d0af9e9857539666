//! IMAP-over-TLS mail store using `async-imap`.
//!
//! Headers and bodies are fetched with `BODY.PEEK[..]` so that reading a
//! message never sets `\Seen` on its own; the poller sets it explicitly after
//! publishing.

use std::sync::Arc;

use async_imap::types::Fetch;
use async_imap::Session;
use async_trait::async_trait;
use futures::TryStreamExt;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::crypto::ring::default_provider;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info};

use super::store::{MailSession, MailStore};
use crate::config::Config;
use crate::error::MailboxError;

type ImapStream = Compat<TlsStream<TcpStream>>;

/// Connection settings for the IMAP store.
#[derive(Debug, Clone)]
pub struct ImapSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub mailbox: String,
}

impl ImapSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.imap_host.clone(),
            port: config.imap_port,
            username: config.imap_username.clone(),
            password: config.imap_password.clone(),
            mailbox: config.imap_mailbox.clone(),
        }
    }
}

/// Mail store backed by an IMAP server over implicit TLS.
pub struct ImapStore {
    settings: ImapSettings,
    connector: TlsConnector,
}

impl ImapStore {
    pub fn new(settings: ImapSettings) -> Result<Self, MailboxError> {
        let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls = ClientConfig::builder_with_provider(Arc::new(default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| MailboxError::Connect(format!("TLS setup failed: {}", e)))?
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            settings,
            connector: TlsConnector::from(Arc::new(tls)),
        })
    }

    async fn connect_tls(&self) -> Result<ImapStream, MailboxError> {
        let tcp = TcpStream::connect((self.settings.host.as_str(), self.settings.port))
            .await
            .map_err(|e| MailboxError::Connect(format!("TCP connect failed: {}", e)))?;

        let server_name = ServerName::try_from(self.settings.host.clone())
            .map_err(|e| MailboxError::Connect(format!("invalid server name: {}", e)))?;

        let tls = self
            .connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| MailboxError::Connect(format!("TLS handshake failed: {}", e)))?;

        Ok(tls.compat())
    }
}

#[async_trait]
impl MailStore for ImapStore {
    type Session = ImapSession;

    async fn connect(&self) -> Result<ImapSession, MailboxError> {
        debug!(host = %self.settings.host, port = self.settings.port, "imap_connecting");

        let stream = self.connect_tls().await?;
        let client = async_imap::Client::new(stream);

        let mut session = client
            .login(&self.settings.username, &self.settings.password)
            .await
            .map_err(|e| MailboxError::Login(e.0.to_string()))?;

        if let Err(e) = session.select(&self.settings.mailbox).await {
            // Best-effort logout, the select error is what gets reported
            session.logout().await.ok();
            return Err(MailboxError::Select(e.to_string()));
        }

        info!(
            host = %self.settings.host,
            mailbox = %self.settings.mailbox,
            "imap_mailbox_selected"
        );

        Ok(ImapSession { inner: session })
    }
}

/// Selected IMAP session.
pub struct ImapSession {
    inner: Session<ImapStream>,
}

impl ImapSession {
    async fn uid_fetch(&mut self, uid: u32, query: &str) -> Result<Vec<Fetch>, MailboxError> {
        self.inner
            .uid_fetch(uid.to_string(), query)
            .await
            .map_err(|e| MailboxError::Fetch(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| MailboxError::Fetch(e.to_string()))
    }
}

/// The response for `uid`, or the only response when the server omits UIDs.
fn pick(fetches: &[Fetch], uid: u32) -> Option<&Fetch> {
    fetches
        .iter()
        .find(|f| f.uid == Some(uid))
        .or_else(|| fetches.first())
}

#[async_trait]
impl MailSession for ImapSession {
    async fn unseen(&mut self) -> Result<Vec<u32>, MailboxError> {
        let uids = self
            .inner
            .uid_search("UNSEEN")
            .await
            .map_err(|e| MailboxError::Search(e.to_string()))?;

        let mut uids: Vec<u32> = uids.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    async fn headers(&mut self, uid: u32) -> Result<Vec<u8>, MailboxError> {
        let fetches = self.uid_fetch(uid, "(UID BODY.PEEK[HEADER])").await?;

        pick(&fetches, uid)
            .and_then(|f| f.header())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| MailboxError::Fetch(format!("no header returned for uid {}", uid)))
    }

    async fn fetch(&mut self, uid: u32) -> Result<Vec<u8>, MailboxError> {
        let fetches = self.uid_fetch(uid, "(UID BODY.PEEK[])").await?;

        pick(&fetches, uid)
            .and_then(|f| f.body())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| MailboxError::Fetch(format!("no body returned for uid {}", uid)))
    }

    async fn mark_seen(&mut self, uid: u32) -> Result<(), MailboxError> {
        let _updates: Vec<_> = self
            .inner
            .uid_store(uid.to_string(), "+FLAGS (\\Seen)")
            .await
            .map_err(|e| MailboxError::Store(e.to_string()))?
            .try_collect()
            .await
            .map_err(|e| MailboxError::Store(e.to_string()))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), MailboxError> {
        self.inner
            .logout()
            .await
            .map_err(|e| MailboxError::Logout(e.to_string()))
    }
}
