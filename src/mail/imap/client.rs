//! IMAP client operations: connection, unseen search, fetch, and flag management.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};

use super::{ImapClient, ImapSession};
use crate::mail::Inbox;
use crate::mail::parser::parse_inbound;
use crate::mail::types::UnseenBatch;

impl ImapClient {
    //
    // Connection Management
    //

    pub async fn connect(&mut self) -> Result<()> {
        use rustls::pki_types::ServerName;
        use tokio::net::TcpStream;
        use tokio_rustls::TlsConnector;
        use tokio_util::compat::TokioAsyncReadCompatExt;

        let addr = format!("{}:{}", self.config.server, self.config.port);

        let tcp = TcpStream::connect(&addr)
            .await
            .with_context(|| format!("Failed to connect to {}", addr))?;

        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let tls_config = rustls::ClientConfig::builder_with_provider(Arc::new(
            rustls::crypto::ring::default_provider(),
        ))
        .with_safe_default_protocol_versions()
        .context("Failed to configure TLS")?
        .with_root_certificates(roots)
        .with_no_client_auth();

        let server_name = ServerName::try_from(self.config.server.clone())
            .with_context(|| format!("Invalid IMAP server name '{}'", self.config.server))?;

        let tls_stream = TlsConnector::from(Arc::new(tls_config))
            .connect(server_name, tcp)
            .await
            .context("TLS handshake failed")?;

        // async-imap speaks futures-io, so wrap the tokio stream with the compat layer
        let client = async_imap::Client::new(tls_stream.compat());

        let session = client
            .login(&self.username, &self.password)
            .await
            .map_err(|e| anyhow::anyhow!("Login failed: {:?}", e.0))?;

        self.session = Some(session);
        tracing::info!("Connected to IMAP server {}", self.config.server);

        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            session.logout().await.ok();
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub(crate) async fn ensure_connected(&mut self) -> Result<()> {
        if !self.is_connected() {
            self.connect().await?;
        }
        Ok(())
    }

    pub(crate) fn session(&mut self) -> Result<&mut ImapSession> {
        self.session
            .as_mut()
            .context("Not connected to IMAP server")
    }

    //
    // Fetch Operations
    //

    /// UIDs of every unseen message in INBOX
    pub async fn search_unseen(&mut self) -> Result<Vec<u32>> {
        self.ensure_connected().await?;
        let session = self.session()?;

        session
            .select("INBOX")
            .await
            .context("Failed to select INBOX")?;

        let mut uids: Vec<u32> = session
            .uid_search("UNSEEN")
            .await
            .context("Failed to search for unseen messages")?
            .into_iter()
            .collect();
        uids.sort_unstable();
        Ok(uids)
    }

    /// Fetch full messages without setting `\Seen`
    pub async fn fetch_messages(&mut self, uids: &[u32]) -> Result<UnseenBatch> {
        if uids.is_empty() {
            return Ok(UnseenBatch::default());
        }

        self.ensure_connected().await?;

        let uid_set = uids
            .iter()
            .map(|u| u.to_string())
            .collect::<Vec<_>>()
            .join(",");

        let session = self.session()?;
        let fetches: Vec<_> = session
            .uid_fetch(&uid_set, "(UID BODY.PEEK[])")
            .await
            .context("Failed to fetch messages")?
            .try_collect()
            .await
            .context("Failed to fetch message")?;

        let mut batch = UnseenBatch::default();
        for fetch in &fetches {
            let Some(uid) = fetch.uid else { continue };
            match fetch.body().and_then(|raw| parse_inbound(Some(uid), raw)) {
                Some(email) => batch.messages.push(email),
                None => batch.unreadable.push(uid),
            }
        }

        // Keep arrival order
        batch.messages.sort_by_key(|email| email.uid);
        batch.unreadable.sort_unstable();

        tracing::debug!(
            "Fetched {} messages, {} unreadable (requested {})",
            batch.messages.len(),
            batch.unreadable.len(),
            uids.len()
        );
        Ok(batch)
    }

    //
    // Flag Operations
    //

    pub async fn add_seen_flag(&mut self, uid: u32) -> Result<()> {
        self.ensure_connected().await?;

        let session = self.session()?;
        let responses: Vec<_> = session
            .uid_store(uid.to_string(), "+FLAGS (\\Seen)")
            .await
            .context("Failed to add \\Seen flag")?
            .collect()
            .await;

        for response in responses {
            if let Err(e) = response {
                tracing::warn!("Error in add_seen_flag response: {:?}", e);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Inbox for ImapClient {
    async fn fetch_unseen(&mut self) -> Result<UnseenBatch> {
        let uids = self.search_unseen().await?;
        if uids.is_empty() {
            tracing::debug!("No unseen messages");
            return Ok(UnseenBatch::default());
        }
        tracing::debug!("Found {} unseen messages", uids.len());
        self.fetch_messages(&uids).await
    }

    async fn mark_seen(&mut self, uid: u32) -> Result<()> {
        self.add_seen_flag(uid).await
    }

    async fn close(&mut self) -> Result<()> {
        self.disconnect().await
    }
}
