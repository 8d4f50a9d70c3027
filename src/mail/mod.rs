pub mod imap;
pub mod parser;
pub mod smtp;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;

pub use imap::ImapClient;
pub use smtp::SmtpClient;
pub use types::{InboundEmail, OutgoingEmail, UnseenBatch};

/// Sends one message per call
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

/// A mailbox that can be checked for unseen replies.
///
/// Implementations connect lazily; `close` ends the session at the end of a
/// poll cycle and the next call reconnects.
#[async_trait]
pub trait Inbox: Send {
    /// Unseen messages, oldest first, plus the UIDs that could not be
    /// parsed. Does not mark anything seen.
    async fn fetch_unseen(&mut self) -> Result<UnseenBatch>;

    async fn mark_seen(&mut self, uid: u32) -> Result<()>;

    async fn close(&mut self) -> Result<()>;
}
