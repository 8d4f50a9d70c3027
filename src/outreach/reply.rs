//! Reply handling shared by the poll loop and the webhook

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::conversation::{ConversationStore, MessageRecord};
use crate::mail::{InboundEmail, Mailer, OutgoingEmail};

use super::EmailWriter;

pub struct ReplyResponder {
    writer: Arc<EmailWriter>,
    mailer: Arc<dyn Mailer>,
    store: Arc<ConversationStore>,
}

impl ReplyResponder {
    pub fn new(
        writer: Arc<EmailWriter>,
        mailer: Arc<dyn Mailer>,
        store: Arc<ConversationStore>,
    ) -> Self {
        Self {
            writer,
            mailer,
            store,
        }
    }

    /// Append the prospect's message to their history
    pub fn record_inbound(&self, email: &InboundEmail) {
        let subject = Some(email.subject.as_str()).filter(|s| !s.trim().is_empty());
        let count = self
            .store
            .append(MessageRecord::inbound(&email.from_addr, subject, &email.body));
        tracing::debug!(
            "Recorded reply from {} ({} messages in conversation)",
            email.from_addr,
            count
        );
    }

    /// Generate and send a follow-up to an already recorded message
    pub async fn respond(&self, email: &InboundEmail) -> Result<()> {
        let history = self.store.history(&email.from_addr);
        let body = self.writer.reply(&history).await?;

        let previous_subject = self.store.last_subject(&email.from_addr);
        let reply = OutgoingEmail::reply_to(email, previous_subject.as_deref(), &body);

        self.mailer
            .send(&reply)
            .await
            .with_context(|| format!("Failed to send reply to {}", email.from_addr))?;

        self.store
            .append(MessageRecord::outbound(&email.from_addr, &reply.subject, &body));
        tracing::info!("Replied to {}", email.from_addr);
        Ok(())
    }

    /// Record an inbound message, then answer it
    pub async fn handle(&self, email: &InboundEmail) -> Result<()> {
        self.record_inbound(email);
        self.respond(email).await
    }
}
