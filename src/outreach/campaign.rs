//! Sequential cold email campaign

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::constants::{TEST_EMAIL_BODY, TEST_EMAIL_SUBJECT};
use crate::conversation::{ConversationStore, MessageRecord};
use crate::mail::{Mailer, OutgoingEmail};

use super::{EmailWriter, Recipient};

/// Outcome of one campaign run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CampaignReport {
    pub sent: Vec<String>,
    /// Recipient and the error that stopped their email
    pub failed: Vec<(String, String)>,
}

pub struct Campaign {
    writer: Arc<EmailWriter>,
    mailer: Arc<dyn Mailer>,
    store: Arc<ConversationStore>,
    send_delay: Duration,
}

impl Campaign {
    pub fn new(
        writer: Arc<EmailWriter>,
        mailer: Arc<dyn Mailer>,
        store: Arc<ConversationStore>,
        send_delay: Duration,
    ) -> Self {
        Self {
            writer,
            mailer,
            store,
            send_delay,
        }
    }

    /// Email every recipient in order, pausing between sends. A failure is
    /// logged and the run moves on to the next recipient.
    pub async fn run(&self, recipients: &[Recipient]) -> CampaignReport {
        let mut report = CampaignReport::default();

        for (i, recipient) in recipients.iter().enumerate() {
            if i > 0 && !self.send_delay.is_zero() {
                tracing::debug!("Waiting {:?} before next send", self.send_delay);
                tokio::time::sleep(self.send_delay).await;
            }

            tracing::info!(
                "Processing {} ({}/{})",
                recipient.email,
                i + 1,
                recipients.len()
            );

            match self.send_one(recipient).await {
                Ok(()) => report.sent.push(recipient.email.clone()),
                Err(e) => {
                    tracing::error!("Failed to email {}: {:#}", recipient.email, e);
                    report.failed.push((recipient.email.clone(), format!("{:#}", e)));
                }
            }
        }

        tracing::info!(
            "Campaign finished: {} sent, {} failed",
            report.sent.len(),
            report.failed.len()
        );
        report
    }

    /// Draft, select, title and send one cold email
    pub async fn send_one(&self, recipient: &Recipient) -> Result<()> {
        let drafts = self.writer.drafts(recipient).await?;
        let chosen = self.writer.select(drafts).await;
        tracing::debug!("Selected {} draft for {}", chosen.persona, recipient.email);

        let subject = self.writer.subject(&chosen.body).await;
        let email = OutgoingEmail::new(&recipient.email, &subject, &chosen.body);

        self.mailer
            .send(&email)
            .await
            .with_context(|| format!("Failed to send to {}", recipient.email))?;

        self.store
            .append(MessageRecord::outbound(&recipient.email, &subject, &chosen.body));
        Ok(())
    }
}

/// Send a test email to `address` to prove the SMTP credentials work
pub async fn verify_smtp(mailer: &dyn Mailer, address: &str) -> Result<()> {
    let email = OutgoingEmail::new(address, TEST_EMAIL_SUBJECT, TEST_EMAIL_BODY);
    mailer
        .send(&email)
        .await
        .context("SMTP self-test failed")?;
    tracing::info!("SMTP self-test succeeded");
    Ok(())
}
