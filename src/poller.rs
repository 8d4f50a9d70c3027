//! Inbox poll loop: detect replies and answer them

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::conversation::normalize_address;
use crate::mail::Inbox;
use crate::outreach::ReplyResponder;

/// Counts for one poll cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub received: usize,
    pub replied: usize,
    pub failed: usize,
    /// Our own messages found in the inbox
    pub skipped: usize,
    /// Messages without a usable sender or body, flagged seen unanswered
    pub unreadable: usize,
}

pub struct Poller<I: Inbox> {
    inbox: I,
    responder: Arc<ReplyResponder>,
    own_address: String,
    interval: Duration,
}

impl<I: Inbox> Poller<I> {
    pub fn new(
        inbox: I,
        responder: Arc<ReplyResponder>,
        own_address: &str,
        interval: Duration,
    ) -> Self {
        Self {
            inbox,
            responder,
            own_address: normalize_address(own_address),
            interval,
        }
    }

    #[cfg(test)]
    pub fn inbox(&self) -> &I {
        &self.inbox
    }

    /// Check the inbox once and answer every unseen message.
    ///
    /// The inbox session is closed at the end of every cycle, including
    /// failed ones.
    pub async fn poll_once(&mut self) -> Result<PollReport> {
        let result = self.process_unseen().await;
        if let Err(e) = self.inbox.close().await {
            tracing::warn!("Failed to close inbox session: {:#}", e);
        }
        result
    }

    async fn process_unseen(&mut self) -> Result<PollReport> {
        let mut report = PollReport::default();

        let batch = self.inbox.fetch_unseen().await?;

        for uid in batch.unreadable {
            tracing::warn!("Marking unparseable message uid {} seen", uid);
            self.mark_seen(Some(uid)).await;
            report.unreadable += 1;
        }

        for email in batch.messages {
            if normalize_address(&email.from_addr) == self.own_address {
                tracing::debug!("Skipping our own message {:?}", email.subject);
                self.mark_seen(email.uid).await;
                report.skipped += 1;
                continue;
            }

            report.received += 1;
            tracing::info!("New reply from {}: {}", email.from_addr, email.subject);

            self.responder.record_inbound(&email);
            self.mark_seen(email.uid).await;

            match self.responder.respond(&email).await {
                Ok(()) => report.replied += 1,
                Err(e) => {
                    tracing::error!("Failed to answer {}: {:#}", email.from_addr, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn mark_seen(&mut self, uid: Option<u32>) {
        let Some(uid) = uid else { return };
        if let Err(e) = self.inbox.mark_seen(uid).await {
            tracing::warn!("Failed to mark uid {} seen: {:#}", uid, e);
        }
    }

    /// Poll until `shutdown` resolves. A failed cycle is logged and the loop
    /// carries on at the next interval.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!("Polling inbox every {:?}", self.interval);

        loop {
            match self.poll_once().await {
                Ok(report) if report.received > 0 => tracing::info!(
                    "Poll cycle: {} received, {} replied, {} failed",
                    report.received,
                    report.replied,
                    report.failed
                ),
                Ok(_) => tracing::debug!("Poll cycle: no new replies"),
                Err(e) => tracing::error!("Poll cycle failed: {:#}", e),
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Stopping inbox poller");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
