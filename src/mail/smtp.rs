use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;

use super::Mailer;
use super::types::OutgoingEmail;

pub struct SmtpClient {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpClient {
    /// Build a STARTTLS transport. No connection is made until the first send.
    pub fn new(
        config: &SmtpConfig,
        username: &str,
        password: &str,
        from_email: &str,
        from_name: Option<&str>,
    ) -> Result<Self> {
        let creds = Credentials::new(username.to_string(), password.to_string());

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
            .context("Failed to create SMTP transport")?
            .port(config.port)
            .credentials(creds)
            .authentication(vec![Mechanism::Plain, Mechanism::Login])
            .build();

        let from = if let Some(name) = from_name {
            format!("{} <{}>", name, from_email)
                .parse::<Mailbox>()
                .context("Invalid from address")?
        } else {
            from_email
                .parse::<Mailbox>()
                .context("Invalid from address")?
        };

        Ok(Self { transport, from })
    }

    fn build_message(&self, email: &OutgoingEmail) -> Result<Message> {
        let to_mailbox = email
            .to
            .trim()
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid recipient address: {}", email.to))?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .reply_to(self.from.clone())
            .to(to_mailbox)
            .subject(&email.subject);

        if let Some(ref message_id) = email.in_reply_to {
            builder = builder
                .in_reply_to(message_id.clone())
                .references(message_id.clone());
        }

        builder
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .context("Failed to build email message")
    }
}

#[async_trait]
impl Mailer for SmtpClient {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = self.build_message(email)?;

        self.transport
            .send(message)
            .await
            .context("Failed to send email")?;

        tracing::info!("Email sent to {}", email.to);
        Ok(())
    }
}
