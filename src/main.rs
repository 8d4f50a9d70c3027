mod ai;
mod config;
mod constants;
mod conversation;
mod mail;
mod outreach;
mod poller;
#[cfg(test)]
mod test_support;
mod webhook;

use std::env;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::ai::OpenAiClient;
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::mail::{ImapClient, Mailer, SmtpClient};
use crate::outreach::{Campaign, EmailWriter, ReplyResponder, verify_smtp};
use crate::poller::Poller;
use crate::webhook::WebhookState;

fn setup_logging() {
    use std::fs::OpenOptions;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,outreach=debug"));

    // Log to a file only when asked to
    let log_file = env::var_os("OUTREACH_LOG_FILE").and_then(|path| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .ok()
    });

    if let Some(file) = log_file {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_usage() {
    eprintln!(
        r#"outreach - Cold email outreach with automatic replies

Usage: outreach [command]

Commands:
    (none)      Verify SMTP, run the campaign, then poll the inbox for replies
    webhook     Answer replies posted to the webhook listener
    help        Show this help message

Required environment:
    OPENAI_API_KEY, EMAIL_ADDRESS, EMAIL_PASSWORD

Campaign file: ~/.config/outreach/campaign.toml (or CAMPAIGN_FILE)
"#
    );
}

/// Long-lived services shared by both run modes
struct Services {
    mailer: Arc<dyn Mailer>,
    store: Arc<ConversationStore>,
    writer: Arc<EmailWriter>,
    responder: Arc<ReplyResponder>,
}

impl Services {
    fn new(config: &Config) -> Result<Self> {
        let client = Arc::new(OpenAiClient::new(
            config.api.api_key.clone(),
            config.api.base_url.clone(),
            config.api.model.clone(),
        ));

        let account = &config.account;
        let mailer: Arc<dyn Mailer> = Arc::new(SmtpClient::new(
            &account.smtp,
            &account.email,
            &account.password,
            &account.email,
            account.display_name.as_deref(),
        )?);

        let store = Arc::new(ConversationStore::new());
        let writer = Arc::new(EmailWriter::new(client, config.company.clone()));
        let responder = Arc::new(ReplyResponder::new(
            writer.clone(),
            mailer.clone(),
            store.clone(),
        ));

        Ok(Self {
            mailer,
            store,
            writer,
            responder,
        })
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

async fn run_outreach(config: Config) -> Result<()> {
    let services = Services::new(&config)?;

    verify_smtp(services.mailer.as_ref(), &config.account.email).await?;

    if config.recipients.is_empty() {
        tracing::info!("No recipients configured, skipping campaign");
    } else {
        tracing::info!(
            "Starting campaign for {} as {}",
            config.recipients.len(),
            services.writer.company().name
        );
        let campaign = Campaign::new(
            services.writer.clone(),
            services.mailer.clone(),
            services.store.clone(),
            config.schedule.send_delay,
        );
        let report = campaign.run(&config.recipients).await;
        for (email, error) in &report.failed {
            tracing::warn!("Not sent to {}: {}", email, error);
        }
    }

    let inbox = ImapClient::new(
        config.account.imap.clone(),
        config.account.email.clone(),
        config.account.password.clone(),
    );
    let mut poller = Poller::new(
        inbox,
        services.responder.clone(),
        &config.account.email,
        config.schedule.poll_interval,
    );
    poller.run(shutdown_signal()).await;

    tracing::info!(
        "Tracked {} messages across {} conversations",
        services.store.record_count(),
        services.store.conversation_count()
    );
    Ok(())
}

async fn run_webhook(config: Config) -> Result<()> {
    let services = Services::new(&config)?;
    let state = WebhookState {
        responder: services.responder,
        token: config.webhook.token.clone(),
    };
    webhook::serve(config.webhook.addr, state, shutdown_signal()).await
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("help") | Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some("webhook") => {
            setup_logging();
            let config = Config::from_env()?;
            run_webhook(config).await
        }
        Some(cmd) => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            std::process::exit(1);
        }
        None => {
            setup_logging();
            let config = Config::from_env()?;
            run_outreach(config).await
        }
    }
}
