use std::collections::{HashMap, HashSet};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::constants::*;
use crate::conversation::normalize_address;
use crate::outreach::Recipient;

/// Fatal startup errors. Reported before any network call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to load campaign file {}: {source}", path.display())]
    CampaignFile {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read env file {}: {source}", path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub account: AccountConfig,
    pub company: CompanyProfile,
    pub schedule: Schedule,
    pub webhook: WebhookConfig,
    /// Campaign recipients, file entries first, de-duplicated by address
    pub recipients: Vec<Recipient>,
}

/// Completion API settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub email: String,
    /// App password used for both SMTP and IMAP login
    pub password: String,
    pub display_name: Option<String>,
    pub smtp: SmtpConfig,
    pub imap: ImapConfig,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub server: String,
    pub port: u16,
}

/// The company the campaign sells for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyProfile {
    pub name: String,
    pub description: String,
}

impl Default for CompanyProfile {
    fn default() -> Self {
        Self {
            name: DEFAULT_COMPANY_NAME.to_string(),
            description: DEFAULT_COMPANY_DESCRIPTION.to_string(),
        }
    }
}

/// Fixed delays of the campaign and poll loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub send_delay: Duration,
    pub poll_interval: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            send_delay: Duration::from_secs(DEFAULT_SEND_DELAY_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub addr: SocketAddr,
    /// Shared secret expected in the `X-Webhook-Token` header, if set
    pub token: Option<String>,
}

/// On-disk campaign definition
///
/// ```toml
/// [[recipients]]
/// email = "jane@example.com"
/// name = "Jane Doe"
/// title = "CTO"
/// company = "Example Inc"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignFile {
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

impl CampaignFile {
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let wrap = |source: anyhow::Error| ConfigError::CampaignFile {
            path: path.to_path_buf(),
            source,
        };
        let content = fs::read_to_string(path).map_err(|e| wrap(e.into()))?;
        Self::parse(&content).map_err(wrap)
    }
}

impl Config {
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("outreach"))
    }

    /// Campaign file picked up without `CAMPAIGN_FILE`, if it exists
    pub fn default_campaign_path() -> Option<PathBuf> {
        Self::config_dir()
            .map(|dir| dir.join("campaign.toml"))
            .filter(|path| path.exists())
    }

    /// Process environment overlaid with `./.env`. Values from the file win.
    pub fn from_env() -> Result<Self, ConfigError> {
        let file_vars = match std::env::current_dir() {
            Ok(dir) => read_env_file(&dir.join(".env"))?,
            Err(_) => HashMap::new(),
        };
        Self::from_lookup(
            |key| {
                file_vars
                    .get(key)
                    .cloned()
                    .or_else(|| std::env::var(key).ok())
            },
            Self::default_campaign_path(),
        )
    }

    /// Build the configuration from an arbitrary variable source.
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F, default_campaign: Option<PathBuf>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let api_key = require("OPENAI_API_KEY")?;
        let email = require("EMAIL_ADDRESS")?;
        let password = require("EMAIL_PASSWORD")?;

        if !is_plausible_address(&email) {
            return Err(ConfigError::Invalid {
                var: "EMAIL_ADDRESS",
                value: email,
                reason: "not an email address".to_string(),
            });
        }

        let api = ApiConfig {
            api_key,
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        };

        let account = AccountConfig {
            email,
            password,
            display_name: get("SENDER_NAME"),
            smtp: SmtpConfig {
                server: get("SMTP_SERVER").unwrap_or_else(|| DEFAULT_SMTP_SERVER.to_string()),
                port: parse_var("SMTP_PORT", get("SMTP_PORT"), DEFAULT_SMTP_PORT)?,
            },
            imap: ImapConfig {
                server: get("IMAP_SERVER").unwrap_or_else(|| DEFAULT_IMAP_SERVER.to_string()),
                port: parse_var("IMAP_PORT", get("IMAP_PORT"), DEFAULT_IMAP_PORT)?,
            },
        };

        let company = CompanyProfile {
            name: get("COMPANY_NAME").unwrap_or_else(|| DEFAULT_COMPANY_NAME.to_string()),
            description: get("COMPANY_DESCRIPTION")
                .unwrap_or_else(|| DEFAULT_COMPANY_DESCRIPTION.to_string()),
        };

        let schedule = Schedule {
            send_delay: Duration::from_secs(parse_var(
                "SEND_DELAY_SECS",
                get("SEND_DELAY_SECS"),
                DEFAULT_SEND_DELAY_SECS,
            )?),
            poll_interval: Duration::from_secs(parse_var(
                "POLL_INTERVAL_SECS",
                get("POLL_INTERVAL_SECS"),
                DEFAULT_POLL_INTERVAL_SECS,
            )?),
        };

        let webhook = WebhookConfig {
            addr: parse_var(
                "WEBHOOK_ADDR",
                get("WEBHOOK_ADDR"),
                SocketAddr::from(([0, 0, 0, 0], DEFAULT_WEBHOOK_PORT)),
            )?,
            token: get("WEBHOOK_TOKEN"),
        };

        let campaign = match get("CAMPAIGN_FILE").map(PathBuf::from).or(default_campaign) {
            Some(path) => CampaignFile::load(&path)?,
            None => CampaignFile::default(),
        };

        let from_env = get("RECIPIENTS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(Recipient::new)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let recipients = merge_recipients(campaign.recipients, from_env)?;

        Ok(Self {
            api,
            account,
            company,
            schedule,
            webhook,
            recipients,
        })
    }
}

fn parse_var<T>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

/// Variables defined in a dotenv file. A missing file defines none.
fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    let wrap = |source: dotenvy::Error| ConfigError::EnvFile {
        path: path.to_path_buf(),
        source,
    };
    let entries = match dotenvy::from_path_iter(path) {
        Ok(entries) => entries,
        Err(e) if e.not_found() => return Ok(HashMap::new()),
        Err(e) => return Err(wrap(e)),
    };
    entries.collect::<Result<HashMap<_, _>, _>>().map_err(wrap)
}

fn is_plausible_address(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn merge_recipients(
    file: Vec<Recipient>,
    env: Vec<Recipient>,
) -> Result<Vec<Recipient>, ConfigError> {
    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for recipient in file.into_iter().chain(env) {
        if !is_plausible_address(&recipient.email) {
            return Err(ConfigError::Invalid {
                var: "RECIPIENTS",
                value: recipient.email,
                reason: "not an email address".to_string(),
            });
        }
        if seen.insert(normalize_address(&recipient.email)) {
            merged.push(recipient);
        }
    }

    Ok(merged)
}
