//! Application-wide constants for tuning and configuration
//!
//! Centralizes magic numbers to make them discoverable and configurable.

/// Delay in seconds between two campaign sends.
/// Keeps personal mailboxes below provider spam heuristics.
pub const DEFAULT_SEND_DELAY_SECS: u64 = 30;

/// Interval in seconds between two inbox poll cycles.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

pub const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_IMAP_SERVER: &str = "imap.gmail.com";
pub const DEFAULT_IMAP_PORT: u16 = 993;

pub const DEFAULT_COMPANY_NAME: &str = "ComplAI";
pub const DEFAULT_COMPANY_DESCRIPTION: &str = "AI-powered SOC2 compliance automation";

pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Port the webhook listener binds on all interfaces by default.
pub const DEFAULT_WEBHOOK_PORT: u16 = 5000;

/// Route the webhook provider posts replies to.
pub const WEBHOOK_PATH: &str = "/webhook/email-reply";

/// Header carrying the shared webhook token when one is configured.
pub const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

/// Title used in prompts when a recipient has none.
pub const DEFAULT_RECIPIENT_TITLE: &str = "CEO";

// === Completion parameters ===

pub const DRAFT_MAX_TOKENS: u32 = 300;
pub const DRAFT_TEMPERATURE: f32 = 0.7;

pub const SELECTION_MAX_TOKENS: u32 = 400;
pub const SELECTION_TEMPERATURE: f32 = 0.3;

pub const SUBJECT_MAX_TOKENS: u32 = 50;
pub const SUBJECT_TEMPERATURE: f32 = 0.7;

pub const REPLY_MAX_TOKENS: u32 = 400;
pub const REPLY_TEMPERATURE: f32 = 0.7;

// === SMTP self-test ===

pub const TEST_EMAIL_SUBJECT: &str = "Test - outreach";
pub const TEST_EMAIL_BODY: &str = "This is a test email from outreach. If you receive this, email sending is working!";
