//! Cold outreach and follow-up pipelines
//!
//! - `writer.rs` - Model-backed drafting, selection, subject and reply text
//! - `campaign.rs` - Sequential campaign driver over a recipient list
//! - `reply.rs` - Inbound reply handling shared by the poll loop and webhook

mod campaign;
mod reply;
mod writer;

use serde::Deserialize;

use crate::constants::DEFAULT_RECIPIENT_TITLE;

pub use campaign::{Campaign, verify_smtp};
pub use reply::ReplyResponder;
pub use writer::EmailWriter;

/// A prospect to send a cold email to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Recipient {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
}

impl Recipient {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            name: None,
            title: None,
            company: None,
        }
    }

    /// Who the email is addressed to, as the drafting prompt describes them
    pub fn describe(&self) -> String {
        let title = self.title.as_deref().unwrap_or(DEFAULT_RECIPIENT_TITLE);
        let role = match self.company.as_deref() {
            Some(company) => format!("{} at {}", title, company),
            None => title.to_string(),
        };
        match self.name.as_deref() {
            Some(name) => format!("{}, {}", name, role),
            None => role,
        }
    }
}
