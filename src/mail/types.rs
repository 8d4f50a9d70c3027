/// A reply or campaign email that has been detected or received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEmail {
    /// IMAP UID; `None` when the message arrived through the webhook
    pub uid: Option<u32>,
    pub message_id: Option<String>,
    pub from_addr: String,
    pub subject: String,
    pub body: String,
}

/// Everything an unseen search turned up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnseenBatch {
    pub messages: Vec<InboundEmail>,
    /// UIDs whose content could not be parsed into a reply
    pub unreadable: Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct EmailBody {
    pub text: Option<String>,
    pub html: Option<String>,
}

impl EmailBody {
    /// Plain text if available, otherwise the HTML part rendered to text
    pub fn display_text(&self) -> String {
        if let Some(ref text) = self.text {
            text.clone()
        } else if let Some(ref html) = self.html {
            strip_html_tags(html)
        } else {
            String::new()
        }
    }
}

/// Convert HTML to readable plain text
fn strip_html_tags(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 80).unwrap_or_else(|_| html.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub in_reply_to: Option<String>,
}

impl OutgoingEmail {
    pub fn new(to: &str, subject: &str, body: &str) -> Self {
        Self {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            in_reply_to: None,
        }
    }

    /// Answer `original` with `body`, threading on its Message-ID when known
    pub fn reply_to(original: &InboundEmail, fallback_subject: Option<&str>, body: &str) -> Self {
        let subject = if original.subject.trim().is_empty() {
            fallback_subject.unwrap_or_default()
        } else {
            original.subject.as_str()
        };

        Self {
            to: original.from_addr.clone(),
            subject: reply_subject(subject),
            body: body.to_string(),
            in_reply_to: original.message_id.clone(),
        }
    }
}

/// Prefix `Re:` once, whatever the case of an existing prefix
pub fn reply_subject(subject: &str) -> String {
    let subject = subject.trim();
    if subject.is_empty() {
        "Re: your reply".to_string()
    } else if subject
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("re:"))
    {
        subject.to_string()
    } else {
        format!("Re: {}", subject)
    }
}
