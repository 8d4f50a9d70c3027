use mail_parser::{MessageParser, MimeHeaders, PartType};

use super::types::{EmailBody, InboundEmail};

/// Parse a full RFC 822 message into the fields the reply path needs.
/// Returns `None` when the message has no usable sender.
pub fn parse_inbound(uid: Option<u32>, raw: &[u8]) -> Option<InboundEmail> {
    let message = MessageParser::default().parse(raw)?;

    let from_addr = message.from()?.first()?.address()?.to_string();
    let subject = message.subject().map(|s| s.to_string()).unwrap_or_default();
    let message_id = message.message_id().map(|id| format!("<{}>", id));

    let body = EmailBody {
        text: extract_text_body(&message),
        html: extract_html_body(&message),
    };

    Some(InboundEmail {
        uid,
        message_id,
        from_addr,
        subject,
        body: body.display_text().trim().to_string(),
    })
}

fn extract_text_body(message: &mail_parser::Message) -> Option<String> {
    for part in message.text_bodies() {
        if let PartType::Text(text) = &part.body {
            return Some(text.to_string());
        }
    }

    // Fallback: any text/plain part
    for part in message.parts.iter() {
        if let PartType::Text(text) = &part.body {
            let content_type = part.content_type();
            if content_type
                .map(|ct| ct.subtype() == Some("plain"))
                .unwrap_or(true)
            {
                return Some(text.to_string());
            }
        }
    }

    None
}

fn extract_html_body(message: &mail_parser::Message) -> Option<String> {
    for part in message.html_bodies() {
        if let PartType::Html(html) = &part.body {
            return Some(html.to_string());
        }
    }

    None
}
