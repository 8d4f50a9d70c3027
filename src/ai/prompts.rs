//! Prompt templates for drafting, selection, subject lines and replies
//!
//! Templates reference named slots as `{slot}`. Rendering fails when a slot the
//! template uses has no value, so prompt assembly can be tested without a
//! completion client.

use std::collections::HashMap;
use std::fmt;

use anyhow::Result;

/// System prompt shared by every outreach completion
pub const SDR_SYSTEM: &str = r#"You are a sales development representative writing plain-text business email. Return only the requested text without any explanations, preamble, or commentary."#;

/// Cold email draft for one persona
pub const COLD_EMAIL: PromptTemplate = PromptTemplate::new(
    r#"{persona}.

Company: {company}
Product: {description}
Recipient: {recipient}

Make it compelling and personalized. Include a clear call to action.
Keep it under 150 words."#,
);

/// Pick the most effective of the three drafts
pub const SELECT_BEST: PromptTemplate = PromptTemplate::new(
    r#"Pick the best cold sales email from these options. Consider which one a busy executive would be most likely to respond to.

Answer with only the number of the selected email (1, 2 or 3), no explanation.

Options:

{drafts}"#,
);

/// Subject line for the chosen draft
pub const SUBJECT_LINE: PromptTemplate = PromptTemplate::new(
    r#"Write a compelling email subject line for this cold sales email:

{draft}

Make it likely to get opened. Under 50 characters. Return only the subject line."#,
);

/// Follow-up reply given the whole conversation
pub const FOLLOW_UP: PromptTemplate = PromptTemplate::new(
    r#"You are a sales representative for {company}, which provides {description}.

A prospect replied to your cold email. Generate a helpful, professional response that continues the conversation.

Conversation so far, oldest first:

{history}

Write a response that:
1. Acknowledges their reply
2. Provides helpful information
3. Moves the conversation forward
4. Includes a clear next step

Keep it conversational and under 200 words. Return only the email body."#,
);

/// Named value slots a template may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Recipient,
    Company,
    Description,
    Persona,
    Drafts,
    Draft,
    History,
}

impl Slot {
    pub const ALL: [Slot; 7] = [
        Slot::Recipient,
        Slot::Company,
        Slot::Description,
        Slot::Persona,
        Slot::Drafts,
        Slot::Draft,
        Slot::History,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Slot::Recipient => "recipient",
            Slot::Company => "company",
            Slot::Description => "description",
            Slot::Persona => "persona",
            Slot::Drafts => "drafts",
            Slot::Draft => "draft",
            Slot::History => "history",
        }
    }

    fn from_name(name: &str) -> Option<Slot> {
        Self::ALL.into_iter().find(|slot| slot.name() == name)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stylistic instruction set used for one draft
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Persona {
    Professional,
    Engaging,
    Concise,
}

impl Persona {
    /// Generation order; also the numbering the selection prompt uses
    pub const ALL: [Persona; 3] = [Persona::Professional, Persona::Engaging, Persona::Concise];

    /// Persona used whenever the model's selection cannot be trusted
    pub const FALLBACK: Persona = Persona::Professional;

    pub fn label(self) -> &'static str {
        match self {
            Persona::Professional => "professional",
            Persona::Engaging => "engaging",
            Persona::Concise => "concise",
        }
    }

    pub fn instruction(self) -> &'static str {
        match self {
            Persona::Professional => "Write a professional, formal cold sales email",
            Persona::Engaging => {
                "Write a witty, engaging cold sales email that's likely to get a response"
            }
            Persona::Concise => {
                "Write a brief, direct cold sales email that gets straight to the point"
            }
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Values bound to slots for one render
#[derive(Debug, Clone, Default)]
pub struct PromptVars {
    values: HashMap<Slot, String>,
}

impl PromptVars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, slot: Slot, value: impl Into<String>) -> Self {
        self.values.insert(slot, value.into());
        self
    }

    pub fn get(&self, slot: Slot) -> Option<&str> {
        self.values.get(&slot).map(String::as_str)
    }
}

/// Fixed prompt text with `{slot}` placeholders
#[derive(Debug, Clone, Copy)]
pub struct PromptTemplate {
    text: &'static str,
}

impl PromptTemplate {
    pub const fn new(text: &'static str) -> Self {
        Self { text }
    }

    /// Slots referenced by this template, in order of first appearance
    #[cfg(test)]
    pub fn slots(&self) -> Vec<Slot> {
        let mut slots = Vec::new();
        let mut rest = self.text;
        while let Some(start) = rest.find('{') {
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else { break };
            if let Some(slot) = Slot::from_name(&after[..end])
                && !slots.contains(&slot)
            {
                slots.push(slot);
            }
            rest = &after[end + 1..];
        }
        slots
    }

    /// Substitute every known slot. Braces that do not name a slot are kept as is.
    pub fn render(&self, vars: &PromptVars) -> Result<String> {
        let mut out = String::with_capacity(self.text.len() + 256);
        let mut rest = self.text;

        while let Some(start) = rest.find('{') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return Ok(out);
            };

            match Slot::from_name(&after[..end]) {
                Some(slot) => {
                    let value = vars
                        .get(slot)
                        .ok_or_else(|| anyhow::anyhow!("prompt slot '{}' has no value", slot))?;
                    out.push_str(value);
                }
                None => out.push_str(&rest[start..start + end + 2]),
            }
            rest = &after[end + 1..];
        }

        out.push_str(rest);
        Ok(out)
    }
}
