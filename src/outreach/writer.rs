//! Model-backed text for every email the system sends

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::ai::prompts::{self, PromptTemplate, PromptVars, Slot};
use crate::ai::{CompletionClient, CompletionRequest, Persona, Purpose};
use crate::config::CompanyProfile;
use crate::constants::*;
use crate::conversation::{Direction, MessageRecord};

use super::Recipient;

/// One candidate body, produced and consumed within a single send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub persona: Persona,
    pub body: String,
}

pub struct EmailWriter {
    client: Arc<dyn CompletionClient>,
    company: CompanyProfile,
}

impl EmailWriter {
    pub fn new(client: Arc<dyn CompletionClient>, company: CompanyProfile) -> Self {
        Self { client, company }
    }

    pub fn company(&self) -> &CompanyProfile {
        &self.company
    }

    /// Run one prompt and return the trimmed text. Blank output is an error.
    async fn complete(
        &self,
        purpose: Purpose,
        template: &PromptTemplate,
        vars: &PromptVars,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String> {
        let request = CompletionRequest {
            purpose,
            system: prompts::SDR_SYSTEM,
            prompt: template.render(vars)?,
            max_tokens,
            temperature,
        };

        let text = self.client.complete(&request).await?;
        let text = text.trim();
        if text.is_empty() {
            anyhow::bail!("empty completion for {}", purpose);
        }
        Ok(text.to_string())
    }

    fn company_vars(&self) -> PromptVars {
        PromptVars::new()
            .set(Slot::Company, self.company.name.as_str())
            .set(Slot::Description, self.company.description.as_str())
    }

    pub async fn draft(&self, persona: Persona, recipient: &Recipient) -> Result<Draft> {
        let vars = self
            .company_vars()
            .set(Slot::Persona, persona.instruction())
            .set(Slot::Recipient, recipient.describe());

        let body = self
            .complete(
                Purpose::Draft(persona),
                &prompts::COLD_EMAIL,
                &vars,
                DRAFT_MAX_TOKENS,
                DRAFT_TEMPERATURE,
            )
            .await
            .with_context(|| format!("Failed to generate {} draft", persona))?;

        Ok(Draft { persona, body })
    }

    /// One draft per persona, requested one after another
    pub async fn drafts(&self, recipient: &Recipient) -> Result<[Draft; 3]> {
        let [first, second, third] = Persona::ALL;
        Ok([
            self.draft(first, recipient).await?,
            self.draft(second, recipient).await?,
            self.draft(third, recipient).await?,
        ])
    }

    /// Ask the model for the most effective draft. Never fails: anything but
    /// a clear answer yields the fallback persona's draft.
    pub async fn select(&self, drafts: [Draft; 3]) -> Draft {
        let options = drafts
            .iter()
            .enumerate()
            .map(|(i, draft)| format!("{}. {}", i + 1, draft.body))
            .collect::<Vec<_>>()
            .join("\n\n");
        let vars = PromptVars::new().set(Slot::Drafts, options);

        let answer = self
            .complete(
                Purpose::Selection,
                &prompts::SELECT_BEST,
                &vars,
                SELECTION_MAX_TOKENS,
                SELECTION_TEMPERATURE,
            )
            .await;

        let chosen = match answer {
            Ok(answer) => parse_selection(&answer, &drafts).or_else(|| {
                tracing::warn!(
                    "Unusable draft selection {:?}, using {} draft",
                    answer,
                    Persona::FALLBACK
                );
                None
            }),
            Err(e) => {
                tracing::warn!(
                    "Draft selection failed: {:#}, using {} draft",
                    e,
                    Persona::FALLBACK
                );
                None
            }
        };

        let index = chosen.unwrap_or_else(|| fallback_index(&drafts));
        let [first, second, third] = drafts;
        match index {
            0 => first,
            1 => second,
            _ => third,
        }
    }

    /// Subject line for a chosen body, or a fixed generic one
    pub async fn subject(&self, body: &str) -> String {
        let vars = PromptVars::new().set(Slot::Draft, body);

        let generated = self
            .complete(
                Purpose::Subject,
                &prompts::SUBJECT_LINE,
                &vars,
                SUBJECT_MAX_TOKENS,
                SUBJECT_TEMPERATURE,
            )
            .await;

        match generated.map(|raw| clean_subject(&raw)) {
            Ok(Some(subject)) => subject,
            Ok(None) => {
                tracing::warn!("Model returned no usable subject, using fallback");
                self.fallback_subject()
            }
            Err(e) => {
                tracing::warn!("Subject generation failed: {:#}, using fallback", e);
                self.fallback_subject()
            }
        }
    }

    pub fn fallback_subject(&self) -> String {
        format!("Quick question about {}", self.company.name)
    }

    /// Follow-up body given the whole conversation
    pub async fn reply(&self, history: &[MessageRecord]) -> Result<String> {
        if history.is_empty() {
            anyhow::bail!("no conversation history to reply to");
        }

        let vars = self
            .company_vars()
            .set(Slot::History, format_history(history));

        self.complete(
            Purpose::Reply,
            &prompts::FOLLOW_UP,
            &vars,
            REPLY_MAX_TOKENS,
            REPLY_TEMPERATURE,
        )
        .await
        .context("Failed to generate reply")
    }
}

fn fallback_index(drafts: &[Draft]) -> usize {
    drafts
        .iter()
        .position(|draft| draft.persona == Persona::FALLBACK)
        .unwrap_or(0)
}

/// Index of the draft the model picked: the first standalone digit in range,
/// else a draft quoted back verbatim
pub fn parse_selection(answer: &str, drafts: &[Draft]) -> Option<usize> {
    let chars: Vec<char> = answer.chars().collect();
    for (i, c) in chars.iter().enumerate() {
        let Some(n) = c.to_digit(10) else { continue };
        let before = i.checked_sub(1).and_then(|j| chars.get(j));
        let after = chars.get(i + 1);
        if before.is_some_and(|c| c.is_ascii_digit()) || after.is_some_and(|c| c.is_ascii_digit()) {
            continue;
        }
        let n = n as usize;
        if (1..=drafts.len()).contains(&n) {
            return Some(n - 1);
        }
    }

    let answer = answer.trim();
    drafts.iter().position(|draft| draft.body.trim() == answer)
}

/// First non-empty line with any `Subject:` label and quotes removed
pub fn clean_subject(raw: &str) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|line| !line.is_empty())?;
    let line = match line.get(..8) {
        Some(label) if label.eq_ignore_ascii_case("subject:") => &line[8..],
        _ => line,
    };
    let subject: String = line
        .chars()
        .filter(|c| !matches!(c, '"' | '\u{201c}' | '\u{201d}'))
        .collect();
    let subject = subject.trim();
    (!subject.is_empty()).then(|| subject.to_string())
}

/// Conversation rendered oldest first for the reply prompt
pub fn format_history(history: &[MessageRecord]) -> String {
    history
        .iter()
        .map(|record| {
            let speaker = match record.direction {
                Direction::Outbound => "YOU",
                Direction::Inbound => "PROSPECT",
            };
            let mut entry = format!(
                "--- {} ({}) ---\n",
                speaker,
                record.timestamp.format("%Y-%m-%d %H:%M UTC")
            );
            if let Some(ref subject) = record.subject {
                entry.push_str(&format!("Subject: {}\n", subject));
            }
            entry.push_str(record.body.trim());
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{self, Event, StubCompletion};

    fn drafts() -> [Draft; 3] {
        Persona::ALL.map(|persona| Draft {
            persona,
            body: format!("{} pitch", persona),
        })
    }

    #[test]
    fn test_parse_selection_digits() {
        let drafts = drafts();
        assert_eq!(parse_selection("2", &drafts), Some(1));
        assert_eq!(parse_selection(" 3.\n", &drafts), Some(2));
        assert_eq!(parse_selection("Option 1 is best", &drafts), Some(0));
        assert_eq!(parse_selection("Email #3", &drafts), Some(2));
        assert_eq!(parse_selection("12", &drafts), None);
        assert_eq!(parse_selection("4", &drafts), None);
        assert_eq!(parse_selection("the second one", &drafts), None);
    }

    #[test]
    fn test_parse_selection_verbatim_body() {
        let drafts = drafts();
        assert_eq!(parse_selection("  concise pitch\n", &drafts), Some(2));
    }

    #[test]
    fn test_clean_subject() {
        assert_eq!(
            clean_subject("\"Cut SOC2 prep to a week\""),
            Some("Cut SOC2 prep to a week".to_string())
        );
        assert_eq!(
            clean_subject("\n  Subject: Quick win for Acme\nextra"),
            Some("Quick win for Acme".to_string())
        );
        assert_eq!(clean_subject("  \n \"\" "), None);
    }

    #[test]
    fn test_format_history() {
        let history = vec![
            MessageRecord::outbound("jane@example.com", "Hi", "pitch"),
            MessageRecord::inbound("jane@example.com", None, "tell me more\n"),
        ];
        let text = format_history(&history);
        let you = text.find("--- YOU").unwrap();
        let prospect = text.find("--- PROSPECT").unwrap();
        assert!(you < prospect);
        assert!(text.contains("Subject: Hi\npitch"));
        assert!(text.ends_with("tell me more"));
    }

    #[tokio::test]
    async fn test_drafts_in_persona_order() {
        let journal = test_support::journal();
        let client = Arc::new(StubCompletion::new(journal.clone()));
        let writer = EmailWriter::new(client.clone(), CompanyProfile::default());

        let recipient = Recipient {
            name: Some("Jane".to_string()),
            ..Recipient::new("jane@example.com")
        };
        let drafts = writer.drafts(&recipient).await.unwrap();

        assert_eq!(drafts.map(|d| d.persona), Persona::ALL);
        assert_eq!(test_support::events(&journal), test_support::draft_events());

        let requests = client.requests();
        assert!(requests[0].prompt.starts_with(Persona::Professional.instruction()));
        assert!(requests[1].prompt.starts_with(Persona::Engaging.instruction()));
        assert!(requests[2].prompt.contains("Recipient: Jane, CEO"));
        assert!(requests[2].prompt.contains("Company: ComplAI"));
        assert!(requests.iter().all(|r| r.max_tokens == DRAFT_MAX_TOKENS));
    }

    #[tokio::test]
    async fn test_draft_error_propagates() {
        let journal = test_support::journal();
        let client = Arc::new(StubCompletion::with(journal.clone(), |request| {
            match request.purpose {
                Purpose::Draft(Persona::Engaging) => anyhow::bail!("503 overloaded"),
                _ => Ok("fine".to_string()),
            }
        }));
        let writer = EmailWriter::new(client, CompanyProfile::default());

        let err = writer
            .drafts(&Recipient::new("jane@example.com"))
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("engaging draft"));
        // Concise is never requested once engaging failed
        assert_eq!(test_support::events(&journal).len(), 2);
    }

    #[tokio::test]
    async fn test_draft_is_trimmed() {
        let journal = test_support::journal();
        let client = Arc::new(StubCompletion::with(journal, |_| {
            Ok("\n  Hi Jane, quick idea.  \n".to_string())
        }));
        let writer = EmailWriter::new(client, CompanyProfile::default());

        let draft = writer
            .draft(Persona::Concise, &Recipient::new("a@example.com"))
            .await
            .unwrap();
        assert_eq!(draft.body, "Hi Jane, quick idea.");
    }

    #[tokio::test]
    async fn test_blank_draft_is_error() {
        let journal = test_support::journal();
        let client = Arc::new(StubCompletion::with(journal, |_| Ok("  \n".to_string())));
        let writer = EmailWriter::new(client, CompanyProfile::default());

        assert!(
            writer
                .draft(Persona::Concise, &Recipient::new("a@example.com"))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_select_uses_model_answer() {
        let journal = test_support::journal();
        let client = Arc::new(StubCompletion::new(journal.clone()));
        let writer = EmailWriter::new(client.clone(), CompanyProfile::default());

        let chosen = writer.select(drafts()).await;
        assert_eq!(chosen.persona, Persona::Engaging);

        let prompt = &client.requests()[0].prompt;
        assert!(prompt.contains("1. professional pitch"));
        assert!(prompt.contains("3. concise pitch"));
        assert_eq!(
            test_support::events(&journal),
            vec![Event::Completion(Purpose::Selection)]
        );
    }

    #[tokio::test]
    async fn test_select_falls_back_on_unparseable_answer() {
        let journal = test_support::journal();
        let client = Arc::new(StubCompletion::with(journal, |_| {
            Ok("They are all great, honestly.".to_string())
        }));
        let writer = EmailWriter::new(client, CompanyProfile::default());

        let chosen = writer.select(drafts()).await;
        assert_eq!(chosen.persona, Persona::Professional);
        assert_eq!(chosen.body, "professional pitch");
    }

    #[tokio::test]
    async fn test_select_falls_back_on_error() {
        let journal = test_support::journal();
        let client = Arc::new(StubCompletion::with(journal, |_| {
            anyhow::bail!("connection reset")
        }));
        let writer = EmailWriter::new(client, CompanyProfile::default());

        assert_eq!(writer.select(drafts()).await.persona, Persona::Professional);
    }

    #[tokio::test]
    async fn test_subject_cleanup_and_fallback() {
        let journal = test_support::journal();
        let client = Arc::new(StubCompletion::new(journal.clone()));
        let writer = EmailWriter::new(client, CompanyProfile::default());
        assert_eq!(writer.subject("body").await, "Compliance in a week");

        let failing = Arc::new(StubCompletion::with(journal, |_| anyhow::bail!("timeout")));
        let writer = EmailWriter::new(
            failing,
            CompanyProfile {
                name: "Acme".to_string(),
                description: "anvils".to_string(),
            },
        );
        assert_eq!(writer.subject("body").await, "Quick question about Acme");
    }

    #[tokio::test]
    async fn test_reply_embeds_history() {
        let journal = test_support::journal();
        let client = Arc::new(StubCompletion::new(journal));
        let writer = EmailWriter::new(client.clone(), CompanyProfile::default());

        let history = vec![
            MessageRecord::outbound("jane@example.com", "Hi", "original pitch"),
            MessageRecord::inbound("jane@example.com", Some("Re: Hi"), "What does it cost?"),
        ];
        let body = writer.reply(&history).await.unwrap();
        assert_eq!(body, "Happy to set up a call.");

        let request = &client.requests()[0];
        assert_eq!(request.purpose, Purpose::Reply);
        assert!(request.prompt.contains("original pitch"));
        assert!(request.prompt.contains("What does it cost?"));
        assert!(request.prompt.contains("sales representative for ComplAI"));

        assert!(writer.reply(&[]).await.is_err());
    }
}
