//! Stub collaborators shared by the pipeline tests

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use crate::ai::{CompletionClient, CompletionRequest, Persona, Purpose};
use crate::config::CompanyProfile;
use crate::conversation::{ConversationStore, normalize_address};
use crate::mail::{Inbox, InboundEmail, Mailer, OutgoingEmail, UnseenBatch};
use crate::outreach::{EmailWriter, ReplyResponder};

/// Everything the stubs were asked to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Completion(Purpose),
    Send(String),
}

pub type Journal = Arc<Mutex<Vec<Event>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(journal: &Journal) -> Vec<Event> {
    journal.lock().unwrap().clone()
}

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

pub struct StubCompletion {
    journal: Journal,
    requests: Mutex<Vec<CompletionRequest>>,
    respond: Responder,
}

impl StubCompletion {
    /// Well-behaved model: labelled drafts, picks draft 2, fixed subject and reply
    pub fn new(journal: Journal) -> Self {
        Self::with(journal, |request| {
            Ok(match request.purpose {
                Purpose::Draft(persona) => format!("{} pitch", persona),
                Purpose::Selection => "2".to_string(),
                Purpose::Subject => "\"Compliance in a week\"".to_string(),
                Purpose::Reply => "Happy to set up a call.".to_string(),
            })
        })
    }

    pub fn with<F>(journal: Journal, respond: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            journal,
            requests: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for StubCompletion {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.journal
            .lock()
            .unwrap()
            .push(Event::Completion(request.purpose));
        self.requests.lock().unwrap().push(request.clone());
        (self.respond)(request)
    }
}

pub struct StubMailer {
    journal: Journal,
    fail_for: HashSet<String>,
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl StubMailer {
    pub fn new(journal: Journal) -> Self {
        Self::failing_for(journal, &[])
    }

    /// Mailer that rejects the given recipients
    pub fn failing_for(journal: Journal, addresses: &[&str]) -> Self {
        Self {
            journal,
            fail_for: addresses.iter().map(|a| normalize_address(a)).collect(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for StubMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        self.journal
            .lock()
            .unwrap()
            .push(Event::Send(email.to.clone()));
        if self.fail_for.contains(&normalize_address(&email.to)) {
            anyhow::bail!("535 authentication rejected for {}", email.to);
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct StubInbox {
    pub pending: VecDeque<InboundEmail>,
    /// UIDs that fail to parse
    pub unreadable: Vec<u32>,
    pub seen: Vec<u32>,
    pub closed: usize,
    pub fail_fetch: bool,
}

impl StubInbox {
    pub fn with_messages(messages: Vec<InboundEmail>) -> Self {
        Self {
            pending: messages.into(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Inbox for StubInbox {
    async fn fetch_unseen(&mut self) -> Result<UnseenBatch> {
        if self.fail_fetch {
            anyhow::bail!("IMAP LOGIN failed: invalid credentials");
        }
        let messages = self
            .pending
            .iter()
            .filter(|email| email.uid.is_none_or(|uid| !self.seen.contains(&uid)))
            .cloned()
            .collect();
        let unreadable = self
            .unreadable
            .iter()
            .copied()
            .filter(|uid| !self.seen.contains(uid))
            .collect();
        Ok(UnseenBatch {
            messages,
            unreadable,
        })
    }

    async fn mark_seen(&mut self, uid: u32) -> Result<()> {
        self.seen.push(uid);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed += 1;
        Ok(())
    }
}

pub fn inbound(uid: u32, from: &str, subject: &str, body: &str) -> InboundEmail {
    InboundEmail {
        uid: Some(uid),
        message_id: Some(format!("<{}@mail.example.com>", uid)),
        from_addr: from.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
    }
}

pub fn writer(client: Arc<dyn CompletionClient>) -> Arc<EmailWriter> {
    Arc::new(EmailWriter::new(client, CompanyProfile::default()))
}

/// Responder wired to fresh stubs, returned alongside them for inspection
pub fn responder(
    journal: &Journal,
) -> (Arc<ReplyResponder>, Arc<StubMailer>, Arc<ConversationStore>) {
    let client = Arc::new(StubCompletion::new(journal.clone()));
    let mailer = Arc::new(StubMailer::new(journal.clone()));
    let store = Arc::new(ConversationStore::new());
    let responder = Arc::new(ReplyResponder::new(
        writer(client),
        mailer.clone(),
        store.clone(),
    ));
    (responder, mailer, store)
}

pub fn draft_events() -> Vec<Event> {
    Persona::ALL
        .iter()
        .map(|&persona| Event::Completion(Purpose::Draft(persona)))
        .collect()
}
