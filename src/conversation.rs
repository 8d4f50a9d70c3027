//! In-memory, append-only conversation history per prospect
//!
//! The store is shared between the campaign driver, the poll loop and the
//! webhook handler. Every access takes the internal lock for the duration of
//! a single read or append and never across an await point.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Outbound,
    Inbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Outbound => f.write_str("outbound"),
            Direction::Inbound => f.write_str("inbound"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// The prospect's address, normalised
    pub address: String,
    pub direction: Direction,
    pub subject: Option<String>,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl MessageRecord {
    pub fn outbound(address: &str, subject: &str, body: &str) -> Self {
        Self::new(address, Direction::Outbound, Some(subject), body)
    }

    pub fn inbound(address: &str, subject: Option<&str>, body: &str) -> Self {
        Self::new(address, Direction::Inbound, subject, body)
    }

    fn new(address: &str, direction: Direction, subject: Option<&str>, body: &str) -> Self {
        Self {
            address: normalize_address(address),
            direction,
            subject: subject.map(str::to_string).filter(|s| !s.is_empty()),
            body: body.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Reduce `"Jane <Jane@Example.com>"` and friends to `jane@example.com`
pub fn normalize_address(raw: &str) -> String {
    let raw = raw.trim();
    let bare = match (raw.rfind('<'), raw.rfind('>')) {
        (Some(start), Some(end)) if start < end => &raw[start + 1..end],
        _ => raw,
    };
    bare.trim().to_lowercase()
}

#[derive(Debug, Default)]
pub struct ConversationStore {
    conversations: Mutex<HashMap<String, Vec<MessageRecord>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<MessageRecord>>> {
        // Records are only ever pushed, so a poisoned map is still consistent
        self.conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a record to its conversation and return the new length
    pub fn append(&self, record: MessageRecord) -> usize {
        let mut conversations = self.lock();
        let history = conversations.entry(record.address.clone()).or_default();
        history.push(record);
        history.len()
    }

    /// Snapshot of one conversation, oldest first
    pub fn history(&self, address: &str) -> Vec<MessageRecord> {
        self.lock()
            .get(&normalize_address(address))
            .cloned()
            .unwrap_or_default()
    }

    /// Subject of the most recent message in a conversation that had one
    pub fn last_subject(&self, address: &str) -> Option<String> {
        self.lock()
            .get(&normalize_address(address))?
            .iter()
            .rev()
            .find_map(|record| record.subject.clone())
    }

    pub fn conversation_count(&self) -> usize {
        self.lock().len()
    }

    /// Total records across all conversations
    pub fn record_count(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }
}
