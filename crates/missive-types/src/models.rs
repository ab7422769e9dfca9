use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account. The id is supplied by the caller, never generated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

/// A message on its way into the store.
///
/// `sender` and `recipient` are user ids. Single sends override `recipient`
/// and `sent_at`; batch sends store every field as given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender: String,
    pub recipient: String,
    pub payload: String,
    pub sent_at: DateTime<Utc>,
}

impl NewMessage {
    /// Message stamped with the current time, for callers that don't track their own clock.
    pub fn now(sender: impl Into<String>, recipient: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            payload: payload.into(),
            sent_at: Utc::now(),
        }
    }
}

/// Listing entry: everything about a message except its body.
/// `sender` is the sender's username, not their id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub id: i64,
    pub sender: String,
    pub sent_at: DateTime<Utc>,
}

/// A stored message with its body. `sender` is the sender's username.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub sender: String,
    pub payload: String,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn header(&self) -> MessageHeader {
        MessageHeader {
            id: self.id,
            sender: self.sender.clone(),
            sent_at: self.sent_at,
        }
    }
}
