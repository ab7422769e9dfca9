//! Multi-row INSERT for batch sends.
//!
//! Message `i` contributes four values and the tuple `(?{4i+1}, ?{4i+2}, ?{4i+3}, ?{4i+4})`.
//! All tuples go into one `VALUES` clause, so the batch is a single statement and
//! commits or fails as a whole.

use rusqlite::types::ToSql;

use missive_types::models::NewMessage;

use crate::error::{Result, StoreError};

pub const COLUMNS_PER_MESSAGE: usize = 4;

const INSERT_PREFIX: &str = "INSERT INTO messages (sender, recipient, payload, sent_at) VALUES ";

/// Statement text plus the flat argument list that goes with it.
pub struct BatchInsert<'a> {
    groups: Vec<String>,
    args: Vec<&'a dyn ToSql>,
    placeholders: usize,
}

impl<'a> BatchInsert<'a> {
    /// Returns `None` for an empty batch; there is nothing to insert and
    /// `VALUES` with no tuples is not valid SQL.
    pub fn build(messages: &'a [NewMessage]) -> Option<Self> {
        if messages.is_empty() {
            return None;
        }

        let mut groups = Vec::with_capacity(messages.len());
        let mut args: Vec<&'a dyn ToSql> = Vec::with_capacity(messages.len() * COLUMNS_PER_MESSAGE);
        let mut placeholders = 0;

        for (i, msg) in messages.iter().enumerate() {
            let base = i * COLUMNS_PER_MESSAGE;
            let group: Vec<String> = (1..=COLUMNS_PER_MESSAGE)
                .map(|n| format!("?{}", base + n))
                .collect();
            placeholders += group.len();
            groups.push(format!("({})", group.join(", ")));

            args.push(&msg.sender);
            args.push(&msg.recipient);
            args.push(&msg.payload);
            args.push(&msg.sent_at);
        }

        Some(Self {
            groups,
            args,
            placeholders,
        })
    }

    pub fn sql(&self) -> String {
        format!("{}{}", INSERT_PREFIX, self.groups.join(", "))
    }

    pub fn args(&self) -> &[&'a dyn ToSql] {
        &self.args
    }

    pub fn placeholder_count(&self) -> usize {
        self.placeholders
    }

    pub fn message_count(&self) -> usize {
        self.groups.len()
    }

    /// Checks that placeholders and arguments both number exactly four per message.
    pub fn validate(&self) -> Result<()> {
        let expected = self.message_count() * COLUMNS_PER_MESSAGE;
        for actual in [self.placeholders, self.args.len()] {
            if actual != expected {
                return Err(StoreError::PlaceholderMismatch { expected, actual });
            }
        }
        Ok(())
    }
}
