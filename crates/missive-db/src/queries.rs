use chrono::Utc;
use rusqlite::Connection;
use tracing::debug;

use missive_types::models::{Message, MessageHeader, NewMessage};

use crate::batch::BatchInsert;
use crate::context::Context;
use crate::error::{NotFoundExt, Result, StoreError};
use crate::{Store, schema};

impl Store {
    /// Creates the schema if it is missing. Safe to call on every startup.
    pub async fn bootstrap(&self, ctx: &Context) -> Result<()> {
        self.run(ctx, "bootstrap", schema::bootstrap).await
    }

    // -- Users --

    /// Inserts a user. Duplicate id or username yields [`StoreError::Conflict`].
    pub async fn register_user(&self, ctx: &Context, user_id: &str, username: &str) -> Result<()> {
        let classify = self.classify;
        let user_id = user_id.to_string();
        let username = username.to_string();
        self.run(ctx, "register_user", move |conn| {
            match conn.execute(
                "INSERT INTO users (id, username) VALUES (?1, ?2)",
                (&user_id, &username),
            ) {
                Ok(_) => {
                    debug!("Registered user {} as {}", user_id, username);
                    Ok(())
                }
                Err(e) if classify(&e) => Err(StoreError::Conflict),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    pub async fn find_recipient(&self, ctx: &Context, username: &str) -> Result<String> {
        let username = username.to_string();
        self.run(ctx, "find_recipient", move |conn| {
            conn.query_row("SELECT id FROM users WHERE username = ?1", [&username], |row| {
                row.get(0)
            })
            .or_not_found()
        })
        .await
    }

    // -- Messages --

    /// Headers of every message addressed to `user_id`, in storage order.
    /// No messages is an empty list, not an error.
    pub async fn list_messages(&self, ctx: &Context, user_id: &str) -> Result<Vec<MessageHeader>> {
        let user_id = user_id.to_string();
        self.run(ctx, "list_messages", move |conn| query_headers(conn, &user_id))
            .await
    }

    pub async fn get_message(&self, ctx: &Context, id: i64) -> Result<Message> {
        self.run(ctx, "get_message", move |conn| {
            conn.query_row(
                "SELECT m.id, u.username, m.payload, m.sent_at
                 FROM messages m
                 JOIN users u ON m.sender = u.id
                 WHERE m.id = ?1",
                [id],
                |row| {
                    Ok(Message {
                        id: row.get(0)?,
                        sender: row.get(1)?,
                        payload: row.get(2)?,
                        sent_at: row.get(3)?,
                    })
                },
            )
            .or_not_found()
        })
        .await
    }

    /// Stores one message for `recipient_id`. The message's own `recipient`
    /// and `sent_at` are ignored; the timestamp is the server clock at insert time.
    pub async fn save_message(&self, ctx: &Context, recipient_id: &str, msg: &NewMessage) -> Result<()> {
        let recipient_id = recipient_id.to_string();
        let sender = msg.sender.clone();
        let payload = msg.payload.clone();
        self.run(ctx, "save_message", move |conn| {
            conn.execute(
                "INSERT INTO messages (sender, recipient, payload, sent_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![sender, recipient_id, payload, Utc::now()],
            )?;
            Ok(())
        })
        .await
    }

    /// Stores every message in one statement, keeping each message's own
    /// recipient and timestamp. All rows land or none do.
    pub async fn save_messages(&self, ctx: &Context, messages: Vec<NewMessage>) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }

        self.run(ctx, "save_messages", move |conn| {
            let Some(batch) = BatchInsert::build(&messages) else {
                return Ok(());
            };
            batch.validate()?;

            let mut stmt = conn.prepare(&batch.sql())?;
            let expected = batch.placeholder_count();
            if stmt.parameter_count() != expected {
                return Err(StoreError::PlaceholderMismatch {
                    expected,
                    actual: stmt.parameter_count(),
                });
            }
            stmt.execute(batch.args())?;

            debug!("Stored batch of {} messages", batch.message_count());
            Ok(())
        })
        .await
    }
}

fn query_headers(conn: &Connection, user_id: &str) -> Result<Vec<MessageHeader>> {
    // JOIN users so the header carries the sender's username, not their id
    let mut stmt = conn.prepare(
        "SELECT m.id, u.username, m.sent_at
         FROM messages m
         JOIN users u ON m.sender = u.id
         WHERE m.recipient = ?1",
    )?;

    let rows = stmt
        .query_map([user_id], |row| {
            Ok(MessageHeader {
                id: row.get(0)?,
                sender: row.get(1)?,
                sent_at: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::path::Path;

    async fn store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store.bootstrap(&Context::background()).await.unwrap();
        store
    }

    async fn with_users(store: &Store, users: &[(&str, &str)]) {
        let ctx = Context::background();
        for (id, name) in users {
            store.register_user(&ctx, id, name).await.unwrap();
        }
    }

    fn outgoing(sender: &str, recipient: &str, payload: &str, secs: i64) -> NewMessage {
        NewMessage {
            sender: sender.into(),
            recipient: recipient.into(),
            payload: payload.into(),
            sent_at: Utc.timestamp_opt(secs, 0).unwrap(),
        }
    }

    fn sorted_ids(headers: &[MessageHeader]) -> Vec<i64> {
        let mut ids: Vec<i64> = headers.iter().map(|h| h.id).collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn bootstrap_twice_succeeds() {
        let store = store().await;
        store.bootstrap(&Context::background()).await.unwrap();
    }

    #[tokio::test]
    async fn registered_user_resolves() {
        let store = store().await;
        with_users(&store, &[("u1", "alice"), ("u2", "bob")]).await;

        let ctx = Context::background();
        assert_eq!(store.find_recipient(&ctx, "alice").await.unwrap(), "u1");
        assert_eq!(store.find_recipient(&ctx, "bob").await.unwrap(), "u2");
    }

    #[tokio::test]
    async fn unknown_username_is_not_found() {
        let store = store().await;
        let err = store
            .find_recipient(&Context::background(), "nobody")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn registering_twice_conflicts() {
        let store = store().await;
        let ctx = Context::background();
        store.register_user(&ctx, "u1", "alice").await.unwrap();

        let err = store.register_user(&ctx, "u1", "alice").await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn duplicate_id_or_username_conflicts_without_new_rows() {
        let store = store().await;
        let ctx = Context::background();
        store.register_user(&ctx, "u1", "alice").await.unwrap();

        assert!(store.register_user(&ctx, "u1", "carol").await.unwrap_err().is_conflict());
        assert!(store.register_user(&ctx, "u9", "alice").await.unwrap_err().is_conflict());

        assert_eq!(store.find_recipient(&ctx, "alice").await.unwrap(), "u1");
        assert!(store.find_recipient(&ctx, "carol").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn concurrent_registration_has_one_winner() {
        let store = store().await;
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .register_user(&Context::background(), &format!("u{}", i), "alice")
                    .await
            }));
        }

        let mut ok = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => ok += 1,
                Err(e) if e.is_conflict() => conflicts += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!((ok, conflicts), (1, 7));
    }

    #[tokio::test]
    async fn custom_classifier_controls_conflict_mapping() {
        fn never(_: &rusqlite::Error) -> bool {
            false
        }
        let store = store().await.with_classifier(never);
        let ctx = Context::background();
        store.register_user(&ctx, "u1", "alice").await.unwrap();

        let err = store.register_user(&ctx, "u1", "alice").await.unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }

    #[tokio::test]
    async fn send_then_list_and_get() {
        let store = store().await;
        with_users(&store, &[("u1", "alice"), ("u2", "bob")]).await;
        let ctx = Context::background();

        let before = Utc::now();
        store
            .save_message(&ctx, "u1", &NewMessage::now("u2", "ignored", "hi"))
            .await
            .unwrap();

        let headers = store.list_messages(&ctx, "u1").await.unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].sender, "bob");

        let msg = store.get_message(&ctx, headers[0].id).await.unwrap();
        assert_eq!(msg.payload, "hi");
        assert_eq!(msg.sender, "bob");
        assert_eq!(msg.header(), headers[0]);
        assert!(msg.sent_at >= before);
    }

    #[tokio::test]
    async fn single_send_uses_server_clock() {
        let store = store().await;
        with_users(&store, &[("u1", "alice"), ("u2", "bob")]).await;
        let ctx = Context::background();

        let stale = outgoing("u2", "u1", "old", 1_000);
        store.save_message(&ctx, "u1", &stale).await.unwrap();

        let headers = store.list_messages(&ctx, "u1").await.unwrap();
        assert_ne!(headers[0].sent_at, stale.sent_at);
    }

    #[tokio::test]
    async fn list_is_scoped_to_recipient() {
        let store = store().await;
        with_users(&store, &[("u1", "alice"), ("u2", "bob")]).await;
        let ctx = Context::background();

        store.save_message(&ctx, "u1", &NewMessage::now("u2", "", "to alice")).await.unwrap();
        store.save_message(&ctx, "u2", &NewMessage::now("u1", "", "to bob")).await.unwrap();

        let alice = store.list_messages(&ctx, "u1").await.unwrap();
        let bob = store.list_messages(&ctx, "u2").await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(bob.len(), 1);
        assert_eq!(alice[0].sender, "bob");
        assert_eq!(bob[0].sender, "alice");
    }

    #[tokio::test]
    async fn empty_inbox_is_empty_list() {
        let store = store().await;
        with_users(&store, &[("u1", "alice")]).await;
        let headers = store.list_messages(&Context::background(), "u1").await.unwrap();
        assert!(headers.is_empty());
    }

    #[tokio::test]
    async fn missing_message_is_not_found() {
        let store = store().await;
        let err = store.get_message(&Context::background(), 42).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn batch_keeps_caller_timestamps_and_recipients() {
        let store = store().await;
        with_users(&store, &[("u1", "alice"), ("u2", "bob"), ("u3", "carol")]).await;
        let ctx = Context::background();

        store
            .save_messages(
                &ctx,
                vec![
                    outgoing("u2", "u1", "one", 1_700_000_000),
                    outgoing("u3", "u1", "two", 1_700_000_060),
                    outgoing("u1", "u2", "three", 1_700_000_120),
                ],
            )
            .await
            .unwrap();

        let mut alice = store.list_messages(&ctx, "u1").await.unwrap();
        alice.sort_by_key(|h| h.id);
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].sender, "bob");
        assert_eq!(alice[0].sent_at, Utc.timestamp_opt(1_700_000_000, 0).unwrap());
        assert_eq!(alice[1].sender, "carol");

        let bob = store.list_messages(&ctx, "u2").await.unwrap();
        assert_eq!(bob.len(), 1);
        let msg = store.get_message(&ctx, bob[0].id).await.unwrap();
        assert_eq!(msg.payload, "three");
        assert_eq!(msg.sent_at, Utc.timestamp_opt(1_700_000_120, 0).unwrap());
    }

    #[tokio::test]
    async fn empty_batch_stores_nothing() {
        let store = store().await;
        with_users(&store, &[("u1", "alice")]).await;
        let ctx = Context::background();

        store.save_messages(&ctx, Vec::new()).await.unwrap();
        assert!(store.list_messages(&ctx, "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_batch_succeeds_even_when_cancelled() {
        let store = store().await;
        let ctx = Context::background();
        ctx.cancel();
        store.save_messages(&ctx, Vec::new()).await.unwrap();
    }

    #[tokio::test]
    async fn large_batch_lands_in_one_statement() {
        let store = store().await;
        with_users(&store, &[("u1", "alice"), ("u2", "bob")]).await;
        let ctx = Context::background();

        let batch: Vec<NewMessage> = (0..250)
            .map(|i| outgoing("u2", "u1", &format!("m{}", i), 1_700_000_000 + i))
            .collect();
        store.save_messages(&ctx, batch).await.unwrap();

        let headers = store.list_messages(&ctx, "u1").await.unwrap();
        assert_eq!(headers.len(), 250);
        let ids = sorted_ids(&headers);
        assert_eq!(ids, (ids[0]..ids[0] + 250).collect::<Vec<_>>());
    }

    /// Opens a second raw connection to the same file to install a trigger
    /// that rejects one payload.
    fn reject_payload(path: &Path, payload: &str) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(&format!(
            "CREATE TRIGGER reject_bad BEFORE INSERT ON messages
             WHEN NEW.payload = '{}'
             BEGIN SELECT RAISE(ABORT, 'rejected payload'); END;",
            payload
        ))
        .unwrap();
    }

    #[tokio::test]
    async fn failing_row_aborts_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missive.db");
        let store = Store::open(&path).unwrap();
        let ctx = Context::background();
        store.bootstrap(&ctx).await.unwrap();
        with_users(&store, &[("u1", "alice"), ("u2", "bob")]).await;
        reject_payload(&path, "poison");

        let err = store
            .save_messages(
                &ctx,
                vec![
                    outgoing("u2", "u1", "fine", 1_700_000_000),
                    outgoing("u2", "u1", "poison", 1_700_000_001),
                    outgoing("u2", "u1", "also fine", 1_700_000_002),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));

        assert!(store.list_messages(&ctx, "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn messages_from_unknown_senders_stay_hidden() {
        let store = store().await;
        with_users(&store, &[("u1", "alice")]).await;
        let ctx = Context::background();

        store
            .save_message(&ctx, "u1", &NewMessage::now("ghost", "", "boo"))
            .await
            .unwrap();

        assert!(store.list_messages(&ctx, "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_context_rejects_every_operation() {
        let store = store().await;
        let ctx = Context::background();
        ctx.cancel();

        assert!(matches!(store.bootstrap(&ctx).await, Err(StoreError::Cancelled)));
        assert!(matches!(store.register_user(&ctx, "u1", "a").await, Err(StoreError::Cancelled)));
        assert!(matches!(store.find_recipient(&ctx, "a").await, Err(StoreError::Cancelled)));
        assert!(matches!(store.list_messages(&ctx, "u1").await, Err(StoreError::Cancelled)));
        assert!(matches!(store.get_message(&ctx, 1).await, Err(StoreError::Cancelled)));
        assert!(matches!(
            store.save_message(&ctx, "u1", &NewMessage::now("u2", "", "x")).await,
            Err(StoreError::Cancelled)
        ));
        assert!(matches!(
            store.save_messages(&ctx, vec![NewMessage::now("u2", "u1", "x")]).await,
            Err(StoreError::Cancelled)
        ));
    }
}
