use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id          TEXT PRIMARY KEY,
        username    TEXT NOT NULL UNIQUE
    );

    CREATE TABLE IF NOT EXISTS messages (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        sender      TEXT NOT NULL,
        recipient   TEXT NOT NULL,
        payload     TEXT NOT NULL,
        sent_at     TEXT NOT NULL,
        read_at     TEXT DEFAULT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_messages_recipient
        ON messages(recipient);
";

/// Creates the tables and index inside one transaction.
///
/// Every statement is `IF NOT EXISTS`, so running this against an already
/// bootstrapped database is a no-op. On failure the transaction is dropped
/// uncommitted, which rolls it back.
pub fn bootstrap(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA)?;
    tx.commit()?;

    info!("Database schema ready");
    Ok(())
}
