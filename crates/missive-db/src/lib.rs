pub mod batch;
pub mod context;
pub mod error;
pub mod queries;
pub mod schema;

pub use rusqlite;

pub use context::Context;
pub use error::{IntegrityClassifier, Result, StoreError, is_integrity_violation};

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};

/// SQLite VM instructions between abort checks while a statement runs.
const PROGRESS_OPS: i32 = 1000;

/// Message store over a single SQLite connection.
///
/// Clones share the connection; calls from concurrent tasks run one at a time
/// on the blocking pool. Uniqueness and atomicity come from SQLite itself.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
    classify: IntegrityClassifier,
}

impl Store {
    /// Wraps a live connection owned by the caller's startup sequence.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            classify: is_integrity_violation,
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        info!("Database opened at {}", path.display());
        Ok(Self::new(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    pub fn with_classifier(mut self, classify: IntegrityClassifier) -> Self {
        self.classify = classify;
        self
    }

    /// Runs `f` against the connection on the blocking pool, bounded by `ctx`.
    ///
    /// If `ctx` ends while the job is still queued for the connection, the call
    /// returns at once and the job bails out without touching the database once
    /// it gets the lock. If the job is already running, SQLite is told to abort
    /// the statement and the job is awaited so its statements and transactions
    /// are dropped before returning. A job that finished anyway keeps its result.
    pub(crate) async fn run<T, F>(&self, ctx: &Context, op: &'static str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        if let Some(reason) = ctx.err() {
            debug!(op, "context already ended: {}", reason);
            return Err(reason);
        }

        let abort = Arc::new(AtomicBool::new(false));
        let started = Arc::new(AtomicBool::new(false));
        let conn = self.conn.clone();
        let flag = abort.clone();
        let locked = started.clone();
        let mut task = tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            // SeqCst pairs with the cancel path: either it sees `started` and
            // waits, or this load sees `abort` and the job exits untouched.
            locked.store(true, Ordering::SeqCst);
            if flag.load(Ordering::SeqCst) {
                return Err(StoreError::Cancelled);
            }

            let polled = flag.clone();
            conn.progress_handler(PROGRESS_OPS, Some(move || polled.load(Ordering::Acquire)));
            let result = f(&mut *conn);
            conn.progress_handler(0, None::<fn() -> bool>);

            match result {
                Err(StoreError::Database(e)) if flag.load(Ordering::Acquire) && error::is_interrupt(&e) => {
                    Err(StoreError::Cancelled)
                }
                other => other,
            }
        });

        tokio::select! {
            joined = &mut task => joined?,
            reason = ctx.done() => {
                abort.store(true, Ordering::SeqCst);
                if !started.load(Ordering::SeqCst) {
                    debug!(op, "abandoned while queued: {}", reason);
                    return Err(reason);
                }
                match task.await {
                    Ok(Err(StoreError::Cancelled)) => {
                        debug!(op, "aborted: {}", reason);
                        Err(reason)
                    }
                    Ok(other) => other,
                    Err(join) => Err(join.into()),
                }
            }
        }
    }
}
