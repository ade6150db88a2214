//! Durable key/value state on a dedicated worker thread.
//!
//! A single thread owns the SQLite connection; callers hand it closures over
//! an mpsc channel and await the result on a oneshot. This keeps rusqlite's
//! `Connection` off the async runtime and gives the crate its single-writer
//! persistence discipline for free.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, bail, Context, Result};
use log::{error, info};
use rusqlite::{params, Connection};
use tokio::sync::oneshot;

pub mod codec;

/// Key for the comma-joined processed-id set.
pub const KEY_PROCESSED: &str = "processed_ids";
/// Key for the newline-separated `id=label|label` record.
pub const KEY_LABEL_RECORD: &str = "label_record";
/// Key for the comma-joined label filter selection.
pub const KEY_LABEL_FILTER: &str = "label_filter";

const CURRENT_SCHEMA_VERSION: i32 = 1;

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Execute(StoreTask),
    Shutdown,
}

struct StateStoreInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for StateStoreInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("Failed to send shutdown to state store thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join state store thread: {join_err:?}");
            }
        }
    }
}

fn run_migrations(conn: &mut Connection) -> Result<()> {
    let mut version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")?;

    if version > CURRENT_SCHEMA_VERSION {
        bail!(
            "state database version ({}) is newer than supported schema ({})",
            version,
            CURRENT_SCHEMA_VERSION
        );
    }

    if version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;

    while version < CURRENT_SCHEMA_VERSION {
        let next_version = version + 1;
        apply_migration(&tx, next_version)
            .with_context(|| format!("migration to version {next_version} failed"))?;
        version = next_version;
    }

    tx.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)
        .context("failed to update user_version pragma")?;
    tx.commit().context("failed to commit migrations")?;

    Ok(())
}

fn apply_migration(tx: &rusqlite::Transaction<'_>, version: i32) -> Result<()> {
    match version {
        1 => {
            tx.execute_batch(
                "CREATE TABLE state (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
            .context("failed to create state table")?;
            Ok(())
        }
        other => bail!("no migration registered for version {other}"),
    }
}

/// Handle to the store worker. Cheap to clone; the worker shuts down when the
/// last handle drops.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StateStoreInner>,
    db_path: Arc<PathBuf>,
}

impl StateStore {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create state directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("mural-state".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open state database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run state migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("State store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        StoreCommand::Shutdown => break,
                    }
                }

                info!("State store thread shutting down");
            })
            .with_context(|| "failed to spawn state store worker thread")?;

        ready_rx
            .recv()
            .context("state store worker exited before signaling readiness")??;

        info!("State store initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(StateStoreInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("State store caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to state store thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("state store thread terminated unexpectedly"))?
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare("SELECT value FROM state WHERE key = ?1")?;
            let mut rows = stmt.query(params![key])?;
            match rows.next()? {
                Some(row) => Ok(Some(row.get::<_, String>(0)?)),
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO state (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .with_context(|| "failed to upsert state value")?;
            Ok(())
        })
        .await
    }

    /// Write several keys in one transaction. Classification state uses this
    /// so the processed set and the label record never diverge on disk.
    pub async fn set_many(&self, entries: Vec<(String, String)>) -> Result<()> {
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open state transaction")?;
            for (key, value) in &entries {
                tx.execute(
                    "INSERT INTO state (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, value],
                )
                .with_context(|| format!("failed to upsert state key '{key}'"))?;
            }
            tx.commit().context("failed to commit state transaction")?;
            Ok(())
        })
        .await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.execute(move |conn| {
            conn.execute("DELETE FROM state WHERE key = ?1", params![key])
                .with_context(|| "failed to delete state value")?;
            Ok(())
        })
        .await
    }
}
