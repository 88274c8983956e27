//! SQLite storage engine.
//!
//! Maps opaque binary keys to binary values in a single `cache` table.
//! Reads filter out expired rows; inserts fire the cleanup trigger built
//! by [`crate::schema`], so expiry and size eviction happen inside the
//! writing transaction.

mod items;

use std::fmt;
use std::io;
use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, OptionalExtension, TransactionBehavior, params};
use tracing::{debug, info, trace};

use crate::error::{KeyPreview, Result, StorageError};
use crate::options::{StorageLocation, StorageOptions};
use crate::schema::{self, NEXT_SEQ, TABLE};

pub use items::Items;

/// SQLite files that may sit next to a database file.
const SIDE_FILE_SUFFIXES: [&str; 3] = ["-journal", "-wal", "-shm"];

/// SQL text derived once from the options.
#[derive(Debug)]
struct Statements {
    select: String,
    select_items: String,
    count: String,
    insert: String,
    delete: String,
    after_get: Option<String>,
}

impl Statements {
    fn new(options: &StorageOptions) -> Self {
        let live = schema::ttl_filter(options);
        Self {
            select: format!("SELECT value FROM {TABLE} WHERE key = ?1 AND {live}"),
            select_items: format!("SELECT key, value FROM {TABLE} WHERE {live} ORDER BY ts, seq"),
            count: format!("SELECT COUNT(*) FROM {TABLE} WHERE {live}"),
            insert: format!(
                "INSERT OR REPLACE INTO {TABLE} (key, seq, value) VALUES (?1, {NEXT_SEQ}, ?2)"
            ),
            delete: format!("DELETE FROM {TABLE} WHERE key = ?1"),
            after_get: options
                .policy
                .spec()
                .after_get
                .map(|update| format!("{update} WHERE key = ?1")),
        }
    }
}

/// Cache storage backed by SQLite.
///
/// The connection is owned exclusively by this instance and guarded by a
/// mutex, so compound operations (read plus policy update, insert plus
/// cleanup) run in one transaction. After [`close`](Self::close) every
/// operation fails with [`StorageError::Closed`].
pub struct SqliteStorage {
    conn: Mutex<Option<Connection>>,
    options: StorageOptions,
    sql: Statements,
}

impl fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("filepath", &self.options.location.to_string())
            .field("maxsize", &self.options.maxsize)
            .field("ttl", &self.options.ttl)
            .field("policy", &self.options.policy)
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Initialization
// ─────────────────────────────────────────────────────────────────────────────

impl SqliteStorage {
    /// Open (or create) a store with the given options.
    ///
    /// Creates the parent directory of a file-backed store and the schema
    /// if they don't exist.
    pub fn open(options: StorageOptions) -> Result<Self> {
        if options.ttl.is_nan() || options.ttl == f64::INFINITY {
            return Err(StorageError::InvalidConfiguration(format!(
                "ttl must be a number of seconds, got {}",
                options.ttl
            )));
        }

        let mut conn = match &options.location {
            StorageLocation::Memory => Connection::open_in_memory()
                .map_err(|e| StorageError::database("open", e))?,
            StorageLocation::File(path) => open_file(path)?,
        };
        // A locked database fails the operation instead of waiting.
        conn.busy_timeout(Duration::ZERO)
            .map_err(|e| StorageError::database("open", e))?;

        schema::ensure_schema(&mut conn, &options)?;

        info!(
            filepath = %options.location,
            maxsize = options.maxsize,
            ttl = options.ttl,
            policy = %options.policy,
            "Cache storage opened"
        );

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            sql: Statements::new(&options),
            options,
        })
    }

    /// Open an in-memory store with default bounds.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(StorageOptions::default())
    }

    /// Open a file-backed store with default bounds.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(StorageOptions::default().with_path(path))
    }

    /// Options this store was opened with.
    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    /// Backing file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.options.location.path()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.conn.lock().is_none()
    }

    /// Run `f` with the open connection.
    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StorageError::Closed)?;
        f(conn)
    }
}

fn open_file(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Io {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }

    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
    )
    .map_err(|e| StorageError::database("open", e))
}

// ─────────────────────────────────────────────────────────────────────────────
// Record Operations
// ─────────────────────────────────────────────────────────────────────────────

impl SqliteStorage {
    /// Insert or replace a record.
    ///
    /// The cleanup trigger runs in the same transaction; if it fails the
    /// insert is rolled back and the error returned.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Deferred)
                .map_err(|e| StorageError::database_for_key("set", key, e))?;
            tx.prepare_cached(&self.sql.insert)
                .and_then(|mut stmt| stmt.execute(params![key, value]))
                .map_err(|e| StorageError::database_for_key("set", key, e))?;
            tx.commit()
                .map_err(|e| StorageError::database_for_key("set", key, e))?;
            trace!(key_len = key.len(), value_len = value.len(), "Stored record");
            Ok(())
        })
    }

    /// Look up a live record.
    ///
    /// On a hit the policy's on-read update runs in the same transaction;
    /// a miss leaves every counter untouched.
    pub fn get_opt(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Deferred)
                .map_err(|e| StorageError::database_for_key("get", key, e))?;

            let value: Option<Vec<u8>> = tx
                .prepare_cached(&self.sql.select)
                .and_then(|mut stmt| stmt.query_row(params![key], |row| row.get(0)).optional())
                .map_err(|e| StorageError::database_for_key("get", key, e))?;

            if value.is_some() {
                if let Some(after_get) = &self.sql.after_get {
                    tx.prepare_cached(after_get)
                        .and_then(|mut stmt| stmt.execute(params![key]))
                        .map_err(|e| StorageError::database_for_key("get", key, e))?;
                }
            }

            tx.commit()
                .map_err(|e| StorageError::database_for_key("get", key, e))?;
            trace!(key_len = key.len(), hit = value.is_some(), "Looked up record");
            Ok(value)
        })
    }

    /// Look up a live record, failing with [`StorageError::NotFound`] on a miss.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.get_opt(key)?
            .ok_or_else(|| StorageError::NotFound(KeyPreview::new(key)))
    }

    /// Look up a live record, returning `default` unchanged on a miss.
    pub fn get_or(&self, key: &[u8], default: Vec<u8>) -> Result<Vec<u8>> {
        Ok(self.get_opt(key)?.unwrap_or(default))
    }

    /// Whether a live record exists. Counts as a read for the policy.
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get_opt(key)?.is_some())
    }

    /// Delete a record.
    ///
    /// Fails with [`StorageError::NotFound`] if there was no row for `key`.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.with_conn(|conn| {
            let rows_affected = conn
                .prepare_cached(&self.sql.delete)
                .and_then(|mut stmt| stmt.execute(params![key]))
                .map_err(|e| StorageError::database_for_key("delete", key, e))?;

            if rows_affected == 0 {
                return Err(StorageError::NotFound(KeyPreview::new(key)));
            }

            debug!(key_len = key.len(), "Deleted record");
            Ok(())
        })
    }

    /// Live records ordered by insertion time, oldest first.
    ///
    /// Does not run the policy's on-read update.
    pub fn items(&self) -> Result<Items> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare_cached(&self.sql.select_items)
                .map_err(|e| StorageError::database("items", e))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(|e| StorageError::database("items", e))?;
            Ok(Items::new(rows))
        })
    }

    /// Number of live records.
    pub fn len(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row(&self.sql.count, [], |row| row.get(0))
                .map_err(|e| StorageError::database("count", e))?;
            Ok(count as usize)
        })
    }

    /// Whether there are no live records.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

impl SqliteStorage {
    /// Drop every record and reclaim the space, then recreate the schema.
    pub fn clear(&self) -> Result<()> {
        self.with_conn(|conn| {
            schema::drop_schema(conn)?;
            conn.execute_batch("VACUUM")
                .map_err(|e| StorageError::database("vacuum", e))?;
            schema::ensure_schema(conn, &self.options)?;
            info!(filepath = %self.options.location, "Cache cleared");
            Ok(())
        })
    }

    /// Release the connection. Calling this more than once is a no-op.
    pub fn close(&self) -> Result<()> {
        let conn = self.conn.lock().take();
        if let Some(conn) = conn {
            conn.close()
                .map_err(|(_, e)| StorageError::database("close", e))?;
            debug!(filepath = %self.options.location, "Cache storage closed");
        }
        Ok(())
    }

    /// Close the store and delete its database file.
    ///
    /// In-memory stores are only closed.
    pub fn remove(&self) -> Result<()> {
        self.close()?;

        let Some(path) = self.path() else {
            return Ok(());
        };

        remove_if_exists(path)?;
        for suffix in SIDE_FILE_SUFFIXES {
            let mut side = path.as_os_str().to_owned();
            side.push(suffix);
            remove_if_exists(Path::new(&side))?;
        }

        info!(filepath = %path.display(), "Cache storage removed");
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::Io {
            path: path.display().to_string(),
            source: e,
        }),
    }
}
