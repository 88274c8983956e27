//! Cache table schema.
//!
//! The schema is derived from [`StorageOptions`]: base columns, policy
//! columns and indexes, and a cleanup trigger that enforces TTL and
//! `maxsize` after every insert. Creation is idempotent: objects that
//! already exist, the trigger included, are left as they are.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::options::StorageOptions;

/// SQL expression for the current time in unix seconds.
pub const SQL_NOW: &str = "(julianday('now') - 2440587.5) * 86400.0";

/// Name of the cache table.
pub const TABLE: &str = "cache";

/// Name of the post-insert cleanup trigger.
pub const CLEANUP_TRIGGER: &str = "t_cache_cleanup";

/// Insertion counter breaking ties between rows stamped in the same
/// millisecond.
pub const SEQ_COLUMN: &str = "seq INTEGER NOT NULL DEFAULT 0";

/// Expression giving the next insertion counter value.
pub const NEXT_SEQ: &str = "(SELECT coalesce(max(seq), 0) + 1 FROM cache)";

/// Predicate keeping only live rows for the given TTL.
pub fn ttl_filter(options: &StorageOptions) -> String {
    if options.expires() {
        format!("({SQL_NOW} - ts) <= {}", options.ttl)
    } else {
        "1 = 1".to_string()
    }
}

/// `CREATE TABLE` statement for the options' policy.
pub fn create_table_sql(options: &StorageOptions) -> String {
    let extra: String = options
        .policy
        .spec()
        .columns
        .iter()
        .map(|c| format!("{c},\n                "))
        .collect();
    format!(
        r#"
            CREATE TABLE IF NOT EXISTS {TABLE} (
                key BINARY PRIMARY KEY,
                ts REAL NOT NULL DEFAULT ({SQL_NOW}),
                {SEQ_COLUMN},
                {extra}value BLOB NOT NULL
            ) WITHOUT ROWID
            "#
    )
}

/// Body of the cleanup trigger, or `None` when neither bound is set.
pub fn cleanup_actions(options: &StorageOptions) -> Option<String> {
    let mut actions = Vec::new();

    if options.expires() {
        actions.push(format!(
            "DELETE FROM {TABLE} WHERE ({SQL_NOW} - ts) > {};",
            options.ttl
        ));
    }
    if options.bounded() {
        actions.push(format!(
            r#"DELETE FROM {TABLE} WHERE key IN (
                    SELECT key FROM {TABLE}
                    ORDER BY {}
                    LIMIT max(0, (SELECT COUNT(key) FROM {TABLE}) - {})
                );"#,
            options.policy.spec().delete_order,
            options.maxsize
        ));
    }

    if actions.is_empty() {
        None
    } else {
        Some(actions.join("\n                "))
    }
}

/// Create the table, indexes and cleanup trigger if they are missing.
///
/// An existing trigger is kept, so the bounds of whoever created the
/// database stay in force for every handle on it.
pub fn ensure_schema(conn: &mut Connection, options: &StorageOptions) -> Result<()> {
    let tx = conn
        .transaction()
        .map_err(|e| StorageError::database("begin schema", e))?;

    tx.execute_batch(&create_table_sql(options))
        .map_err(|e| StorageError::database("create table", e))?;

    migrate_columns(&tx, options)?;

    tx.execute_batch(&format!(
        "CREATE INDEX IF NOT EXISTS i_cache_ts ON {TABLE} (ts, seq);"
    ))
    .map_err(|e| StorageError::database("create index", e))?;
    for (i, columns) in options.policy.spec().indexes.iter().enumerate() {
        tx.execute_batch(&format!(
            "CREATE INDEX IF NOT EXISTS i_cache_{i} ON {TABLE} ({columns});"
        ))
        .map_err(|e| StorageError::database("create index", e))?;
    }

    if let Some(actions) = cleanup_actions(options) {
        tx.execute_batch(&format!(
            r#"
            CREATE TRIGGER IF NOT EXISTS {CLEANUP_TRIGGER}
            AFTER INSERT ON {TABLE} FOR EACH ROW BEGIN
                {actions}
            END;
            "#
        ))
        .map_err(|e| StorageError::database("create trigger", e))?;
    }

    tx.commit()
        .map_err(|e| StorageError::database("commit schema", e))?;
    debug!(
        ttl = options.ttl,
        maxsize = options.maxsize,
        policy = %options.policy,
        "Cache schema ready"
    );
    Ok(())
}

/// Add columns missing from a table created by an older layout or under a
/// policy that doesn't track usage.
fn migrate_columns(conn: &Connection, options: &StorageOptions) -> Result<()> {
    let wanted = std::iter::once(SEQ_COLUMN).chain(options.policy.spec().columns.iter().copied());

    for definition in wanted {
        let name = definition.split_whitespace().next().unwrap_or(definition);
        if conn
            .prepare(&format!("SELECT {name} FROM {TABLE} LIMIT 0"))
            .is_ok()
        {
            continue;
        }

        info!(column = name, policy = %options.policy, "Adding column to existing cache table");
        conn.execute_batch(&format!("ALTER TABLE {TABLE} ADD COLUMN {definition};"))
            .map_err(|e| StorageError::database("migrate schema", e))?;
    }
    Ok(())
}

/// Drop the table together with its indexes and trigger.
pub fn drop_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {TABLE};"))
        .map_err(|e| StorageError::database("drop table", e))
}
