// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Trk Contributors

//! SQLite-backed storage for the ticket tracker.
//!
//! Each tenant namespace is its own SQLite database, ATTACHed to one
//! [`Database`] connection under a validated schema name, so every query is
//! addressed as `"<namespace>".tickets`. Attaching a namespace provisions
//! its tables, indexes, full-text index, and triggers idempotently.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::ticket::{HistoryEntry, Ticket};

/// Maximum namespace identifier length.
const NAMESPACE_MAX_CHARS: usize = 64;

/// A validated tenant namespace identifier.
///
/// Namespace names are interpolated into SQL as schema qualifiers, so they
/// are restricted to ASCII identifiers (`[A-Za-z_][A-Za-z0-9_]*`, at most 64
/// chars). Anything else is rejected before it ever reaches a query string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(name: &str) -> Result<Self> {
        let mut chars = name.chars();
        let valid_first = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_first || !valid_rest || name.len() > NAMESPACE_MAX_CHARS {
            return Err(Error::InvalidNamespace(name.to_string()));
        }
        Ok(Namespace(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Namespace::new(s)
    }
}

/// Ticket columns in the order expected by [`ticket_from_row`].
pub(crate) const TICKET_COLUMNS: &str = "id, session_id, title, description, type, status, \
     priority, assignee, tags, metadata, created_at, updated_at, closed_at, archived_at, \
     content_hash";

/// Ticket columns qualified with a table alias, for joined queries.
pub(crate) fn ticket_columns(alias: &str) -> String {
    TICKET_COLUMNS
        .split(", ")
        .map(|c| format!("{alias}.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// DDL for one namespace: tables, indexes, full-text index, and the
/// write-time triggers keeping it current. All statements are idempotent;
/// re-running on attach is the migration path.
fn namespace_schema(ns: &Namespace) -> String {
    format!(
        r#"
-- Core ticket table
CREATE TABLE IF NOT EXISTS "{ns}".tickets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT,
    title TEXT NOT NULL,
    description TEXT,
    type TEXT NOT NULL,
    status TEXT NOT NULL,
    priority TEXT NOT NULL DEFAULT 'medium',
    assignee TEXT,
    tags TEXT,
    metadata TEXT,
    created_at REAL,
    updated_at REAL,
    closed_at REAL,
    archived_at REAL,
    content_hash TEXT
);

-- Audit trail, append-only
CREATE TABLE IF NOT EXISTS "{ns}".ticket_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_id INTEGER NOT NULL,
    field_name TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    changed_by TEXT,
    changed_at REAL,
    FOREIGN KEY (ticket_id) REFERENCES tickets(id) ON DELETE CASCADE
);

-- Ticket-to-ticket edges
CREATE TABLE IF NOT EXISTS "{ns}".ticket_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id INTEGER NOT NULL,
    target_id INTEGER NOT NULL,
    link_type TEXT NOT NULL,
    created_at REAL,
    FOREIGN KEY (source_id) REFERENCES tickets(id) ON DELETE CASCADE,
    FOREIGN KEY (target_id) REFERENCES tickets(id) ON DELETE CASCADE,
    UNIQUE(source_id, target_id, link_type)
);

-- Ticket-to-context-document edges, keyed by (label, version)
CREATE TABLE IF NOT EXISTS "{ns}".ticket_context_links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ticket_id INTEGER NOT NULL,
    context_label TEXT NOT NULL,
    context_version TEXT NOT NULL DEFAULT 'latest',
    link_type TEXT NOT NULL DEFAULT 'related',
    created_at REAL,
    FOREIGN KEY (ticket_id) REFERENCES tickets(id) ON DELETE CASCADE,
    UNIQUE(ticket_id, context_label, context_version)
);

-- Indexes
CREATE INDEX IF NOT EXISTS "{ns}".idx_tickets_type ON tickets(type);
CREATE INDEX IF NOT EXISTS "{ns}".idx_tickets_status ON tickets(status);
CREATE INDEX IF NOT EXISTS "{ns}".idx_tickets_priority ON tickets(priority);
CREATE INDEX IF NOT EXISTS "{ns}".idx_tickets_assignee
    ON tickets(assignee) WHERE assignee IS NOT NULL;
CREATE INDEX IF NOT EXISTS "{ns}".idx_tickets_archived_at
    ON tickets(archived_at) WHERE archived_at IS NOT NULL;
CREATE INDEX IF NOT EXISTS "{ns}".idx_ticket_history_ticket ON ticket_history(ticket_id);
CREATE INDEX IF NOT EXISTS "{ns}".idx_ticket_links_source ON ticket_links(source_id);
CREATE INDEX IF NOT EXISTS "{ns}".idx_ticket_links_target ON ticket_links(target_id);
CREATE INDEX IF NOT EXISTS "{ns}".idx_ticket_context_links_context
    ON ticket_context_links(context_label);
CREATE INDEX IF NOT EXISTS "{ns}".idx_ticket_context_links_ticket
    ON ticket_context_links(ticket_id);

-- Full-text index over (title, description), porter-stemmed
CREATE VIRTUAL TABLE IF NOT EXISTS "{ns}".tickets_fts USING fts5(
    title, description,
    content='tickets', content_rowid='id',
    tokenize='porter unicode61'
);

CREATE TRIGGER IF NOT EXISTS "{ns}".tickets_fts_insert AFTER INSERT ON tickets BEGIN
    INSERT INTO tickets_fts(rowid, title, description)
    VALUES (new.id, new.title, coalesce(new.description, ''));
END;

CREATE TRIGGER IF NOT EXISTS "{ns}".tickets_fts_update
AFTER UPDATE OF title, description ON tickets BEGIN
    INSERT INTO tickets_fts(tickets_fts, rowid, title, description)
    VALUES ('delete', old.id, old.title, coalesce(old.description, ''));
    INSERT INTO tickets_fts(rowid, title, description)
    VALUES (new.id, new.title, coalesce(new.description, ''));
END;
"#
    )
}

/// SQLite connection with ticket tracker namespaces attached.
pub struct Database {
    /// The underlying SQLite connection.
    pub conn: Connection,
}

impl Database {
    /// Open the root database at the given path, creating directories as
    /// needed. Namespaces are attached separately via [`Database::attach`].
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(Database { conn })
    }

    /// Open an in-memory root database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Database { conn })
    }

    /// Attach a namespace stored at `path` and provision its schema.
    pub fn attach(&mut self, ns: &Namespace, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let path_str = path.to_string_lossy();
        self.conn
            .execute(&format!(r#"ATTACH DATABASE ?1 AS "{ns}""#), [path_str])?;
        self.conn
            .execute_batch(&format!(r#"PRAGMA "{ns}".journal_mode = WAL;"#))?;
        self.provision(ns)
    }

    /// Attach an in-memory namespace and provision its schema (for testing).
    pub fn attach_in_memory(&mut self, ns: &Namespace) -> Result<()> {
        self.conn
            .execute_batch(&format!(r#"ATTACH DATABASE ':memory:' AS "{ns}""#))?;
        self.provision(ns)
    }

    fn provision(&self, ns: &Namespace) -> Result<()> {
        self.conn.execute_batch(&namespace_schema(ns))?;
        Ok(())
    }
}

/// Parse a string value from the database, returning a rusqlite error on
/// parse failure.
pub(crate) fn parse_db<T: FromStr>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid value '{value}' in column '{column}'"
            ))),
        )
    })
}

/// Parse optional JSON text into a value, tolerating corrupt rows.
///
/// Tags and metadata are stored as JSON text; a row that fails to parse
/// maps to None rather than failing the whole read.
fn parse_json_opt<T: serde::de::DeserializeOwned>(value: Option<String>) -> Option<T> {
    value.and_then(|s| serde_json::from_str(&s).ok())
}

/// Map a row selected with [`TICKET_COLUMNS`] to a [`Ticket`].
///
/// History and links start empty; callers populate them separately.
pub(crate) fn ticket_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<Ticket, rusqlite::Error> {
    let type_str: String = row.get(4)?;
    let priority_str: String = row.get(6)?;
    let tags_json: Option<String> = row.get(8)?;
    let metadata_json: Option<String> = row.get(9)?;

    Ok(Ticket {
        id: row.get(0)?,
        session_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        ticket_type: parse_db(&type_str, "type")?,
        status: row.get(5)?,
        priority: parse_db(&priority_str, "priority")?,
        assignee: row.get(7)?,
        tags: parse_json_opt(tags_json),
        metadata: parse_json_opt(metadata_json),
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        closed_at: row.get(12)?,
        archived_at: row.get(13)?,
        content_hash: row.get::<_, Option<String>>(14)?.unwrap_or_default(),
        history: Vec::new(),
        links: Vec::new(),
    })
}

/// Fetch one ticket row by id, without history or links.
pub(crate) fn fetch_ticket(
    conn: &Connection,
    ns: &Namespace,
    id: i64,
) -> Result<Option<Ticket>> {
    let sql = format!(r#"SELECT {TICKET_COLUMNS} FROM "{ns}".tickets WHERE id = ?1"#);
    let ticket = conn
        .query_row(&sql, [id], ticket_from_row)
        .optional()?;
    Ok(ticket)
}

/// Fetch a ticket's history, newest first.
pub(crate) fn fetch_history(
    conn: &Connection,
    ns: &Namespace,
    ticket_id: i64,
) -> Result<Vec<HistoryEntry>> {
    let sql = format!(
        r#"SELECT id, ticket_id, field_name, old_value, new_value, changed_by, changed_at
           FROM "{ns}".ticket_history
           WHERE ticket_id = ?1
           ORDER BY changed_at DESC, id DESC"#
    );
    let mut stmt = conn.prepare(&sql)?;
    let entries = stmt
        .query_map([ticket_id], |row| {
            Ok(HistoryEntry {
                id: row.get(0)?,
                ticket_id: row.get(1)?,
                field_name: row.get(2)?,
                old_value: row.get(3)?,
                new_value: row.get(4)?,
                changed_by: row.get(5)?,
                changed_at: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Current wall-clock time as epoch seconds.
pub(crate) fn now_epoch() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
