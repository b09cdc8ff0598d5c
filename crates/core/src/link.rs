// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Trk Contributors

//! Ticket-to-ticket and ticket-to-context links.
//!
//! Ticket links are directed edges but always read bidirectionally: a
//! ticket's links include edges where it is source or target, each
//! enriched with the other side's title and status. Context links point
//! from a ticket to an external context document keyed by (label, version).

use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::{now_epoch, Database, Namespace};
use crate::error::{Error, Result};

/// Context links without an explicit version refer to this one.
pub const DEFAULT_CONTEXT_VERSION: &str = "latest";

/// Relationship kinds between two tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Blocks,
    Parent,
    #[default]
    Related,
    Duplicate,
    Implements,
    References,
    Updates,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Blocks => "blocks",
            LinkType::Parent => "parent",
            LinkType::Related => "related",
            LinkType::Duplicate => "duplicate",
            LinkType::Implements => "implements",
            LinkType::References => "references",
            LinkType::Updates => "updates",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LinkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "blocks" => Ok(LinkType::Blocks),
            "parent" => Ok(LinkType::Parent),
            "related" => Ok(LinkType::Related),
            "duplicate" => Ok(LinkType::Duplicate),
            "implements" => Ok(LinkType::Implements),
            "references" => Ok(LinkType::References),
            "updates" => Ok(LinkType::Updates),
            _ => Err(Error::InvalidLinkType(s.to_string())),
        }
    }
}

/// Relationship kinds between a ticket and a context document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextLinkType {
    Implements,
    References,
    Updates,
    #[default]
    Related,
}

impl ContextLinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextLinkType::Implements => "implements",
            ContextLinkType::References => "references",
            ContextLinkType::Updates => "updates",
            ContextLinkType::Related => "related",
        }
    }

    /// Parse a link type, falling back to `related` for unknown values.
    pub fn parse_lenient(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "implements" => ContextLinkType::Implements,
            "references" => ContextLinkType::References,
            "updates" => ContextLinkType::Updates,
            _ => ContextLinkType::Related,
        }
    }
}

impl fmt::Display for ContextLinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed edge between two tickets.
///
/// `target_title`/`target_status` describe the other side of the edge from
/// the perspective of whichever ticket the link was fetched for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketLink {
    pub id: i64,
    pub source_id: i64,
    pub target_id: i64,
    pub link_type: LinkType,
    pub created_at: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_status: Option<String>,
}

/// A directed edge from a ticket to a context document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextLink {
    pub id: i64,
    pub ticket_id: i64,
    pub context_label: String,
    pub context_version: String,
    pub link_type: ContextLinkType,
    pub created_at: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_status: Option<String>,
}

fn ticket_exists(conn: &rusqlite::Connection, ns: &Namespace, id: i64) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            &format!(r#"SELECT id FROM "{ns}".tickets WHERE id = ?1"#),
            [id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn ticket_display(
    conn: &rusqlite::Connection,
    ns: &Namespace,
    id: i64,
) -> Result<Option<(String, String)>> {
    let row = conn
        .query_row(
            &format!(r#"SELECT title, status FROM "{ns}".tickets WHERE id = ?1"#),
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    Ok(row)
}

/// Link two tickets. The response carries the target's title and status.
pub fn add_link(
    db: &mut Database,
    ns: &Namespace,
    source_id: i64,
    target_id: i64,
    link_type: LinkType,
) -> Result<TicketLink> {
    let tx = db.conn.transaction()?;
    if !ticket_exists(&tx, ns, source_id)? {
        return Err(Error::TicketNotFound(source_id));
    }
    if !ticket_exists(&tx, ns, target_id)? {
        return Err(Error::TicketNotFound(target_id));
    }

    let now = now_epoch();
    tx.execute(
        &format!(
            r#"INSERT INTO "{ns}".ticket_links (source_id, target_id, link_type, created_at)
               VALUES (?1, ?2, ?3, ?4)"#
        ),
        rusqlite::params![source_id, target_id, link_type.as_str(), now],
    )?;
    let id = tx.last_insert_rowid();
    let display = ticket_display(&tx, ns, target_id)?;
    tx.commit()?;

    let (target_title, target_status) = match display {
        Some((title, status)) => (Some(title), Some(status)),
        None => (None, None),
    };
    Ok(TicketLink {
        id,
        source_id,
        target_id,
        link_type,
        created_at: now,
        target_title,
        target_status,
    })
}

/// Delete a ticket link by id. Returns whether a row was removed.
pub fn remove_link(db: &mut Database, ns: &Namespace, link_id: i64) -> Result<bool> {
    let affected = db.conn.execute(
        &format!(r#"DELETE FROM "{ns}".ticket_links WHERE id = ?1"#),
        [link_id],
    )?;
    Ok(affected > 0)
}

/// All links touching a ticket, in either direction.
///
/// Each row is joined with the other side's title and status, so callers
/// always see the peer ticket's display info.
pub fn links_for_ticket(db: &Database, ns: &Namespace, ticket_id: i64) -> Result<Vec<TicketLink>> {
    let sql = format!(
        r#"SELECT tl.id, tl.source_id, tl.target_id, tl.link_type, tl.created_at,
                  t.title, t.status
           FROM "{ns}".ticket_links tl
           JOIN "{ns}".tickets t ON t.id = tl.target_id
           WHERE tl.source_id = ?1
           UNION ALL
           SELECT tl.id, tl.source_id, tl.target_id, tl.link_type, tl.created_at,
                  t.title, t.status
           FROM "{ns}".ticket_links tl
           JOIN "{ns}".tickets t ON t.id = tl.source_id
           WHERE tl.target_id = ?1"#
    );
    let mut stmt = db.conn.prepare(&sql)?;
    let links = stmt
        .query_map([ticket_id], |row| {
            let type_str: String = row.get(3)?;
            Ok(TicketLink {
                id: row.get(0)?,
                source_id: row.get(1)?,
                target_id: row.get(2)?,
                link_type: crate::db::parse_db(&type_str, "link_type")?,
                created_at: row.get(4)?,
                target_title: row.get(5)?,
                target_status: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(links)
}

/// Link a ticket to a context document identified by (label, version).
pub fn add_context_link(
    db: &mut Database,
    ns: &Namespace,
    ticket_id: i64,
    context_label: &str,
    context_version: Option<&str>,
    link_type: ContextLinkType,
) -> Result<ContextLink> {
    let version = context_version.unwrap_or(DEFAULT_CONTEXT_VERSION);

    let tx = db.conn.transaction()?;
    if !ticket_exists(&tx, ns, ticket_id)? {
        return Err(Error::TicketNotFound(ticket_id));
    }

    let now = now_epoch();
    tx.execute(
        &format!(
            r#"INSERT INTO "{ns}".ticket_context_links
               (ticket_id, context_label, context_version, link_type, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5)"#
        ),
        rusqlite::params![ticket_id, context_label, version, link_type.as_str(), now],
    )?;
    let id = tx.last_insert_rowid();
    let display = ticket_display(&tx, ns, ticket_id)?;
    tx.commit()?;

    let (ticket_title, ticket_status) = match display {
        Some((title, status)) => (Some(title), Some(status)),
        None => (None, None),
    };
    Ok(ContextLink {
        id,
        ticket_id,
        context_label: context_label.to_string(),
        context_version: version.to_string(),
        link_type,
        created_at: now,
        ticket_title,
        ticket_status,
    })
}

/// Delete a context link by id. Returns whether a row was removed.
pub fn remove_context_link(db: &mut Database, ns: &Namespace, link_id: i64) -> Result<bool> {
    let affected = db.conn.execute(
        &format!(r#"DELETE FROM "{ns}".ticket_context_links WHERE id = ?1"#),
        [link_id],
    )?;
    Ok(affected > 0)
}

fn context_link_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<ContextLink, rusqlite::Error> {
    let type_str: String = row.get(4)?;
    Ok(ContextLink {
        id: row.get(0)?,
        ticket_id: row.get(1)?,
        context_label: row.get(2)?,
        context_version: row.get(3)?,
        link_type: ContextLinkType::parse_lenient(&type_str),
        created_at: row.get(5)?,
        ticket_title: row.get(6)?,
        ticket_status: row.get(7)?,
    })
}

const CONTEXT_LINK_COLUMNS: &str = "cl.id, cl.ticket_id, cl.context_label, cl.context_version, \
     cl.link_type, cl.created_at, t.title, t.status";

/// Context documents linked from a ticket.
pub fn context_links_for_ticket(
    db: &Database,
    ns: &Namespace,
    ticket_id: i64,
) -> Result<Vec<ContextLink>> {
    let sql = format!(
        r#"SELECT {CONTEXT_LINK_COLUMNS}
           FROM "{ns}".ticket_context_links cl
           JOIN "{ns}".tickets t ON t.id = cl.ticket_id
           WHERE cl.ticket_id = ?1
           ORDER BY cl.created_at DESC"#
    );
    let mut stmt = db.conn.prepare(&sql)?;
    let links = stmt
        .query_map([ticket_id], context_link_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(links)
}

/// Tickets linked to a context document, optionally pinned to one version.
pub fn tickets_for_context(
    db: &Database,
    ns: &Namespace,
    context_label: &str,
    context_version: Option<&str>,
) -> Result<Vec<ContextLink>> {
    let mut sql = format!(
        r#"SELECT {CONTEXT_LINK_COLUMNS}
           FROM "{ns}".ticket_context_links cl
           JOIN "{ns}".tickets t ON t.id = cl.ticket_id
           WHERE cl.context_label = ?1"#
    );
    let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&context_label];
    if let Some(version) = &context_version {
        sql.push_str(" AND cl.context_version = ?2");
        params.push(version);
    }
    sql.push_str(" ORDER BY cl.created_at DESC");

    let mut stmt = db.conn.prepare(&sql)?;
    let links = stmt
        .query_map(&params[..], context_link_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(links)
}

#[cfg(test)]
#[path = "link_tests.rs"]
mod tests;
