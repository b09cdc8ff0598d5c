// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Trk Contributors

//! Ticket service: create/get/update/transition/close and archival.
//!
//! Every mutating operation runs in a single transaction; on any failure the
//! transaction rolls back and the error propagates. History rows are written
//! in the same transaction as the field change they record.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::db::{fetch_history, fetch_ticket, now_epoch, Database, Namespace};
use crate::error::{Error, Result};
use crate::link::links_for_ticket;
use crate::state::StateMachines;
use crate::ticket::{content_fingerprint, validate_title, NewTicket, Ticket, TicketPatch};

/// Default archival TTL: closed tickets older than 14 days are swept.
pub const DEFAULT_ARCHIVE_TTL: f64 = 1_209_600.0;

/// Actor recorded on history rows written by the archival sweep.
const ARCHIVE_ACTOR: &str = "system:auto_archive";

/// The core ticket service.
///
/// Stateless apart from its immutable state machine configuration; the
/// database connection and namespace are supplied per call.
#[derive(Debug, Clone, Default)]
pub struct TicketService {
    machines: StateMachines,
}

impl TicketService {
    pub fn new(machines: StateMachines) -> Self {
        TicketService { machines }
    }

    pub fn machines(&self) -> &StateMachines {
        &self.machines
    }

    /// Create a ticket with the type's initial status.
    ///
    /// History starts empty; creation itself is not audited.
    pub fn create(&self, db: &mut Database, ns: &Namespace, params: NewTicket) -> Result<Ticket> {
        validate_title(&params.title)?;

        let now = now_epoch();
        let status = self.machines.initial_status(params.ticket_type).to_string();
        let content_hash = content_fingerprint(&params.title, params.description.as_deref());
        let tags_json = params
            .tags
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let metadata_json = params
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let tx = db.conn.transaction()?;
        tx.execute(
            &format!(
                r#"INSERT INTO "{ns}".tickets
                   (session_id, title, description, type, status, priority, assignee,
                    tags, metadata, created_at, updated_at, content_hash)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"#
            ),
            rusqlite::params![
                params.session_id,
                params.title,
                params.description,
                params.ticket_type.as_str(),
                status,
                params.priority.as_str(),
                params.assignee,
                tags_json,
                metadata_json,
                now,
                now,
                content_hash,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!(namespace = %ns, ticket_id = id, ticket_type = %params.ticket_type, "created ticket");
        Ok(Ticket {
            id,
            session_id: params.session_id,
            title: params.title,
            description: params.description,
            ticket_type: params.ticket_type,
            status,
            priority: params.priority,
            assignee: params.assignee,
            tags: params.tags,
            metadata: params.metadata,
            created_at: now,
            updated_at: now,
            closed_at: None,
            archived_at: None,
            content_hash,
            history: Vec::new(),
            links: Vec::new(),
        })
    }

    /// Fetch a ticket with history (newest first) and bidirectional links.
    pub fn get(&self, db: &Database, ns: &Namespace, id: i64) -> Result<Ticket> {
        self.get_with(db, ns, id, true, true)
    }

    /// Fetch a ticket, optionally skipping history or links.
    pub fn get_with(
        &self,
        db: &Database,
        ns: &Namespace,
        id: i64,
        include_history: bool,
        include_links: bool,
    ) -> Result<Ticket> {
        let mut ticket = fetch_ticket(&db.conn, ns, id)?.ok_or(Error::TicketNotFound(id))?;
        if include_history {
            ticket.history = fetch_history(&db.conn, ns, id)?;
        }
        if include_links {
            ticket.links = links_for_ticket(db, ns, id)?;
        }
        Ok(ticket)
    }

    /// Apply a partial update, auditing each field that actually changed.
    ///
    /// Fields equal to their current value are skipped; if nothing changed,
    /// the current ticket is returned and nothing is committed. Status is
    /// never updated here (see [`TicketService::transition`]).
    pub fn update(
        &self,
        db: &mut Database,
        ns: &Namespace,
        id: i64,
        patch: TicketPatch,
        actor: Option<&str>,
    ) -> Result<Ticket> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }

        let tx = db.conn.transaction()?;
        let current = fetch_ticket(&tx, ns, id)?.ok_or(Error::TicketNotFound(id))?;

        // (field, old, new) for every field that is present and different.
        let mut changes: Vec<(&str, Option<String>, Option<String>)> = Vec::new();

        let title = match patch.title {
            Some(t) if t != current.title => {
                changes.push(("title", Some(current.title.clone()), Some(t.clone())));
                t
            }
            _ => current.title.clone(),
        };
        let description = match patch.description {
            Some(d) if current.description.as_deref() != Some(d.as_str()) => {
                changes.push(("description", current.description.clone(), Some(d.clone())));
                Some(d)
            }
            _ => current.description.clone(),
        };
        let priority = match patch.priority {
            Some(p) if p != current.priority => {
                changes.push((
                    "priority",
                    Some(current.priority.to_string()),
                    Some(p.to_string()),
                ));
                p
            }
            _ => current.priority,
        };
        let assignee = match patch.assignee {
            Some(a) if current.assignee.as_deref() != Some(a.as_str()) => {
                changes.push(("assignee", current.assignee.clone(), Some(a.clone())));
                Some(a)
            }
            _ => current.assignee.clone(),
        };
        let tags = match patch.tags {
            Some(t) if current.tags.as_ref() != Some(&t) => {
                changes.push((
                    "tags",
                    current.tags.as_ref().map(serde_json::to_string).transpose()?,
                    Some(serde_json::to_string(&t)?),
                ));
                Some(t)
            }
            _ => current.tags.clone(),
        };
        let metadata = match patch.metadata {
            Some(m) if current.metadata.as_ref() != Some(&m) => {
                changes.push((
                    "metadata",
                    current
                        .metadata
                        .as_ref()
                        .map(serde_json::to_string)
                        .transpose()?,
                    Some(serde_json::to_string(&m)?),
                ));
                Some(m)
            }
            _ => current.metadata.clone(),
        };

        if changes.is_empty() {
            // No-op: do not touch updated_at, do not commit.
            let mut ticket = current;
            ticket.history = fetch_history(&tx, ns, id)?;
            drop(tx);
            ticket.links = links_for_ticket(db, ns, id)?;
            return Ok(ticket);
        }

        let now = now_epoch();
        let content_hash = content_fingerprint(&title, description.as_deref());
        let tags_json = tags.as_ref().map(serde_json::to_string).transpose()?;
        let metadata_json = metadata.as_ref().map(serde_json::to_string).transpose()?;
        tx.execute(
            &format!(
                r#"UPDATE "{ns}".tickets
                   SET title = ?1, description = ?2, priority = ?3, assignee = ?4,
                       tags = ?5, metadata = ?6, updated_at = ?7, content_hash = ?8
                   WHERE id = ?9"#
            ),
            rusqlite::params![
                title,
                description,
                priority.as_str(),
                assignee,
                tags_json,
                metadata_json,
                now,
                content_hash,
                id,
            ],
        )?;
        for (field, old, new) in &changes {
            insert_history(&tx, ns, id, field, old.as_deref(), new.as_deref(), actor, now)?;
        }
        tx.commit()?;

        debug!(namespace = %ns, ticket_id = id, fields = changes.len(), "updated ticket");
        self.get(db, ns, id)
    }

    /// Change a ticket's status along a legal state machine edge.
    ///
    /// Sets `closed_at` when the target is terminal for the type, and clears
    /// it when leaving a terminal status (deferred decisions reopening).
    pub fn transition(
        &self,
        db: &mut Database,
        ns: &Namespace,
        id: i64,
        target: &str,
        actor: Option<&str>,
    ) -> Result<Ticket> {
        let tx = db.conn.transaction()?;
        let current = fetch_ticket(&tx, ns, id)?.ok_or(Error::TicketNotFound(id))?;
        self.machines
            .validate_transition(current.ticket_type, &current.status, target)?;

        let now = now_epoch();
        let machine = self.machines.machine(current.ticket_type);
        let closed_at = machine.is_terminal(target).then_some(now);
        tx.execute(
            &format!(
                r#"UPDATE "{ns}".tickets SET status = ?1, updated_at = ?2, closed_at = ?3
                   WHERE id = ?4"#
            ),
            rusqlite::params![target, now, closed_at, id],
        )?;
        insert_history(
            &tx,
            ns,
            id,
            "status",
            Some(&current.status),
            Some(target),
            actor,
            now,
        )?;
        tx.commit()?;

        debug!(
            namespace = %ns, ticket_id = id,
            from = %current.status, to = target,
            "transitioned ticket"
        );
        self.get(db, ns, id)
    }

    /// Close a ticket by a single hop to a terminal status.
    ///
    /// Already-terminal tickets are returned unchanged. With an explicit
    /// resolution, the hop must be legal for the current status; without
    /// one, the first directly reachable terminal target is chosen. Fails
    /// with [`Error::NoClosePath`] when no terminal is one hop away; batch
    /// close walks multi-hop paths instead (see [`crate::batch`]).
    pub fn close(
        &self,
        db: &mut Database,
        ns: &Namespace,
        id: i64,
        actor: Option<&str>,
        resolution: Option<&str>,
    ) -> Result<Ticket> {
        let current = fetch_ticket(&db.conn, ns, id)?.ok_or(Error::TicketNotFound(id))?;
        let machine = self.machines.machine(current.ticket_type);
        if machine.is_terminal(&current.status) {
            return self.get(db, ns, id);
        }

        if let Some(target) = resolution {
            return self.transition(db, ns, id, target, actor);
        }

        let targets = machine.targets(&current.status).unwrap_or(&[]);
        let Some(terminal) = targets.iter().find(|t| machine.is_terminal(t)) else {
            return Err(Error::NoClosePath {
                ticket_type: current.ticket_type.to_string(),
                from: current.status.clone(),
                allowed: targets.join(", "),
            });
        };
        let terminal = terminal.clone();
        self.transition(db, ns, id, &terminal, actor)
    }

    /// Stamp `archived_at` on closed tickets older than `ttl_seconds`.
    ///
    /// One batch update plus one history row per ticket, all in a single
    /// transaction. Idempotent: already-archived tickets are never
    /// re-stamped. Returns the number of tickets archived.
    pub fn archive_stale(&self, db: &mut Database, ns: &Namespace, ttl_seconds: f64) -> Result<u64> {
        let now = now_epoch();
        let cutoff = now - ttl_seconds;
        let terminals = self.machines.all_terminal_statuses();
        let placeholders = (0..terminals.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");

        let tx = db.conn.transaction()?;
        let ids: Vec<i64> = {
            let mut stmt = tx.prepare(&format!(
                r#"SELECT id FROM "{ns}".tickets
                   WHERE closed_at IS NOT NULL AND closed_at < ?1
                     AND archived_at IS NULL AND status IN ({placeholders})"#
            ))?;
            let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&cutoff];
            for t in &terminals {
                params.push(t);
            }
            let ids = stmt
                .query_map(&params[..], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids
        };
        if ids.is_empty() {
            return Ok(0);
        }

        let id_placeholders = (0..ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let mut params: Vec<&dyn rusqlite::types::ToSql> = vec![&now];
        for id in &ids {
            params.push(id);
        }
        tx.execute(
            &format!(
                r#"UPDATE "{ns}".tickets SET archived_at = ?1 WHERE id IN ({id_placeholders})"#
            ),
            &params[..],
        )?;
        let stamp = now.to_string();
        for id in &ids {
            insert_history(&tx, ns, *id, "archived_at", None, Some(&stamp), Some(ARCHIVE_ACTOR), now)?;
        }
        tx.commit()?;

        info!(namespace = %ns, count = ids.len(), "archived stale tickets");
        Ok(ids.len() as u64)
    }

    /// Best-effort archival sweep run before read queries.
    ///
    /// Failures are logged and swallowed so they never fail the read.
    pub(crate) fn sweep_archives(&self, db: &mut Database, ns: &Namespace) {
        if let Err(err) = self.archive_stale(db, ns, DEFAULT_ARCHIVE_TTL) {
            warn!(namespace = %ns, error = %err, "auto-archive sweep failed");
        }
    }
}

/// Append one audit row. Called inside the caller's transaction.
pub(crate) fn insert_history(
    conn: &Connection,
    ns: &Namespace,
    ticket_id: i64,
    field_name: &str,
    old_value: Option<&str>,
    new_value: Option<&str>,
    changed_by: Option<&str>,
    changed_at: f64,
) -> Result<()> {
    conn.execute(
        &format!(
            r#"INSERT INTO "{ns}".ticket_history
               (ticket_id, field_name, old_value, new_value, changed_by, changed_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#
        ),
        rusqlite::params![ticket_id, field_name, old_value, new_value, changed_by, changed_at],
    )?;
    Ok(())
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
