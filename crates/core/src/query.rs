// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Trk Contributors

//! Listing, full-text search, and board aggregation.
//!
//! All three entry points run a best-effort archival sweep first, then read.
//! Filters compose conjunctively; dynamic SQL is built from a fixed set of
//! clauses with positional parameters, never by interpolating user values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::db::{ticket_columns, ticket_from_row, Database, Namespace, TICKET_COLUMNS};
use crate::error::{Error, Result};
use crate::service::TicketService;
use crate::ticket::{ListFilters, Priority, Ticket, TicketType};

/// Board descriptions are truncated to this many characters.
pub const BOARD_DESC_MAX: usize = 100;

/// Page size bounds for listings.
const LIST_LIMIT_MAX: i64 = 200;

/// Priority-then-recency ordering shared by list and board queries.
/// Unrecognized stored priorities sort last.
const PRIORITY_ORDER: &str = "CASE priority
        WHEN 'urgent' THEN 0
        WHEN 'high' THEN 1
        WHEN 'medium' THEN 2
        WHEN 'low' THEN 3
        WHEN 'none' THEN 4
        ELSE 5
    END,
    updated_at DESC";

/// One page of tickets plus aggregate counts over the filtered set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketPage {
    pub tickets: Vec<Ticket>,
    /// Total matching rows, ignoring pagination.
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
    pub by_status: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
}

/// Filters for full-text search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<TicketType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub limit: i64,
    pub include_archived: bool,
}

impl Default for SearchFilters {
    fn default() -> Self {
        SearchFilters {
            ticket_type: None,
            status: None,
            limit: 20,
            include_archived: false,
        }
    }
}

/// Ranked search results. `total` is the number returned, not the overall
/// match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub tickets: Vec<Ticket>,
    pub total: i64,
    pub query: String,
    pub include_archived: bool,
}

/// Board rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardMode {
    /// Full ticket objects per column, descriptions truncated.
    Kanban,
    /// Counts only, no ticket payloads, no per-column pagination.
    Summary,
    /// Minimal {id, title, priority, type} items per column.
    Compact,
}

impl BoardMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoardMode::Kanban => "kanban",
            BoardMode::Summary => "summary",
            BoardMode::Compact => "compact",
        }
    }
}

impl fmt::Display for BoardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BoardMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "kanban" => Ok(BoardMode::Kanban),
            "summary" => Ok(BoardMode::Summary),
            "compact" => Ok(BoardMode::Compact),
            _ => Err(Error::Validation(format!(
                "invalid board view: '{s}'\n  hint: valid views are: kanban, summary, compact"
            ))),
        }
    }
}

/// Filters for board views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardFilters {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<TicketType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub include_terminal: bool,
    pub include_archived: bool,
    /// Per-column cap for kanban/compact; 0 means unlimited.
    pub limit_per_column: usize,
}

impl Default for BoardFilters {
    fn default() -> Self {
        BoardFilters {
            ticket_type: None,
            status: None,
            include_terminal: false,
            include_archived: false,
            limit_per_column: 10,
        }
    }
}

/// Reduced ticket shape for compact boards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactTicket {
    pub id: i64,
    pub title: String,
    pub priority: Priority,
    #[serde(rename = "type")]
    pub ticket_type: TicketType,
}

impl From<&Ticket> for CompactTicket {
    fn from(t: &Ticket) -> Self {
        CompactTicket {
            id: t.id,
            title: t.title.clone(),
            priority: t.priority,
            ticket_type: t.ticket_type,
        }
    }
}

/// One status column of a board.
///
/// `count` is the full column size even when `tickets`/`items` is capped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardColumn {
    pub status: String,
    pub count: i64,
    /// Full tickets (kanban mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickets: Option<Vec<Ticket>>,
    /// Reduced tickets (compact mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<CompactTicket>>,
    pub has_more: bool,
}

/// Tickets grouped by status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardView {
    pub view: BoardMode,
    pub columns: Vec<BoardColumn>,
    pub total: i64,
    #[serde(rename = "type_filter", skip_serializing_if = "Option::is_none")]
    pub type_filter: Option<TicketType>,
    pub include_archived: bool,
    /// Namespace-wide archived ticket count, for display.
    pub archived_count: i64,
    /// Echoed per-column cap; absent in summary mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_per_column: Option<usize>,
}

/// Tokenize a free-text query into an OR-joined FTS MATCH expression.
///
/// Splits on whitespace, drops empty tokens, and quotes each surviving token
/// so FTS operators inside user input stay literal. OR semantics mean
/// any-term matches are returned, ranked higher the more terms they hit.
/// Returns None when no tokens survive; callers fail closed with empty
/// results rather than matching everything.
pub(crate) fn or_match_query(query: &str) -> Option<String> {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    if tokens.is_empty() {
        return None;
    }
    Some(tokens.join(" OR "))
}

impl TicketService {
    /// List tickets with conjunctive filters and pagination.
    ///
    /// Ordered urgent-first, then most recently updated. Also returns the
    /// total match count and per-status/per-type counts over the filtered
    /// set (ignoring pagination).
    pub fn list(
        &self,
        db: &mut Database,
        ns: &Namespace,
        filters: &ListFilters,
    ) -> Result<TicketPage> {
        self.sweep_archives(db, ns);

        let limit = filters.limit.clamp(1, LIST_LIMIT_MAX);
        let offset = filters.offset.max(0);

        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();
        if !filters.include_archived {
            clauses.push("archived_at IS NULL".to_string());
        }
        if let Some(t) = filters.ticket_type {
            params.push(t.as_str().to_string());
            clauses.push(format!("type = ?{}", params.len()));
        }
        if let Some(status) = &filters.status {
            params.push(status.clone());
            clauses.push(format!("status = ?{}", params.len()));
        }
        if let Some(p) = filters.priority {
            params.push(p.as_str().to_string());
            clauses.push(format!("priority = ?{}", params.len()));
        }
        if let Some(assignee) = &filters.assignee {
            params.push(assignee.clone());
            clauses.push(format!("assignee = ?{}", params.len()));
        }
        if let Some(search) = &filters.search {
            let Some(match_expr) = or_match_query(search) else {
                // Degenerate query: match nothing.
                return Ok(TicketPage {
                    tickets: Vec::new(),
                    total: 0,
                    limit,
                    offset,
                    has_more: false,
                    by_status: BTreeMap::new(),
                    by_type: BTreeMap::new(),
                });
            };
            params.push(match_expr);
            clauses.push(format!(
                r#"id IN (SELECT rowid FROM "{ns}".tickets_fts WHERE tickets_fts MATCH ?{})"#,
                params.len()
            ));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let mut refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::types::ToSql).collect();

        let total: i64 = db.conn.query_row(
            &format!(r#"SELECT COUNT(*) FROM "{ns}".tickets {where_sql}"#),
            &refs[..],
            |row| row.get(0),
        )?;
        let by_status = group_counts(db, &format!(
            r#"SELECT status, COUNT(*) FROM "{ns}".tickets {where_sql} GROUP BY status"#
        ), &refs)?;
        let by_type = group_counts(db, &format!(
            r#"SELECT type, COUNT(*) FROM "{ns}".tickets {where_sql} GROUP BY type"#
        ), &refs)?;

        let page_sql = format!(
            r#"SELECT {TICKET_COLUMNS} FROM "{ns}".tickets {where_sql}
               ORDER BY {PRIORITY_ORDER}
               LIMIT ?{} OFFSET ?{}"#,
            params.len() + 1,
            params.len() + 2,
        );
        refs.push(&limit);
        refs.push(&offset);
        let mut stmt = db.conn.prepare(&page_sql)?;
        let tickets = stmt
            .query_map(&refs[..], ticket_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(TicketPage {
            tickets,
            total,
            limit,
            offset,
            has_more: offset + limit < total,
            by_status,
            by_type,
        })
    }

    /// Full-text search over title and description, ranked by relevance.
    ///
    /// Terms are OR-joined so any-term matches are returned; documents
    /// matching more terms rank higher. An all-whitespace query returns
    /// empty results.
    pub fn search(
        &self,
        db: &mut Database,
        ns: &Namespace,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<SearchResults> {
        self.sweep_archives(db, ns);

        let Some(match_expr) = or_match_query(query) else {
            return Ok(SearchResults {
                tickets: Vec::new(),
                total: 0,
                query: query.to_string(),
                include_archived: filters.include_archived,
            });
        };

        let mut clauses = vec!["tickets_fts MATCH ?1".to_string()];
        let mut params: Vec<String> = vec![match_expr];
        if !filters.include_archived {
            clauses.push("t.archived_at IS NULL".to_string());
        }
        if let Some(t) = filters.ticket_type {
            params.push(t.as_str().to_string());
            clauses.push(format!("t.type = ?{}", params.len()));
        }
        if let Some(status) = &filters.status {
            params.push(status.clone());
            clauses.push(format!("t.status = ?{}", params.len()));
        }

        let cols = ticket_columns("t");
        let sql = format!(
            r#"SELECT {cols}
               FROM "{ns}".tickets_fts
               JOIN "{ns}".tickets t ON t.id = tickets_fts.rowid
               WHERE {}
               ORDER BY bm25(tickets_fts)
               LIMIT ?{}"#,
            clauses.join(" AND "),
            params.len() + 1,
        );
        let limit = filters.limit.max(0);
        let mut refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::types::ToSql).collect();
        refs.push(&limit);

        let mut stmt = db.conn.prepare(&sql)?;
        let tickets = stmt
            .query_map(&refs[..], ticket_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(SearchResults {
            total: tickets.len() as i64,
            tickets,
            query: query.to_string(),
            include_archived: filters.include_archived,
        })
    }

    /// Group tickets by status into board columns.
    ///
    /// Terminal statuses are excluded by default; an explicit status filter
    /// skips that exclusion entirely. With a type filter, columns follow
    /// the type's state machine ordering (empty columns included); without
    /// one, non-empty statuses are ordered alphabetically.
    pub fn board(
        &self,
        db: &mut Database,
        ns: &Namespace,
        mode: BoardMode,
        filters: &BoardFilters,
    ) -> Result<BoardView> {
        self.sweep_archives(db, ns);

        let mut clauses: Vec<String> = Vec::new();
        let mut params: Vec<String> = Vec::new();
        if !filters.include_archived {
            clauses.push("archived_at IS NULL".to_string());
        }
        if let Some(t) = filters.ticket_type {
            params.push(t.as_str().to_string());
            clauses.push(format!("type = ?{}", params.len()));
        }
        if let Some(status) = &filters.status {
            // Explicit status filter wins over terminal exclusion.
            params.push(status.clone());
            clauses.push(format!("status = ?{}", params.len()));
        } else if !filters.include_terminal {
            let terminals: Vec<String> = match filters.ticket_type {
                Some(t) => self.machines().terminal_statuses(t).to_vec(),
                None => self.machines().all_terminal_statuses(),
            };
            if !terminals.is_empty() {
                let placeholders: Vec<String> = terminals
                    .iter()
                    .enumerate()
                    .map(|(i, _)| format!("?{}", params.len() + i + 1))
                    .collect();
                clauses.push(format!("status NOT IN ({})", placeholders.join(", ")));
                params.extend(terminals);
            }
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let refs: Vec<&dyn rusqlite::types::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::types::ToSql).collect();

        let archived_count: i64 = db.conn.query_row(
            &format!(r#"SELECT COUNT(*) FROM "{ns}".tickets WHERE archived_at IS NOT NULL"#),
            [],
            |row| row.get(0),
        )?;

        if mode == BoardMode::Summary {
            let rows = group_counts(db, &format!(
                r#"SELECT status, COUNT(*) FROM "{ns}".tickets {where_sql} GROUP BY status ORDER BY status"#
            ), &refs)?;
            let total = rows.values().sum();
            let columns = rows
                .into_iter()
                .map(|(status, count)| BoardColumn {
                    status,
                    count,
                    tickets: None,
                    items: None,
                    has_more: false,
                })
                .collect();
            return Ok(BoardView {
                view: mode,
                columns,
                total,
                type_filter: filters.ticket_type,
                include_archived: filters.include_archived,
                archived_count,
                limit_per_column: None,
            });
        }

        let sql = format!(
            r#"SELECT {TICKET_COLUMNS} FROM "{ns}".tickets {where_sql}
               ORDER BY {PRIORITY_ORDER}"#
        );
        let mut stmt = db.conn.prepare(&sql)?;
        let tickets = stmt
            .query_map(&refs[..], ticket_from_row)?
            .collect::<std::result::Result<Vec<Ticket>, _>>()?;
        let total = tickets.len() as i64;

        // Group by status, preserving the priority/recency ordering.
        let mut groups: BTreeMap<String, Vec<Ticket>> = BTreeMap::new();
        for mut ticket in tickets {
            if mode == BoardMode::Kanban {
                truncate_description(&mut ticket);
            }
            groups.entry(ticket.status.clone()).or_default().push(ticket);
        }

        // Column order: state machine declaration order when a type is
        // filtered (empty columns included), else alphabetical, with any
        // stray statuses appended.
        let mut ordered: Vec<String> = match filters.ticket_type {
            Some(t) => self
                .machines()
                .all_statuses(t)
                .iter()
                .map(|s| s.to_string())
                .collect(),
            None => groups.keys().cloned().collect(),
        };
        for status in groups.keys() {
            if !ordered.contains(status) {
                ordered.push(status.clone());
            }
        }

        let cap = filters.limit_per_column;
        let columns = ordered
            .into_iter()
            .map(|status| {
                let group = groups.remove(&status).unwrap_or_default();
                let count = group.len() as i64;
                let shown = if cap == 0 { group.len() } else { group.len().min(cap) };
                let has_more = shown < group.len();
                let (tickets, items) = match mode {
                    BoardMode::Compact => (
                        None,
                        Some(group.iter().take(shown).map(CompactTicket::from).collect()),
                    ),
                    _ => (Some(group.into_iter().take(shown).collect()), None),
                };
                BoardColumn {
                    status,
                    count,
                    tickets,
                    items,
                    has_more,
                }
            })
            .collect();

        Ok(BoardView {
            view: mode,
            columns,
            total,
            type_filter: filters.ticket_type,
            include_archived: filters.include_archived,
            archived_count,
            limit_per_column: Some(filters.limit_per_column),
        })
    }
}

/// Truncate a board ticket's description to [`BOARD_DESC_MAX`] characters,
/// appending an ellipsis. Full descriptions come from individual reads.
fn truncate_description(ticket: &mut Ticket) {
    if let Some(desc) = &ticket.description {
        if desc.chars().count() > BOARD_DESC_MAX {
            let truncated: String = desc.chars().take(BOARD_DESC_MAX).collect();
            ticket.description = Some(format!("{truncated}..."));
        }
    }
}

/// Run a two-column (key, count) grouping query.
fn group_counts(
    db: &Database,
    sql: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<BTreeMap<String, i64>> {
    let mut stmt = db.conn.prepare(sql)?;
    let counts = stmt
        .query_map(params, |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<BTreeMap<String, i64>, _>>()?;
    Ok(counts)
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
