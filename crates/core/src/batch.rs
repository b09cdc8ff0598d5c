// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Trk Contributors

//! Bulk status transitions and closes with preview/confirm semantics.
//!
//! Both operations are two-phase: the default is a read-only dry run that
//! reports exactly what would happen; `confirm = true` executes. Per-item
//! failures never abort the rest of the batch; each executed transition is
//! its own transaction, so a multi-hop close that fails midway leaves the
//! ticket at whatever intermediate status it reached.

use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::db::{Database, Namespace};
use crate::error::Result;
use crate::service::TicketService;
use crate::ticket::TicketType;

/// Safety cap for batch operations.
pub const BATCH_MAX: usize = 50;

/// Which bulk operation produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchAction {
    BatchMove,
    BatchClose,
}

/// Per-ticket outcome within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    /// The ticket this entry refers to; 0 for the synthetic oversize item.
    pub ticket_id: i64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<String>,
}

impl BatchItem {
    fn ok(ticket_id: i64, old_status: &str, new_status: &str) -> Self {
        BatchItem {
            ticket_id,
            success: true,
            error: None,
            old_status: Some(old_status.to_string()),
            new_status: Some(new_status.to_string()),
        }
    }

    fn failure(ticket_id: i64, error: String, old_status: Option<&str>) -> Self {
        BatchItem {
            ticket_id,
            success: false,
            error: Some(error),
            old_status: old_status.map(str::to_string),
            new_status: None,
        }
    }
}

/// Aggregate result of a batch operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub action: BatchAction,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
    pub dry_run: bool,
}

impl BatchOutcome {
    fn oversize(action: BatchAction, total: usize, dry_run: bool) -> Self {
        BatchOutcome {
            action,
            total,
            succeeded: 0,
            failed: total,
            results: vec![BatchItem::failure(
                0,
                format!("Batch size {total} exceeds max {BATCH_MAX}"),
                None,
            )],
            dry_run,
        }
    }

    fn tally(action: BatchAction, total: usize, results: Vec<BatchItem>, dry_run: bool) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        BatchOutcome {
            action,
            total,
            succeeded,
            failed: results.len() - succeeded,
            results,
            dry_run,
        }
    }
}

impl TicketService {
    /// Move multiple tickets to `target_status`.
    ///
    /// Each ticket is validated individually: missing tickets and illegal
    /// transitions become failed items with the rest proceeding. Preview
    /// mode reports the same items without mutating.
    pub fn batch_transition(
        &self,
        db: &mut Database,
        ns: &Namespace,
        ticket_ids: &[i64],
        target_status: &str,
        confirm: bool,
        actor: Option<&str>,
    ) -> Result<BatchOutcome> {
        if ticket_ids.len() > BATCH_MAX {
            return Ok(BatchOutcome::oversize(
                BatchAction::BatchMove,
                ticket_ids.len(),
                !confirm,
            ));
        }

        let mut results = Vec::with_capacity(ticket_ids.len());
        for &id in ticket_ids {
            let Some((ticket_type, old_status)) = fetch_type_status(db, ns, id)? else {
                results.push(BatchItem::failure(id, "Ticket not found".to_string(), None));
                continue;
            };

            if !self
                .machines()
                .can_transition(ticket_type, &old_status, target_status)
            {
                let allowed = self
                    .machines()
                    .machine(ticket_type)
                    .targets(&old_status)
                    .unwrap_or(&[])
                    .join(", ");
                results.push(BatchItem::failure(
                    id,
                    format!(
                        "Cannot transition {ticket_type} from '{old_status}' to \
                         '{target_status}'. Allowed: [{allowed}]"
                    ),
                    Some(&old_status),
                ));
                continue;
            }

            if confirm {
                match self.transition(db, ns, id, target_status, actor) {
                    Ok(_) => results.push(BatchItem::ok(id, &old_status, target_status)),
                    Err(e) => {
                        results.push(BatchItem::failure(id, e.to_string(), Some(&old_status)))
                    }
                }
            } else {
                results.push(BatchItem::ok(id, &old_status, target_status));
            }
        }

        let outcome = BatchOutcome::tally(BatchAction::BatchMove, ticket_ids.len(), results, !confirm);
        info!(
            namespace = %ns, total = outcome.total,
            succeeded = outcome.succeeded, failed = outcome.failed,
            dry_run = outcome.dry_run, "batch transition"
        );
        Ok(outcome)
    }

    /// Close multiple tickets, walking intermediate statuses as needed.
    ///
    /// The path to a terminal status comes from state machine BFS, steering
    /// toward positive terminals unless `resolution` names one explicitly.
    /// Already-terminal tickets succeed with old = new = current status.
    pub fn batch_close(
        &self,
        db: &mut Database,
        ns: &Namespace,
        ticket_ids: &[i64],
        confirm: bool,
        actor: Option<&str>,
        resolution: Option<&str>,
    ) -> Result<BatchOutcome> {
        if ticket_ids.len() > BATCH_MAX {
            return Ok(BatchOutcome::oversize(
                BatchAction::BatchClose,
                ticket_ids.len(),
                !confirm,
            ));
        }

        let mut results = Vec::with_capacity(ticket_ids.len());
        for &id in ticket_ids {
            let Some((ticket_type, current)) = fetch_type_status(db, ns, id)? else {
                results.push(BatchItem::failure(id, "Ticket not found".to_string(), None));
                continue;
            };

            if self.machines().machine(ticket_type).is_terminal(&current) {
                results.push(BatchItem::ok(id, &current, &current));
                continue;
            }

            let Some(path) = self
                .machines()
                .find_close_path(ticket_type, &current, resolution)
            else {
                results.push(BatchItem::failure(
                    id,
                    format!("No path to terminal from '{current}' for {ticket_type}"),
                    Some(&current),
                ));
                continue;
            };
            let Some(final_status) = path.last().cloned() else {
                continue;
            };

            if confirm {
                let walked: Result<()> = path
                    .iter()
                    .try_for_each(|step| self.transition(db, ns, id, step, actor).map(|_| ()));
                match walked {
                    Ok(()) => results.push(BatchItem::ok(id, &current, &final_status)),
                    Err(e) => results.push(BatchItem::failure(id, e.to_string(), Some(&current))),
                }
            } else {
                results.push(BatchItem::ok(id, &current, &final_status));
            }
        }

        let outcome = BatchOutcome::tally(BatchAction::BatchClose, ticket_ids.len(), results, !confirm);
        info!(
            namespace = %ns, total = outcome.total,
            succeeded = outcome.succeeded, failed = outcome.failed,
            dry_run = outcome.dry_run, "batch close"
        );
        Ok(outcome)
    }
}

/// Load just a ticket's type and status, or None when missing.
fn fetch_type_status(
    db: &Database,
    ns: &Namespace,
    id: i64,
) -> Result<Option<(TicketType, String)>> {
    let row = db
        .conn
        .query_row(
            &format!(r#"SELECT type, status FROM "{ns}".tickets WHERE id = ?1"#),
            [id],
            |row| {
                let type_str: String = row.get(0)?;
                Ok((crate::db::parse_db(&type_str, "type")?, row.get(1)?))
            },
        )
        .optional()?;
    Ok(row)
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
