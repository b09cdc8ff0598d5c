// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Trk Contributors

//! Core ticket types for the trk ticket tracker.
//!
//! This module contains the fundamental data types: Ticket, TicketType,
//! Priority, HistoryEntry, and the create/update/list parameter structs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::link::TicketLink;

/// Maximum title length in characters.
pub const TITLE_MAX_CHARS: usize = 500;

/// Classification of tickets by their nature and lifecycle.
///
/// Each type has its own status state machine (see [`crate::state`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketType {
    /// Standard unit of work.
    Task,
    /// Defect to triage, confirm, and resolve.
    Bug,
    /// Proposed capability going through approval.
    Feature,
    /// A decision to be made (and possibly deferred).
    Decision,
}

impl TicketType {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketType::Task => "task",
            TicketType::Bug => "bug",
            TicketType::Feature => "feature",
            TicketType::Decision => "decision",
        }
    }
}

impl fmt::Display for TicketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TicketType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "task" => Ok(TicketType::Task),
            "bug" => Ok(TicketType::Bug),
            "feature" => Ok(TicketType::Feature),
            "decision" => Ok(TicketType::Decision),
            _ => Err(Error::UnknownTicketType(s.to_string())),
        }
    }
}

/// Ticket priority, ordered urgent-first in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Medium,
    Low,
    None,
}

impl Priority {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
            Priority::None => "none",
        }
    }

    /// Sort rank used by listings: urgent < high < medium < low < none.
    /// Unrecognized stored values rank after all of these (see the SQL CASE).
    pub fn rank(&self) -> i64 {
        match self {
            Priority::Urgent => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
            Priority::None => 4,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "urgent" => Ok(Priority::Urgent),
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            "none" => Ok(Priority::None),
            _ => Err(Error::InvalidPriority(s.to_string())),
        }
    }
}

/// The primary entity representing a tracked work item.
///
/// `history` and `links` are always lists (possibly empty), never absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// Store-assigned identifier.
    pub id: i64,
    /// Originating session reference, if any (external entity).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Short description of the work (1–500 chars).
    pub title: String,
    /// Longer description providing context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Classification; immutable after creation.
    #[serde(rename = "type")]
    pub ticket_type: TicketType,
    /// Current status within the type's state machine.
    pub status: String,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    /// Creation time, epoch seconds.
    pub created_at: f64,
    /// Last modification time, epoch seconds.
    pub updated_at: f64,
    /// Set exactly when status enters a terminal value for the type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<f64>,
    /// Set only by the archival sweep.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_at: Option<f64>,
    /// Fingerprint of title+description (not a uniqueness constraint).
    pub content_hash: String,
    /// Audit trail, newest first.
    pub history: Vec<HistoryEntry>,
    /// Ticket links in both directions.
    pub links: Vec<TicketLink>,
}

/// An audit record of one field's old→new value change.
///
/// Immutable once written; the synthetic "archived_at" pseudo-field is
/// recorded here too when the archival sweep stamps a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Store-assigned identifier.
    pub id: i64,
    pub ticket_id: i64,
    pub field_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    /// Actor attribution, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_by: Option<String>,
    /// When the change happened, epoch seconds.
    pub changed_at: f64,
}

/// Parameters for creating a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTicket {
    #[serde(rename = "type")]
    pub ticket_type: TicketType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl NewTicket {
    /// Creates ticket parameters with medium priority and no optional fields.
    pub fn new(ticket_type: TicketType, title: impl Into<String>) -> Self {
        NewTicket {
            ticket_type,
            title: title.into(),
            description: None,
            priority: Priority::Medium,
            assignee: None,
            tags: None,
            metadata: None,
            session_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Partial update for a ticket's fields. Status is never updated here —
/// use [`crate::service::TicketService::transition`].
///
/// `None` means "leave unchanged"; fields cannot be unset through a patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl TicketPatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = Some(assignee.into());
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Filter and pagination options for listing tickets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListFilters {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub ticket_type: Option<TicketType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Free-text search over title and description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Page size, 1–200.
    pub limit: i64,
    pub offset: i64,
    pub include_archived: bool,
}

impl Default for ListFilters {
    fn default() -> Self {
        ListFilters {
            ticket_type: None,
            status: None,
            priority: None,
            assignee: None,
            search: None,
            limit: 20,
            offset: 0,
            include_archived: false,
        }
    }
}

/// Validate a ticket title: non-empty, at most [`TITLE_MAX_CHARS`] characters.
pub(crate) fn validate_title(title: &str) -> Result<()> {
    if title.is_empty() {
        return Err(Error::Validation("title must not be empty".to_string()));
    }
    let chars = title.chars().count();
    if chars > TITLE_MAX_CHARS {
        return Err(Error::Validation(format!(
            "title exceeds {TITLE_MAX_CHARS} characters ({chars})"
        )));
    }
    Ok(())
}

/// Fingerprint of title+description for future dedup. 16 hex chars of
/// SHA-256 over `"{title}|{description}"`.
pub fn content_fingerprint(title: &str, description: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"|");
    hasher.update(description.unwrap_or("").as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

#[cfg(test)]
#[path = "ticket_tests.rs"]
mod tests;
