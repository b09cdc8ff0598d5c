// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Trk Contributors

//! Error types for trk-core operations.

use thiserror::Error;

/// All possible errors that can occur in trk-core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("ticket not found: {0}")]
    TicketNotFound(i64),

    #[error("cannot transition {ticket_type} from '{from}' to '{to}'\n  hint: from '{from}' you can go to: {allowed}")]
    InvalidTransition {
        ticket_type: String,
        from: String,
        to: String,
        allowed: String,
    },

    #[error("'{status}' is not a valid status for type '{ticket_type}'\n  hint: valid statuses are: {valid}")]
    UnknownStatus {
        ticket_type: String,
        status: String,
        valid: String,
    },

    #[error("cannot close {ticket_type} from '{from}': no terminal status is directly reachable\n  hint: allowed transitions: {allowed}")]
    NoClosePath {
        ticket_type: String,
        from: String,
        allowed: String,
    },

    #[error("unknown ticket type: '{0}'\n  hint: valid types are: task, bug, feature, decision")]
    UnknownTicketType(String),

    #[error("invalid priority: '{0}'\n  hint: valid priorities are: urgent, high, medium, low, none")]
    InvalidPriority(String),

    #[error(
        "invalid link type: '{0}'\n  hint: valid types are: blocks, parent, related, duplicate, implements, references, updates"
    )]
    InvalidLinkType(String),

    #[error("invalid namespace: '{0}'\n  hint: namespaces are ASCII identifiers of at most 64 chars")]
    InvalidNamespace(String),

    #[error("{0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),
}

/// A specialized Result type for trk-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
