// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Trk Contributors

#![allow(clippy::unwrap_used)]

use super::*;

#[test]
fn invalid_transition_message_lists_allowed_targets() {
    let err = Error::InvalidTransition {
        ticket_type: "bug".to_string(),
        from: "confirmed".to_string(),
        to: "resolved".to_string(),
        allowed: "in_progress".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("cannot transition bug from 'confirmed' to 'resolved'"));
    assert!(msg.contains("in_progress"));
}

#[test]
fn unknown_status_message_lists_valid_statuses() {
    let err = Error::UnknownStatus {
        ticket_type: "task".to_string(),
        status: "bogus".to_string(),
        valid: "backlog, in_progress, done, cancelled".to_string(),
    };
    let msg = err.to_string();
    assert!(msg.contains("'bogus' is not a valid status for type 'task'"));
    assert!(msg.contains("backlog, in_progress, done, cancelled"));
}

#[test]
fn ticket_not_found_carries_id() {
    let err = Error::TicketNotFound(42);
    assert_eq!(err.to_string(), "ticket not found: 42");
}

#[test]
fn unknown_ticket_type_hints_valid_types() {
    let msg = Error::UnknownTicketType("epic".to_string()).to_string();
    assert!(msg.contains("'epic'"));
    assert!(msg.contains("task, bug, feature, decision"));
}

#[test]
fn database_error_converts() {
    let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
    assert!(matches!(err, Error::Database(_)));
}

#[test]
fn json_error_converts() {
    let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
    let err: Error = json_err.into();
    assert!(matches!(err, Error::Json(_)));
}
