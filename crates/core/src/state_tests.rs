// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Trk Contributors

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

fn machines() -> StateMachines {
    StateMachines::standard()
}

#[parameterized(
    task = { TicketType::Task, "backlog" },
    bug = { TicketType::Bug, "triage" },
    feature = { TicketType::Feature, "proposed" },
    decision = { TicketType::Decision, "open" },
)]
fn initial_status(ticket_type: TicketType, expected: &str) {
    assert_eq!(machines().initial_status(ticket_type), expected);
}

#[parameterized(
    task = { TicketType::Task, &["done", "cancelled"] },
    bug = { TicketType::Bug, &["resolved", "wont_fix"] },
    feature = { TicketType::Feature, &["shipped", "rejected"] },
    decision = { TicketType::Decision, &["decided", "deferred"] },
)]
fn terminal_statuses(ticket_type: TicketType, expected: &[&str]) {
    assert_eq!(machines().terminal_statuses(ticket_type), expected);
}

#[test]
fn no_status_transitions_to_itself() {
    let machines = machines();
    for ticket_type in [
        TicketType::Task,
        TicketType::Bug,
        TicketType::Feature,
        TicketType::Decision,
    ] {
        for status in machines.all_statuses(ticket_type) {
            assert!(
                !machines.can_transition(ticket_type, status, status),
                "{ticket_type} {status} -> {status} should be invalid"
            );
        }
    }
}

#[test]
fn terminals_have_no_outgoing_edges_except_deferred() {
    let machines = machines();
    for ticket_type in [
        TicketType::Task,
        TicketType::Bug,
        TicketType::Feature,
        TicketType::Decision,
    ] {
        let machine = machines.machine(ticket_type);
        for terminal in machine.terminal() {
            let targets = machine.targets(terminal).unwrap();
            if ticket_type == TicketType::Decision && terminal == "deferred" {
                assert_eq!(targets, ["open".to_string()]);
            } else {
                assert!(
                    targets.is_empty(),
                    "{ticket_type} terminal {terminal} has outgoing edges"
                );
            }
        }
    }
}

#[test]
fn all_terminal_statuses_is_sorted_union() {
    let terminals = machines().all_terminal_statuses();
    assert_eq!(
        terminals,
        vec![
            "cancelled",
            "decided",
            "deferred",
            "done",
            "rejected",
            "resolved",
            "shipped",
            "wont_fix"
        ]
    );
}

#[parameterized(
    task_start = { TicketType::Task, "backlog", "in_progress" },
    task_direct_done = { TicketType::Task, "backlog", "done" },
    bug_confirm = { TicketType::Bug, "triage", "confirmed" },
    bug_resolve = { TicketType::Bug, "in_progress", "resolved" },
    feature_approve = { TicketType::Feature, "proposed", "approved" },
    decision_reopen = { TicketType::Decision, "deferred", "open" },
)]
fn valid_transitions(ticket_type: TicketType, from: &str, to: &str) {
    assert!(machines().validate_transition(ticket_type, from, to).is_ok());
}

#[parameterized(
    bug_skip_confirm = { TicketType::Bug, "triage", "resolved" },
    bug_confirmed_to_resolved = { TicketType::Bug, "confirmed", "resolved" },
    task_reopen = { TicketType::Task, "done", "backlog" },
    feature_skip = { TicketType::Feature, "proposed", "shipped" },
)]
fn invalid_transitions(ticket_type: TicketType, from: &str, to: &str) {
    assert!(matches!(
        machines().validate_transition(ticket_type, from, to),
        Err(Error::InvalidTransition { .. })
    ));
}

#[test]
fn unknown_from_status_fails_with_unknown_status() {
    assert!(matches!(
        machines().validate_transition(TicketType::Task, "bogus", "done"),
        Err(Error::UnknownStatus { .. })
    ));
}

// Close path: positive terminals win over nearer negative ones.
#[test]
fn close_path_bug_triage_prefers_resolved() {
    // wont_fix is one hop away but negative; resolved is three hops.
    let path = machines()
        .find_close_path(TicketType::Bug, "triage", None)
        .unwrap();
    assert_eq!(path, vec!["confirmed", "in_progress", "resolved"]);
}

#[test]
fn close_path_feature_proposed_prefers_shipped() {
    let path = machines()
        .find_close_path(TicketType::Feature, "proposed", None)
        .unwrap();
    assert_eq!(path, vec!["approved", "in_progress", "shipped"]);
}

#[test]
fn close_path_task_backlog_is_direct_done() {
    let path = machines()
        .find_close_path(TicketType::Task, "backlog", None)
        .unwrap();
    assert_eq!(path, vec!["done"]);
}

#[test]
fn close_path_decision_open_is_decided() {
    let path = machines()
        .find_close_path(TicketType::Decision, "open", None)
        .unwrap();
    assert_eq!(path, vec!["decided"]);
}

#[test]
fn close_path_explicit_target_overrides_preference() {
    let path = machines()
        .find_close_path(TicketType::Bug, "triage", Some("wont_fix"))
        .unwrap();
    assert_eq!(path, vec!["wont_fix"]);
}

#[test]
fn close_path_explicit_unreachable_target_is_none() {
    // A bug can never end up "cancelled".
    assert!(machines()
        .find_close_path(TicketType::Bug, "triage", Some("cancelled"))
        .is_none());
}

#[test]
fn close_path_from_terminal_is_none() {
    assert!(machines()
        .find_close_path(TicketType::Task, "done", None)
        .is_none());
}

#[test]
fn close_path_from_unknown_status_is_none() {
    assert!(machines()
        .find_close_path(TicketType::Task, "bogus", None)
        .is_none());
}

#[test]
fn custom_machines_are_injectable() {
    let trivial = StateMachine::new(
        "new",
        &["closed"],
        &[("new", &["closed"]), ("closed", &[])],
    );
    let machines = StateMachines::new(
        trivial.clone(),
        trivial.clone(),
        trivial.clone(),
        trivial,
    );
    assert_eq!(machines.initial_status(TicketType::Bug), "new");
    let path = machines
        .find_close_path(TicketType::Bug, "new", None)
        .unwrap();
    assert_eq!(path, vec!["closed"]);
}
