// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Trk Contributors

#![allow(clippy::unwrap_used)]

use super::*;
use crate::ticket::NewTicket;

fn setup() -> (TicketService, Database, Namespace) {
    let mut db = Database::open_in_memory().unwrap();
    let ns = Namespace::new("test_project").unwrap();
    db.attach_in_memory(&ns).unwrap();
    (TicketService::default(), db, ns)
}

fn create_tasks(svc: &TicketService, db: &mut Database, ns: &Namespace, n: usize) -> Vec<i64> {
    (0..n)
        .map(|i| {
            svc.create(db, ns, NewTicket::new(TicketType::Task, format!("Task {i}")))
                .unwrap()
                .id
        })
        .collect()
}

// Size cap
#[test]
fn batch_of_exactly_50_is_accepted() {
    let (svc, mut db, ns) = setup();
    let ids = create_tasks(&svc, &mut db, &ns, BATCH_MAX);
    let outcome = svc
        .batch_transition(&mut db, &ns, &ids, "in_progress", true, None)
        .unwrap();
    assert_eq!(outcome.total, 50);
    assert_eq!(outcome.succeeded, 50);
    assert_eq!(outcome.failed, 0);
}

#[test]
fn batch_of_51_fails_wholesale() {
    let (svc, mut db, ns) = setup();
    let ids: Vec<i64> = (1..=51).collect();
    let outcome = svc
        .batch_transition(&mut db, &ns, &ids, "in_progress", true, None)
        .unwrap();
    assert_eq!(outcome.total, 51);
    assert_eq!(outcome.succeeded, 0);
    assert_eq!(outcome.failed, 51);
    assert_eq!(outcome.results.len(), 1);
    let item = &outcome.results[0];
    assert_eq!(item.ticket_id, 0);
    assert!(!item.success);
    assert!(item.error.as_ref().unwrap().contains("exceeds max 50"));
}

// batch_transition
#[test]
fn batch_transition_preview_does_not_mutate() {
    let (svc, mut db, ns) = setup();
    let ids = create_tasks(&svc, &mut db, &ns, 3);

    let outcome = svc
        .batch_transition(&mut db, &ns, &ids, "in_progress", false, None)
        .unwrap();
    assert!(outcome.dry_run);
    assert_eq!(outcome.succeeded, 3);
    for item in &outcome.results {
        assert_eq!(item.old_status.as_deref(), Some("backlog"));
        assert_eq!(item.new_status.as_deref(), Some("in_progress"));
    }
    // Nothing actually moved.
    for id in ids {
        assert_eq!(svc.get(&db, &ns, id).unwrap().status, "backlog");
    }
}

#[test]
fn batch_transition_confirm_executes() {
    let (svc, mut db, ns) = setup();
    let ids = create_tasks(&svc, &mut db, &ns, 3);

    let outcome = svc
        .batch_transition(&mut db, &ns, &ids, "in_progress", true, Some("ava"))
        .unwrap();
    assert!(!outcome.dry_run);
    assert_eq!(outcome.succeeded, 3);
    for id in ids {
        let ticket = svc.get(&db, &ns, id).unwrap();
        assert_eq!(ticket.status, "in_progress");
        assert_eq!(ticket.history[0].changed_by.as_deref(), Some("ava"));
    }
}

#[test]
fn batch_transition_isolates_per_item_failures() {
    let (svc, mut db, ns) = setup();
    let ok = create_tasks(&svc, &mut db, &ns, 1)[0];
    let bug = svc
        .create(&mut db, &ns, NewTicket::new(TicketType::Bug, "Wrong graph"))
        .unwrap()
        .id;
    let ids = vec![ok, 9999, bug];

    let outcome = svc
        .batch_transition(&mut db, &ns, &ids, "in_progress", true, None)
        .unwrap();
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.failed, 2);

    let missing = &outcome.results[1];
    assert_eq!(missing.error.as_deref(), Some("Ticket not found"));
    assert!(missing.old_status.is_none());

    // triage -> in_progress is not a bug edge; failure carries old_status.
    let invalid = &outcome.results[2];
    assert!(!invalid.success);
    assert_eq!(invalid.old_status.as_deref(), Some("triage"));
    assert!(invalid.error.as_ref().unwrap().contains("Cannot transition bug"));

    // The valid one still went through.
    assert_eq!(svc.get(&db, &ns, ok).unwrap().status, "in_progress");
}

// batch_close
#[test]
fn batch_close_walks_multi_hop_paths() {
    let (svc, mut db, ns) = setup();
    let bug = svc
        .create(&mut db, &ns, NewTicket::new(TicketType::Bug, "Deep close"))
        .unwrap()
        .id;

    let outcome = svc.batch_close(&mut db, &ns, &[bug], true, None, None).unwrap();
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.results[0].old_status.as_deref(), Some("triage"));
    assert_eq!(outcome.results[0].new_status.as_deref(), Some("resolved"));

    let ticket = svc.get(&db, &ns, bug).unwrap();
    assert_eq!(ticket.status, "resolved");
    assert!(ticket.closed_at.is_some());
    // One history row per hop: confirmed, in_progress, resolved.
    let hops: Vec<&str> = ticket
        .history
        .iter()
        .rev()
        .filter(|h| h.field_name == "status")
        .map(|h| h.new_value.as_deref().unwrap())
        .collect();
    assert_eq!(hops, vec!["confirmed", "in_progress", "resolved"]);
}

#[test]
fn batch_close_preview_reports_final_status_without_mutating() {
    let (svc, mut db, ns) = setup();
    let bug = svc
        .create(&mut db, &ns, NewTicket::new(TicketType::Bug, "Preview"))
        .unwrap()
        .id;

    let outcome = svc.batch_close(&mut db, &ns, &[bug], false, None, None).unwrap();
    assert!(outcome.dry_run);
    assert_eq!(outcome.results[0].new_status.as_deref(), Some("resolved"));
    assert_eq!(svc.get(&db, &ns, bug).unwrap().status, "triage");
}

#[test]
fn batch_close_already_terminal_succeeds_in_place() {
    let (svc, mut db, ns) = setup();
    let task = create_tasks(&svc, &mut db, &ns, 1)[0];
    svc.transition(&mut db, &ns, task, "done", None).unwrap();

    let outcome = svc.batch_close(&mut db, &ns, &[task], true, None, None).unwrap();
    assert_eq!(outcome.succeeded, 1);
    let item = &outcome.results[0];
    assert_eq!(item.old_status.as_deref(), Some("done"));
    assert_eq!(item.new_status.as_deref(), Some("done"));
}

#[test]
fn batch_close_honors_explicit_resolution() {
    let (svc, mut db, ns) = setup();
    let bug = svc
        .create(&mut db, &ns, NewTicket::new(TicketType::Bug, "Won't fix"))
        .unwrap()
        .id;

    let outcome = svc
        .batch_close(&mut db, &ns, &[bug], true, None, Some("wont_fix"))
        .unwrap();
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(svc.get(&db, &ns, bug).unwrap().status, "wont_fix");
}

#[test]
fn batch_close_reports_unreachable_resolution() {
    let (svc, mut db, ns) = setup();
    let bug = svc
        .create(&mut db, &ns, NewTicket::new(TicketType::Bug, "No cancel"))
        .unwrap()
        .id;

    let outcome = svc
        .batch_close(&mut db, &ns, &[bug], true, None, Some("cancelled"))
        .unwrap();
    assert_eq!(outcome.failed, 1);
    assert!(outcome.results[0]
        .error
        .as_ref()
        .unwrap()
        .contains("No path to terminal"));
    assert_eq!(svc.get(&db, &ns, bug).unwrap().status, "triage");
}

#[test]
fn batch_close_missing_ticket_is_per_item_failure() {
    let (svc, mut db, ns) = setup();
    let outcome = svc.batch_close(&mut db, &ns, &[404], true, None, None).unwrap();
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.results[0].error.as_deref(), Some("Ticket not found"));
}
