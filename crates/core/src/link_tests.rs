// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Trk Contributors

#![allow(clippy::unwrap_used)]

use super::*;
use crate::service::TicketService;
use crate::ticket::{NewTicket, TicketType};
use yare::parameterized;

fn setup() -> (TicketService, Database, Namespace) {
    let mut db = Database::open_in_memory().unwrap();
    let ns = Namespace::new("test_project").unwrap();
    db.attach_in_memory(&ns).unwrap();
    (TicketService::default(), db, ns)
}

fn create(svc: &TicketService, db: &mut Database, ns: &Namespace, title: &str) -> i64 {
    svc.create(db, ns, NewTicket::new(TicketType::Task, title))
        .unwrap()
        .id
}

// LinkType parsing
#[parameterized(
    blocks = { "blocks", LinkType::Blocks },
    parent = { "parent", LinkType::Parent },
    related = { "related", LinkType::Related },
    duplicate = { "duplicate", LinkType::Duplicate },
    implements = { "implements", LinkType::Implements },
    references = { "references", LinkType::References },
    updates = { "updates", LinkType::Updates },
)]
fn link_type_from_str(input: &str, expected: LinkType) {
    assert_eq!(input.parse::<LinkType>().unwrap(), expected);
}

#[test]
fn link_type_from_str_invalid() {
    assert!(matches!(
        "follows".parse::<LinkType>(),
        Err(Error::InvalidLinkType(_))
    ));
}

#[test]
fn link_type_default_is_related() {
    assert_eq!(LinkType::default(), LinkType::Related);
}

#[parameterized(
    implements = { "implements", ContextLinkType::Implements },
    references = { "references", ContextLinkType::References },
    updates = { "updates", ContextLinkType::Updates },
    related = { "related", ContextLinkType::Related },
    unknown_falls_back = { "bogus", ContextLinkType::Related },
    empty_falls_back = { "", ContextLinkType::Related },
)]
fn context_link_type_parse_lenient(input: &str, expected: ContextLinkType) {
    assert_eq!(ContextLinkType::parse_lenient(input), expected);
}

// Ticket links
#[test]
fn add_link_enriches_with_target_display() {
    let (svc, mut db, ns) = setup();
    let a = create(&svc, &mut db, &ns, "Blocker");
    let b = create(&svc, &mut db, &ns, "Blocked");

    let link = add_link(&mut db, &ns, a, b, LinkType::Blocks).unwrap();
    assert_eq!(link.source_id, a);
    assert_eq!(link.target_id, b);
    assert_eq!(link.link_type, LinkType::Blocks);
    assert_eq!(link.target_title.as_deref(), Some("Blocked"));
    assert_eq!(link.target_status.as_deref(), Some("backlog"));
}

#[test]
fn add_link_missing_ticket_is_not_found() {
    let (svc, mut db, ns) = setup();
    let a = create(&svc, &mut db, &ns, "Lonely");
    assert!(matches!(
        add_link(&mut db, &ns, a, 999, LinkType::Related),
        Err(Error::TicketNotFound(999))
    ));
    assert!(matches!(
        add_link(&mut db, &ns, 998, a, LinkType::Related),
        Err(Error::TicketNotFound(998))
    ));
}

#[test]
fn duplicate_link_triple_is_rejected() {
    let (svc, mut db, ns) = setup();
    let a = create(&svc, &mut db, &ns, "A");
    let b = create(&svc, &mut db, &ns, "B");

    add_link(&mut db, &ns, a, b, LinkType::Related).unwrap();
    assert!(add_link(&mut db, &ns, a, b, LinkType::Related).is_err());
    // Same pair with a different type is a distinct edge.
    assert!(add_link(&mut db, &ns, a, b, LinkType::Blocks).is_ok());
}

#[test]
fn links_are_listed_bidirectionally() {
    let (svc, mut db, ns) = setup();
    let a = create(&svc, &mut db, &ns, "Source");
    let b = create(&svc, &mut db, &ns, "Target");
    add_link(&mut db, &ns, a, b, LinkType::Blocks).unwrap();

    // From the source's side the peer is the target.
    let from_a = links_for_ticket(&db, &ns, a).unwrap();
    assert_eq!(from_a.len(), 1);
    assert_eq!(from_a[0].target_title.as_deref(), Some("Target"));

    // From the target's side the peer is the source.
    let from_b = links_for_ticket(&db, &ns, b).unwrap();
    assert_eq!(from_b.len(), 1);
    assert_eq!(from_b[0].target_title.as_deref(), Some("Source"));
}

#[test]
fn get_populates_ticket_links() {
    let (svc, mut db, ns) = setup();
    let a = create(&svc, &mut db, &ns, "A");
    let b = create(&svc, &mut db, &ns, "B");
    add_link(&mut db, &ns, a, b, LinkType::Related).unwrap();

    let ticket = svc.get(&db, &ns, a).unwrap();
    assert_eq!(ticket.links.len(), 1);
}

#[test]
fn remove_link_is_idempotent() {
    let (svc, mut db, ns) = setup();
    let a = create(&svc, &mut db, &ns, "A");
    let b = create(&svc, &mut db, &ns, "B");
    let link = add_link(&mut db, &ns, a, b, LinkType::Related).unwrap();

    assert!(remove_link(&mut db, &ns, link.id).unwrap());
    assert!(!remove_link(&mut db, &ns, link.id).unwrap());
    assert!(links_for_ticket(&db, &ns, a).unwrap().is_empty());
}

// Context links
#[test]
fn add_context_link_defaults_version_to_latest() {
    let (svc, mut db, ns) = setup();
    let t = create(&svc, &mut db, &ns, "Implements auth");

    let link = add_context_link(&mut db, &ns, t, "auth_rules", None, ContextLinkType::Implements)
        .unwrap();
    assert_eq!(link.context_label, "auth_rules");
    assert_eq!(link.context_version, DEFAULT_CONTEXT_VERSION);
    assert_eq!(link.link_type, ContextLinkType::Implements);
    assert_eq!(link.ticket_title.as_deref(), Some("Implements auth"));
    assert_eq!(link.ticket_status.as_deref(), Some("backlog"));
}

#[test]
fn add_context_link_missing_ticket_is_not_found() {
    let (_svc, mut db, ns) = setup();
    assert!(matches!(
        add_context_link(&mut db, &ns, 42, "spec", None, ContextLinkType::Related),
        Err(Error::TicketNotFound(42))
    ));
}

#[test]
fn duplicate_context_link_key_is_rejected() {
    let (svc, mut db, ns) = setup();
    let t = create(&svc, &mut db, &ns, "T");

    add_context_link(&mut db, &ns, t, "spec", Some("v1"), ContextLinkType::Related).unwrap();
    // Same (ticket, label, version) is unique regardless of link type.
    assert!(
        add_context_link(&mut db, &ns, t, "spec", Some("v1"), ContextLinkType::Updates).is_err()
    );
    // A different version is fine.
    assert!(
        add_context_link(&mut db, &ns, t, "spec", Some("v2"), ContextLinkType::Related).is_ok()
    );
}

#[test]
fn context_links_for_ticket_lists_all() {
    let (svc, mut db, ns) = setup();
    let t = create(&svc, &mut db, &ns, "T");
    add_context_link(&mut db, &ns, t, "auth_rules", None, ContextLinkType::Implements).unwrap();
    add_context_link(&mut db, &ns, t, "api_spec", None, ContextLinkType::References).unwrap();

    let links = context_links_for_ticket(&db, &ns, t).unwrap();
    assert_eq!(links.len(), 2);
}

#[test]
fn tickets_for_context_filters_by_version() {
    let (svc, mut db, ns) = setup();
    let t1 = create(&svc, &mut db, &ns, "One");
    let t2 = create(&svc, &mut db, &ns, "Two");
    add_context_link(&mut db, &ns, t1, "spec", Some("v1"), ContextLinkType::Related).unwrap();
    add_context_link(&mut db, &ns, t2, "spec", Some("v2"), ContextLinkType::Related).unwrap();

    let all = tickets_for_context(&db, &ns, "spec", None).unwrap();
    assert_eq!(all.len(), 2);

    let v1_only = tickets_for_context(&db, &ns, "spec", Some("v1")).unwrap();
    assert_eq!(v1_only.len(), 1);
    assert_eq!(v1_only[0].ticket_id, t1);
}

#[test]
fn remove_context_link_is_idempotent() {
    let (svc, mut db, ns) = setup();
    let t = create(&svc, &mut db, &ns, "T");
    let link = add_context_link(&mut db, &ns, t, "spec", None, ContextLinkType::Related).unwrap();

    assert!(remove_context_link(&mut db, &ns, link.id).unwrap());
    assert!(!remove_context_link(&mut db, &ns, link.id).unwrap());
}
