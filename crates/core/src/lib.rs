// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Trk Contributors

//! trk-core: ticket-tracking backend core
//!
//! This crate provides the data types, SQLite storage, and business logic for
//! a multi-tenant ticket tracker: per-type lifecycle state machines, audit
//! history, ticket and context links, archival of stale closed tickets, and
//! the list/search/board query surface. Transports (REST, agent tool-calling)
//! marshal requests onto [`TicketService`] and are out of scope here.

pub mod batch;
pub mod db;
pub mod error;
pub mod link;
pub mod query;
pub mod service;
pub mod state;
pub mod ticket;

pub use batch::{BatchAction, BatchItem, BatchOutcome, BATCH_MAX};
pub use db::{Database, Namespace};
pub use error::{Error, Result};
pub use link::{ContextLink, ContextLinkType, LinkType, TicketLink, DEFAULT_CONTEXT_VERSION};
pub use query::{
    BoardColumn, BoardFilters, BoardMode, BoardView, CompactTicket, SearchFilters, SearchResults,
    TicketPage, BOARD_DESC_MAX,
};
pub use service::{TicketService, DEFAULT_ARCHIVE_TTL};
pub use state::{StateMachine, StateMachines};
pub use ticket::{HistoryEntry, ListFilters, NewTicket, Priority, Ticket, TicketPatch, TicketType};
