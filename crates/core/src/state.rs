// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Trk Contributors

//! Per-type status state machines.
//!
//! Each ticket type has its own directed graph of statuses: an initial
//! status, a set of terminal statuses, and an ordered transition table.
//! The configuration is immutable once constructed; services hold a shared
//! read-only copy and validate every status change against it.

use std::collections::{HashSet, VecDeque};

use crate::error::{Error, Result};
use crate::ticket::TicketType;

/// Terminal statuses that represent a positive outcome, in preference order.
/// `find_close_path` steers toward these when no explicit target is given.
const POSITIVE_TERMINALS: [&str; 4] = ["done", "resolved", "shipped", "decided"];

/// One ticket type's status graph.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMachine {
    initial: String,
    terminal: Vec<String>,
    /// Transition table in declaration order. Board column ordering and
    /// close-target selection depend on this order, so it is a Vec rather
    /// than a map.
    transitions: Vec<(String, Vec<String>)>,
}

impl StateMachine {
    /// Build a machine from a literal transition table.
    pub fn new(initial: &str, terminal: &[&str], transitions: &[(&str, &[&str])]) -> Self {
        StateMachine {
            initial: initial.to_string(),
            terminal: terminal.iter().map(|s| s.to_string()).collect(),
            transitions: transitions
                .iter()
                .map(|(from, to)| {
                    (
                        from.to_string(),
                        to.iter().map(|s| s.to_string()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// The status assigned to newly created tickets.
    pub fn initial(&self) -> &str {
        &self.initial
    }

    /// Terminal (closed) statuses, in declaration order.
    pub fn terminal(&self) -> &[String] {
        &self.terminal
    }

    pub fn is_terminal(&self, status: &str) -> bool {
        self.terminal.iter().any(|t| t == status)
    }

    /// All statuses, in transition-table declaration order.
    pub fn statuses(&self) -> Vec<&str> {
        self.transitions.iter().map(|(s, _)| s.as_str()).collect()
    }

    /// Allowed transition targets from `status`, or None for an unknown status.
    pub fn targets(&self, status: &str) -> Option<&[String]> {
        self.transitions
            .iter()
            .find(|(from, _)| from == status)
            .map(|(_, to)| to.as_slice())
    }
}

/// Immutable per-type state machine configuration.
///
/// Constructed once at startup (usually via [`StateMachines::standard`]) and
/// shared read-only; never mutated at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMachines {
    task: StateMachine,
    bug: StateMachine,
    feature: StateMachine,
    decision: StateMachine,
}

impl Default for StateMachines {
    fn default() -> Self {
        StateMachines::standard()
    }
}

impl StateMachines {
    /// Custom per-type machines (injectable configuration).
    pub fn new(
        task: StateMachine,
        bug: StateMachine,
        feature: StateMachine,
        decision: StateMachine,
    ) -> Self {
        StateMachines {
            task,
            bug,
            feature,
            decision,
        }
    }

    /// The standard lifecycle graphs for all four ticket types.
    pub fn standard() -> Self {
        StateMachines {
            task: StateMachine::new(
                "backlog",
                &["done", "cancelled"],
                &[
                    ("backlog", &["in_progress", "done", "cancelled"]),
                    ("in_progress", &["done", "cancelled"]),
                    ("done", &[]),
                    ("cancelled", &[]),
                ],
            ),
            bug: StateMachine::new(
                "triage",
                &["resolved", "wont_fix"],
                &[
                    ("triage", &["confirmed", "wont_fix"]),
                    ("confirmed", &["in_progress"]),
                    ("in_progress", &["resolved", "wont_fix"]),
                    ("resolved", &[]),
                    ("wont_fix", &[]),
                ],
            ),
            feature: StateMachine::new(
                "proposed",
                &["shipped", "rejected"],
                &[
                    ("proposed", &["approved", "rejected"]),
                    ("approved", &["in_progress"]),
                    ("in_progress", &["shipped", "rejected"]),
                    ("shipped", &[]),
                    ("rejected", &[]),
                ],
            ),
            decision: StateMachine::new(
                "open",
                &["decided", "deferred"],
                &[
                    ("open", &["decided", "deferred"]),
                    ("decided", &[]),
                    // Deferred decisions can be reopened.
                    ("deferred", &["open"]),
                ],
            ),
        }
    }

    /// The state machine for a ticket type.
    pub fn machine(&self, ticket_type: TicketType) -> &StateMachine {
        match ticket_type {
            TicketType::Task => &self.task,
            TicketType::Bug => &self.bug,
            TicketType::Feature => &self.feature,
            TicketType::Decision => &self.decision,
        }
    }

    /// The status assigned to newly created tickets of this type.
    pub fn initial_status(&self, ticket_type: TicketType) -> &str {
        self.machine(ticket_type).initial()
    }

    /// Terminal (closed) statuses for a ticket type.
    pub fn terminal_statuses(&self, ticket_type: TicketType) -> &[String] {
        self.machine(ticket_type).terminal()
    }

    /// All valid statuses for a ticket type, in declaration order.
    pub fn all_statuses(&self, ticket_type: TicketType) -> Vec<&str> {
        self.machine(ticket_type).statuses()
    }

    /// The union of terminal statuses across all ticket types, sorted and
    /// deduplicated.
    pub fn all_terminal_statuses(&self) -> Vec<String> {
        let mut terminals: Vec<String> = [&self.task, &self.bug, &self.feature, &self.decision]
            .iter()
            .flat_map(|m| m.terminal().iter().cloned())
            .collect();
        terminals.sort();
        terminals.dedup();
        terminals
    }

    /// Check whether `from -> to` is a legal transition, without failing.
    pub fn can_transition(&self, ticket_type: TicketType, from: &str, to: &str) -> bool {
        self.machine(ticket_type)
            .targets(from)
            .is_some_and(|allowed| allowed.iter().any(|t| t == to))
    }

    /// Validate a status transition against the state machine.
    ///
    /// Fails with [`Error::UnknownStatus`] when `from` is not a status of
    /// this type, and [`Error::InvalidTransition`] when `to` is not among
    /// the allowed targets.
    pub fn validate_transition(
        &self,
        ticket_type: TicketType,
        from: &str,
        to: &str,
    ) -> Result<()> {
        let machine = self.machine(ticket_type);
        let Some(allowed) = machine.targets(from) else {
            return Err(Error::UnknownStatus {
                ticket_type: ticket_type.to_string(),
                status: from.to_string(),
                valid: machine.statuses().join(", "),
            });
        };
        if !allowed.iter().any(|t| t == to) {
            return Err(Error::InvalidTransition {
                ticket_type: ticket_type.to_string(),
                from: from.to_string(),
                to: to.to_string(),
                allowed: allowed.join(", "),
            });
        }
        Ok(())
    }

    /// Find the shortest status sequence from `from` to a terminal status.
    ///
    /// Breadth-first search over the transition graph; the returned path
    /// excludes `from` and ends in a terminal status. With an explicit
    /// target, the shortest path ending exactly there is returned (None if
    /// unreachable). Without one, a positive-outcome terminal (done,
    /// resolved, shipped, decided) is preferred over a negative one even
    /// when the negative terminal is nearer; remaining ties are broken by
    /// the machine's terminal declaration order.
    ///
    /// Returns None when `from` is already terminal, unknown, or no terminal
    /// is reachable.
    pub fn find_close_path(
        &self,
        ticket_type: TicketType,
        from: &str,
        explicit_target: Option<&str>,
    ) -> Option<Vec<String>> {
        let machine = self.machine(ticket_type);
        if machine.is_terminal(from) {
            return None;
        }
        machine.targets(from)?;

        // BFS visiting each status once, recording the first (shortest) path
        // that reaches each terminal.
        let mut reached: Vec<Vec<String>> = Vec::new();
        let mut visited: HashSet<String> = HashSet::from([from.to_string()]);
        let mut queue: VecDeque<(String, Vec<String>)> = VecDeque::new();
        queue.push_back((from.to_string(), Vec::new()));

        while let Some((status, path)) = queue.pop_front() {
            let Some(targets) = machine.targets(&status) else {
                continue;
            };
            for next in targets {
                if !visited.insert(next.clone()) {
                    continue;
                }
                let mut next_path = path.clone();
                next_path.push(next.clone());
                if machine.is_terminal(next) {
                    if explicit_target == Some(next.as_str()) {
                        return Some(next_path);
                    }
                    reached.push(next_path.clone());
                }
                queue.push_back((next.clone(), next_path));
            }
        }

        if explicit_target.is_some() {
            return None;
        }
        // Reach order is by depth, so the first match per bucket is shortest.
        for positive in POSITIVE_TERMINALS {
            if let Some(path) = reached
                .iter()
                .find(|p| p.last().map(String::as_str) == Some(positive))
            {
                return Some(path.clone());
            }
        }
        for terminal in machine.terminal() {
            if let Some(path) = reached.iter().find(|p| p.last() == Some(terminal)) {
                return Some(path.clone());
            }
        }
        reached.into_iter().next()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
