//! Declarative forward rules.
//!
//! Each routable operand is mapped to exactly one action: broadcast the
//! frame to every connected peer of a role, or hand it to the
//! [`FrameHandler`](crate::FrameHandler) for a per-frame decision. Operands
//! with no rule are dropped.

use std::collections::HashMap;

use flotilla_wire::{Operand, Role};

/// What to do with frames carrying a given operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    /// Deliver a copy to every connected peer of this role.
    BroadcastTo(Role),
    /// Ask the frame handler for a forwarding decision.
    Handler,
}

/// Operand → action table, built once at startup.
#[derive(Debug, Default)]
pub struct RuleTable {
    rules: HashMap<Operand, RuleAction>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule; the last registration for an operand wins.
    pub fn add(mut self, operand: Operand, action: RuleAction) -> Self {
        self.rules.insert(operand, action);
        self
    }

    pub fn lookup(&self, operand: Operand) -> Option<RuleAction> {
        self.rules.get(&operand).copied()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
