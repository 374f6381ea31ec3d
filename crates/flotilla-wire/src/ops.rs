//! Protocol opcodes, peer roles, and the forwarding decision type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The role a peer authenticates as when it connects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The scheduler itself (server side).
    Scheduler,
    /// Control-plane client that drives workload commands.
    Controller,
    /// Compute node agent.
    Agent,
    /// Network node agent.
    NetAgent,
    /// Concentrator instance agent, addressed by forwarded events only.
    CnciAgent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Scheduler => "scheduler",
            Role::Controller => "controller",
            Role::Agent => "agent",
            Role::NetAgent => "netagent",
            Role::CnciAgent => "cnciagent",
        };
        f.write_str(s)
    }
}

/// Command opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Start,
    Restart,
    Stop,
    Delete,
    Evacuate,
    Stats,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Command::Start => "START",
            Command::Restart => "RESTART",
            Command::Stop => "STOP",
            Command::Delete => "DELETE",
            Command::Evacuate => "EVACUATE",
            Command::Stats => "STATS",
        };
        f.write_str(s)
    }
}

/// Event opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    NodeConnected,
    NodeDisconnected,
    TenantAdded,
    TenantRemoved,
    PublicIpAssigned,
    TraceReport,
    InstanceDeleted,
    ConcentratorInstanceAdded,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Event::NodeConnected => "NodeConnected",
            Event::NodeDisconnected => "NodeDisconnected",
            Event::TenantAdded => "TenantAdded",
            Event::TenantRemoved => "TenantRemoved",
            Event::PublicIpAssigned => "PublicIPAssigned",
            Event::TraceReport => "TraceReport",
            Event::InstanceDeleted => "InstanceDeleted",
            Event::ConcentratorInstanceAdded => "ConcentratorInstanceAdded",
        };
        f.write_str(s)
    }
}

/// Error-frame opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorOp {
    StartFailure,
    StopFailure,
    RestartFailure,
}

impl fmt::Display for ErrorOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorOp::StartFailure => "StartFailure",
            ErrorOp::StopFailure => "StopFailure",
            ErrorOp::RestartFailure => "RestartFailure",
        };
        f.write_str(s)
    }
}

/// Peer status, carried on status frames and tracked per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Connected,
    Ready,
    Full,
    Offline,
    Maintenance,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Connected => "CONNECTED",
            Status::Ready => "READY",
            Status::Full => "FULL",
            Status::Offline => "OFFLINE",
            Status::Maintenance => "MAINTENANCE",
        };
        f.write_str(s)
    }
}

/// Any routable opcode, used to key declarative forward rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Command(Command),
    Event(Event),
    Error(ErrorOp),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Command(c) => c.fmt(f),
            Operand::Event(e) => e.fmt(f),
            Operand::Error(e) => e.fmt(f),
        }
    }
}

/// The outcome of a per-frame forwarding callback.
///
/// Either the frame is dropped, or it is delivered to exactly one named
/// recipient. Broadcast delivery is declared through forward rules instead
/// and never flows through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardDecision {
    /// Drop the frame.
    Discard,
    /// Deliver the frame to the peer with this UUID.
    Recipient(String),
}

impl ForwardDecision {
    pub fn is_discard(&self) -> bool {
        matches!(self, ForwardDecision::Discard)
    }
}
