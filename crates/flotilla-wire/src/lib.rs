//! flotilla-wire — the protocol surface shared by the scheduler and its peers.
//!
//! Defines the vocabulary of the cluster protocol:
//!
//! - Peer roles ([`Role`]) and per-peer status ([`Status`])
//! - Command, event, and error opcodes
//! - The YAML payloads the scheduler inspects ([`payloads`])
//! - The forwarding decision returned from per-frame callbacks
//!
//! Payloads are deliberately structural: the scheduler only parses the
//! fields it needs to validate and route a frame. Everything else passes
//! through opaque.

pub mod error;
pub mod ops;
pub mod payloads;

pub use error::WireError;
pub use ops::{Command, ErrorOp, Event, ForwardDecision, Operand, Role, Status};
pub use payloads::{
    from_yaml, to_yaml, DeleteCommand, EvacuateCommand, EvacuateTarget, FailureReason,
    NodeConnected, NodeDisconnected, NodeKind, NodeMembership, PublicIpAssigned,
    PublicIpEvent, Ready, RequestedResource, ResourceKind, RestartCommand, StartCommand,
    StartFailure, StartWorkload, StopCommand, TenantAdded, TenantEvent, TenantRemoved,
    WorkloadRef,
};
