//! flotilla-scheduler — the cluster's in-memory placement and forwarding
//! engine.
//!
//! The scheduler sits between controllers (the control plane) and the agent
//! fleet on compute and network nodes. Controllers drive workload lifecycle
//! commands; agents report telemetry and instance events. This crate:
//!
//! - Tracks connected controllers and runs master/backup election
//! - Tracks compute and network nodes with their latest resource counters
//! - Picks a placement node per START (first-fit, rotated for spread) and
//!   claims the memory speculatively until the next telemetry report
//! - Routes lifecycle commands and concentrator-directed events to the right
//!   peer without deserializing more than it must
//!
//! Everything is memory-only: a restart begins with empty registries and the
//! fleet re-registers through the transport.
//!
//! # Locking
//!
//! Each registry has a reader/writer lock; each node has its own lock for
//! telemetry. Lock order is controllers → compute → network → node, and no
//! lock is ever held across a transport send: fan-out snapshots the
//! controller list first.

pub mod controllers;
pub mod heartbeat;
pub mod placement;
pub mod registry;
pub mod scheduler;
pub mod workload;

mod commands;
mod events;

pub use controllers::{ControllerRegistry, ControllerRole};
pub use placement::{pick_compute_node, pick_network_node, PickedNode};
pub use registry::{ComputeRegistry, ComputeSummary, NetworkRegistry, NodeState};
pub use scheduler::Scheduler;
pub use workload::{RequestError, WorkloadRequest};
