//! YAML wire payloads.
//!
//! Only the fields the scheduler reads are modeled; unknown fields are
//! ignored on deserialization so agents and controllers can evolve their
//! payloads independently. Wrapper keys (`start:`, `restart:`, ...) follow
//! the cluster protocol's one-document-per-frame convention.

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::WireError;

/// Decode a YAML payload into a typed wire structure.
pub fn from_yaml<T: DeserializeOwned>(payload: &[u8]) -> Result<T, WireError> {
    Ok(serde_yaml::from_slice(payload)?)
}

/// Encode a wire structure as a YAML payload.
pub fn to_yaml<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    Ok(serde_yaml::to_string(value)?.into_bytes())
}

// ── Workload commands ──────────────────────────────────────────────

/// Resource types a START request may ask for.
///
/// The scheduler acts on `mem_mb` and `network_node`; the rest are carried
/// for the agents and ignored here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    MemMb,
    Vcpus,
    DiskMb,
    NetworkNode,
    #[serde(other)]
    Other,
}

/// One `{type, value}` pair from a START resource list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestedResource {
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub value: i64,
}

/// START command body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartWorkload {
    #[serde(default)]
    pub instance_uuid: String,
    #[serde(default)]
    pub requested_resources: Vec<RequestedResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartCommand {
    pub start: StartWorkload,
}

/// Shared body of RESTART / STOP / DELETE: names the instance and the agent
/// that owns it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkloadRef {
    #[serde(default)]
    pub instance_uuid: String,
    #[serde(default)]
    pub workload_agent_uuid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartCommand {
    pub restart: WorkloadRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopCommand {
    pub stop: WorkloadRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteCommand {
    pub delete: WorkloadRef,
}

/// EVACUATE names only the agent to drain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvacuateTarget {
    #[serde(default)]
    pub workload_agent_uuid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvacuateCommand {
    pub evacuate: EvacuateTarget,
}

// ── Telemetry ──────────────────────────────────────────────────────

/// READY status payload: a node's resource counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ready {
    #[serde(default)]
    pub node_uuid: String,
    #[serde(default)]
    pub mem_total_mb: i64,
    #[serde(default)]
    pub mem_available_mb: i64,
    #[serde(default)]
    pub disk_total_mb: i64,
    #[serde(default)]
    pub disk_available_mb: i64,
    #[serde(default)]
    pub load: i64,
    #[serde(default)]
    pub cpus_online: i64,
}

// ── Membership events ──────────────────────────────────────────────

/// Worker node flavor, as carried on membership events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    ComputeNode,
    NetworkNode,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::ComputeNode => f.write_str("compute_node"),
            NodeKind::NetworkNode => f.write_str("network_node"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMembership {
    pub node_uuid: String,
    pub node_type: NodeKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConnected {
    pub node_connected: NodeMembership,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDisconnected {
    pub node_disconnected: NodeMembership,
}

// ── Concentrator-directed events ───────────────────────────────────

/// Tenant lifecycle body; the scheduler reads only `concentrator_uuid`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantEvent {
    #[serde(default)]
    pub agent_uuid: String,
    #[serde(default)]
    pub tenant_uuid: String,
    #[serde(default)]
    pub concentrator_uuid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantAdded {
    pub tenant_added: TenantEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRemoved {
    pub tenant_removed: TenantEvent,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublicIpEvent {
    #[serde(default)]
    pub concentrator_uuid: String,
    #[serde(default)]
    pub instance_uuid: String,
    #[serde(default)]
    pub public_ip: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicIpAssigned {
    pub public_ip_assigned: PublicIpEvent,
}

// ── Error frames ───────────────────────────────────────────────────

/// Why a START could not be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    NoComputeNodes,
    NoNetworkNodes,
    FullCloud,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NoComputeNodes => f.write_str("no compute node available"),
            FailureReason::NoNetworkNodes => f.write_str("no network node available"),
            FailureReason::FullCloud => f.write_str("cloud at capacity"),
        }
    }
}

/// StartFailure error payload, sent back to the originating controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartFailure {
    pub instance_uuid: String,
    pub reason: FailureReason,
}
