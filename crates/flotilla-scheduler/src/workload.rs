//! Workload resource demands, derived from START payloads.

use thiserror::Error;

use flotilla_wire::{NodeKind, ResourceKind, StartWorkload};

/// What a START asks the scheduler for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadRequest {
    pub instance_uuid: String,
    pub mem_req_mb: i64,
    /// Which fleet the instance lands on.
    pub target: NodeKind,
}

/// Validation failures for a START resource list.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("memory demand {0} MB must be > 0")]
    InvalidMemory(i64),

    #[error("network_node flag {0} must be 0 or 1")]
    InvalidNetworkFlag(i64),
}

impl WorkloadRequest {
    /// Walk the requested resource list and validate the demands the
    /// scheduler acts on. Unrecognized resource types pass through for the
    /// agent to interpret.
    pub fn from_start(start: &StartWorkload) -> Result<Self, RequestError> {
        let mut mem_req_mb = 0i64;
        let mut network_node = 0i64;

        for resource in &start.requested_resources {
            match resource.kind {
                ResourceKind::MemMb => mem_req_mb = resource.value,
                ResourceKind::NetworkNode => network_node = resource.value,
                _ => {}
            }
        }

        if mem_req_mb <= 0 {
            return Err(RequestError::InvalidMemory(mem_req_mb));
        }
        if network_node != 0 && network_node != 1 {
            return Err(RequestError::InvalidNetworkFlag(network_node));
        }

        Ok(Self {
            instance_uuid: start.instance_uuid.clone(),
            mem_req_mb,
            target: if network_node == 1 {
                NodeKind::NetworkNode
            } else {
                NodeKind::ComputeNode
            },
        })
    }
}
