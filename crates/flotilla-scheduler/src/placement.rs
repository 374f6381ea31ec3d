//! Placement: pick a node for a workload.
//!
//! Policy is first-fit with rotation, not bin-packing: the cursor over the
//! compute sequence advances past the last pick so back-to-back STARTs
//! spread across the fleet instead of piling onto one node, without queues
//! or full-fleet scoring.
//!
//! A successful pick returns the node still locked. The caller claims the
//! requested memory and releases the lock in one step ([`PickedNode::claim`]),
//! so the fit check and the claim are atomic with respect to other picks and
//! telemetry updates. The claim is speculative: the node's next READY report
//! overwrites it with ground truth.

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::RawMutex;

use flotilla_wire::{FailureReason, Status};

use crate::registry::{ComputeRegistry, MruCursor, NetworkRegistry, NodeState};
use crate::workload::WorkloadRequest;

/// A chosen node, returned with its state lock held.
pub struct PickedNode {
    uuid: String,
    guard: ArcMutexGuard<RawMutex, NodeState>,
}

impl std::fmt::Debug for PickedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickedNode")
            .field("uuid", &self.uuid)
            .field("guard", &*self.guard)
            .finish()
    }
}

impl PickedNode {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Subtract the workload's memory demand from the node and release it.
    /// Returns the node's UUID for the forwarding decision.
    pub fn claim(mut self, mem_req_mb: i64) -> String {
        self.guard.mem_avail_mb -= mem_req_mb;
        self.uuid
    }
}

/// A node fits iff it has reported READY and advertises enough memory.
/// Disk, CPU, and load are informational only.
fn fits(state: &NodeState, workload: &WorkloadRequest) -> bool {
    state.status == Status::Ready && state.mem_avail_mb >= workload.mem_req_mb
}

/// Pick a compute node: first fit, scanning forward from the rotation
/// cursor and wrapping to a full scan when nothing past it fits.
pub fn pick_compute_node(
    registry: &ComputeRegistry,
    workload: &WorkloadRequest,
) -> Result<PickedNode, FailureReason> {
    let table = registry.table.read();
    if table.ordered.is_empty() {
        return Err(FailureReason::NoComputeNodes);
    }

    let mut mru = registry.mru.lock();

    // Single-node cluster: nothing to rotate over.
    if table.ordered.len() == 1 {
        let node = &table.ordered[0];
        let guard = node.state.lock_arc();
        if fits(&guard, workload) {
            return Ok(PickedNode {
                uuid: node.uuid.clone(),
                guard,
            });
        }
        return Err(FailureReason::FullCloud);
    }

    // First pass: nodes after the cursor.
    if let Some(cursor) = mru.clone() {
        if cursor.index + 1 < table.ordered.len() {
            for (offset, node) in table.ordered[cursor.index + 1..].iter().enumerate() {
                if node.uuid == cursor.uuid {
                    continue;
                }
                let guard = node.state.lock_arc();
                if fits(&guard, workload) {
                    *mru = Some(MruCursor {
                        index: cursor.index + 1 + offset,
                        uuid: node.uuid.clone(),
                    });
                    return Ok(PickedNode {
                        uuid: node.uuid.clone(),
                        guard,
                    });
                }
            }
        }
    }

    // Second pass: the whole sequence, cursor included.
    for (index, node) in table.ordered.iter().enumerate() {
        let guard = node.state.lock_arc();
        if fits(&guard, workload) {
            *mru = Some(MruCursor {
                index,
                uuid: node.uuid.clone(),
            });
            return Ok(PickedNode {
                uuid: node.uuid.clone(),
                guard,
            });
        }
    }

    Err(FailureReason::FullCloud)
}

/// Pick a network node: any fitting node, preferring not to repeat the last
/// pick while more than one node is connected.
pub fn pick_network_node(
    registry: &NetworkRegistry,
    workload: &WorkloadRequest,
) -> Result<PickedNode, FailureReason> {
    let nodes = registry.nodes.read();
    if nodes.is_empty() {
        return Err(FailureReason::NoNetworkNodes);
    }

    let mut mru = registry.mru.lock();

    for node in nodes.values() {
        let is_last_pick = matches!(mru.as_deref(), Some(last) if last == node.uuid);
        if nodes.len() > 1 && is_last_pick {
            continue;
        }

        let guard = node.state.lock_arc();
        if fits(&guard, workload) {
            *mru = Some(node.uuid.clone());
            return Ok(PickedNode {
                uuid: node.uuid.clone(),
                guard,
            });
        }
    }

    Err(FailureReason::NoNetworkNodes)
}
