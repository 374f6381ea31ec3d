//! The scheduler facade: transport callbacks in, forwarding decisions and
//! frames out.
//!
//! This is the only place the core touches the transport. Registry writers
//! are released before any send; controller fan-out works from a snapshot
//! of the controller list.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use flotilla_net::{FrameHandler, FrameSink};
use flotilla_wire::{
    from_yaml, to_yaml, Command, ErrorOp, Event, FailureReason, ForwardDecision, NodeConnected,
    NodeDisconnected, NodeKind, NodeMembership, Ready, Role, StartCommand, StartFailure, Status,
};

use crate::commands;
use crate::controllers::{ControllerRegistry, ControllerRole};
use crate::events;
use crate::placement::{pick_compute_node, pick_network_node};
use crate::registry::{ComputeRegistry, NetworkRegistry};
use crate::workload::WorkloadRequest;

/// The central scheduler state: three registries and the send surface.
pub struct Scheduler {
    controllers: ControllerRegistry,
    compute: ComputeRegistry,
    network: NetworkRegistry,
    sink: Arc<dyn FrameSink>,
}

impl Scheduler {
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            controllers: ControllerRegistry::new(),
            compute: ComputeRegistry::new(),
            network: NetworkRegistry::new(),
            sink,
        }
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    pub fn compute(&self) -> &ComputeRegistry {
        &self.compute
    }

    pub fn network(&self) -> &NetworkRegistry {
        &self.network
    }

    /// Tell every controller a node joined or left. Best-effort: a
    /// controller that misses one re-syncs through the STATS broadcast.
    async fn broadcast_node_event(&self, node_uuid: &str, kind: NodeKind, connected: bool) {
        let membership = NodeMembership {
            node_uuid: node_uuid.to_string(),
            node_type: kind,
        };
        let (op, payload) = if connected {
            (
                Event::NodeConnected,
                to_yaml(&NodeConnected {
                    node_connected: membership,
                }),
            )
        } else {
            (
                Event::NodeDisconnected,
                to_yaml(&NodeDisconnected {
                    node_disconnected: membership,
                }),
            )
        };

        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "node membership payload encode failed");
                return;
            }
        };

        for controller in self.controllers.uuids() {
            if let Err(e) = self
                .sink
                .send_event(&controller, op, payload.clone())
                .await
            {
                debug!(%controller, error = %e, "membership event not delivered");
            }
        }
    }

    async fn send_start_failure(&self, controller: &str, instance: &str, reason: FailureReason) {
        error!(instance_uuid = %instance, %reason, "unable to place workload");

        let failure = StartFailure {
            instance_uuid: instance.to_string(),
            reason,
        };
        match to_yaml(&failure) {
            Ok(payload) => {
                if let Err(e) = self
                    .sink
                    .send_error(controller, ErrorOp::StartFailure, payload)
                    .await
                {
                    warn!(%controller, error = %e, "start failure not delivered");
                }
            }
            Err(e) => error!(error = %e, "start failure payload encode failed"),
        }
    }

    /// Place a START. On success the chosen node's memory is claimed before
    /// its lock is released, so a burst of STARTs spreads instead of landing
    /// on one node; the node's next READY report restores ground truth.
    async fn start_workload(&self, controller: &str, payload: &[u8]) -> (ForwardDecision, String) {
        let start: StartCommand = match from_yaml(payload) {
            Ok(cmd) => cmd,
            Err(e) => {
                error!(%controller, error = %e, "bad START payload");
                return (ForwardDecision::Discard, String::new());
            }
        };

        let workload = match WorkloadRequest::from_start(&start.start) {
            Ok(workload) => workload,
            Err(e) => {
                error!(%controller, error = %e, "invalid START resource demand");
                return (ForwardDecision::Discard, String::new());
            }
        };
        let instance = workload.instance_uuid.clone();

        let placed = match workload.target {
            NodeKind::ComputeNode => pick_compute_node(&self.compute, &workload)
                .map(|node| node.claim(workload.mem_req_mb)),
            NodeKind::NetworkNode => pick_network_node(&self.network, &workload)
                .map(|node| node.claim(workload.mem_req_mb)),
        };

        match placed {
            Ok(node_uuid) => {
                debug!(instance_uuid = %instance, node = %node_uuid, "workload placed");
                (ForwardDecision::Recipient(node_uuid), instance)
            }
            Err(reason) => {
                // Not queued or retried: the controller owns recovery.
                self.send_start_failure(controller, &instance, reason).await;
                (ForwardDecision::Discard, instance)
            }
        }
    }

    fn relay_command(&self, op: Command, payload: &[u8]) -> (ForwardDecision, String) {
        match commands::relay_target(op, payload) {
            Ok((instance, agent)) if !agent.is_empty() => {
                debug!(command = %op, %agent, "forwarding controller command");
                (ForwardDecision::Recipient(agent), instance)
            }
            Ok((instance, _)) => {
                error!(command = %op, "command names no workload agent");
                (ForwardDecision::Discard, instance)
            }
            Err(e) => {
                error!(command = %op, error = %e, "bad command payload");
                (ForwardDecision::Discard, String::new())
            }
        }
    }
}

#[async_trait]
impl FrameHandler for Scheduler {
    async fn on_connect(&self, uuid: &str, role: Role) {
        match role {
            Role::Controller => {
                self.controllers.connect(uuid);
            }
            Role::Agent => {
                if self.compute.connect(uuid) {
                    self.broadcast_node_event(uuid, NodeKind::ComputeNode, true)
                        .await;
                }
            }
            Role::NetAgent => {
                if self.network.connect(uuid) {
                    self.broadcast_node_event(uuid, NodeKind::NetworkNode, true)
                        .await;
                }
            }
            _ => {}
        }
        debug!(%uuid, %role, "peer connect");
    }

    async fn on_disconnect(&self, uuid: &str, role: Role) {
        match role {
            Role::Controller => {
                self.controllers.disconnect(uuid);
            }
            Role::Agent => {
                if self.compute.disconnect(uuid) {
                    self.broadcast_node_event(uuid, NodeKind::ComputeNode, false)
                        .await;
                }
            }
            Role::NetAgent => {
                if self.network.disconnect(uuid) {
                    self.broadcast_node_event(uuid, NodeKind::NetworkNode, false)
                        .await;
                }
            }
            _ => {}
        }
        debug!(%uuid, %role, "peer disconnect");
    }

    async fn on_status(&self, uuid: &str, status: Status, payload: &[u8]) {
        debug!(%uuid, %status, "status report");

        if self.controllers.gate(uuid).is_some() {
            warn!(%uuid, "ignoring status change from controller");
            return;
        }
        if !self.compute.contains(uuid) && !self.network.contains(uuid) {
            warn!(%uuid, "status from unknown peer");
            return;
        }

        // READY carries the telemetry record; any other status only moves
        // the status field.
        let ready: Option<Ready> = if status == Status::Ready {
            match from_yaml(payload) {
                Ok(ready) => Some(ready),
                Err(e) => {
                    error!(%uuid, error = %e, "bad READY payload");
                    None
                }
            }
        } else {
            None
        };

        if !self.compute.update_status(uuid, status, ready.as_ref()) {
            self.network.update_status(uuid, status, ready.as_ref());
        }
    }

    async fn on_command_forward(
        &self,
        uuid: &str,
        op: Command,
        payload: &[u8],
    ) -> ForwardDecision {
        match self.controllers.gate(uuid) {
            None => {
                warn!(%uuid, command = %op, "ignoring command from unknown controller");
                return ForwardDecision::Discard;
            }
            Some(ControllerRole::Backup) => {
                warn!(%uuid, command = %op, "ignoring command from non-master controller");
                return ForwardDecision::Discard;
            }
            Some(ControllerRole::Master) => {}
        }

        let started = Instant::now();
        let (decision, instance) = match op {
            Command::Start => self.start_workload(uuid, payload).await,
            Command::Restart | Command::Stop | Command::Delete | Command::Evacuate => {
                self.relay_command(op, payload)
            }
            _ => (ForwardDecision::Discard, String::new()),
        };

        debug!(
            command = %op,
            instance_uuid = %instance,
            elapsed = ?started.elapsed(),
            "command processed"
        );
        decision
    }

    async fn on_event_forward(&self, uuid: &str, op: Event, payload: &[u8]) -> ForwardDecision {
        match events::concentrator_target(op, payload) {
            Ok(target) if !target.is_empty() => {
                debug!(event = %op, %target, "forwarding event to concentrator");
                ForwardDecision::Recipient(target)
            }
            Ok(_) => {
                error!(event = %op, %uuid, "event names no concentrator");
                ForwardDecision::Discard
            }
            Err(e) => {
                error!(event = %op, %uuid, error = %e, "bad event payload");
                ForwardDecision::Discard
            }
        }
    }

    async fn on_command_notify(&self, uuid: &str, op: Command) {
        debug!(%uuid, command = %op, "command observed");
    }

    async fn on_event_notify(&self, uuid: &str, op: Event) {
        debug!(%uuid, event = %op, "event observed");
    }

    async fn on_error_notify(&self, uuid: &str, op: ErrorOp) {
        debug!(%uuid, error_op = %op, "error observed");
    }
}
