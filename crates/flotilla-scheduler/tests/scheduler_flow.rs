//! End-to-end scheduler flows against a recording transport.
//!
//! Drives the transport callback surface directly: connects, telemetry,
//! commands, events. Asserts on the forwarding decisions returned and the
//! frames pushed through the sink.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use flotilla_net::{FrameHandler, FrameSink, NetError};
use flotilla_scheduler::Scheduler;
use flotilla_wire::{
    from_yaml, to_yaml, Command, ErrorOp, Event, FailureReason, ForwardDecision, Ready,
    RequestedResource, ResourceKind, Role, StartCommand, StartFailure, StartWorkload, Status,
};

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<(String, Event, Vec<u8>)>>,
    errors: Mutex<Vec<(String, ErrorOp, Vec<u8>)>>,
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn send_command(&self, _to: &str, _op: Command, _payload: Vec<u8>) -> Result<(), NetError> {
        Ok(())
    }

    async fn send_event(&self, to: &str, op: Event, payload: Vec<u8>) -> Result<(), NetError> {
        self.events.lock().push((to.to_string(), op, payload));
        Ok(())
    }

    async fn send_status(&self, _to: &str, _status: Status, _payload: Vec<u8>) -> Result<(), NetError> {
        Ok(())
    }

    async fn send_error(&self, to: &str, op: ErrorOp, payload: Vec<u8>) -> Result<(), NetError> {
        self.errors.lock().push((to.to_string(), op, payload));
        Ok(())
    }
}

fn cluster() -> (Arc<RecordingSink>, Scheduler) {
    let sink = Arc::new(RecordingSink::default());
    let sched = Scheduler::new(sink.clone());
    (sink, sched)
}

fn ready_payload(avail: i64) -> Vec<u8> {
    to_yaml(&Ready {
        mem_total_mb: avail,
        mem_available_mb: avail,
        load: 0,
        cpus_online: 4,
        ..Ready::default()
    })
    .unwrap()
}

fn start_payload(instance: &str, mem: i64) -> Vec<u8> {
    to_yaml(&StartCommand {
        start: StartWorkload {
            instance_uuid: instance.to_string(),
            requested_resources: vec![RequestedResource {
                kind: ResourceKind::MemMb,
                value: mem,
            }],
        },
    })
    .unwrap()
}

async fn connect_ready_node(sched: &Scheduler, uuid: &str, avail: i64) {
    sched.on_connect(uuid, Role::Agent).await;
    sched.on_status(uuid, Status::Ready, &ready_payload(avail)).await;
}

#[tokio::test]
async fn single_node_start_places_and_claims_memory() {
    let (sink, sched) = cluster();
    sched.on_connect("ctl-1", Role::Controller).await;
    connect_ready_node(&sched, "cn-1", 1024).await;

    let decision = sched
        .on_command_forward("ctl-1", Command::Start, &start_payload("inst-1", 256))
        .await;

    assert_eq!(decision, ForwardDecision::Recipient("cn-1".to_string()));
    assert_eq!(sched.compute().telemetry("cn-1").unwrap().mem_avail_mb, 768);
    assert!(sink.errors.lock().is_empty());
}

#[tokio::test]
async fn exhausted_fleet_reports_full_cloud() {
    let (sink, sched) = cluster();
    sched.on_connect("ctl-1", Role::Controller).await;
    connect_ready_node(&sched, "cn-1", 100).await;
    connect_ready_node(&sched, "cn-2", 100).await;

    let decision = sched
        .on_command_forward("ctl-1", Command::Start, &start_payload("inst-1", 200))
        .await;

    assert!(decision.is_discard());
    let errors = sink.errors.lock();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, "ctl-1");
    let failure: StartFailure = from_yaml(&errors[0].2).unwrap();
    assert_eq!(failure.instance_uuid, "inst-1");
    assert_eq!(failure.reason, FailureReason::FullCloud);

    // Failed placement never mutates node state.
    assert_eq!(sched.compute().telemetry("cn-1").unwrap().mem_avail_mb, 100);
    assert_eq!(sched.compute().telemetry("cn-2").unwrap().mem_avail_mb, 100);
}

#[tokio::test]
async fn consecutive_starts_rotate_across_the_fleet() {
    let (_sink, sched) = cluster();
    sched.on_connect("ctl-1", Role::Controller).await;
    for uuid in ["cn-1", "cn-2", "cn-3"] {
        connect_ready_node(&sched, uuid, 1000).await;
    }

    let mut recipients = Vec::new();
    for instance in ["inst-1", "inst-2", "inst-3"] {
        match sched
            .on_command_forward("ctl-1", Command::Start, &start_payload(instance, 1))
            .await
        {
            ForwardDecision::Recipient(uuid) => recipients.push(uuid),
            ForwardDecision::Discard => panic!("placement failed for {instance}"),
        }
    }

    assert_eq!(recipients, vec!["cn-1", "cn-2", "cn-3"]);
}

#[tokio::test]
async fn spread_holds_across_many_starts() {
    let (_sink, sched) = cluster();
    sched.on_connect("ctl-1", Role::Controller).await;
    for uuid in ["cn-1", "cn-2", "cn-3", "cn-4"] {
        connect_ready_node(&sched, uuid, 10_000).await;
    }

    let mut counts = std::collections::HashMap::new();
    for i in 0..12 {
        let payload = start_payload(&format!("inst-{i}"), 1);
        match sched.on_command_forward("ctl-1", Command::Start, &payload).await {
            ForwardDecision::Recipient(uuid) => *counts.entry(uuid).or_insert(0u32) += 1,
            ForwardDecision::Discard => panic!("placement failed"),
        }
    }

    // 12 starts over 4 nodes that all fit everything: 3 each.
    assert_eq!(counts.len(), 4);
    assert!(counts.values().all(|&n| n == 3), "{counts:?}");
}

#[tokio::test]
async fn master_promotion_shifts_command_authority() {
    let (sink, sched) = cluster();
    sched.on_connect("ctl-1", Role::Controller).await;
    sched.on_connect("ctl-2", Role::Controller).await;
    connect_ready_node(&sched, "cn-1", 1000).await;

    // Backup's command is refused while the master lives.
    let decision = sched
        .on_command_forward("ctl-2", Command::Start, &start_payload("inst-1", 10))
        .await;
    assert!(decision.is_discard());
    assert!(sink.errors.lock().is_empty());
    assert_eq!(sched.compute().telemetry("cn-1").unwrap().mem_avail_mb, 1000);

    sched.on_disconnect("ctl-1", Role::Controller).await;

    // Promoted backup now drives commands.
    let decision = sched
        .on_command_forward("ctl-2", Command::Start, &start_payload("inst-2", 10))
        .await;
    assert_eq!(decision, ForwardDecision::Recipient("cn-1".to_string()));

    // A replay from the departed master's uuid is unknown now.
    let decision = sched
        .on_command_forward("ctl-1", Command::Start, &start_payload("inst-3", 10))
        .await;
    assert!(decision.is_discard());
}

#[tokio::test]
async fn concentrator_events_route_to_their_concentrator() {
    let (_sink, sched) = cluster();
    sched.on_connect("ctl-1", Role::Controller).await;

    let payload = b"tenant_added:\n  tenant_uuid: t-1\n  concentrator_uuid: cnci-x\n";
    let decision = sched
        .on_event_forward("ctl-1", Event::TenantAdded, payload)
        .await;
    assert_eq!(decision, ForwardDecision::Recipient("cnci-x".to_string()));

    let empty = b"tenant_added:\n  tenant_uuid: t-1\n";
    let decision = sched
        .on_event_forward("ctl-1", Event::TenantAdded, empty)
        .await;
    assert!(decision.is_discard());
}

#[tokio::test]
async fn membership_stays_consistent_through_churn() {
    let (_sink, sched) = cluster();
    sched.on_connect("ctl-1", Role::Controller).await;

    for i in 0..6 {
        sched.on_connect(&format!("cn-{i}"), Role::Agent).await;
    }
    sched.on_disconnect("cn-2", Role::Agent).await;
    sched.on_disconnect("cn-4", Role::Agent).await;
    sched.on_connect("cn-6", Role::Agent).await;
    // Orphan disconnect and duplicate connect are no-ops.
    sched.on_disconnect("cn-2", Role::Agent).await;
    sched.on_connect("cn-6", Role::Agent).await;

    assert_eq!(sched.compute().len(), 5);
    for uuid in ["cn-0", "cn-1", "cn-3", "cn-5", "cn-6"] {
        assert!(sched.compute().contains(uuid), "{uuid} missing");
    }
    assert!(!sched.compute().contains("cn-2"));
    assert!(!sched.compute().contains("cn-4"));
}

#[tokio::test]
async fn mru_disconnect_clears_the_cursor_and_placement_recovers() {
    let (_sink, sched) = cluster();
    sched.on_connect("ctl-1", Role::Controller).await;
    for uuid in ["cn-1", "cn-2", "cn-3"] {
        connect_ready_node(&sched, uuid, 1000).await;
    }

    // First pick lands on cn-1 and sets the cursor there.
    sched
        .on_command_forward("ctl-1", Command::Start, &start_payload("inst-1", 1))
        .await;
    assert_eq!(sched.compute().mru_uuid(), Some("cn-1".to_string()));

    sched.on_disconnect("cn-1", Role::Agent).await;
    assert_eq!(sched.compute().mru_uuid(), None);

    // With the cursor unset, placement restarts from the head.
    let decision = sched
        .on_command_forward("ctl-1", Command::Start, &start_payload("inst-2", 1))
        .await;
    assert_eq!(decision, ForwardDecision::Recipient("cn-2".to_string()));
}

#[tokio::test]
async fn ready_overwrites_speculative_claims() {
    let (_sink, sched) = cluster();
    sched.on_connect("ctl-1", Role::Controller).await;
    connect_ready_node(&sched, "cn-1", 1024).await;

    sched
        .on_command_forward("ctl-1", Command::Start, &start_payload("inst-1", 300))
        .await;
    assert_eq!(sched.compute().telemetry("cn-1").unwrap().mem_avail_mb, 724);

    // The node's next READY is ground truth, claims included.
    sched
        .on_status("cn-1", Status::Ready, &ready_payload(1024))
        .await;
    assert_eq!(sched.compute().telemetry("cn-1").unwrap().mem_avail_mb, 1024);
}

#[tokio::test]
async fn node_lifecycle_events_reach_every_controller() {
    let (sink, sched) = cluster();
    sched.on_connect("ctl-1", Role::Controller).await;
    sched.on_connect("ctl-2", Role::Controller).await;
    sched.on_connect("ctl-3", Role::Controller).await;

    sched.on_connect("cn-1", Role::Agent).await;
    sched.on_disconnect("cn-1", Role::Agent).await;

    let events = sink.events.lock();
    let connected = events
        .iter()
        .filter(|(_, op, _)| *op == Event::NodeConnected)
        .count();
    let disconnected = events
        .iter()
        .filter(|(_, op, _)| *op == Event::NodeDisconnected)
        .count();
    assert_eq!(connected, 3);
    assert_eq!(disconnected, 3);
}
