//! The two seams between the transport and the scheduler core.
//!
//! The transport owns sockets and delivery; the scheduler owns state and
//! policy. `FrameHandler` is implemented by the scheduler and invoked by the
//! transport; `FrameSink` is implemented by the transport and invoked by the
//! scheduler. Both are object-safe so the core can be exercised against an
//! in-memory fake in tests.

use async_trait::async_trait;

use flotilla_wire::{Command, ErrorOp, Event, ForwardDecision, Role, Status};

use crate::error::NetError;

/// Callback surface the transport drives as frames arrive.
///
/// Forwarding hooks return a [`ForwardDecision`] synchronously to the
/// transport; they must not perform delivery themselves.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    /// A peer completed its handshake.
    async fn on_connect(&self, uuid: &str, role: Role);

    /// A peer's connection ended.
    async fn on_disconnect(&self, uuid: &str, role: Role);

    /// A status frame arrived from a peer.
    async fn on_status(&self, uuid: &str, status: Status, payload: &[u8]);

    /// A command with a handler-routed rule arrived; decide where it goes.
    async fn on_command_forward(&self, uuid: &str, op: Command, payload: &[u8])
        -> ForwardDecision;

    /// An event with a handler-routed rule arrived; decide where it goes.
    async fn on_event_forward(&self, uuid: &str, op: Event, payload: &[u8]) -> ForwardDecision;

    /// Observability hook; no state change expected.
    async fn on_command_notify(&self, _uuid: &str, _op: Command) {}

    /// Observability hook; no state change expected.
    async fn on_event_notify(&self, _uuid: &str, _op: Event) {}

    /// Observability hook; no state change expected.
    async fn on_error_notify(&self, _uuid: &str, _op: ErrorOp) {}
}

/// Send surface for pushing frames to a single named peer.
///
/// Sends are best-effort: a failure means the frame was not queued for the
/// peer (unknown uuid, connection gone). Callers log and move on; the
/// transport never retries.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn send_command(&self, to: &str, op: Command, payload: Vec<u8>) -> Result<(), NetError>;

    async fn send_event(&self, to: &str, op: Event, payload: Vec<u8>) -> Result<(), NetError>;

    async fn send_status(&self, to: &str, status: Status, payload: Vec<u8>)
        -> Result<(), NetError>;

    async fn send_error(&self, to: &str, op: ErrorOp, payload: Vec<u8>) -> Result<(), NetError>;
}
