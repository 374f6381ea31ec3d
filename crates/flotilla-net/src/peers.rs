//! Connected peer registry and the outbound send path.
//!
//! Each live connection owns an unbounded outbound queue drained by its
//! writer task. Sending never blocks the caller: a send either enqueues or
//! fails because the peer is gone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use flotilla_wire::{Command, ErrorOp, Event, Role, Status};

use crate::contract::FrameSink;
use crate::envelope::Envelope;
use crate::error::NetError;

struct Peer {
    role: Role,
    conn_id: u64,
    tx: mpsc::UnboundedSender<Envelope>,
}

/// All currently connected peers, keyed by UUID.
#[derive(Default)]
pub struct PeerTable {
    inner: RwLock<HashMap<String, Peer>>,
    next_conn_id: AtomicU64,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection. Returns the connection id, or `None` if a
    /// peer with this UUID is already connected.
    pub fn register(
        &self,
        uuid: &str,
        role: Role,
        tx: mpsc::UnboundedSender<Envelope>,
    ) -> Option<u64> {
        let mut peers = self.inner.write();
        if peers.contains_key(uuid) {
            return None;
        }
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        peers.insert(uuid.to_string(), Peer { role, conn_id, tx });
        Some(conn_id)
    }

    /// Remove a connection, but only if it still owns the entry. A stale
    /// task racing a reconnect must not evict the newer connection.
    pub fn remove(&self, uuid: &str, conn_id: u64) -> bool {
        let mut peers = self.inner.write();
        match peers.get(uuid) {
            Some(p) if p.conn_id == conn_id => {
                peers.remove(uuid);
                true
            }
            _ => false,
        }
    }

    /// Queue an envelope for one peer.
    pub fn send_to(&self, uuid: &str, envelope: Envelope) -> Result<(), NetError> {
        let peers = self.inner.read();
        let peer = peers
            .get(uuid)
            .ok_or_else(|| NetError::PeerUnavailable(uuid.to_string()))?;
        peer.tx
            .send(envelope)
            .map_err(|_| NetError::PeerUnavailable(uuid.to_string()))
    }

    /// Queue a copy of an envelope for every peer of the given role.
    /// Returns how many peers it was queued for.
    pub fn broadcast(&self, role: Role, envelope: &Envelope) -> usize {
        let peers = self.inner.read();
        let mut delivered = 0;
        for peer in peers.values() {
            if peer.role == role && peer.tx.send(envelope.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.inner.read().contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// A [`FrameSink`] backed by this table.
    pub fn sink(self: &Arc<Self>) -> Arc<dyn FrameSink> {
        Arc::new(PeerSink {
            peers: Arc::clone(self),
        })
    }
}

/// `FrameSink` implementation over the peer table.
struct PeerSink {
    peers: Arc<PeerTable>,
}

#[async_trait]
impl FrameSink for PeerSink {
    async fn send_command(&self, to: &str, op: Command, payload: Vec<u8>) -> Result<(), NetError> {
        self.peers.send_to(to, Envelope::Command { op, payload })
    }

    async fn send_event(&self, to: &str, op: Event, payload: Vec<u8>) -> Result<(), NetError> {
        self.peers.send_to(to, Envelope::Event { op, payload })
    }

    async fn send_status(&self, to: &str, status: Status, payload: Vec<u8>) -> Result<(), NetError> {
        self.peers.send_to(to, Envelope::Status { status, payload })
    }

    async fn send_error(&self, to: &str, op: ErrorOp, payload: Vec<u8>) -> Result<(), NetError> {
        self.peers.send_to(to, Envelope::Error { op, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (
        mpsc::UnboundedSender<Envelope>,
        mpsc::UnboundedReceiver<Envelope>,
    ) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn register_rejects_duplicate_uuid() {
        let table = PeerTable::new();
        let (tx1, _rx1) = channel();
        let (tx2, _rx2) = channel();

        assert!(table.register("peer-1", Role::Agent, tx1).is_some());
        assert!(table.register("peer-1", Role::Agent, tx2).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn remove_requires_matching_conn_id() {
        let table = PeerTable::new();
        let (tx, _rx) = channel();
        let conn_id = table.register("peer-1", Role::Agent, tx).unwrap();

        assert!(!table.remove("peer-1", conn_id + 1));
        assert!(table.contains("peer-1"));
        assert!(table.remove("peer-1", conn_id));
        assert!(!table.contains("peer-1"));
    }

    #[test]
    fn send_to_unknown_peer_fails() {
        let table = PeerTable::new();
        let env = Envelope::Status {
            status: Status::Ready,
            payload: Vec::new(),
        };
        assert!(matches!(
            table.send_to("ghost", env),
            Err(NetError::PeerUnavailable(_))
        ));
    }

    #[test]
    fn broadcast_reaches_only_matching_role() {
        let table = PeerTable::new();
        let (ctl_tx, mut ctl_rx) = channel();
        let (agent_tx, mut agent_rx) = channel();
        table.register("ctl-1", Role::Controller, ctl_tx).unwrap();
        table.register("agent-1", Role::Agent, agent_tx).unwrap();

        let env = Envelope::Event {
            op: Event::TraceReport,
            payload: Vec::new(),
        };
        assert_eq!(table.broadcast(Role::Controller, &env), 1);

        assert!(ctl_rx.try_recv().is_ok());
        assert!(agent_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sink_routes_to_named_peer() {
        let table = Arc::new(PeerTable::new());
        let (tx, mut rx) = channel();
        table.register("ctl-1", Role::Controller, tx).unwrap();

        let sink = table.sink();
        sink.send_error("ctl-1", ErrorOp::StartFailure, b"reason".to_vec())
            .await
            .unwrap();

        match rx.try_recv().unwrap() {
            Envelope::Error { op, payload } => {
                assert_eq!(op, ErrorOp::StartFailure);
                assert_eq!(payload, b"reason");
            }
            other => panic!("expected Error envelope, got {other:?}"),
        }

        assert!(sink
            .send_event("ghost", Event::NodeConnected, Vec::new())
            .await
            .is_err());
    }
}
