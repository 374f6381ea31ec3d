//! Worker node registries.
//!
//! Compute and network nodes share the same record shape but live in
//! independent registries: placement policy over compute nodes needs a
//! stable scan order (an ordered sequence plus a rotation cursor), while
//! network nodes are few and a bare map with a last-picked UUID is enough.
//!
//! A registry's reader/writer lock guards membership; each node carries its
//! own lock for status and telemetry so concurrent placement scans and
//! telemetry updates don't serialize on the registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use flotilla_wire::{Ready, Status};

/// Per-node status and resource counters, guarded by the node's own lock.
///
/// Counters are zero until the node's first READY report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeState {
    pub status: Status,
    pub mem_total_mb: i64,
    pub mem_avail_mb: i64,
    pub load: i64,
    pub cpus_online: i64,
}

impl NodeState {
    fn connected() -> Self {
        Self {
            status: Status::Connected,
            mem_total_mb: 0,
            mem_avail_mb: 0,
            load: 0,
            cpus_online: 0,
        }
    }

    fn apply_ready(&mut self, ready: &Ready) {
        self.mem_total_mb = ready.mem_total_mb;
        self.mem_avail_mb = ready.mem_available_mb;
        self.load = ready.load;
        self.cpus_online = ready.cpus_online;
    }
}

/// One connected worker node. Which fleet it belongs to is encoded by the
/// registry holding it.
pub(crate) struct Node {
    pub(crate) uuid: String,
    pub(crate) state: Arc<Mutex<NodeState>>,
}

impl Node {
    fn new(uuid: &str) -> Arc<Self> {
        Arc::new(Self {
            uuid: uuid.to_string(),
            state: Arc::new(Mutex::new(NodeState::connected())),
        })
    }
}

/// Rotation cursor over the compute sequence: the index and UUID of the
/// last node picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MruCursor {
    pub(crate) index: usize,
    pub(crate) uuid: String,
}

#[derive(Default)]
pub(crate) struct ComputeTable {
    pub(crate) by_uuid: HashMap<String, Arc<Node>>,
    /// Connect order; defines the placement scan order.
    pub(crate) ordered: Vec<Arc<Node>>,
}

/// Registry of connected compute nodes.
#[derive(Default)]
pub struct ComputeRegistry {
    pub(crate) table: RwLock<ComputeTable>,
    pub(crate) mru: Mutex<Option<MruCursor>>,
}

/// One row of the heartbeat summary.
#[derive(Debug, Clone)]
pub struct ComputeSummary {
    pub uuid: String,
    pub status: Status,
    pub mem_avail_mb: i64,
    pub mem_total_mb: i64,
    pub load: i64,
    pub is_mru: bool,
}

impl ComputeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a newly connected node. Reconnects of a live UUID are ignored.
    pub fn connect(&self, uuid: &str) -> bool {
        let mut table = self.table.write();
        if table.by_uuid.contains_key(uuid) {
            warn!(%uuid, "unexpected reconnect from compute node");
            return false;
        }

        let node = Node::new(uuid);
        table.ordered.push(Arc::clone(&node));
        table.by_uuid.insert(uuid.to_string(), node);
        true
    }

    /// Remove a departed node, keeping the rotation cursor on the node it
    /// already points at.
    pub fn disconnect(&self, uuid: &str) -> bool {
        let mut table = self.table.write();
        if table.by_uuid.remove(uuid).is_none() {
            warn!(%uuid, "unexpected disconnect from compute node");
            return false;
        }

        if let Some(index) = table.ordered.iter().position(|n| n.uuid == uuid) {
            table.ordered.remove(index);

            let mut mru = self.mru.lock();
            let removed_is_mru = matches!(mru.as_ref(), Some(c) if c.uuid == uuid);
            if removed_is_mru {
                *mru = None;
            } else if let Some(cursor) = mru.as_mut() {
                if index < cursor.index {
                    cursor.index -= 1;
                }
            }
        }
        true
    }

    /// Record a status report. READY payloads overwrite the node's
    /// telemetry, including any speculative claims since the last report.
    pub fn update_status(&self, uuid: &str, status: Status, ready: Option<&Ready>) -> bool {
        let table = self.table.read();
        let Some(node) = table.by_uuid.get(uuid) else {
            return false;
        };

        let mut state = node.state.lock();
        state.status = status;
        if let Some(ready) = ready {
            state.apply_ready(ready);
        }
        true
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.table.read().by_uuid.contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.table.read().ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of a node's current state, if connected.
    pub fn telemetry(&self, uuid: &str) -> Option<NodeState> {
        let table = self.table.read();
        table.by_uuid.get(uuid).map(|n| n.state.lock().clone())
    }

    /// UUID the rotation cursor currently points at.
    pub fn mru_uuid(&self) -> Option<String> {
        self.mru.lock().as_ref().map(|c| c.uuid.clone())
    }

    /// Scan-ordered summary rows for the heartbeat line.
    pub fn summaries(&self) -> Vec<ComputeSummary> {
        let table = self.table.read();
        let mru_uuid = self.mru_uuid();

        table
            .ordered
            .iter()
            .map(|node| {
                let state = node.state.lock();
                ComputeSummary {
                    uuid: node.uuid.clone(),
                    status: state.status,
                    mem_avail_mb: state.mem_avail_mb,
                    mem_total_mb: state.mem_total_mb,
                    load: state.load,
                    is_mru: mru_uuid.as_deref() == Some(node.uuid.as_str()),
                }
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn scan_order(&self) -> Vec<String> {
        self.table.read().ordered.iter().map(|n| n.uuid.clone()).collect()
    }
}

/// Registry of connected network nodes.
#[derive(Default)]
pub struct NetworkRegistry {
    pub(crate) nodes: RwLock<HashMap<String, Arc<Node>>>,
    /// UUID of the last network node picked.
    pub(crate) mru: Mutex<Option<String>>,
}

impl NetworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, uuid: &str) -> bool {
        let mut nodes = self.nodes.write();
        if nodes.contains_key(uuid) {
            warn!(%uuid, "unexpected reconnect from network node");
            return false;
        }
        nodes.insert(uuid.to_string(), Node::new(uuid));
        true
    }

    pub fn disconnect(&self, uuid: &str) -> bool {
        let mut nodes = self.nodes.write();
        if nodes.remove(uuid).is_none() {
            warn!(%uuid, "unexpected disconnect from network node");
            return false;
        }
        true
    }

    pub fn update_status(&self, uuid: &str, status: Status, ready: Option<&Ready>) -> bool {
        let nodes = self.nodes.read();
        let Some(node) = nodes.get(uuid) else {
            return false;
        };

        let mut state = node.state.lock();
        state.status = status;
        if let Some(ready) = ready {
            state.apply_ready(ready);
        }
        true
    }

    pub fn contains(&self, uuid: &str) -> bool {
        self.nodes.read().contains_key(uuid)
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn telemetry(&self, uuid: &str) -> Option<NodeState> {
        let nodes = self.nodes.read();
        nodes.get(uuid).map(|n| n.state.lock().clone())
    }

    pub fn mru_uuid(&self) -> Option<String> {
        self.mru.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(avail: i64, total: i64) -> Ready {
        Ready {
            node_uuid: String::new(),
            mem_total_mb: total,
            mem_available_mb: avail,
            disk_total_mb: 0,
            disk_available_mb: 0,
            load: 2,
            cpus_online: 8,
        }
    }

    #[test]
    fn connect_is_idempotent() {
        let reg = ComputeRegistry::new();
        assert!(reg.connect("cn-1"));
        assert!(!reg.connect("cn-1"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn connect_order_defines_scan_order() {
        let reg = ComputeRegistry::new();
        for uuid in ["cn-1", "cn-2", "cn-3"] {
            reg.connect(uuid);
        }
        assert_eq!(reg.scan_order(), vec!["cn-1", "cn-2", "cn-3"]);
    }

    #[test]
    fn disconnect_preserves_relative_order() {
        let reg = ComputeRegistry::new();
        for uuid in ["cn-1", "cn-2", "cn-3"] {
            reg.connect(uuid);
        }
        assert!(reg.disconnect("cn-2"));
        assert_eq!(reg.scan_order(), vec!["cn-1", "cn-3"]);
        assert!(!reg.contains("cn-2"));
    }

    #[test]
    fn orphan_disconnect_changes_nothing() {
        let reg = ComputeRegistry::new();
        reg.connect("cn-1");
        assert!(!reg.disconnect("cn-9"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn new_node_starts_connected_with_zero_counters() {
        let reg = ComputeRegistry::new();
        reg.connect("cn-1");
        let state = reg.telemetry("cn-1").unwrap();
        assert_eq!(state.status, Status::Connected);
        assert_eq!(state.mem_avail_mb, 0);
        assert_eq!(state.mem_total_mb, 0);
    }

    #[test]
    fn ready_report_overwrites_telemetry() {
        let reg = ComputeRegistry::new();
        reg.connect("cn-1");
        assert!(reg.update_status("cn-1", Status::Ready, Some(&ready(1024, 2048))));

        let state = reg.telemetry("cn-1").unwrap();
        assert_eq!(state.status, Status::Ready);
        assert_eq!(state.mem_avail_mb, 1024);
        assert_eq!(state.mem_total_mb, 2048);
        assert_eq!(state.load, 2);
        assert_eq!(state.cpus_online, 8);
    }

    #[test]
    fn non_ready_status_leaves_telemetry_alone() {
        let reg = ComputeRegistry::new();
        reg.connect("cn-1");
        reg.update_status("cn-1", Status::Ready, Some(&ready(1024, 2048)));
        reg.update_status("cn-1", Status::Full, None);

        let state = reg.telemetry("cn-1").unwrap();
        assert_eq!(state.status, Status::Full);
        assert_eq!(state.mem_avail_mb, 1024);
    }

    #[test]
    fn status_for_unknown_node_is_dropped() {
        let reg = ComputeRegistry::new();
        assert!(!reg.update_status("cn-9", Status::Ready, Some(&ready(1, 1))));
    }

    #[test]
    fn removing_the_mru_clears_the_cursor() {
        let reg = ComputeRegistry::new();
        for uuid in ["cn-1", "cn-2", "cn-3"] {
            reg.connect(uuid);
        }
        *reg.mru.lock() = Some(MruCursor {
            index: 1,
            uuid: "cn-2".to_string(),
        });

        reg.disconnect("cn-2");
        assert_eq!(reg.mru_uuid(), None);
    }

    #[test]
    fn removing_an_earlier_node_keeps_the_cursor_on_its_node() {
        let reg = ComputeRegistry::new();
        for uuid in ["cn-1", "cn-2", "cn-3"] {
            reg.connect(uuid);
        }
        *reg.mru.lock() = Some(MruCursor {
            index: 2,
            uuid: "cn-3".to_string(),
        });

        reg.disconnect("cn-1");

        let cursor = reg.mru.lock().clone().unwrap();
        assert_eq!(cursor.uuid, "cn-3");
        assert_eq!(cursor.index, 1);
        assert_eq!(reg.scan_order()[cursor.index], "cn-3");
    }

    #[test]
    fn removing_a_later_node_leaves_the_cursor_index() {
        let reg = ComputeRegistry::new();
        for uuid in ["cn-1", "cn-2", "cn-3"] {
            reg.connect(uuid);
        }
        *reg.mru.lock() = Some(MruCursor {
            index: 0,
            uuid: "cn-1".to_string(),
        });

        reg.disconnect("cn-3");

        let cursor = reg.mru.lock().clone().unwrap();
        assert_eq!(cursor.index, 0);
        assert_eq!(reg.scan_order()[cursor.index], "cn-1");
    }

    #[test]
    fn network_registry_membership() {
        let reg = NetworkRegistry::new();
        assert!(reg.connect("nn-1"));
        assert!(!reg.connect("nn-1"));
        assert!(reg.contains("nn-1"));
        assert!(reg.disconnect("nn-1"));
        assert!(!reg.disconnect("nn-1"));
        assert!(reg.is_empty());
    }

    #[test]
    fn network_ready_updates_counters() {
        let reg = NetworkRegistry::new();
        reg.connect("nn-1");
        reg.update_status("nn-1", Status::Ready, Some(&ready(512, 1024)));

        let state = reg.telemetry("nn-1").unwrap();
        assert_eq!(state.status, Status::Ready);
        assert_eq!(state.mem_avail_mb, 512);
    }

    #[test]
    fn summaries_flag_the_mru() {
        let reg = ComputeRegistry::new();
        reg.connect("cn-1");
        reg.connect("cn-2");
        *reg.mru.lock() = Some(MruCursor {
            index: 1,
            uuid: "cn-2".to_string(),
        });

        let rows = reg.summaries();
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].is_mru);
        assert!(rows[1].is_mru);
    }
}
