//! Controller registry and master/backup election.
//!
//! The first controller to connect becomes master; everyone after it joins
//! as backup while a master exists. When the master disconnects, one backup
//! is promoted, whichever the registry iteration yields first. Role flips
//! happen under the registry writer lock, so at most one master can ever
//! exist.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

/// A controller's election role. Only the master's commands are honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerRole {
    Master,
    Backup,
}

impl fmt::Display for ControllerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerRole::Master => f.write_str("MASTER"),
            ControllerRole::Backup => f.write_str("BACKUP"),
        }
    }
}

struct Controller {
    uuid: String,
    role: Mutex<ControllerRole>,
}

/// Registry of connected controllers.
#[derive(Default)]
pub struct ControllerRegistry {
    map: RwLock<HashMap<String, Arc<Controller>>>,
}

impl ControllerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a newly connected controller, electing its role.
    pub fn connect(&self, uuid: &str) -> bool {
        let mut map = self.map.write();
        if map.contains_key(uuid) {
            warn!(%uuid, "unexpected reconnect from controller");
            return false;
        }

        // Assume master unless another controller already is.
        let mut role = ControllerRole::Master;
        for other in map.values() {
            if *other.role.lock() == ControllerRole::Master {
                role = ControllerRole::Backup;
                break;
            }
        }

        map.insert(
            uuid.to_string(),
            Arc::new(Controller {
                uuid: uuid.to_string(),
                role: Mutex::new(role),
            }),
        );
        info!(%uuid, %role, "controller connected");
        true
    }

    /// Remove a departed controller, promoting a backup if it was master.
    ///
    /// The promoted controller is not told about its new role; it learns by
    /// having its commands accepted.
    pub fn disconnect(&self, uuid: &str) -> bool {
        let mut map = self.map.write();
        let Some(departed) = map.remove(uuid) else {
            warn!(%uuid, "unexpected disconnect from controller");
            return false;
        };

        if *departed.role.lock() == ControllerRole::Backup {
            return true;
        }

        // Master left: promote the first backup the map yields. Until one
        // connects, the cluster simply has no master.
        for candidate in map.values() {
            let mut role = candidate.role.lock();
            if *role == ControllerRole::Backup {
                *role = ControllerRole::Master;
                info!(uuid = %candidate.uuid, "controller promoted to master");
                break;
            }
        }
        true
    }

    /// Look up a controller for command gating.
    pub fn gate(&self, uuid: &str) -> Option<ControllerRole> {
        let map = self.map.read();
        map.get(uuid).map(|c| *c.role.lock())
    }

    /// Snapshot of connected controller UUIDs, for fan-out.
    pub fn uuids(&self) -> Vec<String> {
        self.map.read().keys().cloned().collect()
    }

    /// Snapshot of (uuid, role) pairs, for the heartbeat line.
    pub fn summaries(&self) -> Vec<(String, ControllerRole)> {
        let map = self.map.read();
        map.values()
            .map(|c| (c.uuid.clone(), *c.role.lock()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
