//! Optional one-line cluster heartbeat.
//!
//! When enabled, logs a once-a-second summary: the first couple of
//! controllers with their election roles, then the first few compute nodes
//! with available/total memory and load. The rotation cursor's node is
//! starred.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use crate::controllers::ControllerRegistry;
use crate::registry::ComputeRegistry;
use crate::scheduler::Scheduler;

const CONTROLLERS_SHOWN: usize = 2;
const COMPUTE_NODES_SHOWN: usize = 4;
const HEADER_EVERY: u64 = 22;

/// Emit the heartbeat line every second until shutdown.
pub async fn run(scheduler: Arc<Scheduler>, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut beats: u64 = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if beats % HEADER_EVERY == 0 {
                    info!(target: "flotilla::heartbeat", "controllers\t\tcompute nodes");
                }
                beats += 1;
                info!(target: "flotilla::heartbeat", "{}", beat_line(&scheduler));
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// Render one heartbeat line from current registry state.
pub fn beat_line(scheduler: &Scheduler) -> String {
    if scheduler.controllers().is_empty() && scheduler.compute().is_empty() {
        return "** idle / disconnected **".to_string();
    }

    format!(
        "{}\t{}",
        controller_beat(scheduler.controllers()),
        compute_beat(scheduler.compute())
    )
}

fn controller_beat(controllers: &ControllerRegistry) -> String {
    let summaries = controllers.summaries();
    if summaries.is_empty() {
        return "-no controllers-".to_string();
    }

    summaries
        .iter()
        .take(CONTROLLERS_SHOWN)
        .map(|(uuid, role)| format!("controller-{}:{role}", short(uuid)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn compute_beat(compute: &ComputeRegistry) -> String {
    let rows = compute.summaries();
    if rows.is_empty() {
        return "-no compute nodes-".to_string();
    }

    rows.iter()
        .take(COMPUTE_NODES_SHOWN)
        .map(|row| {
            format!(
                "node-{}:{}{}:{}/{},{}",
                short(&row.uuid),
                row.status,
                if row.is_mru { "*" } else { "" },
                row.mem_avail_mb,
                row.mem_total_mb,
                row.load
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn short(uuid: &str) -> &str {
    uuid.get(..8).unwrap_or(uuid)
}
