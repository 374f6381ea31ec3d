//! flotillad — the cluster scheduler daemon.
//!
//! Hosts the in-memory scheduler behind the TLS peer transport. State is
//! memory-only: on restart the fleet re-registers and the registries
//! rebuild themselves.
//!
//! # Usage
//!
//! ```text
//! flotillad --cert /etc/pki/flotilla/cert-server.pem \
//!           --cacert /etc/pki/flotilla/CAcert.pem \
//!           --listen 0.0.0.0:8888 --heartbeat
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use flotilla_net::{FrameHandler, PeerServer, PeerTable, RuleAction, RuleTable, ServerConfig};
use flotilla_scheduler::{heartbeat, Scheduler};
use flotilla_wire::{Command, ErrorOp, Event, Operand, Role};

#[derive(Parser)]
#[command(name = "flotillad", about = "Flotilla cluster scheduler")]
struct Cli {
    /// Server certificate and key, combined PEM.
    #[arg(long, default_value = "/etc/pki/flotilla/cert-server.pem")]
    cert: PathBuf,

    /// CA certificate; peers must present a certificate it signed.
    #[arg(long, default_value = "/etc/pki/flotilla/CAcert.pem")]
    cacert: PathBuf,

    /// Address the peer transport listens on.
    #[arg(long, default_value = "0.0.0.0:8888")]
    listen: SocketAddr,

    /// Emit a once-a-second cluster summary line.
    #[arg(long)]
    heartbeat: bool,
}

/// The scheduler's routing policy: which operands fan out to controllers
/// wholesale and which ones it decides per frame.
fn forward_rules() -> RuleTable {
    RuleTable::new()
        // Telemetry and reports every controller wants.
        .add(Operand::Command(Command::Stats), RuleAction::BroadcastTo(Role::Controller))
        .add(Operand::Event(Event::TraceReport), RuleAction::BroadcastTo(Role::Controller))
        .add(Operand::Event(Event::InstanceDeleted), RuleAction::BroadcastTo(Role::Controller))
        .add(
            Operand::Event(Event::ConcentratorInstanceAdded),
            RuleAction::BroadcastTo(Role::Controller),
        )
        .add(Operand::Error(ErrorOp::StartFailure), RuleAction::BroadcastTo(Role::Controller))
        .add(Operand::Error(ErrorOp::StopFailure), RuleAction::BroadcastTo(Role::Controller))
        .add(Operand::Error(ErrorOp::RestartFailure), RuleAction::BroadcastTo(Role::Controller))
        // Workload lifecycle goes through the dispatcher.
        .add(Operand::Command(Command::Start), RuleAction::Handler)
        .add(Operand::Command(Command::Restart), RuleAction::Handler)
        .add(Operand::Command(Command::Stop), RuleAction::Handler)
        .add(Operand::Command(Command::Delete), RuleAction::Handler)
        .add(Operand::Command(Command::Evacuate), RuleAction::Handler)
        // Concentrator-directed events are unwrapped and re-routed.
        .add(Operand::Event(Event::TenantAdded), RuleAction::Handler)
        .add(Operand::Event(Event::TenantRemoved), RuleAction::Handler)
        .add(Operand::Event(Event::PublicIpAssigned), RuleAction::Handler)
}

/// Lift the open-file soft limit to the hard limit; every peer costs a
/// descriptor. Failure is survivable.
fn raise_fd_limit() {
    unsafe {
        let mut limit = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        if libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) != 0 {
            warn!(error = %std::io::Error::last_os_error(), "getrlimit failed");
            return;
        }
        info!(current = limit.rlim_cur, max = limit.rlim_max, "initial nofile limits");

        if limit.rlim_cur < limit.rlim_max {
            let previous = limit.rlim_cur;
            limit.rlim_cur = limit.rlim_max;
            if libc::setrlimit(libc::RLIMIT_NOFILE, &limit) != 0 {
                warn!(error = %std::io::Error::last_os_error(), "setrlimit failed");
                limit.rlim_cur = previous;
            }
        }
        info!(current = limit.rlim_cur, max = limit.rlim_max, "updated nofile limits");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,flotillad=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    info!("flotilla scheduler starting");
    raise_fd_limit();

    let tls = flotilla_net::tls::acceptor(&cli.cert, Some(&cli.cacert))?;

    // The peer table is the send surface; the scheduler is the callback
    // surface. Wire them to the listener.
    let peers = Arc::new(PeerTable::new());
    let scheduler = Arc::new(Scheduler::new(peers.sink()));

    let server = PeerServer::bind(
        ServerConfig {
            listen: cli.listen,
            tls: Some(tls),
            rules: forward_rules(),
        },
        Arc::clone(&peers),
        Arc::clone(&scheduler) as Arc<dyn FrameHandler>,
    )
    .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let heartbeat_handle = cli.heartbeat.then(|| {
        tokio::spawn(heartbeat::run(Arc::clone(&scheduler), shutdown_rx.clone()))
    });

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.serve(shutdown_rx).await?;

    if let Some(handle) = heartbeat_handle {
        let _ = handle.await;
    }

    info!("flotilla scheduler stopped");
    Ok(())
}
