//! The peer listener.
//!
//! One task per connection. Each connection performs a connect/ack
//! handshake, registers in the [`PeerTable`], then loops reading frames and
//! dispatching them through the rule table. A dedicated writer task drains
//! the peer's outbound queue, so sends from anywhere in the process never
//! block on the socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use flotilla_wire::{ForwardDecision, Operand, Role, Status};

use crate::contract::FrameHandler;
use crate::envelope::{read_envelope, write_envelope, Envelope};
use crate::error::NetError;
use crate::peers::PeerTable;
use crate::rules::{RuleAction, RuleTable};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Listener configuration.
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// `None` runs plain TCP (tests, closed networks).
    pub tls: Option<TlsAcceptor>,
    pub rules: RuleTable,
}

/// The peer-facing server.
pub struct PeerServer {
    peers: Arc<PeerTable>,
    handler: Arc<dyn FrameHandler>,
    rules: Arc<RuleTable>,
    tls: Option<TlsAcceptor>,
    listener: TcpListener,
}

impl PeerServer {
    /// Bind the listener. The peer table is shared with whoever needs the
    /// send surface (see [`PeerTable::sink`]).
    pub async fn bind(
        config: ServerConfig,
        peers: Arc<PeerTable>,
        handler: Arc<dyn FrameHandler>,
    ) -> Result<Self, NetError> {
        let listener = TcpListener::bind(config.listen).await?;
        Ok(Self {
            peers,
            handler,
            rules: Arc::new(config.rules),
            tls: config.tls,
            listener,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the shutdown signal flips.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<(), NetError> {
        info!(addr = %self.listener.local_addr()?, tls = self.tls.is_some(), "peer transport listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, remote) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };

                    let peers = Arc::clone(&self.peers);
                    let handler = Arc::clone(&self.handler);
                    let rules = Arc::clone(&self.rules);

                    match &self.tls {
                        Some(acceptor) => {
                            let acceptor = acceptor.clone();
                            tokio::spawn(async move {
                                match acceptor.accept(stream).await {
                                    Ok(tls_stream) => {
                                        run_connection(tls_stream, remote, peers, handler, rules)
                                            .await;
                                    }
                                    Err(e) => warn!(%remote, error = %e, "tls handshake failed"),
                                }
                            });
                        }
                        None => {
                            tokio::spawn(async move {
                                run_connection(stream, remote, peers, handler, rules).await;
                            });
                        }
                    }
                }
                _ = shutdown.changed() => {
                    info!("peer transport shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

fn frame_name(envelope: &Envelope) -> &'static str {
    match envelope {
        Envelope::Connect { .. } => "connect",
        Envelope::ConnectAck { .. } => "connect-ack",
        Envelope::Command { .. } => "command",
        Envelope::Event { .. } => "event",
        Envelope::Status { .. } => "status",
        Envelope::Error { .. } => "error",
    }
}

async fn run_connection<S>(
    stream: S,
    remote: SocketAddr,
    peers: Arc<PeerTable>,
    handler: Arc<dyn FrameHandler>,
    rules: Arc<RuleTable>,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    let first = match timeout(HANDSHAKE_TIMEOUT, read_envelope(&mut reader)).await {
        Ok(Ok(Some(envelope))) => envelope,
        Ok(Ok(None)) => return,
        Ok(Err(e)) => {
            warn!(%remote, error = %e, "handshake read failed");
            return;
        }
        Err(_) => {
            warn!(%remote, "handshake timed out");
            return;
        }
    };

    let (uuid, role): (String, Role) = match first {
        Envelope::Connect { uuid, role } if !uuid.is_empty() => (uuid, role),
        other => {
            warn!(%remote, frame = frame_name(&other), "expected connect frame, closing");
            return;
        }
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let Some(conn_id) = peers.register(&uuid, role, tx.clone()) else {
        warn!(%uuid, %remote, "duplicate peer uuid, closing connection");
        return;
    };

    debug!(%uuid, %role, %remote, "peer connected");
    handler.on_connect(&uuid, role).await;

    // Ack goes through the queue so the writer task stays the only writer.
    let _ = tx.send(Envelope::ConnectAck {
        status: Status::Connected,
    });
    drop(tx);

    let writer_uuid = uuid.clone();
    let writer_task = tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            if let Err(e) = write_envelope(&mut writer, &envelope).await {
                debug!(uuid = %writer_uuid, error = %e, "peer write failed");
                break;
            }
        }
    });

    loop {
        match read_envelope(&mut reader).await {
            Ok(Some(envelope)) => dispatch_frame(&uuid, envelope, &peers, &handler, &rules).await,
            Ok(None) => break,
            Err(e) => {
                warn!(%uuid, error = %e, "peer read failed");
                break;
            }
        }
    }

    // Dropping the table entry drops the last sender, ending the writer.
    peers.remove(&uuid, conn_id);
    handler.on_disconnect(&uuid, role).await;
    debug!(%uuid, "peer disconnected");
    let _ = writer_task.await;
}

async fn dispatch_frame(
    from: &str,
    envelope: Envelope,
    peers: &PeerTable,
    handler: &Arc<dyn FrameHandler>,
    rules: &RuleTable,
) {
    match envelope {
        Envelope::Status { status, payload } => {
            handler.on_status(from, status, &payload).await;
        }

        Envelope::Command { op, payload } => {
            match rules.lookup(Operand::Command(op)) {
                Some(RuleAction::BroadcastTo(role)) => {
                    let delivered = peers.broadcast(role, &Envelope::Command { op, payload });
                    debug!(%from, op = %op, %role, delivered, "command broadcast");
                }
                Some(RuleAction::Handler) => {
                    match handler.on_command_forward(from, op, &payload).await {
                        ForwardDecision::Recipient(to) => {
                            deliver(peers, &to, Envelope::Command { op, payload });
                        }
                        ForwardDecision::Discard => {}
                    }
                }
                None => debug!(%from, op = %op, "no forward rule for command, dropping"),
            }
            handler.on_command_notify(from, op).await;
        }

        Envelope::Event { op, payload } => {
            match rules.lookup(Operand::Event(op)) {
                Some(RuleAction::BroadcastTo(role)) => {
                    let delivered = peers.broadcast(role, &Envelope::Event { op, payload });
                    debug!(%from, op = %op, %role, delivered, "event broadcast");
                }
                Some(RuleAction::Handler) => {
                    match handler.on_event_forward(from, op, &payload).await {
                        ForwardDecision::Recipient(to) => {
                            deliver(peers, &to, Envelope::Event { op, payload });
                        }
                        ForwardDecision::Discard => {}
                    }
                }
                None => debug!(%from, op = %op, "no forward rule for event, dropping"),
            }
            handler.on_event_notify(from, op).await;
        }

        Envelope::Error { op, payload } => {
            match rules.lookup(Operand::Error(op)) {
                Some(RuleAction::BroadcastTo(role)) => {
                    let delivered = peers.broadcast(role, &Envelope::Error { op, payload });
                    debug!(%from, op = %op, %role, delivered, "error broadcast");
                }
                // Error frames have no per-frame handler path.
                Some(RuleAction::Handler) | None => {
                    debug!(%from, op = %op, "no broadcast rule for error, dropping");
                }
            }
            handler.on_error_notify(from, op).await;
        }

        Envelope::Connect { .. } | Envelope::ConnectAck { .. } => {
            warn!(%from, "unexpected handshake frame mid-stream, ignoring");
        }
    }
}

fn deliver(peers: &PeerTable, to: &str, envelope: Envelope) {
    if let Err(e) = peers.send_to(to, envelope) {
        warn!(%to, error = %e, "forward recipient unavailable, dropping frame");
    }
}
