//! flotilla-net — the peer transport that hosts the scheduler.
//!
//! The scheduler core never touches sockets. It talks to this crate through
//! two narrow seams:
//!
//! - [`FrameHandler`] — the callback surface the transport invokes as frames
//!   arrive (connect, disconnect, status, command/event forwarding hooks)
//! - [`FrameSink`] — the send surface the scheduler uses to push frames to a
//!   named peer
//!
//! On top of the contract sits the server itself: length-prefixed bincode
//! envelopes over TCP, optionally wrapped in TLS with CA-verified client
//! certificates. Delivery of inbound frames is driven by a declarative
//! [`RuleTable`]: an operand either broadcasts to every peer of a role or is
//! handed to the [`FrameHandler`] for a per-frame forwarding decision.
//!
//! Callbacks for one peer are serialized by its connection task; callbacks
//! for different peers run concurrently.

pub mod contract;
pub mod envelope;
pub mod error;
pub mod peers;
pub mod rules;
pub mod server;
pub mod tls;

pub use contract::{FrameHandler, FrameSink};
pub use envelope::Envelope;
pub use error::NetError;
pub use peers::PeerTable;
pub use rules::{RuleAction, RuleTable};
pub use server::{PeerServer, ServerConfig};
