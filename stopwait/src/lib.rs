//! `stopwait` — a stop-and-wait reliable transport over an unreliable
//! datagram channel.
//!
//! # Architecture
//!
//! ```text
//!  Application
//!      │  send(payload) / receive() / reset()
//!  ┌───▼──────────────────────────────────────┐
//!  │                Session                   │
//!  │  SendState (send_seq)                    │──── RetransmitTimer
//!  │  RecvState (recv_seq, prev_recv_seq)     │     (floods DATA every
//!  └───┬──────────────────────────────────────┘      100 ms until ACKed)
//!      │ framed datagrams (4-byte header)                │
//!  ┌───▼─────────────────────────────────────────────────▼──┐
//!  │  Channel: Socket (UDP) or Simulator<Socket> (faults)   │
//!  └────────────────────────────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]     — wire format (framing, checksum, corruption check)
//! - [`seq`]        — the 127-value sequence ring
//! - [`channel`]    — the datagram transport contract
//! - [`socket`]     — UDP implementation of [`channel::Channel`]
//! - [`simulator`]  — lossy/corrupting/reordering channel for testing
//! - [`timer`]      — cancellable flood-retransmission task
//! - [`sender`]     — outbound sequence bookkeeping
//! - [`receiver`]   — inbound accept / re-ACK decisions
//! - [`session`]    — the blocking send / receive / reset API
//! - [`transfer`]   — chunking a byte stream into packets

pub mod channel;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod seq;
pub mod session;
pub mod simulator;
pub mod socket;
pub mod timer;
pub mod transfer;

pub use channel::{Channel, ChannelError};
pub use packet::{PacketError, Tag, MAX_PAYLOAD};
pub use seq::Seq;
pub use session::{ConfigError, Session, SessionConfig, SessionError};
pub use simulator::{Fault, Simulator, SimulatorConfig};
pub use socket::Socket;
