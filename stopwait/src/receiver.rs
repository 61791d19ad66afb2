//! Inbound state for stop-and-wait reliability.
//!
//! [`RecvState`] decides what to do with each received datagram:
//! - An intact DATA packet carrying `recv_seq` is **accepted**: its payload
//!   goes to the application and it is acknowledged with `recv_seq`.
//! - Corrupt datagrams and DATA carrying any other sequence (typically a
//!   retransmission of the packet accepted last) are **re-acknowledged**
//!   with `prev_recv_seq`, the last sequence actually accepted.
//! - Intact ACKs are **ignored**; answering them would start an ACK storm
//!   between two receiving peers.
//!
//! The [`RecvState`] does **not** send ACKs itself; it returns a
//! [`Verdict`] that [`crate::session::Session`] acts on.

use crate::packet::{Packet, PacketError, Tag};
use crate::seq::Seq;

/// What the session should do with one received datagram.
#[derive(Debug, PartialEq, Eq)]
pub enum Verdict<'a> {
    /// Deliver `payload`, then send `ACK(ack)`.
    Accept { payload: &'a [u8], ack: Seq },
    /// Drop the datagram and send `ACK(ack)`; `None` is the sentinel.
    Reack { ack: Option<Seq> },
    /// Drop the datagram silently.
    Ignore,
}

/// Stop-and-wait receive-side state for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecvState {
    /// Sequence number of the next packet to accept.
    pub recv_seq: Seq,
    /// Sequence number of the last accepted packet, `None` before the first.
    pub prev_recv_seq: Option<Seq>,
}

impl Default for RecvState {
    fn default() -> Self {
        Self::new()
    }
}

impl RecvState {
    /// Start-of-session state.
    pub fn new() -> Self {
        Self {
            recv_seq: Seq::ZERO,
            prev_recv_seq: None,
        }
    }

    /// Classify a datagram and advance the counters if it is accepted.
    ///
    /// `parsed` is the result of [`Packet::from_datagram`] on the datagram.
    pub fn on_datagram<'a>(&mut self, parsed: Result<Packet<'a>, PacketError>) -> Verdict<'a> {
        match parsed {
            Ok(pkt) if pkt.tag == Tag::Ack => Verdict::Ignore,
            Ok(pkt) if pkt.is_data(Some(self.recv_seq)) => {
                let ack = self.recv_seq;
                self.prev_recv_seq = Some(ack);
                self.recv_seq = ack.next();
                Verdict::Accept {
                    payload: pkt.payload,
                    ack,
                }
            }
            _ => Verdict::Reack {
                ack: self.prev_recv_seq,
            },
        }
    }

    /// `true` for an intact DATA packet that duplicates the last one
    /// accepted.  Used outside `receive` to keep a peer from retransmitting
    /// forever after its ACK got lost.
    pub fn is_duplicate_of_last(&self, pkt: &Packet<'_>) -> bool {
        pkt.is_data(self.prev_recv_seq)
    }
}
