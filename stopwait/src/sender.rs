//! Outbound state for stop-and-wait reliability.
//!
//! [`SendState`] tracks the sequence number of the single outstanding data
//! packet.  It does **not** touch the channel; [`crate::session::Session`]
//! calls these methods and owns the actual send/receive loop.
//!
//! # Stop-and-Wait contract
//! - At most **one** data packet is in flight at any moment.
//! - It carries `send_seq`.
//! - Only an intact ACK carrying exactly `send_seq` completes it; everything
//!   else (corrupt, wrong tag, stale sequence) is ignored.
//! - On completion `send_seq` advances by one, modulo the ring.

use crate::packet::{self, Packet, PacketError, Tag};
use crate::seq::Seq;

/// Stop-and-wait send-side state for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendState {
    /// Sequence number the next (or current) data packet carries.
    pub send_seq: Seq,
}

impl Default for SendState {
    fn default() -> Self {
        Self::new()
    }
}

impl SendState {
    /// Start-of-session state.
    pub fn new() -> Self {
        Self {
            send_seq: Seq::ZERO,
        }
    }

    /// Frame `payload` as the data packet for the current sequence number.
    pub fn build_data_packet(&self, payload: &[u8]) -> Result<Vec<u8>, PacketError> {
        packet::encode(Tag::Data, Some(self.send_seq), payload)
    }

    /// `true` if `pkt` acknowledges the outstanding data packet.
    pub fn is_ack_for_current(&self, pkt: &Packet<'_>) -> bool {
        pkt.is_ack(self.send_seq)
    }

    /// The outstanding packet was acknowledged; move to the next sequence.
    pub fn on_acked(&mut self) {
        self.send_seq = self.send_seq.next();
    }
}
