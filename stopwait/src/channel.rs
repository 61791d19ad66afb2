//! The unreliable datagram channel the protocol runs over.
//!
//! [`Channel`] is the whole contract the session layer needs from the
//! network: send one datagram to an address, receive one datagram and learn
//! where it came from.  Delivery is best-effort — datagrams may be dropped,
//! duplicated, reordered, delayed, or have bits flipped.  An implementation
//! must never resize a datagram.
//!
//! Both methods take `&self`: the session's retransmission task sends on the
//! same channel the foreground is receiving on.
//!
//! Implementations: [`crate::socket::Socket`] (real UDP) and
//! [`crate::simulator::Simulator`] (fault injection around another channel).

use std::future::Future;
use std::net::SocketAddr;

use thiserror::Error;

/// Fatal failures of the underlying channel.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Underlying I/O error from the OS.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The channel has been shut down.
    #[error("channel closed")]
    Closed,
}

/// A datagram transport with raw, unordered, possibly-corrupted delivery.
pub trait Channel: Send + Sync + 'static {
    /// Send `buf` as a single datagram to `dest`.
    fn send_to(
        &self,
        buf: &[u8],
        dest: SocketAddr,
    ) -> impl Future<Output = Result<(), ChannelError>> + Send;

    /// Receive the next datagram into `buf`.
    ///
    /// Returns `(len, source)`.  Must be cancel-safe: dropping the future
    /// before it completes loses no datagram.
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<(usize, SocketAddr), ChannelError>> + Send;

    /// Address this end of the channel is bound to.
    fn local_addr(&self) -> Result<SocketAddr, ChannelError>;
}
