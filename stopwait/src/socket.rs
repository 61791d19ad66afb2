//! Async UDP socket channel.
//!
//! [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` implementing
//! [`Channel`].  All protocol logic lives elsewhere; this module owns only
//! byte I/O.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::channel::{Channel, ChannelError};

/// A real UDP endpoint.
///
/// All methods are `&self`, and tokio allows a send and a receive to be in
/// progress on the same socket at once, so one `Socket` can be shared
/// between the session and its retransmission task.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing port `0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, ChannelError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }
}

impl Channel for Socket {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> Result<(), ChannelError> {
        self.inner.send_to(buf, dest).await?;
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), ChannelError> {
        loop {
            match self.inner.recv_from(buf).await {
                Ok(v) => return Ok(v),
                // ICMP port-unreachable surfacing on some platforms while the
                // peer is not up yet; the datagram is lost, not the socket.
                Err(e) if is_unreachable_peer(&e) => {
                    log::trace!("[socket] ignoring {e}");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        Ok(self.local_addr)
    }
}

fn is_unreachable_peer(e: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        e.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset
    )
}
