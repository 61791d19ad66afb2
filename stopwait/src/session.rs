//! Reliable stop-and-wait session.
//!
//! A [`Session`] owns the complete state for one logical exchange with one
//! peer.  Its responsibilities are:
//! - Framing outgoing payloads and flooding them until acknowledged
//!   ([`Session::send`]).
//! - Accepting the next in-order payload and acknowledging every datagram it
//!   reads ([`Session::receive`]).
//! - Resynchronising both sequence counters after a quiet period
//!   ([`Session::reset`]).
//!
//! Counter bookkeeping lives in [`crate::sender`] and [`crate::receiver`];
//! this module owns the loops around the channel.
//!
//! # Blocking semantics
//!
//! `send` and `receive` wait for as long as it takes: loss and corruption are
//! never reported, only masked.  The only errors are caller mistakes
//! (oversized payloads, an invalid [`SessionConfig`]), channel failures, and, when
//! [`SessionConfig::max_transmissions`] is set, giving up.  Dropping either
//! future cancels the operation without touching the counters.
//!
//! All three operations take `&mut self`, so one session can never have two
//! sends, or a reset and an exchange, in progress at once.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::channel::{Channel, ChannelError};
use crate::packet::{self, Packet, PacketError, Tag, MAX_PACKET_LEN};
use crate::receiver::{RecvState, Verdict};
use crate::sender::SendState;
use crate::seq::{Seq, Show};
use crate::socket::Socket;
use crate::timer::{RetransmitTimer, TimerExit};

/// Per-packet diagnostics, emitted only when the session is verbose.
macro_rules! trace_pkt {
    ($session:expr, $($arg:tt)+) => {
        if $session.config.verbose {
            log::debug!($($arg)+);
        }
    };
}

/// Timing and diagnostics knobs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Gap between transmissions of an unacknowledged packet.
    pub retransmit_interval: Duration,
    /// How long [`Session::reset`] drains the channel.
    pub quiet_period: Duration,
    /// Give up after this many unanswered transmissions; `None` never does.
    pub max_transmissions: Option<u32>,
    /// Log every packet at `debug`.
    pub verbose: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retransmit_interval: Duration::from_millis(100),
            quiet_period: Duration::from_secs(5),
            max_transmissions: None,
            verbose: false,
        }
    }
}

/// Invalid session configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("retransmit_interval must be non-zero")]
    ZeroRetransmitInterval,
    #[error("max_transmissions must be at least 1")]
    ZeroTransmissions,
}

impl SessionConfig {
    /// Reject settings the retransmission loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retransmit_interval.is_zero() {
            return Err(ConfigError::ZeroRetransmitInterval);
        }
        if self.max_transmissions == Some(0) {
            return Err(ConfigError::ZeroTransmissions);
        }
        Ok(())
    }
}

/// Errors surfaced by a [`Session`].
#[derive(Error, Debug)]
pub enum SessionError {
    /// The payload cannot be framed (too large for one packet).
    #[error("cannot frame payload: {0}")]
    Packet(#[from] PacketError),
    /// The underlying channel failed; the session is unusable.
    #[error("channel failure: {0}")]
    Channel(#[from] ChannelError),
    /// [`SessionConfig::max_transmissions`] was reached without an ACK.
    #[error("no acknowledgement after {attempts} transmissions")]
    RetransmitLimit { attempts: u32 },
    /// [`SessionConfig::validate`] rejected the configuration.
    #[error("invalid session config: {0}")]
    Config(#[from] ConfigError),
    /// The retransmission task ended without being asked to.
    #[error("retransmission task ended unexpectedly")]
    RetransmitTask,
}

/// One end of a reliable stop-and-wait exchange with a single peer.
#[derive(Debug)]
pub struct Session<C> {
    /// Shared with the retransmission task while a send is in progress.
    channel: Arc<C>,
    peer: SocketAddr,
    config: SessionConfig,
    sender: SendState,
    receiver: RecvState,
}

impl Session<Socket> {
    /// Bind a UDP socket on `local` and talk to `peer` over it.
    pub async fn bind(
        local: SocketAddr,
        peer: SocketAddr,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let socket = Socket::bind(local).await?;
        log::info!("[sw] bound {} ↔ peer {peer}", socket.local_addr);
        Ok(Self::new(Arc::new(socket), peer, config))
    }
}

impl<C: Channel> Session<C> {
    /// A fresh session over `channel`, at the start-of-session counters.
    ///
    /// `config` is checked when it is first needed: an invalid one makes
    /// every [`send`](Self::send) fail with [`SessionError::Config`].
    pub fn new(channel: Arc<C>, peer: SocketAddr, config: SessionConfig) -> Self {
        Self {
            channel,
            peer,
            config,
            sender: SendState::new(),
            receiver: RecvState::new(),
        }
    }

    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr, SessionError> {
        Ok(self.channel.local_addr()?)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Toggle per-packet diagnostics.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.config.verbose = verbose;
    }

    /// Sequence number the next data packet will carry.
    pub fn send_seq(&self) -> Seq {
        self.sender.send_seq
    }

    /// Sequence number the next accepted packet must carry.
    pub fn recv_seq(&self) -> Seq {
        self.receiver.recv_seq
    }

    /// Last accepted sequence number, `None` before the first.
    pub fn prev_recv_seq(&self) -> Option<Seq> {
        self.receiver.prev_recv_seq
    }

    /// Deliver `payload` to the peer.
    ///
    /// Floods the framed packet every [`SessionConfig::retransmit_interval`]
    /// until the peer acknowledges this exact sequence number, then advances
    /// `send_seq`.  Payloads over [`packet::MAX_PAYLOAD`] bytes, and an
    /// invalid config, fail before anything is sent.
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), SessionError> {
        self.config.validate()?;
        let framed = self.sender.build_data_packet(payload)?;
        let seq = self.sender.send_seq;
        trace_pkt!(self, "[sw] → DATA seq={seq} len={}", payload.len());

        let mut timer = RetransmitTimer::start(
            Arc::clone(&self.channel),
            self.peer,
            framed,
            self.config.retransmit_interval,
            self.config.max_transmissions,
        );

        let mut buf = [0u8; MAX_PACKET_LEN];
        loop {
            tokio::select! {
                exit = timer.finished() => {
                    return Err(self.unexpected_exit(exit, seq));
                }
                result = self.channel.recv_from(&mut buf) => {
                    let (n, from) = result?;
                    if from != self.peer {
                        trace_pkt!(self, "[sw] ← {n} bytes from stranger {from}; dropped");
                        continue;
                    }
                    match Packet::from_datagram(&buf[..n]) {
                        Ok(pkt) if self.sender.is_ack_for_current(&pkt) => break,
                        Ok(pkt) if self.receiver.is_duplicate_of_last(&pkt) => {
                            let last = self.receiver.prev_recv_seq;
                            trace_pkt!(self, "[sw] ← stale DATA seq={}; → ACK", Show(last));
                            self.send_ack(last).await?;
                        }
                        Ok(pkt) => {
                            trace_pkt!(
                                self,
                                "[sw] ← {:?} seq={} while awaiting ACK {seq}; ignored",
                                pkt.tag,
                                Show(pkt.seq)
                            );
                        }
                        Err(e) => {
                            trace_pkt!(self, "[sw] ← corrupt datagram ({e}); ignored");
                        }
                    }
                }
            }
        }

        match timer.stop().await {
            TimerExit::Stopped { attempts } => {
                trace_pkt!(self, "[sw] ← ACK seq={seq} after {attempts} transmission(s)");
            }
            // The ACK is in hand, so the packet got through regardless.
            other => log::debug!("[sw] ← ACK seq={seq}; retransmit task ended with {other:?}"),
        }
        self.sender.on_acked();
        Ok(())
    }

    /// Wait for the next in-order payload from the peer.
    ///
    /// Every datagram read is answered with exactly one ACK, except intact
    /// ACKs, which are dropped: `ACK(recv_seq)` when it is accepted,
    /// `ACK(prev_recv_seq)` when it is corrupt or out of sequence.
    /// Duplicates are never delivered twice.
    pub async fn receive(&mut self) -> Result<Vec<u8>, SessionError> {
        let mut buf = [0u8; MAX_PACKET_LEN];
        loop {
            let (n, from) = self.channel.recv_from(&mut buf).await?;
            if from != self.peer {
                trace_pkt!(self, "[sw] ← {n} bytes from stranger {from}; dropped");
                continue;
            }

            let parsed = Packet::from_datagram(&buf[..n]);
            if let Err(e) = &parsed {
                trace_pkt!(self, "[sw] ← corrupt datagram ({e})");
            }

            match self.receiver.on_datagram(parsed) {
                Verdict::Accept { payload, ack } => {
                    let payload = payload.to_vec();
                    trace_pkt!(self, "[sw] ← DATA seq={ack} len={}; → ACK", payload.len());
                    self.send_ack(Some(ack)).await?;
                    return Ok(payload);
                }
                Verdict::Reack { ack } => {
                    trace_pkt!(
                        self,
                        "[sw] want seq={}; → ACK seq={}",
                        self.receiver.recv_seq,
                        Show(ack)
                    );
                    self.send_ack(ack).await?;
                }
                Verdict::Ignore => {
                    trace_pkt!(self, "[sw] ← ACK while receiving; ignored");
                }
            }
        }
    }

    /// Start a new logical session on the same channel.
    ///
    /// Drains the channel for [`SessionConfig::quiet_period`] so duplicates
    /// from the previous exchange cannot be mistaken for the next one's
    /// packets, then returns every counter to its start-of-session value.
    /// Intact repeats of the last accepted packet are still acknowledged
    /// while draining, so a peer whose final ACK was lost can finish.
    pub async fn reset(&mut self) -> Result<(), SessionError> {
        log::info!("[sw] reset: draining for {:?}", self.config.quiet_period);

        let quiet = tokio::time::sleep(self.config.quiet_period);
        tokio::pin!(quiet);

        let mut buf = [0u8; MAX_PACKET_LEN];
        let mut drained = 0usize;
        loop {
            tokio::select! {
                _ = &mut quiet => break,
                result = self.channel.recv_from(&mut buf) => {
                    let (n, from) = result?;
                    if from != self.peer {
                        continue;
                    }
                    drained += 1;
                    if let Ok(pkt) = Packet::from_datagram(&buf[..n]) {
                        if self.receiver.is_duplicate_of_last(&pkt) {
                            self.send_ack(self.receiver.prev_recv_seq).await?;
                        }
                    }
                }
            }
        }

        self.sender = SendState::new();
        self.receiver = RecvState::new();
        log::info!("[sw] reset complete; discarded {drained} stale datagram(s)");
        Ok(())
    }

    async fn send_ack(&self, seq: Option<Seq>) -> Result<(), SessionError> {
        let ack = packet::encode(Tag::Ack, seq, &[])?;
        self.channel.send_to(&ack, self.peer).await?;
        Ok(())
    }

    fn unexpected_exit(&self, exit: TimerExit, seq: Seq) -> SessionError {
        match exit {
            TimerExit::Exhausted { attempts } => {
                log::warn!("[sw] DATA seq={seq} unacknowledged after {attempts} transmission(s)");
                SessionError::RetransmitLimit { attempts }
            }
            TimerExit::Failed(e) => SessionError::Channel(e),
            TimerExit::Stopped { .. } | TimerExit::Lost => SessionError::RetransmitTask,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(SessionConfig::default().validate(), Ok(()));
    }

    #[test]
    fn zero_interval_and_zero_budget_are_rejected() {
        let cfg = SessionConfig {
            retransmit_interval: Duration::ZERO,
            ..SessionConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroRetransmitInterval));

        let cfg = SessionConfig {
            max_transmissions: Some(0),
            ..SessionConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTransmissions));
    }
}
