//! Fault-injecting channel for testing.
//!
//! Real networks drop, reorder, duplicate and corrupt packets.  To exercise
//! the reliability mechanisms without depending on actual network
//! conditions, [`Simulator`] wraps another [`Channel`] and applies a fault
//! model to every datagram it sends:
//!
//! | Fault            | Description                                        |
//! |------------------|----------------------------------------------------|
//! | Packet loss      | Drop a datagram with probability `loss_rate`.      |
//! | Corruption       | Flip one random bit with probability `corrupt_rate`.|
//! | Duplication      | Send a datagram twice.                             |
//! | Reordering       | Hold a datagram back for `reorder_delay`, letting  |
//! |                  | later datagrams overtake it.                       |
//!
//! A fault *script* can be queued in front of the random model so a test
//! can say exactly what happens to the first few datagrams.  The RNG is
//! seeded from [`SimulatorConfig::seed`] so failures are reproducible.
//!
//! Receives pass straight through to the inner channel.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::channel::{Channel, ChannelError};

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Probability that any given datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that a datagram has one bit flipped.
    pub corrupt_rate: f64,
    /// Probability that a datagram is sent twice.
    pub duplicate_rate: f64,
    /// Probability that a datagram is held back.
    pub reorder_rate: f64,
    /// How long a held-back datagram waits.
    pub reorder_delay: Duration,
    /// RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        // No faults by default — simulator is a transparent pass-through.
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            duplicate_rate: 0.0,
            reorder_rate: 0.0,
            reorder_delay: Duration::ZERO,
            seed: None,
        }
    }
}

/// Invalid simulator configuration.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{name} must be within [0, 1], got {value}")]
pub struct RateError {
    pub name: &'static str,
    pub value: f64,
}

impl SimulatorConfig {
    /// Reject probabilities outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), RateError> {
        for (name, value) in [
            ("loss_rate", self.loss_rate),
            ("corrupt_rate", self.corrupt_rate),
            ("duplicate_rate", self.duplicate_rate),
            ("reorder_rate", self.reorder_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RateError { name, value });
            }
        }
        Ok(())
    }
}

/// What happens to one outgoing datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Deliver,
    Drop,
    /// Flip one random bit.
    Corrupt,
    /// Deliver two copies.
    Duplicate,
    /// Deliver after the given delay.
    Delay(Duration),
}

/// Running totals, for assertions and logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulatorStats {
    /// Datagrams handed to [`Channel::send_to`].
    pub sent: u64,
    pub dropped: u64,
    pub corrupted: u64,
    pub duplicated: u64,
    pub delayed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    sent: AtomicU64,
    dropped: AtomicU64,
    corrupted: AtomicU64,
    duplicated: AtomicU64,
    delayed: AtomicU64,
}

#[derive(Debug)]
struct FaultState {
    rng: StdRng,
    script: VecDeque<Fault>,
}

/// A fault-injecting wrapper around another channel.
#[derive(Debug)]
pub struct Simulator<C> {
    inner: Arc<C>,
    config: SimulatorConfig,
    state: Mutex<FaultState>,
    counters: Counters,
}

impl<C: Channel> Simulator<C> {
    /// Wrap `inner`.  Fails if `config` has an out-of-range probability.
    pub fn new(inner: C, config: SimulatorConfig) -> Result<Self, RateError> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            inner: Arc::new(inner),
            config,
            state: Mutex::new(FaultState {
                rng,
                script: VecDeque::new(),
            }),
            counters: Counters::default(),
        })
    }

    /// Queue faults for the next datagrams, ahead of the random model.
    pub fn push_script(&self, faults: impl IntoIterator<Item = Fault>) {
        self.lock_state().script.extend(faults);
    }

    /// The wrapped channel.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn stats(&self) -> SimulatorStats {
        let c = &self.counters;
        SimulatorStats {
            sent: c.sent.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            corrupted: c.corrupted.load(Ordering::Relaxed),
            duplicated: c.duplicated.load(Ordering::Relaxed),
            delayed: c.delayed.load(Ordering::Relaxed),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, FaultState> {
        // The state is a plain RNG and queue; a panic elsewhere cannot leave
        // it half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick the fault for the next datagram and, for corruption, which bit.
    fn roll(&self, len: usize) -> (Fault, usize) {
        let mut state = self.lock_state();
        let fault = match state.script.pop_front() {
            Some(fault) => fault,
            None => {
                let cfg = &self.config;
                let rng = &mut state.rng;
                if rng.random_bool(cfg.loss_rate) {
                    Fault::Drop
                } else if rng.random_bool(cfg.corrupt_rate) {
                    Fault::Corrupt
                } else if rng.random_bool(cfg.duplicate_rate) {
                    Fault::Duplicate
                } else if rng.random_bool(cfg.reorder_rate) {
                    Fault::Delay(cfg.reorder_delay)
                } else {
                    Fault::Deliver
                }
            }
        };
        let bit = if len == 0 {
            0
        } else {
            state.rng.random_range(0..len * 8)
        };
        (fault, bit)
    }
}

impl<C: Channel> Channel for Simulator<C> {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> Result<(), ChannelError> {
        self.counters.sent.fetch_add(1, Ordering::Relaxed);
        let (fault, bit) = self.roll(buf.len());

        match fault {
            Fault::Deliver => self.inner.send_to(buf, dest).await,
            Fault::Drop => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                log::trace!("[sim] drop {} bytes → {dest}", buf.len());
                Ok(())
            }
            Fault::Corrupt => {
                self.counters.corrupted.fetch_add(1, Ordering::Relaxed);
                let mut mangled = buf.to_vec();
                if let Some(byte) = mangled.get_mut(bit / 8) {
                    *byte ^= 1 << (bit % 8);
                }
                log::trace!("[sim] flip bit {bit} → {dest}");
                self.inner.send_to(&mangled, dest).await
            }
            Fault::Duplicate => {
                self.counters.duplicated.fetch_add(1, Ordering::Relaxed);
                log::trace!("[sim] duplicate {} bytes → {dest}", buf.len());
                self.inner.send_to(buf, dest).await?;
                self.inner.send_to(buf, dest).await
            }
            Fault::Delay(delay) => {
                self.counters.delayed.fetch_add(1, Ordering::Relaxed);
                log::trace!("[sim] delay {} bytes by {delay:?} → {dest}", buf.len());
                let inner = Arc::clone(&self.inner);
                let held = buf.to_vec();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = inner.send_to(&held, dest).await {
                        log::debug!("[sim] delayed send failed: {e}");
                    }
                });
                Ok(())
            }
        }
    }

    async fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), ChannelError> {
        self.inner.recv_from(buf).await
    }

    fn local_addr(&self) -> Result<SocketAddr, ChannelError> {
        self.inner.local_addr()
    }
}
