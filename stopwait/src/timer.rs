//! Flood retransmission.
//!
//! While a data packet is unacknowledged, [`RetransmitTimer`] re-sends it on
//! a fixed interval from a background tokio task: once immediately, then
//! every `interval`.  There is no RTT estimate and no back-off.
//!
//! The task only ever touches the channel, never session state.  The session
//! calls [`RetransmitTimer::stop`], which signals the task and awaits it, so
//! no transmission of the old packet can start after `stop` returns.  Dropping
//! the timer without stopping it (e.g. because the surrounding `send` future
//! was cancelled) aborts the task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::channel::{Channel, ChannelError};

/// Why the retransmission task finished.
#[derive(Debug)]
pub enum TimerExit {
    /// [`RetransmitTimer::stop`] was called.
    Stopped { attempts: u32 },
    /// The configured transmission bound was reached and one further
    /// interval passed without the task being stopped.
    Exhausted { attempts: u32 },
    /// The channel failed while sending.
    Failed(ChannelError),
    /// The task panicked or was aborted.
    Lost,
}

/// Handle to a running retransmission task.
#[derive(Debug)]
pub struct RetransmitTimer {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<TimerExit>>,
}

impl RetransmitTimer {
    /// Spawn the task.  The first transmission happens right away.
    ///
    /// `limit = None` retransmits until stopped.
    pub fn start<C: Channel>(
        channel: Arc<C>,
        dest: SocketAddr,
        packet: Vec<u8>,
        interval: Duration,
        limit: Option<u32>,
    ) -> Self {
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(flood(channel, dest, packet, interval, limit, stop_rx));
        Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Resolves when the task ends without having been stopped.
    ///
    /// Cancel-safe; once this has returned the timer is spent and
    /// [`stop`](Self::stop) reports [`TimerExit::Lost`].
    pub async fn finished(&mut self) -> TimerExit {
        match self.handle.as_mut() {
            Some(handle) => {
                let exit = join_exit(handle.await);
                self.handle = None;
                exit
            }
            None => std::future::pending().await,
        }
    }

    /// Stop retransmitting and wait for the task to wind down.
    pub async fn stop(mut self) -> TimerExit {
        if let Some(tx) = self.stop_tx.take() {
            // The task may already have exited; that is reported below.
            let _ = tx.send(());
        }
        match self.handle.take() {
            Some(handle) => join_exit(handle.await),
            None => TimerExit::Lost,
        }
    }
}

impl Drop for RetransmitTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

fn join_exit(res: Result<TimerExit, tokio::task::JoinError>) -> TimerExit {
    res.unwrap_or(TimerExit::Lost)
}

async fn flood<C: Channel>(
    channel: Arc<C>,
    dest: SocketAddr,
    packet: Vec<u8>,
    interval: Duration,
    limit: Option<u32>,
    mut stop_rx: oneshot::Receiver<()>,
) -> TimerExit {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut attempts = 0u32;

    loop {
        tokio::select! {
            biased;

            _ = &mut stop_rx => return TimerExit::Stopped { attempts },

            _ = ticker.tick() => {
                if limit.is_some_and(|max| attempts >= max) {
                    return TimerExit::Exhausted { attempts };
                }
                if let Err(e) = channel.send_to(&packet, dest).await {
                    return TimerExit::Failed(e);
                }
                attempts += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::Socket;

    async fn loopback() -> Socket {
        Socket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap()
    }

    #[tokio::test]
    async fn first_transmission_is_immediate() {
        let tx = Arc::new(loopback().await);
        let rx = loopback().await;

        let timer = RetransmitTimer::start(
            tx,
            rx.local_addr,
            b"ping".to_vec(),
            Duration::from_secs(60),
            None,
        );

        let mut buf = [0u8; 16];
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), rx.recv_from(&mut buf))
            .await
            .expect("no immediate transmission")
            .unwrap();
        assert_eq!(&buf[..n], b"ping");

        assert!(matches!(timer.stop().await, TimerExit::Stopped { attempts: 1 }));
    }

    #[tokio::test]
    async fn keeps_retransmitting_until_stopped() {
        let tx = Arc::new(loopback().await);
        let rx = loopback().await;

        let timer = RetransmitTimer::start(
            tx,
            rx.local_addr,
            b"again".to_vec(),
            Duration::from_millis(10),
            None,
        );

        let mut buf = [0u8; 16];
        for _ in 0..3 {
            let (n, _) = tokio::time::timeout(Duration::from_secs(2), rx.recv_from(&mut buf))
                .await
                .expect("retransmission missing")
                .unwrap();
            assert_eq!(&buf[..n], b"again");
        }

        match timer.stop().await {
            TimerExit::Stopped { attempts } => assert!(attempts >= 3),
            other => panic!("unexpected exit: {other:?}"),
        }
    }

    #[tokio::test]
    async fn bounded_timer_reports_exhaustion() {
        let tx = Arc::new(loopback().await);
        let rx = loopback().await;

        let mut timer = RetransmitTimer::start(
            tx,
            rx.local_addr,
            b"x".to_vec(),
            Duration::from_millis(5),
            Some(2),
        );

        let exit = tokio::time::timeout(Duration::from_secs(2), timer.finished())
            .await
            .expect("bounded timer never finished");
        assert!(matches!(exit, TimerExit::Exhausted { attempts: 2 }));
        assert!(matches!(timer.stop().await, TimerExit::Lost));
    }
}
