//! Entry point for `stopwait`.
//!
//! Parses CLI arguments and dispatches into either **send** or **receive**
//! mode.  All actual protocol work is delegated to library modules;
//! `main.rs` owns only process setup (logging, argument parsing, files).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use stopwait::transfer::{receive_stream, send_stream};
use stopwait::{Session, SessionConfig, Simulator, SimulatorConfig, Socket};

/// Reliable file transfer over UDP with stop-and-wait ARQ.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    #[command(flatten)]
    session: SessionArgs,

    #[command(flatten)]
    faults: FaultArgs,

    /// Log every packet.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Mode {
    /// Send one or more files, resetting the session between them.
    Send {
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:9001")]
        bind: SocketAddr,
        /// Receiver address.
        #[arg(short, long)]
        peer: SocketAddr,
        /// Files to send, in order.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Receive files into a directory.
    Receive {
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
        /// Sender address.
        #[arg(short, long)]
        peer: SocketAddr,
        /// Where to write `received-<n>` files.
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
        /// How many files to expect.
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },
}

#[derive(Args)]
struct SessionArgs {
    /// Retransmission interval in milliseconds.
    #[arg(long, default_value_t = 100, global = true)]
    interval_ms: u64,
    /// Quiet period between files in milliseconds.
    #[arg(long, default_value_t = 5000, global = true)]
    quiet_ms: u64,
    /// Give up on a packet after this many transmissions (default: never).
    #[arg(long, global = true)]
    max_transmissions: Option<u32>,
}

/// Fault injection on this end's outgoing datagrams.
#[derive(Args)]
struct FaultArgs {
    #[arg(long, default_value_t = 0.0, global = true)]
    loss: f64,
    #[arg(long, default_value_t = 0.0, global = true)]
    corrupt: f64,
    #[arg(long, default_value_t = 0.0, global = true)]
    duplicate: f64,
    #[arg(long, default_value_t = 0.0, global = true)]
    reorder: f64,
    #[arg(long, default_value_t = 200, global = true)]
    reorder_delay_ms: u64,
    /// RNG seed for reproducible runs.
    #[arg(long, global = true)]
    seed: Option<u64>,
}

impl SessionArgs {
    fn config(&self, verbose: bool) -> SessionConfig {
        SessionConfig {
            retransmit_interval: Duration::from_millis(self.interval_ms),
            quiet_period: Duration::from_millis(self.quiet_ms),
            max_transmissions: self.max_transmissions,
            verbose,
        }
    }
}

impl FaultArgs {
    fn config(&self) -> SimulatorConfig {
        SimulatorConfig {
            loss_rate: self.loss,
            corrupt_rate: self.corrupt,
            duplicate_rate: self.duplicate,
            reorder_rate: self.reorder,
            reorder_delay: Duration::from_millis(self.reorder_delay_ms),
            seed: self.seed,
        }
    }
}

async fn open(
    bind: SocketAddr,
    peer: SocketAddr,
    cli: &Cli,
) -> Result<Session<Simulator<Socket>>> {
    let socket = Socket::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;
    log::info!("Bound {} ↔ peer {peer}", socket.local_addr);
    let channel = Simulator::new(socket, cli.faults.config())?;
    let config = cli.session.config(cli.verbose);
    config.validate()?;
    Ok(Session::new(Arc::new(channel), peer, config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG still wins; -v only changes the default.
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match &cli.mode {
        Mode::Send { bind, peer, files } => {
            let mut session = open(*bind, *peer, &cli).await?;
            for (i, path) in files.iter().enumerate() {
                if i > 0 {
                    session.reset().await?;
                }
                let mut file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("opening {}", path.display()))?;
                let bytes = send_stream(&mut session, &mut file).await?;
                log::info!("Sent {} ({bytes} bytes)", path.display());
            }
            log::info!("Channel stats: {:?}", session.channel().stats());
        }
        Mode::Receive {
            bind,
            peer,
            out_dir,
            count,
        } => {
            let mut session = open(*bind, *peer, &cli).await?;
            for i in 0..*count {
                if i > 0 {
                    session.reset().await?;
                }
                let path = out_dir.join(format!("received-{i}"));
                let mut file = tokio::fs::File::create(&path)
                    .await
                    .with_context(|| format!("creating {}", path.display()))?;
                let bytes = receive_stream(&mut session, &mut file).await?;
                log::info!("Received {} ({bytes} bytes)", path.display());
            }
            // Keep answering the sender's last retransmissions before exiting.
            session.reset().await?;
        }
    }

    Ok(())
}
