//! Relay command - pass raw records through to an output sink
//!
//! Wires ring -> relay producer -> bounded queue -> output drain. The two
//! tasks share nothing but the queue; admission mode decides whether a
//! full queue drops records or exerts backpressure on the ring side.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use fragsrc_config::Config;
use fragsrc_protocol::RawRecord;
use fragsrc_sinks::{OutputDrain, OutputOutcome};
use fragsrc_source::{AdmissionMode, RecordRelay, RelayConfig, RingAddress, TcpRing};

/// Relay command arguments
///
/// Every flag overrides the corresponding config file setting.
#[derive(Args, Debug, Default)]
pub struct RelayArgs {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ring address, e.g. tcp://daq-host:30000
    #[arg(long)]
    pub ring: Option<String>,

    /// Drop records when the queue is full instead of waiting
    #[arg(long)]
    pub non_blocking: bool,

    /// Exit after writing an end-of-run record
    #[arg(long)]
    pub exit_on_end: bool,

    /// Output sink: stdout or tcp://host:port
    #[arg(long)]
    pub output: Option<String>,

    /// Stop reading after this many sources deliver end-of-run
    #[arg(long, value_name = "SOURCES")]
    pub oneshot: Option<u32>,
}

/// Run the relay command
pub async fn run(args: RelayArgs) -> Result<()> {
    let mut config = super::read_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config
        .validate_relay_mode()
        .context("invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        ring = %config.source.ring,
        output = %config.relay.output,
        "fragsrc relay starting"
    );

    let ring = match RingAddress::parse(&config.source.ring)? {
        RingAddress::Tcp(authority) => TcpRing::attach(&authority).await?,
        RingAddress::Memory(name) => {
            bail!("mem://{name} rings are in-process only; a standalone relay needs tcp://")
        }
    };

    let (producer, consumer) = fragsrc_queue::bounded::<RawRecord>(config.relay.queue_capacity);

    let relay_config = RelayConfig {
        poll_interval: Duration::from_millis(config.source.poll_interval_ms),
        admission: if config.relay.non_blocking {
            AdmissionMode::NonBlocking
        } else {
            AdmissionMode::Blocking
        },
        stop_after_ends: (config.oneshot.sources > 0).then_some(config.oneshot.sources),
    };
    let relay = RecordRelay::new(ring, producer).with_config(relay_config);

    let sink = open_sink(&config.relay.output).await?;
    let drain = OutputDrain::new(consumer, sink)
        .exit_on_end(config.relay.exit_on_end)
        .default_source(config.relay.default_id);

    let cancel = CancellationToken::new();
    let mut relay_task = tokio::spawn(relay.run(cancel.clone()));
    let mut output_task = tokio::spawn(drain.run(cancel.clone()));

    let outcome = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
            cancel.cancel();
            relay_task.await.context("relay task panicked")??;
            output_task.await.context("output task panicked")??
        }
        res = &mut relay_task => {
            res.context("relay task panicked")??;
            // Producer gone: the output drain flushes everything still in
            // flight, then sees the queue close.
            output_task.await.context("output task panicked")??
        }
        res = &mut output_task => {
            let outcome = res.context("output task panicked")??;
            // The relay has nothing left to feed; stop its ring polling.
            cancel.cancel();
            relay_task.await.context("relay task panicked")??;
            outcome
        }
    };

    match outcome {
        OutputOutcome::EndOfRun => info!("end of run written, exiting"),
        OutputOutcome::QueueClosed => info!("ring side done, queue drained"),
        OutputOutcome::Cancelled => info!("stopped by signal"),
    }
    Ok(())
}

/// Open the byte sink named by the `output` setting
async fn open_sink(output: &str) -> Result<Box<dyn AsyncWrite + Send + Unpin>> {
    if output == "stdout" {
        return Ok(Box::new(tokio::io::stdout()));
    }
    let authority = output
        .strip_prefix("tcp://")
        .ok_or_else(|| anyhow!("unsupported output '{output}' (expected stdout or tcp://...)"))?;
    let stream = TcpStream::connect(authority)
        .await
        .with_context(|| format!("failed to connect output to {output}"))?;
    Ok(Box::new(stream))
}

fn apply_overrides(config: &mut Config, args: &RelayArgs) {
    if let Some(ring) = &args.ring {
        config.source.ring = ring.clone();
    }
    if args.non_blocking {
        config.relay.non_blocking = true;
    }
    if args.exit_on_end {
        config.relay.exit_on_end = true;
    }
    if let Some(output) = &args.output {
        config.relay.output = output.clone();
    }
    if let Some(sources) = args.oneshot {
        config.oneshot.sources = sources;
    }
}
