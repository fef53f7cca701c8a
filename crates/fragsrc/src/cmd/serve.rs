//! Serve command - drain a ring into event-builder fragments
//!
//! Attaches to the ring, runs the drain loop, and streams each fragment
//! batch to stdout as `[20-byte header][record image]` frames for the
//! downstream event builder. One-shot completion exits 0; fatal errors
//! propagate to main and exit non-zero.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use fragsrc_assembler::AcceptAll;
use fragsrc_config::Config;
use fragsrc_sinks::StreamClient;
use fragsrc_source::{DrainConfig, DrainLoop, DrainOutcome, OneshotState, RingAddress, TcpRing};

/// Serve command arguments
///
/// Every flag overrides the corresponding config file setting.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ring address, e.g. tcp://daq-host:30000
    #[arg(long)]
    pub ring: Option<String>,

    /// Allowed source ids, comma separated
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<u32>,

    /// Expect a body header on every record
    #[arg(long)]
    pub expect_body_headers: bool,

    /// Source id for records without a body header
    #[arg(long)]
    pub default_id: Option<u32>,

    /// Timestamp extractor name (see `fragsrc check` for the registry)
    #[arg(long)]
    pub timestamp_extractor: Option<String>,

    /// Exit after this many sources deliver end-of-run
    #[arg(long, value_name = "SOURCES")]
    pub oneshot: Option<u32>,

    /// Idle seconds tolerated after the first end-of-run
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Tick adjustment added to every resolved timestamp
    #[arg(long)]
    pub offset: Option<i64>,
}

/// Run the serve command
pub async fn run(args: ServeArgs) -> Result<()> {
    let mut config = super::read_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args);
    config.validate().context("invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        ring = %config.source.ring,
        oneshot = config.oneshot_enabled(),
        "fragsrc starting"
    );

    let ring = match RingAddress::parse(&config.source.ring)? {
        RingAddress::Tcp(authority) => TcpRing::attach(&authority).await?,
        RingAddress::Memory(name) => {
            bail!("mem://{name} rings are in-process only; a standalone serve needs tcp://")
        }
    };

    let assembler = super::build_assembler(&config)?;
    let client = StreamClient::stdout();

    let drain_config = DrainConfig {
        poll_interval: Duration::from_millis(config.source.poll_interval_ms),
        batch_budget: config.assembly.batch_budget,
    };
    let mut drain =
        DrainLoop::new(ring, Box::new(AcceptAll), assembler, client).with_config(drain_config);
    if config.oneshot_enabled() {
        drain = drain.with_oneshot(OneshotState::new(
            config.oneshot.sources,
            Duration::from_secs(config.oneshot.timeout_secs),
        ));
    }

    let cancel = CancellationToken::new();
    let mut task = tokio::spawn(drain.run(cancel.clone()));

    let outcome = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
            cancel.cancel();
            task.await.context("drain task panicked")??
        }
        res = &mut task => res.context("drain task panicked")??,
    };

    match outcome {
        DrainOutcome::Completed => info!("one-shot run complete"),
        DrainOutcome::Cancelled => info!("stopped by signal"),
    }
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &ServeArgs) {
    if let Some(ring) = &args.ring {
        config.source.ring = ring.clone();
    }
    if !args.ids.is_empty() {
        config.assembly.ids = args.ids.clone();
    }
    if args.expect_body_headers {
        config.assembly.expect_body_headers = true;
    }
    if let Some(id) = args.default_id {
        config.assembly.default_id = Some(id);
    }
    if let Some(name) = &args.timestamp_extractor {
        config.extractor.name = Some(name.clone());
    }
    if let Some(sources) = args.oneshot {
        config.oneshot.sources = sources;
    }
    if let Some(secs) = args.timeout {
        config.oneshot.timeout_secs = secs;
    }
    if let Some(offset) = args.offset {
        config.assembly.tick_offset = offset;
    }
}
