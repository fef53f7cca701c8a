//! Check command - validate configuration and print resolved settings

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use fragsrc_source::RingAddress;

/// Check command arguments
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Run the check command
pub async fn run(args: CheckArgs) -> Result<()> {
    let config = super::read_config(args.config.as_deref())?;
    config.validate().context("invalid configuration")?;

    let address = RingAddress::parse(&config.source.ring)?;
    // Building the assembler exercises the extractor factory too, so a bad
    // parameter table surfaces here instead of at serve time.
    let assembler = super::build_assembler(&config)?;

    println!("configuration ok");
    println!("  ring:                {address}");
    println!("  poll interval:       {} ms", config.source.poll_interval_ms);
    println!("  allowed ids:         {:?}", config.assembly.ids);
    println!("  default id:          {:?}", config.resolved_default_id());
    println!(
        "  expect body headers: {}",
        config.assembly.expect_body_headers
    );
    println!("  extractor:           {}", assembler.extractor_name());
    println!("  tick offset:         {}", config.assembly.tick_offset);
    println!("  batch budget:        {} bytes", config.assembly.batch_budget);
    if config.oneshot_enabled() {
        println!(
            "  oneshot:             {} sources, {} s idle timeout",
            config.oneshot.sources, config.oneshot.timeout_secs
        );
    } else {
        println!("  oneshot:             off");
    }
    println!(
        "  relay queue:         {} slots, {}",
        config.relay.queue_capacity,
        if config.relay.non_blocking {
            "drop on full"
        } else {
            "blocking"
        }
    );
    println!("  relay output:        {}", config.relay.output);

    Ok(())
}
