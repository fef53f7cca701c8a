//! Command implementations

pub mod check;
pub mod relay;
pub mod serve;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::info;

use fragsrc_assembler::{AssemblerPolicy, FragmentAssembler, NullExtractor, default_registry};
use fragsrc_config::Config;

/// Config file locations probed when `--config` is not given
const DEFAULT_CONFIG_PATHS: &[&str] = &["configs/fragsrc.toml", "fragsrc.toml"];

/// Read the configuration file without validating it
///
/// Commands merge their own CLI overrides on top and validate the result,
/// so a file that is incomplete on its own is fine here. An explicitly
/// given path must exist; otherwise the default paths are probed and an
/// all-defaults config is the fallback.
fn read_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("config file not found: {}", path.display());
            }
            Config::read_file(path).context("failed to load configuration")
        }
        None => {
            for candidate in DEFAULT_CONFIG_PATHS {
                let path = Path::new(candidate);
                if path.exists() {
                    info!(config = %path.display(), "using config file");
                    return Config::read_file(path).context("failed to load configuration");
                }
            }
            Ok(Config::default())
        }
    }
}

/// Build the fragment assembler from a validated configuration
fn build_assembler(config: &Config) -> Result<FragmentAssembler> {
    let policy = AssemblerPolicy {
        default_id: config.resolved_default_id(),
        allowed_ids: config.assembly.ids.clone(),
        expect_body_headers: config.assembly.expect_body_headers,
        tick_offset: config.assembly.tick_offset,
    };

    let extractor = match &config.extractor.name {
        Some(name) => default_registry()
            .create(name, &config.extractor.params)
            .context("failed to build timestamp extractor")?,
        // Validation only lets the name be absent when body headers are
        // expected on every record.
        None => Arc::new(NullExtractor),
    };

    FragmentAssembler::new(policy, extractor).context("invalid assembly policy")
}
