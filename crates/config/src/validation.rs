//! Configuration validation
//!
//! Cross-field constraints checked once at load time, so every later
//! component can assume a coherent configuration. All violations here are
//! fatal before any data flows.

use crate::error::{ConfigError, Result};
use crate::Config;

/// Validate the full configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_source(config)?;
    validate_assembly(config)?;
    validate_extractor(config)?;
    validate_oneshot(config)?;
    validate_relay(config)?;
    Ok(())
}

/// Validate only what relay mode touches
///
/// The relay never assembles fragments, so the assembly and extractor
/// sections may be absent entirely.
pub fn validate_relay_mode(config: &Config) -> Result<()> {
    validate_source(config)?;
    validate_oneshot(config)?;
    validate_relay(config)?;
    Ok(())
}

fn validate_source(config: &Config) -> Result<()> {
    if config.source.ring.is_empty() {
        return Err(ConfigError::missing_field("source", "ring"));
    }
    if !config.source.ring.contains("://") {
        return Err(ConfigError::invalid_value(
            "source",
            "ring",
            format!("'{}' is not a ring address (expected '<scheme>://...')", config.source.ring),
        ));
    }
    if config.source.poll_interval_ms == 0 {
        return Err(ConfigError::invalid_value(
            "source",
            "poll_interval_ms",
            "must be non-zero",
        ));
    }
    Ok(())
}

fn validate_assembly(config: &Config) -> Result<()> {
    // Without either path, headerless records have no source id.
    if config.assembly.ids.is_empty() && !config.assembly.expect_body_headers {
        return Err(ConfigError::NoSourceIdPath);
    }
    if config.assembly.batch_budget == 0 {
        return Err(ConfigError::invalid_value(
            "assembly",
            "batch_budget",
            "must be non-zero",
        ));
    }
    if let Some(default_id) = config.assembly.default_id
        && !config.assembly.ids.is_empty()
        && !config.assembly.ids.contains(&default_id)
    {
        return Err(ConfigError::invalid_value(
            "assembly",
            "default_id",
            format!("{default_id} is not in the allowed id list {:?}", config.assembly.ids),
        ));
    }
    Ok(())
}

fn validate_extractor(config: &Config) -> Result<()> {
    // Body headers make the extractor optional; otherwise one is required.
    if !config.assembly.expect_body_headers && config.extractor.name.is_none() {
        return Err(ConfigError::missing_field("extractor", "type"));
    }
    Ok(())
}

fn validate_oneshot(config: &Config) -> Result<()> {
    if config.oneshot.sources > 0 && config.oneshot.timeout_secs == 0 {
        return Err(ConfigError::invalid_value(
            "oneshot",
            "timeout_secs",
            "must be non-zero in one-shot mode",
        ));
    }
    Ok(())
}

fn validate_relay(config: &Config) -> Result<()> {
    if config.relay.queue_capacity == 0 {
        return Err(ConfigError::invalid_value(
            "relay",
            "queue_capacity",
            "must be non-zero",
        ));
    }
    if config.relay.output != "stdout" && !config.relay.output.contains("://") {
        return Err(ConfigError::invalid_value(
            "relay",
            "output",
            format!("'{}' is not 'stdout' or an address", config.relay.output),
        ));
    }
    Ok(())
}
