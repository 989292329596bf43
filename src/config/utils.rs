// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::debug;

use super::Config;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_energy_monitor --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema_str = include_str!("../../resources/config.schema.json");

    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Port Range**: API and Modbus ports within 1-65534
/// - **IP Address Format**: a malformed address only produces a debug line
/// - **Calibration**: every constant positive, ADC resolution within 1..=24
/// - **Timing**: non-zero sample interval
/// - **Retention**: at least one batch kept
/// - **Analysis**: positive fundamental, cutoff and grid step, non-zero filter order
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.visualization.port < 1 || config.visualization.port > 65534 {
        anyhow::bail!("Invalid port number: {}", config.visualization.port);
    }
    if config.modbus.port < 1 || config.modbus.port > 65534 {
        anyhow::bail!("Invalid Modbus port number: {}", config.modbus.port);
    }

    for address in [&config.visualization.address, &config.modbus.address] {
        if !is_valid_ip_address(address) {
            debug!("Potentially invalid address format: {}", address);
        }
    }

    config
        .calibration
        .validate()
        .context("Invalid calibration section")?;

    if config.acquisition.sample_interval_us == 0 {
        anyhow::bail!("acquisition.sample_interval_us must be greater than zero");
    }
    if config.acquisition.queue_capacity == 0 {
        anyhow::bail!("acquisition.queue_capacity must be greater than zero");
    }

    if config.storage.max_batches < 1 {
        anyhow::bail!("storage.max_batches must be at least 1");
    }

    let analysis = &config.analysis;
    if analysis.fundamental_hz <= 0.0 {
        anyhow::bail!(
            "analysis.fundamental_hz must be positive, got {}",
            analysis.fundamental_hz
        );
    }
    if analysis.cutoff_hz <= 0.0 {
        anyhow::bail!(
            "analysis.cutoff_hz must be positive, got {}",
            analysis.cutoff_hz
        );
    }
    if analysis.filter_order == 0 {
        anyhow::bail!("analysis.filter_order must be at least 1");
    }
    if analysis.harmonic_step_hz <= 0.0 {
        anyhow::bail!(
            "analysis.harmonic_step_hz must be positive, got {}",
            analysis.harmonic_step_hz
        );
    }

    Ok(())
}
