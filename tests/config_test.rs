// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use rust_energy_monitor::config::{Config, VisualizationConfig};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_and_save() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let mut config = Config {
        visualization: VisualizationConfig {
            port: 8081,
            address: "192.168.1.1".to_string(),
            name: "TestServer".to_string(),
            enabled: false,
        },
        ..Default::default()
    };
    config.calibration.burden_divisor = 33.0;
    config.storage.max_batches = 8;
    config.analysis.fundamental_hz = 50.0;

    config.save_to_file(&config_path)?;
    let loaded = Config::from_file(&config_path)?;

    assert_eq!(loaded.visualization.port, 8081);
    assert_eq!(loaded.visualization.address, "192.168.1.1");
    assert_eq!(loaded.visualization.name, "TestServer");
    assert!(!loaded.visualization.enabled);
    assert_eq!(loaded.calibration, config.calibration);
    assert_eq!(loaded.analysis, config.analysis);
    assert_eq!(loaded.storage.max_batches, 8);

    Ok(())
}

#[test]
fn test_missing_file_creates_default() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("non_existent.yaml");

    let config = Config::from_file(&path)?;

    assert!(path.exists());
    assert_eq!(config.visualization.port, 8080);
    assert_eq!(config.visualization.address, "127.0.0.1");
    assert_eq!(config.storage.max_batches, 4);
    assert_eq!(config.calibration.burden_divisor, 165.0);
    assert!(!config.modbus.enabled);

    Ok(())
}

#[test]
fn test_partial_file_uses_section_defaults() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("partial.yaml");
    fs::write(
        &path,
        "storage:\n  max_batches: 2\nanalysis:\n  fundamental_hz: 50.0\n",
    )?;

    let config = Config::from_file(&path)?;

    assert_eq!(config.storage.max_batches, 2);
    assert_eq!(config.storage.preview_len, 50);
    assert_eq!(config.analysis.fundamental_hz, 50.0);
    assert_eq!(config.analysis.cutoff_hz, 60.0);
    assert_eq!(config.calibration.adc_bits, 12);

    Ok(())
}

#[test]
fn test_apply_args() {
    let mut config = Config::default();

    config.apply_args(None, None, None, None, None);
    assert_eq!(config.visualization.port, 8080);
    assert!(!config.modbus.enabled);

    config.apply_args(
        Some(9000),
        Some("192.168.0.1".to_string()),
        Some(true),
        Some("0.0.0.0".to_string()),
        Some(1502),
    );

    assert_eq!(config.visualization.port, 9000);
    assert_eq!(config.visualization.address, "192.168.0.1");
    assert!(config.modbus.enabled);
    assert_eq!(config.modbus.address, "0.0.0.0");
    assert_eq!(config.modbus.port, 1502);
}

#[test]
fn test_schema_rejects_invalid_values() -> Result<()> {
    let temp_dir = tempdir()?;

    let cases = [
        ("zero_burden.yaml", "calibration:\n  burden_divisor: 0\n"),
        ("bits.yaml", "calibration:\n  adc_bits: 32\n"),
        ("port.yaml", "visualization:\n  port: 0\n"),
        ("retention.yaml", "storage:\n  max_batches: 0\n"),
        ("unknown.yaml", "storage:\n  max_batchs: 3\n"),
        ("threshold.yaml", "analysis:\n  load_threshold_deg: 120\n"),
    ];

    for (name, contents) in cases {
        let path = temp_dir.path().join(name);
        fs::write(&path, contents)?;
        let result = Config::from_file(&path);
        assert!(result.is_err(), "{} should be rejected", name);

        // The invalid file is kept and a sample is written next to it
        assert_eq!(fs::read_to_string(&path)?, contents);
        assert!(path.with_extension("sample.yaml").exists());
    }

    Ok(())
}

#[test]
fn test_malformed_yaml() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("broken.yaml");
    fs::write(&path, "storage: [max_batches: \n")?;

    let err = Config::from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse YAML"));

    Ok(())
}
