// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Synthetic mains payload generator
// Writes upload payloads in the same JSON shape the acquisition board posts

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use clap::Parser;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use rust_energy_monitor::utility::{MainsWaveform, WaveformGenerator};

/// Synthetic mains waveform generator
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Output file path (.json); stdout when omitted
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Number of payloads to generate
    #[arg(short = 'n', long, default_value_t = 1)]
    count: usize,

    /// Samples per channel in each payload
    #[arg(short, long, default_value_t = 1000)]
    samples: usize,

    /// Sample rate in Hz
    #[arg(short = 'r', long, default_value_t = 500.0)]
    sample_rate: f64,

    /// Mains fundamental frequency in Hz
    #[arg(short, long, default_value_t = 60.0)]
    frequency: f64,

    /// Current lag behind voltage in degrees (negative for a leading current)
    #[arg(short = 'l', long, default_value_t = 0.0, allow_hyphen_values = true)]
    phase_lag: f64,

    /// Voltage swing around mid-scale, in ADC codes
    #[arg(long, default_value_t = 1200.0)]
    voltage_peak: f64,

    /// Current swing around mid-scale, in ADC codes
    #[arg(long, default_value_t = 800.0)]
    current_peak: f64,

    /// Current harmonic as ORDER:RELATIVE_AMPLITUDE, repeatable (e.g. 3:0.2)
    #[arg(long = "harmonic", value_parser = parse_harmonic)]
    harmonics: Vec<(u32, f64)>,

    /// Gaussian noise standard deviation, in ADC codes
    #[arg(long, default_value_t = 0.0)]
    noise: f64,

    /// ADC resolution in bits
    #[arg(long, default_value_t = 12)]
    adc_bits: u32,

    /// Seed for reproducible noise; system time when omitted
    #[arg(long)]
    seed: Option<u32>,
}

fn parse_harmonic(value: &str) -> Result<(u32, f64), String> {
    let (order, relative) = value
        .split_once(':')
        .ok_or_else(|| format!("expected ORDER:AMPLITUDE, got '{value}'"))?;
    let order = order
        .parse::<u32>()
        .map_err(|e| format!("invalid harmonic order '{order}': {e}"))?;
    let relative = relative
        .parse::<f64>()
        .map_err(|e| format!("invalid harmonic amplitude '{relative}': {e}"))?;
    if order < 2 {
        return Err(format!("harmonic order must be at least 2, got {order}"));
    }
    Ok((order, relative))
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.sample_rate <= 0.0 {
        bail!("Sample rate must be positive");
    }
    if args.samples == 0 {
        bail!("At least one sample per channel is required");
    }
    if !(1..=24).contains(&args.adc_bits) {
        bail!("ADC resolution must be between 1 and 24 bits");
    }

    let shape = MainsWaveform {
        sample_rate_hz: args.sample_rate,
        fundamental_hz: args.frequency,
        voltage_peak: args.voltage_peak,
        current_peak: args.current_peak,
        phase_lag_deg: args.phase_lag,
        harmonics: args.harmonics.clone(),
        noise_std: args.noise,
    };

    let generator = match args.seed {
        Some(seed) => WaveformGenerator::new(seed),
        None => WaveformGenerator::new_from_system_time(),
    };
    let mut generator = generator.with_adc_bits(args.adc_bits);

    // Consecutive payloads are back to back in time
    let burst_us = (args.samples as f64 / args.sample_rate * 1e6).round() as i64;
    let first_end = Utc::now() - Duration::microseconds(burst_us * (args.count as i64 - 1).max(0));

    let mut payloads = Vec::with_capacity(args.count);
    for i in 0..args.count {
        let end = first_end + Duration::microseconds(burst_us * i as i64);
        payloads.push(generator.generate(&shape, args.samples, end));
    }

    let json = if payloads.len() == 1 {
        serde_json::to_string_pretty(&payloads[0])?
    } else {
        serde_json::to_string_pretty(&payloads)?
    };

    match &args.output {
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            file.write_all(json.as_bytes())?;
            eprintln!(
                "Wrote {} payload(s) of {} samples to {}",
                payloads.len(),
                args.samples,
                path.display()
            );
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(json.as_bytes())?;
            handle.write_all(b"\n")?;
        }
    }

    Ok(())
}
