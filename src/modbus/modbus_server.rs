// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus server implementation for the energy monitor
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the device that provides data,
//! while the client is the device that requests data.
//!
//! ## Register Map
//!
//! ### Input Registers (Read Only)
//!
//! | Register Address | Description | Unit | Scaling |
//! |-----------------|-------------|------|---------|
//! | 0 | RMS Voltage | V | ×10 (0.1 V resolution) |
//! | 1 | RMS Current | A | ×1000 (1 mA resolution) |
//! | 2 | Apparent Power | VA | 1 |
//! | 3 | Energy over window | Wh | ×10 (0.1 Wh resolution) |
//! | 4 | Phase Angle | degrees | ×10, two's complement |
//! | 5 | Load Type | - | 0=resistive, 1=inductive, 2=capacitive, 0xFFFF=unknown |
//! | 6 | Measurement Timestamp (Low Word) | epoch seconds | 1 |
//! | 7 | Measurement Timestamp (High Word) | epoch seconds | 1 |
//! | 8 | Status Code | - | 0=normal, 1=no data |
//!
//! Values that do not fit a register saturate at 0 or 65535.

use std::{
    collections::HashMap,
    future,
    sync::{Arc, Mutex},
};

use chrono::Utc;
use log::{debug, error};
use tokio_modbus::prelude::*;

use crate::power::RmsSummary;
use crate::processing::MonitorState;
use crate::spectral::FftResult;

/// Number of input registers exposed
pub const INPUT_REGISTER_COUNT: u16 = 9;

/// Load type register value before the first analysis
pub const LOAD_TYPE_UNKNOWN: u16 = 0xFFFF;

/// A Modbus TCP server exposing the monitor readings as input registers.
///
/// The register values are recomputed from the monitor state before each
/// read request. When a state lock is busy the previous values are served.
pub struct MainsModbusServer {
    /// Input registers (read-only values like measurements)
    pub input_registers: Arc<Mutex<HashMap<u16, u16>>>,

    state: Option<MonitorState>,
}

impl tokio_modbus::server::Service for MainsModbusServer {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    /// Process a Modbus request and provide a response
    ///
    /// Only 0x04 (Read Input Registers) is supported. Any other function
    /// code returns an IllegalFunction exception.
    fn call(&self, req: Self::Request) -> Self::Future {
        debug!("Received Modbus request: {:?}", req);

        let res = match req {
            Request::ReadInputRegisters(addr, cnt) => {
                debug!(
                    "Reading {} input registers starting from address {}",
                    cnt, addr
                );
                self.refresh_from_state();
                match self.input_registers.lock() {
                    Ok(registers) => {
                        register_read(&registers, addr, cnt).map(Response::ReadInputRegisters)
                    }
                    Err(_) => Err(ExceptionCode::ServerDeviceFailure),
                }
            }
            _ => {
                error!(
                    "Exception::IllegalFunction - Unimplemented function code in request: {req:?}"
                );
                Err(ExceptionCode::IllegalFunction)
            }
        };

        if let Err(e) = &res {
            error!("Modbus request error: {:?}", e);
        }

        future::ready(res)
    }
}

impl Default for MainsModbusServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MainsModbusServer {
    /// Create a server with no state attached, reporting "no data".
    pub fn new() -> Self {
        let registers = encode_registers(None, None, 0.0);
        Self {
            input_registers: Arc::new(Mutex::new(to_map(&registers))),
            state: None,
        }
    }

    /// Create a server reading live values from the monitor state
    pub fn with_state(state: &MonitorState) -> Self {
        let mut server = Self::new();
        server.state = Some(state.clone());
        server.refresh_from_state();
        server
    }

    /// Recompute the registers from the monitor state.
    ///
    /// Returns `false` when a lock could not be taken without waiting.
    pub fn refresh_from_state(&self) -> bool {
        let Some(ref state) = self.state else {
            return false;
        };

        let summary = match state
            .accumulator()
            .try_summary(state.energy_window(), Utc::now())
        {
            Ok(summary) => summary,
            Err(_) => {
                debug!("Could not read RMS log for Modbus update");
                return false;
            }
        };
        let result = match state.cache().try_current() {
            Ok(result) => result,
            Err(_) => {
                debug!("Could not read result cache for Modbus update");
                return false;
            }
        };

        let registers = encode_registers(
            summary.as_ref(),
            result.as_deref(),
            state.analysis_config().load_threshold_deg,
        );
        match self.input_registers.lock() {
            Ok(mut input_regs) => {
                *input_regs = to_map(&registers);
                true
            }
            Err(_) => false,
        }
    }
}

/// Scale a reading into an unsigned register, saturating at the bounds.
fn scale_unsigned(value: Option<f64>, factor: f64) -> u16 {
    match value {
        Some(v) if v.is_finite() => (v * factor).round().clamp(0.0, u16::MAX as f64) as u16,
        _ => 0,
    }
}

/// Compute the input register values from the latest readings.
pub fn encode_registers(
    summary: Option<&RmsSummary>,
    result: Option<&FftResult>,
    load_threshold_deg: f64,
) -> [u16; INPUT_REGISTER_COUNT as usize] {
    let mut regs = [0u16; INPUT_REGISTER_COUNT as usize];

    if let Some(summary) = summary {
        regs[0] = scale_unsigned(summary.record.v_rms, 10.0);
        regs[1] = scale_unsigned(summary.record.i_rms, 1000.0);
        regs[2] = scale_unsigned(summary.record.w_rms, 1.0);
        regs[3] = scale_unsigned(Some(summary.energy_hour), 10.0);

        let epoch = summary.record.timestamp.timestamp().clamp(0, u32::MAX as i64) as u32;
        regs[6] = (epoch & 0xFFFF) as u16; // Low word
        regs[7] = ((epoch >> 16) & 0xFFFF) as u16; // High word
    }

    match result {
        Some(result) => {
            // The folded angle lies in (-90, 90], well within i16 after ×10
            regs[4] = ((result.phase_diff_deg * 10.0).round() as i16) as u16;
            regs[5] = result.load_type(load_threshold_deg).register_code();
        }
        None => regs[5] = LOAD_TYPE_UNKNOWN,
    }

    regs[8] = if summary.is_some() { 0 } else { 1 };
    regs
}

fn to_map(registers: &[u16]) -> HashMap<u16, u16> {
    registers
        .iter()
        .enumerate()
        .map(|(addr, value)| (addr as u16, *value))
        .collect()
}

/// Helper function for reading Modbus registers from a HashMap
///
/// ### Errors
///
/// Returns `ExceptionCode::IllegalDataAddress` if any requested register
/// address does not exist in the HashMap.
fn register_read(
    registers: &HashMap<u16, u16>,
    addr: u16,
    cnt: u16,
) -> Result<Vec<u16>, ExceptionCode> {
    let mut response_values = vec![0; cnt.into()];

    for i in 0..cnt {
        let reg_addr = addr.checked_add(i).ok_or(ExceptionCode::IllegalDataAddress)?;
        if let Some(r) = registers.get(&reg_addr) {
            response_values[i as usize] = *r;
        } else {
            error!(
                "Exception::IllegalDataAddress - Register {} not found",
                reg_addr
            );
            return Err(ExceptionCode::IllegalDataAddress);
        }
    }

    debug!("Successfully read {} registers from address {}", cnt, addr);
    Ok(response_values)
}
