// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! This module provides a Modbus TCP server exposing the latest electrical
//! readings of the monitor to PLCs and SCADA systems.
//!
//! ## Register Map
//!
//! ### Input Registers (Read-Only)
//!
//! - Register 0: RMS voltage (V × 10)
//! - Register 1: RMS current (A × 1000)
//! - Register 2: Apparent power (W)
//! - Register 3: Energy over the configured window (Wh × 10)
//! - Register 4: Phase angle (degrees × 10, signed)
//! - Register 5: Load type (0=resistive, 1=inductive, 2=capacitive, 0xFFFF=unknown)
//! - Register 6: Timestamp low word (UNIX epoch seconds)
//! - Register 7: Timestamp high word (UNIX epoch seconds)
//! - Register 8: Status code (0=normal, 1=no data)

pub mod modbus_server;
pub use modbus_server::MainsModbusServer;
