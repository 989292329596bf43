// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-energy-monitor project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Phase angle helpers and load classification
//!
//! Phase angles are measured as voltage angle minus current angle, so a
//! positive value means the current lags the voltage.

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Character of the load derived from the fundamental phase angle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadType {
    /// Phase within the threshold
    Resistive,
    /// Current lagging the voltage
    Inductive,
    /// Current leading the voltage
    Capacitive,
}

impl LoadType {
    /// Classify a phase angle in degrees against a symmetric threshold.
    ///
    /// Angles exactly on the threshold are resistive.
    pub fn classify(phase_deg: f64, threshold_deg: f64) -> Self {
        if phase_deg > threshold_deg {
            LoadType::Inductive
        } else if phase_deg < -threshold_deg {
            LoadType::Capacitive
        } else {
            LoadType::Resistive
        }
    }

    /// Code published on the Modbus register map
    pub fn register_code(self) -> u16 {
        match self {
            LoadType::Resistive => 0,
            LoadType::Inductive => 1,
            LoadType::Capacitive => 2,
        }
    }
}

impl fmt::Display for LoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadType::Resistive => "resistive",
            LoadType::Inductive => "inductive",
            LoadType::Capacitive => "capacitive",
        };
        f.write_str(name)
    }
}

/// Wrap an angle in radians into (-π, π]
pub fn wrap_radians(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    // rem_euclid maps +π to -π
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}

/// Fold an angle in degrees from (-180, 180] into (-90, 90].
///
/// A 180° shift only swaps the sign of one sensor, so angles beyond ±90° are
/// brought back by adding or subtracting 180°.
pub fn fold_degrees(angle_deg: f64) -> f64 {
    if angle_deg > 90.0 {
        angle_deg - 180.0
    } else if angle_deg <= -90.0 {
        angle_deg + 180.0
    } else {
        angle_deg
    }
}

/// Phase difference in degrees between two bin angles, folded into (-90, 90].
pub fn phase_difference_deg(voltage_angle: f64, current_angle: f64) -> f64 {
    fold_degrees(wrap_radians(voltage_angle - current_angle).to_degrees())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_classify() {
        assert_eq!(LoadType::classify(0.0, 20.0), LoadType::Resistive);
        assert_eq!(LoadType::classify(20.0, 20.0), LoadType::Resistive);
        assert_eq!(LoadType::classify(-20.0, 20.0), LoadType::Resistive);
        assert_eq!(LoadType::classify(20.1, 20.0), LoadType::Inductive);
        assert_eq!(LoadType::classify(-45.0, 20.0), LoadType::Capacitive);
        assert_eq!(LoadType::classify(10.0, 5.0), LoadType::Inductive);
    }

    #[test]
    fn test_wrap_radians() {
        assert_relative_eq!(wrap_radians(PI), PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_radians(-PI), PI, epsilon = 1e-12);
        assert_relative_eq!(wrap_radians(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_radians(-3.0 * PI / 2.0), PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(wrap_radians(0.25), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_fold_degrees() {
        assert_eq!(fold_degrees(90.0), 90.0);
        assert_eq!(fold_degrees(-90.0), 90.0);
        assert_eq!(fold_degrees(120.0), -60.0);
        assert_eq!(fold_degrees(-150.0), 30.0);
        assert_eq!(fold_degrees(180.0), 0.0);
        assert_eq!(fold_degrees(45.0), 45.0);
    }

    #[test]
    fn test_phase_difference_range() {
        let mut angle = -10.0;
        while angle < 10.0 {
            let diff = phase_difference_deg(angle, 0.3);
            assert!(diff > -90.0 && diff <= 90.0, "{} out of range", diff);
            angle += 0.07;
        }
    }

    #[test]
    fn test_display_and_serde() {
        assert_eq!(LoadType::Inductive.to_string(), "inductive");
        assert_eq!(
            serde_json::to_string(&LoadType::Capacitive).unwrap(),
            "\"capacitive\""
        );
    }
}
