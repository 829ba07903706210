//! Blood pressure math: mean arterial pressure and free-text pressure entry.
//!
//! `parse_pressure_input` is the only parser for "120/80"-style entries;
//! table rows, analytics and the gateway all go through it.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Accepted systolic range for free-text entry (mmHg, inclusive).
pub const SYSTOLIC_RANGE: (u16, u16) = (50, 250);
/// Accepted diastolic range for free-text entry (mmHg, inclusive).
pub const DIASTOLIC_RANGE: (u16, u16) = (30, 150);

/// Systolic above this value is highlighted as high blood pressure.
pub const HIGH_SYSTOLIC: u16 = 140;
/// Diastolic above this value is highlighted as high blood pressure.
pub const HIGH_DIASTOLIC: u16 = 90;

static PRESSURE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{2,3})\s*[/\-]\s*(\d{2,3})\s*$").unwrap());

/// A systolic/diastolic pair as recorded by the patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodPressure {
    pub systolic: u16,
    pub diastolic: u16,
}

/// Derived pressure value shown to clinicians; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureValue {
    pub systolic: u16,
    pub diastolic: u16,
    pub map: u16,
}

impl BloodPressure {
    pub fn new(systolic: u16, diastolic: u16) -> Self {
        Self { systolic, diastolic }
    }

    pub fn to_value(self) -> PressureValue {
        PressureValue {
            systolic: self.systolic,
            diastolic: self.diastolic,
            map: compute_map(self.systolic, self.diastolic),
        }
    }
}

impl PressureValue {
    /// Systolic > 140 or diastolic > 90.
    pub fn is_high(&self) -> bool {
        self.systolic > HIGH_SYSTOLIC || self.diastolic > HIGH_DIASTOLIC
    }
}

/// Mean arterial pressure: `round((systolic + 2 * diastolic) / 3)`.
///
/// Total over any input; range validation belongs to the caller.
pub fn compute_map(systolic: u16, diastolic: u16) -> u16 {
    let sum = u32::from(systolic) + 2 * u32::from(diastolic);
    // Integer rounding of sum / 3: remainder 2 rounds up, remainder 1 rounds down.
    ((sum + 1) / 3) as u16
}

/// Parse "SSS/DDD" or "SSS-DDD" (2–3 digits per side, optional whitespace).
///
/// Returns `None` when the text does not match or either side falls outside
/// the accepted clinical range.
pub fn parse_pressure_input(text: &str) -> Option<BloodPressure> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let caps = PRESSURE_PATTERN.captures(trimmed)?;
    let systolic: u16 = caps.get(1)?.as_str().parse().ok()?;
    let diastolic: u16 = caps.get(2)?.as_str().parse().ok()?;

    if !(SYSTOLIC_RANGE.0..=SYSTOLIC_RANGE.1).contains(&systolic)
        || !(DIASTOLIC_RANGE.0..=DIASTOLIC_RANGE.1).contains(&diastolic)
    {
        return None;
    }
    Some(BloodPressure { systolic, diastolic })
}
