use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EMERGENCY_PAIN_THRESHOLD;
use crate::pressure::{parse_pressure_input, BloodPressure, PressureValue};

/// A patient health-log entry as seen by the sharing subsystem.
///
/// Read-only here: clinical notes and edits happen elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthLogRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub symptom_id: Option<String>,
    pub primary_symptom: Option<String>,
    pub secondary_symptoms: Vec<String>,
    /// 0–10, `None` when the patient skipped the slider.
    pub pain_level: Option<u8>,
    pub context: Option<String>,
    /// Structured pressure (`details.pressure`).
    pub pressure: Option<BloodPressure>,
    /// Legacy free-text pressure ("120/80") from older records.
    pub legacy_blood_pressure: Option<String>,
    pub heart_rate: Option<f64>,
    pub oxygen_saturation: Option<f64>,
    /// Server-side urgency flag.
    pub emergency: bool,
    /// A clinician has attached a reviewed note.
    pub is_reviewed: bool,
    /// The record carries a clinical-note object.
    pub has_clinical_note: bool,
}

impl HealthLogRecord {
    /// Minimal record; remaining fields are empty.
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
            symptom_id: None,
            primary_symptom: None,
            secondary_symptoms: Vec::new(),
            pain_level: None,
            context: None,
            pressure: None,
            legacy_blood_pressure: None,
            heart_rate: None,
            oxygen_saturation: None,
            emergency: false,
            is_reviewed: false,
            has_clinical_note: false,
        }
    }

    /// Server-flagged, or pain at or above the emergency threshold.
    pub fn is_emergency(&self) -> bool {
        self.emergency || is_emergency_pain(self.pain_level)
    }

    /// Structured pressure first, then the legacy free-text field.
    pub fn blood_pressure(&self) -> Option<BloodPressure> {
        self.pressure.or_else(|| {
            self.legacy_blood_pressure
                .as_deref()
                .and_then(parse_pressure_input)
        })
    }

    pub fn pressure_value(&self) -> Option<PressureValue> {
        self.blood_pressure().map(BloodPressure::to_value)
    }

    /// Primary symptom name, trimmed; `None` when blank.
    pub fn primary_symptom_name(&self) -> Option<&str> {
        self.primary_symptom
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

pub fn is_emergency_pain(pain_level: Option<u8>) -> bool {
    pain_level.is_some_and(|p| p >= EMERGENCY_PAIN_THRESHOLD)
}
