//! Wire shapes returned by the `shared-history` endpoint.
//!
//! These types are deliberately lenient: the backend has shipped several
//! revisions of this payload. The gateway resolves them once into the
//! normalized model; nothing downstream reads these structs directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::health_log::HealthLogRecord;
use crate::pressure::BloodPressure;

/// Patient header shown on the doctor's view and in reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientInfo {
    pub name: String,
    pub age: Option<u32>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryMetadata {
    pub expires_at: Option<DateTime<Utc>>,
    pub doctor_name: Option<String>,
}

/// One entry of `analytics.history`: either a per-reading pair
/// (`date` or `period`, + `systolic`/`diastolic`) or a period aggregate
/// (`period` + `avg_map`, or `map` from older backends).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryItem {
    pub period: Option<String>,
    pub date: Option<String>,
    pub count: Option<u32>,
    pub avg_pain_level: Option<f64>,
    pub avg_map: Option<f64>,
    pub systolic: Option<u16>,
    pub diastolic: Option<u16>,
    pub map: Option<f64>,
    pub heart_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyEntry {
    pub symptom_id: Option<String>,
    pub symptom_name: Option<String>,
    pub count: Option<u32>,
}

/// `analytics.symptom_frequency` arrives as a list or as a name → count map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SymptomFrequencyPayload {
    List(Vec<FrequencyEntry>),
    Map(serde_json::Map<String, serde_json::Value>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsPayload {
    pub history: Option<Vec<HistoryItem>>,
    pub symptom_frequency: Option<SymptomFrequencyPayload>,
    pub anomaly: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressureDetails {
    pub systolic: Option<u16>,
    pub diastolic: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogDetails {
    pub pressure: Option<PressureDetails>,
}

/// A log as serialized by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedHistoryLog {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub symptom_id: Option<String>,
    #[serde(default)]
    pub symptom_name: Option<String>,
    #[serde(default)]
    pub primary_symptom_name: Option<String>,
    #[serde(default)]
    pub secondary_symptoms: Option<Vec<String>>,
    #[serde(default)]
    pub pain_level: Option<u8>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub blood_pressure: Option<String>,
    #[serde(default)]
    pub details: Option<LogDetails>,
    #[serde(default)]
    pub heart_rate: Option<f64>,
    #[serde(default)]
    pub oxygen_saturation: Option<f64>,
    #[serde(default)]
    pub emergency: Option<bool>,
    #[serde(default)]
    pub is_reviewed: Option<bool>,
    #[serde(default)]
    pub clinical_record: Option<serde_json::Value>,
}

impl SharedHistoryLog {
    /// Minimal wire log, used by the in-memory backend and tests.
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
            patient_id: None,
            symptom_id: None,
            symptom_name: None,
            primary_symptom_name: None,
            secondary_symptoms: None,
            pain_level: None,
            context: None,
            blood_pressure: None,
            details: None,
            heart_rate: None,
            oxygen_saturation: None,
            emergency: None,
            is_reviewed: None,
            clinical_record: None,
        }
    }
}

impl From<SharedHistoryLog> for HealthLogRecord {
    fn from(log: SharedHistoryLog) -> Self {
        let pressure = log
            .details
            .and_then(|d| d.pressure)
            .and_then(|p| match (p.systolic, p.diastolic) {
                (Some(s), Some(d)) => Some(BloodPressure::new(s, d)),
                _ => None,
            });
        let primary_symptom = log
            .primary_symptom_name
            .filter(|s| !s.trim().is_empty())
            .or(log.symptom_name.filter(|s| !s.trim().is_empty()));
        let has_clinical_note = matches!(log.clinical_record, Some(serde_json::Value::Object(_)));

        HealthLogRecord {
            id: log.id,
            created_at: log.created_at,
            symptom_id: log.symptom_id,
            primary_symptom,
            secondary_symptoms: log.secondary_symptoms.unwrap_or_default(),
            pain_level: log.pain_level,
            context: log.context,
            pressure,
            legacy_blood_pressure: log.blood_pressure,
            heart_rate: log.heart_rate,
            oxygen_saturation: log.oxygen_saturation,
            emergency: log.emergency.unwrap_or(false),
            is_reviewed: log.is_reviewed.unwrap_or(false),
            has_clinical_note,
        }
    }
}

/// Full `shared-history` response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedHistoryResponse {
    pub patient_info: PatientInfo,
    pub metadata: Option<HistoryMetadata>,
    pub analytics: Option<AnalyticsPayload>,
    pub logs: Vec<SharedHistoryLog>,
    pub total: Option<u32>,
    /// Some backends put expiry at the root instead of in `metadata`.
    pub expires_at: Option<DateTime<Utc>>,
    pub expires_in_seconds: Option<i64>,
}
