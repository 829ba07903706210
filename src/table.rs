//! Doctor-facing table rows derived from health logs.
//!
//! Deterministic projection: identical input yields an identical row.
//! `date_time` is formatted in UTC so rows do not depend on the host locale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::EMERGENCY_PAIN_THRESHOLD;
use crate::models::HealthLogRecord;
use crate::pressure::PressureValue;

/// Pain at or above this level is shown in orange.
pub const PAIN_MODERATE_THRESHOLD: u8 = 4;

/// Oxygen saturation below this value is highlighted.
pub const LOW_OXYGEN_SATURATION: f64 = 90.0;

/// Maximum characters of context shown in the table before the ellipsis.
pub const CONTEXT_SNIPPET_LEN: usize = 50;

/// Placeholder shown when a log has no symptom name.
pub const MISSING_SYMPTOM: &str = "—";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PainColor {
    Green,
    Orange,
    Red,
}

impl PainColor {
    pub fn as_str(self) -> &'static str {
        match self {
            PainColor::Green => "green",
            PainColor::Orange => "orange",
            PainColor::Red => "red",
        }
    }
}

/// Ephemeral presentation row; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRow {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// `dd/mm/yyyy HH:MM` (UTC).
    pub date_time: String,
    pub is_emergency: bool,
    pub symptom_primary: Option<String>,
    pub symptom_secondary: Vec<String>,
    pub pain_level: Option<u8>,
    pub pain_color: PainColor,
    pub pressure: Option<PressureValue>,
    pub is_high_pressure: bool,
    pub heart_rate: Option<f64>,
    pub oxygen_saturation: Option<f64>,
    pub is_low_oxygen: bool,
    /// Full context, kept for exports.
    pub context: Option<String>,
    pub context_snippet: Option<String>,
    pub has_note: bool,
    pub note_reviewed: bool,
}

impl TableRow {
    /// Primary symptom for display ("—" when absent).
    pub fn primary_label(&self) -> &str {
        self.symptom_primary.as_deref().unwrap_or(MISSING_SYMPTOM)
    }

    /// Secondary symptoms joined with ", ".
    pub fn secondary_label(&self) -> String {
        self.symptom_secondary.join(", ")
    }
}

pub fn pain_color(pain_level: Option<u8>) -> PainColor {
    match pain_level {
        None => PainColor::Green,
        Some(p) if p >= EMERGENCY_PAIN_THRESHOLD => PainColor::Red,
        Some(p) if p >= PAIN_MODERATE_THRESHOLD => PainColor::Orange,
        Some(_) => PainColor::Green,
    }
}

pub fn format_date_time(at: &DateTime<Utc>) -> String {
    at.format("%d/%m/%Y %H:%M").to_string()
}

/// Trimmed context cut to 50 characters plus ellipsis; `None` when blank.
pub fn context_snippet(context: Option<&str>) -> Option<String> {
    let trimmed = context?.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.chars().count() > CONTEXT_SNIPPET_LEN {
        let head: String = trimmed.chars().take(CONTEXT_SNIPPET_LEN).collect();
        Some(format!("{head}…"))
    } else {
        Some(trimmed.to_string())
    }
}

pub fn map_to_row(log: &HealthLogRecord) -> TableRow {
    let pressure = log.pressure_value();
    let is_high_pressure = pressure.is_some_and(|p| p.is_high());
    let is_low_oxygen = log
        .oxygen_saturation
        .is_some_and(|spo2| spo2 < LOW_OXYGEN_SATURATION);

    TableRow {
        id: log.id.clone(),
        created_at: log.created_at,
        date_time: format_date_time(&log.created_at),
        is_emergency: log.is_emergency(),
        symptom_primary: log.primary_symptom_name().map(str::to_string),
        symptom_secondary: log.secondary_symptoms.clone(),
        pain_level: log.pain_level,
        pain_color: pain_color(log.pain_level),
        pressure,
        is_high_pressure,
        heart_rate: log.heart_rate,
        oxygen_saturation: log.oxygen_saturation,
        is_low_oxygen,
        context: log.context.clone(),
        context_snippet: context_snippet(log.context.as_deref()),
        has_note: log.is_reviewed || log.has_clinical_note,
        note_reviewed: log.is_reviewed,
    }
}

pub fn map_to_rows(logs: &[HealthLogRecord]) -> Vec<TableRow> {
    logs.iter().map(map_to_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pressure::BloodPressure;
    use chrono::TimeZone;

    fn log() -> HealthLogRecord {
        HealthLogRecord::new("log-1", Utc.with_ymd_and_hms(2026, 4, 2, 14, 5, 0).unwrap())
    }

    #[test]
    fn pain_colors() {
        let color = |pain: Option<u8>| {
            map_to_row(&HealthLogRecord { pain_level: pain, ..log() }).pain_color
        };
        assert_eq!(color(Some(3)), PainColor::Green);
        assert_eq!(color(Some(5)), PainColor::Orange);
        assert_eq!(color(Some(8)), PainColor::Red);
        assert_eq!(color(None), PainColor::Green);
    }

    #[test]
    fn pain_color_band_edges() {
        assert_eq!(pain_color(Some(0)), PainColor::Green);
        assert_eq!(pain_color(Some(4)), PainColor::Orange);
        assert_eq!(pain_color(Some(7)), PainColor::Orange);
        assert_eq!(pain_color(Some(10)), PainColor::Red);
    }

    #[test]
    fn emergency_from_pain_or_flag() {
        assert!(map_to_row(&HealthLogRecord { pain_level: Some(9), ..log() }).is_emergency);
        let flagged = HealthLogRecord { emergency: true, pain_level: Some(2), ..log() };
        assert!(map_to_row(&flagged).is_emergency);
        assert!(!map_to_row(&HealthLogRecord { pain_level: Some(7), ..log() }).is_emergency);
    }

    #[test]
    fn high_pressure_row() {
        let row = map_to_row(&HealthLogRecord {
            pressure: Some(BloodPressure::new(150, 95)),
            ..log()
        });
        let pressure = row.pressure.unwrap();
        assert_eq!(pressure.map, 113);
        assert!(row.is_high_pressure);
    }

    #[test]
    fn pressure_falls_back_to_legacy_text() {
        let row = map_to_row(&HealthLogRecord {
            legacy_blood_pressure: Some("120-80".into()),
            ..log()
        });
        assert_eq!(row.pressure.map(|p| p.map), Some(93));
        assert!(!row.is_high_pressure);
    }

    #[test]
    fn missing_pressure_is_none() {
        let row = map_to_row(&log());
        assert!(row.pressure.is_none());
        assert!(!row.is_high_pressure);
    }

    #[test]
    fn context_snippet_truncates_at_fifty() {
        let long = "a".repeat(60);
        let row = map_to_row(&HealthLogRecord { context: Some(format!("  {long}  ")), ..log() });
        let snippet = row.context_snippet.unwrap();
        assert_eq!(snippet.chars().count(), 51);
        assert!(snippet.ends_with('…'));
        assert_eq!(row.context.as_deref().map(str::trim), Some(long.as_str()));
    }

    #[test]
    fn context_snippet_short_and_empty() {
        assert_eq!(context_snippet(Some("  mareo leve ")), Some("mareo leve".into()));
        assert_eq!(context_snippet(Some("   ")), None);
        assert_eq!(context_snippet(None), None);
        let exact = "b".repeat(50);
        assert_eq!(context_snippet(Some(exact.as_str())).map(|s| s.chars().count()), Some(50));
    }

    #[test]
    fn note_flags() {
        let reviewed = map_to_row(&HealthLogRecord { is_reviewed: true, ..log() });
        assert!(reviewed.has_note && reviewed.note_reviewed);

        let attached = map_to_row(&HealthLogRecord { has_clinical_note: true, ..log() });
        assert!(attached.has_note);
        assert!(!attached.note_reviewed);

        assert!(!map_to_row(&log()).has_note);
    }

    #[test]
    fn low_oxygen_flag() {
        let low = |spo2: f64| {
            map_to_row(&HealthLogRecord { oxygen_saturation: Some(spo2), ..log() }).is_low_oxygen
        };
        assert!(low(88.0));
        assert!(!low(90.0));
    }

    #[test]
    fn labels_and_date() {
        let row = map_to_row(&HealthLogRecord {
            secondary_symptoms: vec!["Tos".into(), "Mareo".into()],
            ..log()
        });
        assert_eq!(row.primary_label(), MISSING_SYMPTOM);
        assert_eq!(row.secondary_label(), "Tos, Mareo");
        assert_eq!(row.date_time, "02/04/2026 14:05");
    }

    #[test]
    fn mapping_is_deterministic() {
        let input = HealthLogRecord {
            pain_level: Some(6),
            context: Some("después de comer".into()),
            pressure: Some(BloodPressure::new(128, 84)),
            ..log()
        };
        assert_eq!(map_to_row(&input), map_to_row(&input));
    }
}
