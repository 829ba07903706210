//! Chart-ready derivations over a window of health logs: blood-pressure
//! series (with MAP) and symptom-frequency ranking.
//!
//! Inputs are already window-filtered by the caller. Everything here is pure.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::HealthLogRecord;
use crate::pressure::{compute_map, BloodPressure};

/// Default maximum label width for chart axes and row labels.
pub const DEFAULT_LABEL_LEN: usize = 20;

/// One point of the blood-pressure chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodPressurePoint {
    /// Zero-based position in chronological order.
    pub index: usize,
    /// ISO 8601 date or timestamp.
    pub date: String,
    pub systolic: u16,
    pub diastolic: u16,
    pub map: u16,
}

/// How often a symptom appears in the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymptomFrequencyItem {
    pub symptom_id: String,
    pub symptom_name: String,
    pub count: u32,
}

/// A dated systolic/diastolic pair from any source (log or server history).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressureReading {
    pub date: String,
    pub pressure: BloodPressure,
}

/// Sort logs oldest-first, drop those without pressure, index and compute MAP.
pub fn to_blood_pressure_series(logs: &[HealthLogRecord]) -> Vec<BloodPressurePoint> {
    let mut with_pressure: Vec<(&HealthLogRecord, BloodPressure)> = logs
        .iter()
        .filter_map(|log| log.blood_pressure().map(|bp| (log, bp)))
        .collect();
    with_pressure.sort_by_key(|(log, _)| log.created_at);

    with_pressure
        .into_iter()
        .enumerate()
        .map(|(index, (log, bp))| point(index, log.created_at.to_rfc3339(), bp))
        .collect()
}

/// Same derivation for readings that arrive pre-dated from the server.
///
/// Readings are ordered by their ISO date string (stable for equal dates).
pub fn series_from_readings(mut readings: Vec<PressureReading>) -> Vec<BloodPressurePoint> {
    readings.sort_by(|a, b| a.date.cmp(&b.date));
    readings
        .into_iter()
        .enumerate()
        .map(|(index, r)| point(index, r.date, r.pressure))
        .collect()
}

fn point(index: usize, date: String, bp: BloodPressure) -> BloodPressurePoint {
    BloodPressurePoint {
        index,
        date,
        systolic: bp.systolic,
        diastolic: bp.diastolic,
        map: compute_map(bp.systolic, bp.diastolic),
    }
}

/// Group by trimmed, lower-cased primary symptom name and rank by count.
///
/// Ties keep first-seen order. Logs without a symptom name are skipped.
pub fn to_symptom_frequency(logs: &[HealthLogRecord]) -> Vec<SymptomFrequencyItem> {
    let mut items: Vec<SymptomFrequencyItem> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for log in logs {
        let Some(name) = log.primary_symptom_name() else {
            continue;
        };
        let key = name.to_lowercase();
        match by_key.get(&key) {
            Some(&pos) => items[pos].count += 1,
            None => {
                by_key.insert(key.clone(), items.len());
                items.push(SymptomFrequencyItem {
                    symptom_id: log.symptom_id.clone().unwrap_or(key),
                    symptom_name: name.to_string(),
                    count: 1,
                });
            }
        }
    }

    rank_by_count(items)
}

/// Stable descending sort by count.
pub fn rank_by_count(mut items: Vec<SymptomFrequencyItem>) -> Vec<SymptomFrequencyItem> {
    items.sort_by(|a, b| b.count.cmp(&a.count));
    items
}

/// Trim, and cut to `max_len` characters (ellipsis included) when longer.
pub fn truncate_label(name: &str, max_len: usize) -> String {
    let trimmed = name.trim();
    if trimmed.chars().count() <= max_len {
        return trimmed.to_string();
    }
    if max_len == 0 {
        return String::new();
    }
    let head: String = trimmed.chars().take(max_len.saturating_sub(1)).collect();
    format!("{}…", head.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn log_at(id: &str, minutes: i64) -> HealthLogRecord {
        let base = Utc.with_ymd_and_hms(2026, 1, 10, 8, 0, 0).unwrap();
        HealthLogRecord::new(id, base + Duration::minutes(minutes))
    }

    fn with_pressure(id: &str, minutes: i64, s: u16, d: u16) -> HealthLogRecord {
        HealthLogRecord { pressure: Some(BloodPressure::new(s, d)), ..log_at(id, minutes) }
    }

    fn with_symptom(id: &str, minutes: i64, name: &str) -> HealthLogRecord {
        HealthLogRecord { primary_symptom: Some(name.to_string()), ..log_at(id, minutes) }
    }

    #[test]
    fn series_sorts_ascending_and_indexes() {
        let logs = vec![
            with_pressure("late", 60, 150, 95),
            with_pressure("early", 0, 120, 80),
        ];
        let series = to_blood_pressure_series(&logs);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].index, 0);
        assert_eq!(series[0].systolic, 120);
        assert_eq!(series[0].map, 93);
        assert_eq!(series[1].index, 1);
        assert_eq!(series[1].map, 113);
    }

    #[test]
    fn series_drops_logs_without_pressure() {
        let logs = vec![log_at("a", 0), with_pressure("b", 5, 130, 85), log_at("c", 10)];
        let series = to_blood_pressure_series(&logs);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].index, 0);
    }

    #[test]
    fn series_uses_legacy_pressure_text() {
        let legacy = HealthLogRecord {
            legacy_blood_pressure: Some("140/90".into()),
            ..log_at("a", 0)
        };
        let series = to_blood_pressure_series(&[legacy]);
        assert_eq!(series[0].map, compute_map(140, 90));
    }

    #[test]
    fn series_never_longer_than_input_and_map_consistent() {
        let logs: Vec<HealthLogRecord> = (0..30)
            .map(|i| {
                if i % 3 == 0 {
                    log_at(&format!("l{i}"), i)
                } else {
                    with_pressure(&format!("l{i}"), 30 - i, 100 + i as u16, 60 + i as u16)
                }
            })
            .collect();
        let series = to_blood_pressure_series(&logs);
        assert!(series.len() <= logs.len());
        for p in &series {
            assert_eq!(p.map, compute_map(p.systolic, p.diastolic));
        }
        assert!(series.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn readings_sorted_by_date() {
        let series = series_from_readings(vec![
            PressureReading { date: "2026-01-03".into(), pressure: BloodPressure::new(130, 80) },
            PressureReading { date: "2026-01-01".into(), pressure: BloodPressure::new(120, 80) },
        ]);
        assert_eq!(series[0].date, "2026-01-01");
        assert_eq!(series[1].index, 1);
    }

    #[test]
    fn frequency_groups_case_insensitively() {
        let logs = vec![
            with_symptom("1", 0, "Fiebre"),
            with_symptom("2", 1, "fiebre "),
            with_symptom("3", 2, "Tos"),
            with_symptom("4", 3, "FIEBRE"),
        ];
        let freq = to_symptom_frequency(&logs);
        assert_eq!(freq.len(), 2);
        assert_eq!(freq[0].symptom_name, "Fiebre");
        assert_eq!(freq[0].count, 3);
        assert_eq!(freq[0].symptom_id, "fiebre");
        assert_eq!(freq[1].count, 1);
    }

    #[test]
    fn frequency_ties_keep_first_seen_order() {
        let logs = vec![
            with_symptom("1", 0, "Tos"),
            with_symptom("2", 1, "Mareo"),
            with_symptom("3", 2, "Náusea"),
            with_symptom("4", 3, "Mareo"),
            with_symptom("5", 4, "Tos"),
        ];
        let names: Vec<String> =
            to_symptom_frequency(&logs).into_iter().map(|i| i.symptom_name).collect();
        assert_eq!(names, vec!["Tos", "Mareo", "Náusea"]);
    }

    #[test]
    fn frequency_skips_missing_names() {
        let logs = vec![log_at("1", 0), with_symptom("2", 1, "  ")];
        assert!(to_symptom_frequency(&logs).is_empty());
    }

    #[test]
    fn frequency_prefers_symptom_id() {
        let log = HealthLogRecord {
            symptom_id: Some("sym-42".into()),
            ..with_symptom("1", 0, "Cefalea")
        };
        assert_eq!(to_symptom_frequency(&[log])[0].symptom_id, "sym-42");
    }

    #[test]
    fn truncate_short_label_unchanged() {
        assert_eq!(truncate_label("  Fiebre  ", DEFAULT_LABEL_LEN), "Fiebre");
        assert_eq!(truncate_label("12345678901234567890", 20), "12345678901234567890");
    }

    #[test]
    fn truncate_never_exceeds_max_len() {
        assert_eq!(truncate_label("Fiebre", 0), "");
        assert_eq!(truncate_label("Fiebre", 1), "…");
        assert_eq!(truncate_label("   ", 0), "");
    }

    #[test]
    fn truncate_long_label_adds_ellipsis() {
        let label = truncate_label("Dolor abdominal intenso persistente", 20);
        assert_eq!(label.chars().count(), 20);
        assert!(label.ends_with('…'));
        assert!(label.starts_with("Dolor abdominal"));
    }

    #[test]
    fn truncate_trims_before_ellipsis() {
        assert_eq!(truncate_label("Dolor de cabeza muy fuerte", 20), "Dolor de cabeza muy…");
        // first 5 chars are "abcd " and the trailing space is dropped
        assert_eq!(truncate_label("abcd efgh", 6), "abcd…");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_label("ñññññ", 5), "ñññññ");
        assert_eq!(truncate_label("ññññññ", 5), "ññññ…");
    }
}
