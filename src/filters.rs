//! Doctor-chosen filters and the canonical display order.

use serde::{Deserialize, Serialize};

use crate::models::HealthLogRecord;

/// Filters applied to the shared history table, CSV and PDF alike.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    pub emergency_only: bool,
    pub search_text: String,
}

impl LogFilter {
    pub fn emergency_only() -> Self {
        Self { emergency_only: true, ..Self::default() }
    }

    pub fn search(text: impl Into<String>) -> Self {
        Self { search_text: text.into(), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        !self.emergency_only && self.search_text.trim().is_empty()
    }

    /// Both predicates AND-ed; evaluation order does not matter.
    pub fn matches(&self, log: &HealthLogRecord) -> bool {
        if self.emergency_only && !log.is_emergency() {
            return false;
        }
        let needle = self.search_text.trim().to_lowercase();
        needle.is_empty() || matches_search(log, &needle)
    }
}

/// `needle` must already be trimmed and lower-cased.
fn matches_search(log: &HealthLogRecord, needle: &str) -> bool {
    let primary = log.primary_symptom.as_deref().unwrap_or_default().to_lowercase();
    let secondary = log.secondary_symptoms.join(" ").to_lowercase();
    let context = log.context.as_deref().unwrap_or_default().to_lowercase();

    primary.contains(needle) || secondary.contains(needle) || context.contains(needle)
}

pub fn apply_filters(logs: &[HealthLogRecord], filter: &LogFilter) -> Vec<HealthLogRecord> {
    logs.iter().filter(|log| filter.matches(log)).cloned().collect()
}

/// Most recent first.
pub fn sort_for_display(mut logs: Vec<HealthLogRecord>) -> Vec<HealthLogRecord> {
    logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    logs
}

/// Filter then sort: the order every doctor-facing list uses.
pub fn prepare_for_display(logs: &[HealthLogRecord], filter: &LogFilter) -> Vec<HealthLogRecord> {
    sort_for_display(apply_filters(logs, filter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn log(id: &str, hours: i64) -> HealthLogRecord {
        let base = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        HealthLogRecord::new(id, base + Duration::hours(hours))
    }

    fn sample() -> Vec<HealthLogRecord> {
        vec![
            HealthLogRecord {
                primary_symptom: Some("Fiebre".into()),
                pain_level: Some(3),
                ..log("fever", 1)
            },
            HealthLogRecord {
                primary_symptom: Some("Cefalea".into()),
                pain_level: Some(9),
                ..log("headache", 2)
            },
            HealthLogRecord {
                primary_symptom: Some("Tos".into()),
                secondary_symptoms: vec!["Dolor de garganta".into(), "fiebre leve".into()],
                ..log("cough", 3)
            },
            HealthLogRecord {
                primary_symptom: Some("Mareo".into()),
                context: Some("Tras la FIEBRE de ayer".into()),
                emergency: true,
                ..log("dizzy", 4)
            },
            HealthLogRecord { pain_level: None, ..log("blank", 5) },
        ]
    }

    fn ids(logs: &[HealthLogRecord]) -> Vec<&str> {
        logs.iter().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn emergency_only_keeps_emergencies() {
        let result = apply_filters(&sample(), &LogFilter::emergency_only());
        assert!(result.iter().all(HealthLogRecord::is_emergency));
        assert_eq!(ids(&result), vec!["headache", "dizzy"]);
    }

    #[test]
    fn search_matches_primary_secondary_and_context() {
        let result = apply_filters(&sample(), &LogFilter::search("fiebre"));
        assert_eq!(ids(&result), vec!["fever", "cough", "dizzy"]);
    }

    #[test]
    fn search_is_trimmed_and_case_insensitive() {
        let result = apply_filters(&sample(), &LogFilter::search("  CEFALEA "));
        assert_eq!(ids(&result), vec!["headache"]);
    }

    #[test]
    fn secondary_names_are_space_joined() {
        let result = apply_filters(&sample(), &LogFilter::search("garganta fiebre"));
        assert_eq!(ids(&result), vec!["cough"]);
    }

    #[test]
    fn empty_filter_keeps_everything() {
        let filter = LogFilter::default();
        assert!(filter.is_empty());
        assert_eq!(apply_filters(&sample(), &filter).len(), 5);
        assert!(LogFilter::search("   ").is_empty());
    }

    #[test]
    fn filters_compose_in_any_order() {
        let both = LogFilter { emergency_only: true, search_text: "fiebre".into() };
        let combined = apply_filters(&sample(), &both);
        let searched = apply_filters(&sample(), &LogFilter::search("fiebre"));
        let search_first = apply_filters(&searched, &LogFilter::emergency_only());
        let urgent = apply_filters(&sample(), &LogFilter::emergency_only());
        let emergency_first = apply_filters(&urgent, &LogFilter::search("fiebre"));
        assert_eq!(ids(&combined), vec!["dizzy"]);
        assert_eq!(ids(&search_first), ids(&combined));
        assert_eq!(ids(&emergency_first), ids(&combined));
    }

    #[test]
    fn sort_is_most_recent_first() {
        let sorted = sort_for_display(sample());
        assert_eq!(ids(&sorted), vec!["blank", "dizzy", "cough", "headache", "fever"]);
    }

    #[test]
    fn prepare_filters_then_sorts() {
        let prepared = prepare_for_display(&sample(), &LogFilter::search("fiebre"));
        assert_eq!(ids(&prepared), vec!["dizzy", "cough", "fever"]);
    }
}
