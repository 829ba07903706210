//! Doctor-side shared-history fetch and normalization.
//!
//! The backend may pre-aggregate blood pressure (per reading or per period)
//! and symptom frequency, or leave them out. Both are resolved exactly once
//! here into [`PressureHistory`] / [`FrequencySource`]; when a pre-aggregated
//! form is missing the values are derived from the logs. Consumers only ever
//! see [`SharedHistory`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::{
    rank_by_count, series_from_readings, to_blood_pressure_series, to_symptom_frequency,
    BloodPressurePoint, PressureReading, SymptomFrequencyItem,
};
use crate::api::{SharedHistoryApi, SharedHistoryQuery};
use crate::config::DEFAULT_HISTORY_LIMIT;
use crate::error::{SharingError, SharingResult};
use crate::export;
use crate::filters::{prepare_for_display, LogFilter};
use crate::models::{
    AccessToken, HealthLogRecord, HistoryItem, PatientInfo, SharedHistoryResponse,
    SymptomFrequencyPayload,
};
use crate::pressure::BloodPressure;
use crate::table::{map_to_rows, TableRow};

// ═══════════════════════════════════════════════════════════
// History range
// ═══════════════════════════════════════════════════════════

/// Windows offered to the doctor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRange {
    #[default]
    Week,
    Month,
    Quarter,
}

impl HistoryRange {
    pub fn days(self) -> u32 {
        match self {
            HistoryRange::Week => 7,
            HistoryRange::Month => 30,
            HistoryRange::Quarter => 90,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            HistoryRange::Week => "Last 7 days",
            HistoryRange::Month => "Last 30 days",
            HistoryRange::Quarter => "Last 90 days",
        }
    }

    pub fn from_days(days: u32) -> Option<Self> {
        match days {
            7 => Some(HistoryRange::Week),
            30 => Some(HistoryRange::Month),
            90 => Some(HistoryRange::Quarter),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Retry policy
// ═══════════════════════════════════════════════════════════

/// Exponential backoff for transient shared-history failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay after failed attempt `attempt` (1-based): base, 2×base, 4×base, …
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor)
    }
}

// ═══════════════════════════════════════════════════════════
// Resolved server shapes
// ═══════════════════════════════════════════════════════════

/// A pre-aggregated per-period mean arterial pressure.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodAverage {
    pub period: String,
    pub avg_map: f64,
    pub count: Option<u32>,
}

/// Blood-pressure history as delivered by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum PressureHistory {
    Readings(Vec<PressureReading>),
    PeriodAverages(Vec<PeriodAverage>),
    /// Not provided (or empty); derive from logs.
    Absent,
}

impl PressureHistory {
    pub fn resolve(history: Option<Vec<HistoryItem>>) -> Self {
        let Some(items) = history else {
            return PressureHistory::Absent;
        };

        let readings: Vec<PressureReading> = items
            .iter()
            .filter_map(|item| {
                let date = item.date.as_ref().or(item.period.as_ref())?;
                Some(PressureReading {
                    date: date.clone(),
                    pressure: BloodPressure::new(item.systolic?, item.diastolic?),
                })
            })
            .collect();
        if !readings.is_empty() {
            return PressureHistory::Readings(readings);
        }

        let averages: Vec<PeriodAverage> = items
            .into_iter()
            .filter_map(|item| {
                let period = item.period.or(item.date)?;
                let avg_map = item.avg_map.or(item.map).filter(|m| m.is_finite() && *m > 0.0)?;
                Some(PeriodAverage {
                    period,
                    avg_map,
                    count: item.count,
                })
            })
            .collect();
        if !averages.is_empty() {
            return PressureHistory::PeriodAverages(averages);
        }

        PressureHistory::Absent
    }

    /// Chart series; logs are only consulted when nothing was pre-aggregated.
    pub fn to_series(&self, logs: &[HealthLogRecord]) -> Vec<BloodPressurePoint> {
        match self {
            PressureHistory::Readings(readings) => series_from_readings(readings.clone()),
            PressureHistory::PeriodAverages(averages) => series_from_readings(
                averages
                    .iter()
                    .map(|avg| {
                        let map = round_map(avg.avg_map);
                        PressureReading {
                            date: avg.period.clone(),
                            pressure: BloodPressure::new(map, map),
                        }
                    })
                    .collect(),
            ),
            PressureHistory::Absent => to_blood_pressure_series(logs),
        }
    }
}

/// Integer counts as-is; float counts (`3.0`) rounded when finite and non-negative.
fn frequency_count(value: &serde_json::Value) -> Option<u32> {
    if let Some(count) = value.as_u64() {
        return u32::try_from(count).ok();
    }
    let count = value.as_f64().filter(|c| c.is_finite() && *c >= 0.0)?.round();
    (count <= f64::from(u32::MAX)).then_some(count as u32)
}

fn round_map(value: f64) -> u16 {
    value.round().clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Symptom frequency as delivered by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum FrequencySource {
    Precomputed(Vec<SymptomFrequencyItem>),
    Absent,
}

impl FrequencySource {
    pub fn resolve(payload: Option<SymptomFrequencyPayload>) -> Self {
        let items: Vec<SymptomFrequencyItem> = match payload {
            None => Vec::new(),
            Some(SymptomFrequencyPayload::List(entries)) => entries
                .into_iter()
                .filter_map(|entry| {
                    let name = entry.symptom_name?.trim().to_string();
                    if name.is_empty() {
                        return None;
                    }
                    Some(SymptomFrequencyItem {
                        symptom_id: entry.symptom_id.unwrap_or_else(|| name.to_lowercase()),
                        symptom_name: name,
                        count: entry.count.unwrap_or(0),
                    })
                })
                .collect(),
            Some(SymptomFrequencyPayload::Map(map)) => map
                .into_iter()
                .filter_map(|(name, value)| {
                    let name = name.trim().to_string();
                    let count = frequency_count(&value)?;
                    if name.is_empty() {
                        return None;
                    }
                    Some(SymptomFrequencyItem {
                        symptom_id: name.to_lowercase(),
                        symptom_name: name,
                        count,
                    })
                })
                .collect(),
        };

        if items.is_empty() {
            FrequencySource::Absent
        } else {
            FrequencySource::Precomputed(rank_by_count(items))
        }
    }

    pub fn to_items(&self, logs: &[HealthLogRecord]) -> Vec<SymptomFrequencyItem> {
        match self {
            FrequencySource::Precomputed(items) => items.clone(),
            FrequencySource::Absent => to_symptom_frequency(logs),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Normalized model
// ═══════════════════════════════════════════════════════════

/// Shape-independent view of one shared-history fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedHistory {
    pub patient_info: PatientInfo,
    pub doctor_name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub expires_in_seconds: Option<i64>,
    pub logs: Vec<HealthLogRecord>,
    pub blood_pressure_series: Vec<BloodPressurePoint>,
    pub symptom_frequency: Vec<SymptomFrequencyItem>,
    pub anomaly: bool,
    /// Logs in the window on the server, which may exceed `logs.len()`.
    pub total: usize,
}

impl SharedHistory {
    /// Filtered, most-recent-first table rows.
    pub fn rows(&self, filter: &LogFilter) -> Vec<TableRow> {
        map_to_rows(&prepare_for_display(&self.logs, filter))
    }

    pub fn to_csv(&self, filter: &LogFilter) -> String {
        export::to_csv(&self.rows(filter))
    }

    pub fn to_pdf_html(&self, filter: &LogFilter, range_label: &str) -> String {
        let doctor_name = self
            .doctor_name
            .as_deref()
            .unwrap_or(crate::workflow::DEFAULT_DOCTOR_NAME);
        export::to_pdf_html(&self.patient_info, doctor_name, &self.rows(filter), range_label)
    }
}

/// Resolve a raw response into [`SharedHistory`]. Pure; `now` is only used
/// to derive `expires_in_seconds` when the server omits it.
pub fn normalize_shared_history(
    response: SharedHistoryResponse,
    now: DateTime<Utc>,
) -> SharedHistory {
    let SharedHistoryResponse {
        patient_info,
        metadata,
        analytics,
        logs,
        total,
        expires_at: root_expires_at,
        expires_in_seconds,
    } = response;

    let (meta_expires_at, doctor_name) = metadata
        .map(|m| (m.expires_at, m.doctor_name))
        .unwrap_or_default();
    let expires_at = meta_expires_at.or(root_expires_at);
    let expires_in_seconds = expires_in_seconds
        .or_else(|| expires_at.map(|at| (at - now).num_seconds().max(0)));

    let analytics = analytics.unwrap_or_default();
    let pressure = PressureHistory::resolve(analytics.history);
    let frequency = FrequencySource::resolve(analytics.symptom_frequency);

    let logs: Vec<HealthLogRecord> = logs.into_iter().map(HealthLogRecord::from).collect();
    let total = total.map(|t| t as usize).unwrap_or(logs.len()).max(logs.len());

    SharedHistory {
        patient_info,
        doctor_name: doctor_name.filter(|n| !n.trim().is_empty()),
        expires_at,
        expires_in_seconds,
        blood_pressure_series: pressure.to_series(&logs),
        symptom_frequency: frequency.to_items(&logs),
        anomaly: analytics.anomaly.unwrap_or(false),
        total,
        logs,
    }
}

// ═══════════════════════════════════════════════════════════
// Gateway
// ═══════════════════════════════════════════════════════════

/// Token-authenticated read access to a patient's shared history.
pub struct SharedHistoryGateway<C> {
    client: C,
    history_limit: u32,
}

impl<C: SharedHistoryApi> SharedHistoryGateway<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: u32) -> Self {
        self.history_limit = limit;
        self
    }

    /// Fetch the last `range_days` days. 401/403 surface as
    /// [`SharingError::Auth`]; other failures as `Transient`.
    pub async fn fetch(
        &self,
        token: &AccessToken,
        range_days: u32,
    ) -> SharingResult<SharedHistory> {
        if token.as_str().trim().is_empty() {
            return Err(SharingError::Validation("access token is required".into()));
        }
        if range_days == 0 {
            return Err(SharingError::Validation("range must be at least one day".into()));
        }

        let now = Utc::now();
        let query = SharedHistoryQuery::for_window(
            token.clone(),
            range_days,
            now.date_naive(),
            self.history_limit,
        );
        match self.client.shared_history(&query).await {
            Ok(response) => {
                let history = normalize_shared_history(response, now);
                tracing::info!(
                    range_days = range_days,
                    logs = history.logs.len(),
                    series = history.blood_pressure_series.len(),
                    "Shared history fetched"
                );
                Ok(history)
            }
            Err(e) => {
                if e.is_access_expired() {
                    tracing::info!(
                        token = %crate::models::redact(token.as_str()),
                        "Shared access expired"
                    );
                }
                Err(e)
            }
        }
    }

    /// [`Self::fetch`] with backoff on transient failures. Expired or
    /// forbidden tokens are returned immediately.
    pub async fn fetch_with_retry(
        &self,
        token: &AccessToken,
        range_days: u32,
        policy: RetryPolicy,
    ) -> SharingResult<SharedHistory> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch(token, range_days).await {
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Shared history fetch failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
