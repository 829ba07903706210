//! In-process sharing backend.
//!
//! Implements the request/grant/revoke/list and shared-history endpoints plus
//! share-code storage over one mutex-guarded state. Tokens are stored only as
//! SHA-256 hashes and compared in constant time. Clones share state; use
//! [`InMemorySharingService::signed_in_as`] to get a patient-session handle.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

use super::types::{generate_token, hash_token, token_hash_matches};
use super::{AccessApi, RequestAccessResponse, SharedHistoryApi, SharedHistoryQuery};
use crate::analytics::to_symptom_frequency;
use crate::config::DEFAULT_TOKEN_TTL_HOURS;
use crate::error::{SharingError, SharingResult};
use crate::models::{
    redact, AccessOverview, AccessRequest, AccessToken, AnalyticsPayload, AuthorizedDoctor,
    FrequencyEntry, HealthLogRecord, HistoryItem, HistoryMetadata, PatientInfo, RequestState,
    ShareCode, SharedHistoryLog, SharedHistoryResponse, SymptomFrequencyPayload,
};
use crate::pressure::compute_map;
use crate::share_code::ShareCodeStore;
use crate::workflow::DEFAULT_DOCTOR_NAME;

/// How `analytics.history` is rendered in shared-history responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryShape {
    /// One `{date, systolic, diastolic}` item per log with pressure.
    #[default]
    PerReading,
    /// One `{period, count, avg_map, avg_pain_level}` item per day.
    PeriodAverages,
    /// `analytics.history` omitted.
    None,
}

/// How `analytics.symptom_frequency` is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FrequencyShape {
    #[default]
    List,
    /// `{ "<symptom name>": count }`
    Map,
    None,
}

#[derive(Debug)]
struct StoredRequest {
    request_id: String,
    patient_id: String,
    doctor_name: String,
    requested_at: DateTime<Utc>,
    state: RequestState,
}

#[derive(Debug)]
struct StoredGrant {
    doctor_id: String,
    request_id: String,
    patient_id: String,
    doctor_name: String,
    granted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    token_hash: [u8; 32],
    revoked: bool,
}

#[derive(Debug, Default)]
struct PatientData {
    info: PatientInfo,
    logs: Vec<SharedHistoryLog>,
}

#[derive(Debug)]
struct State {
    share_codes: HashMap<String, ShareCode>,
    patients: HashMap<String, PatientData>,
    requests: Vec<StoredRequest>,
    grants: Vec<StoredGrant>,
    next_request: u64,
    next_doctor: u64,
    token_ttl: Duration,
    history_shape: HistoryShape,
    frequency_shape: FrequencyShape,
    clock: Option<DateTime<Utc>>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            share_codes: HashMap::new(),
            patients: HashMap::new(),
            requests: Vec::new(),
            grants: Vec::new(),
            next_request: 0,
            next_doctor: 0,
            token_ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
            history_shape: HistoryShape::default(),
            frequency_shape: FrequencyShape::default(),
            clock: None,
        }
    }
}

impl State {
    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    fn patient_for_code(&self, code: &ShareCode) -> Option<&str> {
        self.share_codes
            .iter()
            .find(|(_, stored)| *stored == code)
            .map(|(patient_id, _)| patient_id.as_str())
    }
}

/// In-memory implementation of the sharing backend.
#[derive(Debug, Clone, Default)]
pub struct InMemorySharingService {
    state: Arc<Mutex<State>>,
    session: Option<String>,
}

impl InMemorySharingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle acting as `patient_id` for patient-authenticated endpoints.
    pub fn signed_in_as(&self, patient_id: &str) -> Self {
        Self {
            state: Arc::clone(&self.state),
            session: Some(patient_id.to_string()),
        }
    }

    fn lock(&self) -> SharingResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| SharingError::Transient("sharing state lock poisoned".into()))
    }

    fn session(&self) -> SharingResult<&str> {
        self.session.as_deref().ok_or(SharingError::Auth { status: 401 })
    }

    // ── Seeding ──────────────────────────────────────────

    pub fn add_patient(&self, patient_id: &str, info: PatientInfo) -> SharingResult<()> {
        let mut state = self.lock()?;
        state.patients.entry(patient_id.to_string()).or_default().info = info;
        Ok(())
    }

    pub fn add_log(&self, patient_id: &str, log: SharedHistoryLog) -> SharingResult<()> {
        let mut state = self.lock()?;
        state.patients.entry(patient_id.to_string()).or_default().logs.push(log);
        Ok(())
    }

    pub fn set_history_shape(&self, shape: HistoryShape) -> SharingResult<()> {
        self.lock()?.history_shape = shape;
        Ok(())
    }

    pub fn set_frequency_shape(&self, shape: FrequencyShape) -> SharingResult<()> {
        self.lock()?.frequency_shape = shape;
        Ok(())
    }

    pub fn set_token_ttl(&self, ttl: Duration) -> SharingResult<()> {
        self.lock()?.token_ttl = ttl;
        Ok(())
    }

    /// Pin the backend clock; `None` returns to wall-clock time.
    pub fn set_clock(&self, now: Option<DateTime<Utc>>) -> SharingResult<()> {
        self.lock()?.clock = now;
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Share-code storage
// ═══════════════════════════════════════════════════════════

impl ShareCodeStore for InMemorySharingService {
    async fn read_share_code(&self, patient_id: &str) -> SharingResult<Option<ShareCode>> {
        Ok(self.lock()?.share_codes.get(patient_id).cloned())
    }

    async fn insert_share_code_if_absent(
        &self,
        patient_id: &str,
        code: &ShareCode,
    ) -> SharingResult<ShareCode> {
        let mut state = self.lock()?;
        if let Some(existing) = state.share_codes.get(patient_id) {
            return Ok(existing.clone());
        }
        if state.patient_for_code(code).is_some() {
            return Err(SharingError::Conflict("share code already assigned".into()));
        }
        state.share_codes.insert(patient_id.to_string(), code.clone());
        Ok(code.clone())
    }
}

// ═══════════════════════════════════════════════════════════
// Access requests
// ═══════════════════════════════════════════════════════════

impl AccessApi for InMemorySharingService {
    async fn request_access(
        &self,
        share_code: &ShareCode,
        doctor_name: &str,
    ) -> SharingResult<RequestAccessResponse> {
        let mut state = self.lock()?;
        let patient_id = state
            .patient_for_code(share_code)
            .map(str::to_string)
            .ok_or_else(|| SharingError::NotFound("Invalid share code".into()))?;

        let doctor_name = match doctor_name.trim() {
            "" => DEFAULT_DOCTOR_NAME.to_string(),
            name => name.to_string(),
        };
        state.next_request += 1;
        let request_id = format!("req_{}", state.next_request);
        let requested_at = state.now();
        state.requests.push(StoredRequest {
            request_id: request_id.clone(),
            patient_id,
            doctor_name,
            requested_at,
            state: RequestState::Pending,
        });

        Ok(RequestAccessResponse {
            status: RequestState::Pending,
            request_id,
        })
    }

    async fn grant_access(&self, request_id: &str) -> SharingResult<AccessToken> {
        let patient_id = self.session()?;
        let mut state = self.lock()?;
        let now = state.now();
        let ttl = state.token_ttl;

        let request = state
            .requests
            .iter_mut()
            .find(|r| r.request_id == request_id && r.patient_id == patient_id)
            .ok_or_else(|| SharingError::NotFound(format!("request {request_id} not found")))?;
        request.state = request.state.grant()?;
        let doctor_name = request.doctor_name.clone();

        let token = generate_token();
        state.next_doctor += 1;
        let doctor_id = format!("doc_{}", state.next_doctor);
        state.grants.push(StoredGrant {
            doctor_id: doctor_id.clone(),
            request_id: request_id.to_string(),
            patient_id: patient_id.to_string(),
            doctor_name,
            granted_at: now,
            expires_at: now + ttl,
            token_hash: hash_token(&token),
            revoked: false,
        });
        tracing::debug!(
            request_id = %request_id,
            doctor_id = %doctor_id,
            token = %redact(&token),
            "Grant issued"
        );

        Ok(AccessToken::new(token))
    }

    async fn revoke_access(&self, doctor_id: &str) -> SharingResult<()> {
        let patient_id = self.session()?;
        let mut state = self.lock()?;
        let State { grants, requests, .. } = &mut *state;

        let grant = grants
            .iter_mut()
            .find(|g| g.doctor_id == doctor_id && g.patient_id == patient_id)
            .ok_or_else(|| SharingError::NotFound(format!("doctor {doctor_id} not found")))?;
        grant.revoked = true;
        if let Some(request) = requests.iter_mut().find(|r| r.request_id == grant.request_id) {
            request.state = request.state.revoke();
        }
        Ok(())
    }

    async fn list_access(&self) -> SharingResult<AccessOverview> {
        let patient_id = self.session()?;
        let state = self.lock()?;
        let now = state.now();

        let pending_requests = state
            .requests
            .iter()
            .filter(|r| r.patient_id == patient_id && r.state == RequestState::Pending)
            .map(|r| AccessRequest {
                request_id: r.request_id.clone(),
                doctor_name: r.doctor_name.clone(),
                requested_at: Some(r.requested_at),
            })
            .collect();
        let authorized_doctors = state
            .grants
            .iter()
            .filter(|g| g.patient_id == patient_id && !g.revoked && g.expires_at > now)
            .map(|g| AuthorizedDoctor {
                doctor_id: g.doctor_id.clone(),
                doctor_name: g.doctor_name.clone(),
                granted_at: Some(g.granted_at),
            })
            .collect();

        Ok(AccessOverview {
            share_code: state
                .share_codes
                .get(patient_id)
                .map(|c| c.as_str().to_string()),
            pending_requests,
            authorized_doctors,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Shared history
// ═══════════════════════════════════════════════════════════

impl SharedHistoryApi for InMemorySharingService {
    async fn shared_history(
        &self,
        query: &SharedHistoryQuery,
    ) -> SharingResult<SharedHistoryResponse> {
        let state = self.lock()?;
        let now = state.now();
        let presented = hash_token(query.access_token.as_str());

        let grant = state
            .grants
            .iter()
            .find(|g| token_hash_matches(&g.token_hash, &presented))
            .ok_or(SharingError::Auth { status: 401 })?;
        if grant.revoked || grant.expires_at <= now {
            return Err(SharingError::Auth { status: 403 });
        }

        let patient = state.patients.get(&grant.patient_id);
        let mut logs: Vec<SharedHistoryLog> = patient
            .map(|p| p.logs.as_slice())
            .unwrap_or_default()
            .iter()
            .filter(|log| query.contains(log.created_at.date_naive()))
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = logs.len();
        logs.truncate(query.limit as usize);

        let records: Vec<HealthLogRecord> =
            logs.iter().cloned().map(HealthLogRecord::from).collect();
        let analytics = AnalyticsPayload {
            history: render_history(&records, state.history_shape),
            symptom_frequency: render_frequency(&records, state.frequency_shape),
            anomaly: Some(records.iter().any(HealthLogRecord::is_emergency)),
        };

        Ok(SharedHistoryResponse {
            patient_info: patient.map(|p| p.info.clone()).unwrap_or_default(),
            metadata: Some(HistoryMetadata {
                expires_at: Some(grant.expires_at),
                doctor_name: Some(grant.doctor_name.clone()),
            }),
            analytics: Some(analytics),
            logs,
            total: u32::try_from(total).ok(),
            expires_at: None,
            expires_in_seconds: Some((grant.expires_at - now).num_seconds().max(0)),
        })
    }
}

fn render_history(records: &[HealthLogRecord], shape: HistoryShape) -> Option<Vec<HistoryItem>> {
    match shape {
        HistoryShape::None => None,
        HistoryShape::PerReading => Some(
            records
                .iter()
                .filter_map(|r| {
                    let bp = r.blood_pressure()?;
                    Some(HistoryItem {
                        date: Some(r.created_at.to_rfc3339()),
                        systolic: Some(bp.systolic),
                        diastolic: Some(bp.diastolic),
                        map: Some(f64::from(compute_map(bp.systolic, bp.diastolic))),
                        heart_rate: r.heart_rate,
                        ..HistoryItem::default()
                    })
                })
                .collect(),
        ),
        HistoryShape::PeriodAverages => {
            // period -> (count, map sum, map count, pain sum, pain count)
            let mut periods: BTreeMap<String, (u32, f64, u32, f64, u32)> = BTreeMap::new();
            for r in records {
                let entry = periods
                    .entry(r.created_at.format("%Y-%m-%d").to_string())
                    .or_default();
                entry.0 += 1;
                if let Some(bp) = r.blood_pressure() {
                    entry.1 += f64::from(compute_map(bp.systolic, bp.diastolic));
                    entry.2 += 1;
                }
                if let Some(pain) = r.pain_level {
                    entry.3 += f64::from(pain);
                    entry.4 += 1;
                }
            }
            Some(
                periods
                    .into_iter()
                    .map(|(period, (count, map_sum, map_n, pain_sum, pain_n))| HistoryItem {
                        period: Some(period),
                        count: Some(count),
                        avg_map: (map_n > 0).then(|| map_sum / f64::from(map_n)),
                        avg_pain_level: (pain_n > 0).then(|| pain_sum / f64::from(pain_n)),
                        ..HistoryItem::default()
                    })
                    .collect(),
            )
        }
    }
}

fn render_frequency(
    records: &[HealthLogRecord],
    shape: FrequencyShape,
) -> Option<SymptomFrequencyPayload> {
    let ranked = to_symptom_frequency(records);
    match shape {
        FrequencyShape::None => None,
        FrequencyShape::List => Some(SymptomFrequencyPayload::List(
            ranked
                .into_iter()
                .map(|item| FrequencyEntry {
                    symptom_id: Some(item.symptom_id),
                    symptom_name: Some(item.symptom_name),
                    count: Some(item.count),
                })
                .collect(),
        )),
        FrequencyShape::Map => {
            let mut map = Map::new();
            for item in ranked {
                map.insert(item.symptom_name, Value::from(item.count));
            }
            Some(SymptomFrequencyPayload::Map(map))
        }
    }
}
