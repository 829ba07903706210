//! Patient share codes: generation and get-or-create over a persistent store.
//!
//! Codes are 8 characters from `[A-Z0-9]`, drawn from the OS CSPRNG. The code
//! space is 36^8 ≈ 2.82e12; see [`collision_probability`] for the birthday
//! bound at a given patient count.

use std::future::Future;

use rand::rngs::OsRng;
use rand::Rng;

use crate::config::SHARE_CODE_LEN;
use crate::error::{SharingError, SharingResult};
use crate::models::{redact, ShareCode};

pub const SHARE_CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of distinct share codes (36^8).
pub const SHARE_CODE_SPACE: u64 = 36u64.pow(SHARE_CODE_LEN as u32);

/// Generate a fresh share code from the OS random source.
pub fn generate_share_code() -> ShareCode {
    let mut rng = OsRng;
    let code: String = (0..SHARE_CODE_LEN)
        .map(|_| SHARE_CODE_ALPHABET[rng.gen_range(0..SHARE_CODE_ALPHABET.len())] as char)
        .collect();
    ShareCode::from_generated(code)
}

/// Probability that at least two of `patients` independently generated codes
/// collide: `1 - exp(-n(n-1) / 2N)`.
pub fn collision_probability(patients: u64) -> f64 {
    if patients < 2 {
        return 0.0;
    }
    let n = patients as f64;
    let exponent = -(n * (n - 1.0)) / (2.0 * SHARE_CODE_SPACE as f64);
    -exponent.exp_m1()
}

/// Durable per-patient share code storage.
pub trait ShareCodeStore {
    /// The patient's existing code, if any.
    fn read_share_code(
        &self,
        patient_id: &str,
    ) -> impl Future<Output = SharingResult<Option<ShareCode>>> + Send;

    /// Atomically store `code` unless the patient already has one.
    /// Returns whichever code is stored afterwards.
    fn insert_share_code_if_absent(
        &self,
        patient_id: &str,
        code: &ShareCode,
    ) -> impl Future<Output = SharingResult<ShareCode>> + Send;
}

/// Read-or-create access to patient share codes.
#[derive(Debug, Clone)]
pub struct ShareCodeRegistry<S> {
    store: S,
}

impl<S: ShareCodeStore> ShareCodeRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Return the patient's code, creating it on first use.
    ///
    /// Concurrent first calls converge on one code: the insert is
    /// insert-if-absent and the stored value is re-read afterwards.
    pub async fn get_or_create_share_code(&self, patient_id: &str) -> SharingResult<ShareCode> {
        if patient_id.trim().is_empty() {
            return Err(SharingError::Validation("patient id is required".into()));
        }

        if let Some(existing) = self.store.read_share_code(patient_id).await? {
            return Ok(existing);
        }

        let candidate = generate_share_code();
        let stored = self
            .store
            .insert_share_code_if_absent(patient_id, &candidate)
            .await?;

        let current = self.store.read_share_code(patient_id).await?.unwrap_or(stored);
        if current == candidate {
            tracing::info!(
                patient_id = %patient_id,
                code = %redact(current.as_str()),
                "Share code created"
            );
        } else {
            tracing::debug!(patient_id = %patient_id, "Share code created by a concurrent caller");
        }
        Ok(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::InMemorySharingService;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[test]
    fn generated_codes_are_well_formed() {
        for _ in 0..200 {
            let code = generate_share_code();
            assert_eq!(code.as_str().len(), SHARE_CODE_LEN);
            assert!(code
                .as_str()
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
            assert_eq!(ShareCode::parse(code.as_str()).unwrap(), code);
        }
    }

    #[test]
    fn generated_codes_differ() {
        assert_ne!(generate_share_code(), generate_share_code());
    }

    #[test]
    fn code_space_is_36_pow_8() {
        assert_eq!(SHARE_CODE_SPACE, 2_821_109_907_456);
    }

    #[test]
    fn collision_probability_bounds() {
        assert_eq!(collision_probability(0), 0.0);
        assert_eq!(collision_probability(1), 0.0);
        let p_10k = collision_probability(10_000);
        assert!(p_10k > 0.0 && p_10k < 0.0001);
        let p_1m = collision_probability(1_000_000);
        assert!(p_1m > 0.1 && p_1m < 0.2);
    }

    #[tokio::test]
    async fn creates_once_then_reads() {
        let registry = ShareCodeRegistry::new(InMemorySharingService::new());
        let first = registry.get_or_create_share_code("patient-1").await.unwrap();
        let second = registry.get_or_create_share_code("patient-1").await.unwrap();
        assert_eq!(first, second);

        let other = registry.get_or_create_share_code("patient-2").await.unwrap();
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn returns_existing_code() {
        let service = InMemorySharingService::new();
        let code = ShareCode::parse("AB12CD34").unwrap();
        service.insert_share_code_if_absent("patient-1", &code).await.unwrap();

        let registry = ShareCodeRegistry::new(service);
        let got = registry.get_or_create_share_code("patient-1").await.unwrap();
        assert_eq!(got.display(), "AB12-CD34");
    }

    #[tokio::test]
    async fn concurrent_first_calls_agree() {
        let registry = ShareCodeRegistry::new(InMemorySharingService::new());
        let (a, b, c) = tokio::join!(
            registry.get_or_create_share_code("patient-1"),
            registry.get_or_create_share_code("patient-1"),
            registry.get_or_create_share_code("patient-1"),
        );
        let a = a.unwrap();
        assert_eq!(a, b.unwrap());
        assert_eq!(a, c.unwrap());
    }

    #[tokio::test]
    async fn empty_patient_id_is_rejected() {
        let registry = ShareCodeRegistry::new(InMemorySharingService::new());
        let err = registry.get_or_create_share_code("  ").await.unwrap_err();
        assert!(matches!(err, SharingError::Validation(_)));
    }

    /// Store whose first read misses while another writer has already
    /// inserted a code.
    #[derive(Clone, Default)]
    struct RacingStore {
        codes: Arc<Mutex<HashMap<String, ShareCode>>>,
        reads: Arc<Mutex<u32>>,
    }

    impl ShareCodeStore for RacingStore {
        async fn read_share_code(&self, patient_id: &str) -> SharingResult<Option<ShareCode>> {
            let mut reads = self.reads.lock().unwrap();
            *reads += 1;
            if *reads == 1 {
                let winner = ShareCode::parse("WINNER01").unwrap();
                self.codes.lock().unwrap().insert(patient_id.to_string(), winner);
                return Ok(None);
            }
            Ok(self.codes.lock().unwrap().get(patient_id).cloned())
        }

        async fn insert_share_code_if_absent(
            &self,
            patient_id: &str,
            code: &ShareCode,
        ) -> SharingResult<ShareCode> {
            let mut codes = self.codes.lock().unwrap();
            Ok(codes
                .entry(patient_id.to_string())
                .or_insert_with(|| code.clone())
                .clone())
        }
    }

    #[tokio::test]
    async fn lost_race_returns_stored_winner() {
        let registry = ShareCodeRegistry::new(RacingStore::default());
        let code = registry.get_or_create_share_code("patient-1").await.unwrap();
        assert_eq!(code.as_str(), "WINNER01");
    }

    #[derive(Clone)]
    struct FailingStore;

    impl ShareCodeStore for FailingStore {
        async fn read_share_code(&self, _patient_id: &str) -> SharingResult<Option<ShareCode>> {
            Err(SharingError::Transient("database unavailable".into()))
        }

        async fn insert_share_code_if_absent(
            &self,
            _patient_id: &str,
            code: &ShareCode,
        ) -> SharingResult<ShareCode> {
            Ok(code.clone())
        }
    }

    #[tokio::test]
    async fn store_errors_surface_unchanged() {
        let registry = ShareCodeRegistry::new(FailingStore);
        let err = registry.get_or_create_share_code("patient-1").await.unwrap_err();
        assert_eq!(err, SharingError::Transient("database unavailable".into()));
    }
}
