//! Doctor/patient access-request workflow.
//!
//! ```text
//! request_access ──► PENDING ──grant_access──► GRANTED (token issued)
//!                       │                          │
//!                       └────── revoke_access ─────┴──► REVOKED
//! ```
//!
//! The remote service owns the state machine; this layer validates input,
//! forwards calls, and enforces the retry rules: `grant_access` is never
//! retried (a retry could mint a second token), `revoke_access` is idempotent.

use crate::api::{AccessApi, RequestAccessResponse};
use crate::error::{SharingError, SharingResult};
use crate::models::{redact, AccessOverview, AccessToken, ShareCode};

/// Name recorded when the doctor leaves the field blank.
pub const DEFAULT_DOCTOR_NAME: &str = "Doctor";

/// Outcome of re-checking a grant whose first attempt failed ambiguously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantReconciliation {
    /// Request is still pending; granting again is safe.
    StillPending,
    /// Request was consumed (granted by the earlier call) or no longer exists.
    Resolved,
}

pub struct AccessWorkflow<A> {
    api: A,
}

impl<A: AccessApi> AccessWorkflow<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Doctor side: ask for access with a patient's share code.
    pub async fn request_access(
        &self,
        share_code: &str,
        doctor_name: &str,
    ) -> SharingResult<RequestAccessResponse> {
        let code = ShareCode::parse(share_code)?;
        let doctor_name = match doctor_name.trim() {
            "" => DEFAULT_DOCTOR_NAME,
            name => name,
        };

        let response = self.api.request_access(&code, doctor_name).await?;
        tracing::info!(
            request_id = %response.request_id,
            code = %redact(code.as_str()),
            "Access requested"
        );
        Ok(response)
    }

    /// Patient side: approve a pending request. Not retried on failure;
    /// call [`Self::reconcile_grant`] before trying again.
    pub async fn grant_access(&self, request_id: &str) -> SharingResult<AccessToken> {
        let request_id = required(request_id, "request_id")?;

        match self.api.grant_access(request_id).await {
            Ok(token) => {
                tracing::info!(
                    request_id = %request_id,
                    token = %redact(token.as_str()),
                    "Access granted"
                );
                Ok(token)
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(
                        request_id = %request_id,
                        error = %e,
                        "Grant outcome unknown, reconcile before retrying"
                    );
                }
                Err(e)
            }
        }
    }

    /// Patient side: revoke a doctor. Revoking twice is not an error.
    pub async fn revoke_access(&self, doctor_id: &str) -> SharingResult<()> {
        let doctor_id = required(doctor_id, "doctor_id")?;

        match self.api.revoke_access(doctor_id).await {
            Ok(()) => {
                tracing::info!(doctor_id = %doctor_id, "Access revoked");
                Ok(())
            }
            Err(SharingError::NotFound(_)) => {
                tracing::debug!(doctor_id = %doctor_id, "Doctor already revoked");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Patient side: share code, pending requests and authorized doctors.
    pub async fn list_access(&self) -> SharingResult<AccessOverview> {
        self.api.list_access().await
    }

    /// Re-read the overview to learn whether an ambiguous grant went through.
    pub async fn reconcile_grant(&self, request_id: &str) -> SharingResult<GrantReconciliation> {
        let request_id = required(request_id, "request_id")?;
        let overview = self.api.list_access().await?;
        let outcome = if overview.is_pending(request_id) {
            GrantReconciliation::StillPending
        } else {
            GrantReconciliation::Resolved
        };
        tracing::debug!(request_id = %request_id, outcome = ?outcome, "Grant reconciled");
        Ok(outcome)
    }
}

fn required<'a>(value: &'a str, field: &str) -> SharingResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SharingError::Validation(format!("{field} is required")));
    }
    Ok(trimmed)
}
