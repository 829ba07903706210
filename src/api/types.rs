//! Request/response bodies of the sharing endpoints and token helpers.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{AccessToken, RequestState};

// ═══════════════════════════════════════════════════════════
// Request bodies
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
pub struct RequestAccessBody<'a> {
    pub share_code: &'a str,
    pub doctor_name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct GrantAccessBody<'a> {
    pub request_id: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RevokeAccessBody<'a> {
    pub doctor_id: &'a str,
}

// ═══════════════════════════════════════════════════════════
// Response bodies
// ═══════════════════════════════════════════════════════════

/// `201` body of `request-access`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestAccessResponse {
    pub status: RequestState,
    pub request_id: String,
}

/// `200` body of `grant-access`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GrantAccessResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Error body returned by the edge functions on non-2xx.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Best human-readable message for a non-2xx response body.
pub fn error_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(msg) = parsed.error.or(parsed.message).filter(|m| !m.trim().is_empty()) {
            return msg;
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed.to_string()
    }
}

// ═══════════════════════════════════════════════════════════
// Shared-history query
// ═══════════════════════════════════════════════════════════

/// Query string of `GET shared-history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedHistoryQuery {
    pub access_token: AccessToken,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub limit: u32,
}

impl SharedHistoryQuery {
    /// Window of `range_days` ending `today`, both ends inclusive.
    pub fn for_window(
        access_token: AccessToken,
        range_days: u32,
        today: NaiveDate,
        limit: u32,
    ) -> Self {
        let from_date = today
            .checked_sub_days(Days::new(u64::from(range_days)))
            .unwrap_or(NaiveDate::MIN);
        Self {
            access_token,
            from_date,
            to_date: today,
            limit,
        }
    }

    pub fn query_pairs(&self) -> [(&'static str, String); 4] {
        [
            ("access_token", self.access_token.as_str().to_string()),
            ("from_date", self.from_date.format("%Y-%m-%d").to_string()),
            ("to_date", self.to_date.format("%Y-%m-%d").to_string()),
            ("limit", self.limit.to_string()),
        ]
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.from_date && date <= self.to_date
    }
}

// ═══════════════════════════════════════════════════════════
// Token helpers
// ═══════════════════════════════════════════════════════════

/// Hash a bearer token for storage (SHA-256).
pub fn hash_token(token: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().into()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Constant-time comparison of two token hashes.
pub fn token_hash_matches(stored: &[u8; 32], presented: &[u8; 32]) -> bool {
    use subtle::ConstantTimeEq;
    stored.ct_eq(presented).into()
}
