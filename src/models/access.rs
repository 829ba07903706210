use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SHARE_CODE_LEN;
use crate::error::{SharingError, SharingResult};

// ═══════════════════════════════════════════════════════════
// Share code
// ═══════════════════════════════════════════════════════════

/// Durable 8-character patient share code, alphabet `[A-Z0-9]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShareCode(String);

impl ShareCode {
    /// Normalize user input (trim, drop hyphens/spaces, upper-case) and validate.
    pub fn parse(input: &str) -> SharingResult<Self> {
        let normalized: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if normalized.is_empty() {
            return Err(SharingError::Validation("share code is required".into()));
        }
        if normalized.chars().count() != SHARE_CODE_LEN
            || !normalized.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(SharingError::Validation(format!(
                "share code must be {SHARE_CODE_LEN} characters from A-Z and 0-9"
            )));
        }
        Ok(Self(normalized))
    }

    /// Wrap a code produced by the generator, which only emits `[A-Z0-9]{8}`.
    pub(crate) fn from_generated(code: String) -> Self {
        debug_assert_eq!(code.len(), SHARE_CODE_LEN);
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Grouped display form, `XXXX-XXXX`.
    pub fn display(&self) -> String {
        format_code_display(&self.0)
    }
}

impl fmt::Display for ShareCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ShareCode {
    type Error = SharingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShareCode> for String {
    fn from(code: ShareCode) -> Self {
        code.0
    }
}

/// Insert a hyphen after the 4th character when the code has exactly 8
/// characters; anything else is shown verbatim.
pub fn format_code_display(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    if chars.len() != SHARE_CODE_LEN {
        return code.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[4..].iter().collect();
    format!("{head}-{tail}")
}

// ═══════════════════════════════════════════════════════════
// Access token
// ═══════════════════════════════════════════════════════════

/// Opaque bearer capability for one (patient, doctor) grant.
///
/// Never decoded or minted client-side; only forwarded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken({})", redact(&self.0))
    }
}

/// Keep the first four characters of a secret for log lines.
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}…")
}

// ═══════════════════════════════════════════════════════════
// Requests, grants, read model
// ═══════════════════════════════════════════════════════════

/// A doctor's pending request for a patient's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub request_id: String,
    pub doctor_name: String,
    #[serde(default)]
    pub requested_at: Option<DateTime<Utc>>,
}

/// Public projection of an access grant; identity is `doctor_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedDoctor {
    pub doctor_id: String,
    pub doctor_name: String,
    #[serde(default)]
    pub granted_at: Option<DateTime<Utc>>,
}

/// Full grant as issued; the token is a capability, not an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub doctor_id: String,
    pub doctor_name: String,
    pub granted_at: DateTime<Utc>,
    pub token: AccessToken,
}

impl AccessGrant {
    pub fn authorized_doctor(&self) -> AuthorizedDoctor {
        AuthorizedDoctor {
            doctor_id: self.doctor_id.clone(),
            doctor_name: self.doctor_name.clone(),
            granted_at: Some(self.granted_at),
        }
    }
}

/// Patient-side read model: share code, pending requests, authorized doctors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessOverview {
    #[serde(default)]
    pub share_code: Option<String>,
    #[serde(default)]
    pub pending_requests: Vec<AccessRequest>,
    #[serde(default)]
    pub authorized_doctors: Vec<AuthorizedDoctor>,
}

impl AccessOverview {
    pub fn is_pending(&self, request_id: &str) -> bool {
        self.pending_requests.iter().any(|r| r.request_id == request_id)
    }

    pub fn is_authorized(&self, doctor_id: &str) -> bool {
        self.authorized_doctors.iter().any(|d| d.doctor_id == doctor_id)
    }

    /// Share code in `XXXX-XXXX` form, if one exists.
    pub fn share_code_display(&self) -> Option<String> {
        self.share_code.as_deref().map(format_code_display)
    }
}

// ═══════════════════════════════════════════════════════════
// Request lifecycle
// ═══════════════════════════════════════════════════════════

/// Lifecycle of an access request.
///
/// PENDING → GRANTED → REVOKED, or PENDING → REVOKED. There is no rejected
/// state: a pending request persists until acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Pending,
    Granted,
    Revoked,
}

impl RequestState {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestState::Pending => "pending",
            RequestState::Granted => "granted",
            RequestState::Revoked => "revoked",
        }
    }

    /// Only a pending request can be granted; anything else is stale.
    pub fn grant(self) -> SharingResult<Self> {
        match self {
            RequestState::Pending => Ok(RequestState::Granted),
            other => Err(SharingError::NotFound(format!(
                "request is no longer pending ({})",
                other.as_str()
            ))),
        }
    }

    /// Revocation is terminal and idempotent.
    pub fn revoke(self) -> Self {
        RequestState::Revoked
    }

    pub fn is_terminal(self) -> bool {
        self == RequestState::Revoked
    }
}
