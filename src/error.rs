//! Error taxonomy shared by the registry, the access workflow and the
//! shared-history gateway.

/// Errors surfaced by sharing operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SharingError {
    /// Malformed share code or empty required field.
    #[error("Invalid input: {0}")]
    Validation(String),
    /// Unknown share code or stale request id.
    #[error("Not found: {0}")]
    NotFound(String),
    /// Expired or forbidden access token (or missing patient session).
    #[error("Access expired or forbidden (HTTP {status})")]
    Auth { status: u16 },
    /// Network failure or server-side error; safe to retry with backoff.
    #[error("Temporary failure: {0}")]
    Transient(String),
    /// Concurrent modification of the same access request.
    #[error("Conflict: {0}")]
    Conflict(String),
    /// 2xx response whose body could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

pub type SharingResult<T> = Result<T, SharingError>;

impl SharingError {
    /// Only transient failures may be retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SharingError::Transient(_))
    }

    /// True when the doctor must be routed to the "access expired" state.
    pub fn is_access_expired(&self) -> bool {
        matches!(self, SharingError::Auth { .. })
    }

    pub fn code(&self) -> &'static str {
        match self {
            SharingError::Validation(_) => "VALIDATION",
            SharingError::NotFound(_) => "NOT_FOUND",
            SharingError::Auth { .. } => "ACCESS_EXPIRED",
            SharingError::Transient(_) => "TRANSIENT",
            SharingError::Conflict(_) => "CONFLICT",
            SharingError::MalformedResponse(_) => "MALFORMED_RESPONSE",
        }
    }
}

/// Classify a non-2xx status from request/grant/revoke/list endpoints.
pub fn classify_status(status: u16, message: &str) -> SharingError {
    match status {
        400 | 422 => SharingError::Validation(message.to_string()),
        401 | 403 => SharingError::Auth { status },
        404 => SharingError::NotFound(message.to_string()),
        409 => SharingError::Conflict(message.to_string()),
        _ => SharingError::Transient(format!("HTTP {status}: {message}")),
    }
}

/// Classify a non-2xx status from the shared-history endpoint.
///
/// 401/403 mean the token is expired or revoked; everything else is transient.
pub fn classify_history_status(status: u16, message: &str) -> SharingError {
    match status {
        401 | 403 => SharingError::Auth { status },
        _ => SharingError::Transient(format!("HTTP {status}: {message}")),
    }
}

impl From<reqwest::Error> for SharingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SharingError::MalformedResponse(err.to_string())
        } else if err.is_timeout() {
            SharingError::Transient(format!("request timed out: {err}"))
        } else {
            SharingError::Transient(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_401_and_403_are_auth() {
        assert_eq!(classify_history_status(401, ""), SharingError::Auth { status: 401 });
        assert_eq!(classify_history_status(403, ""), SharingError::Auth { status: 403 });
    }

    #[test]
    fn history_other_statuses_are_transient() {
        for status in [400, 404, 500, 502, 503] {
            let err = classify_history_status(status, "boom");
            assert!(err.is_retryable(), "status {status} should be transient");
        }
    }

    #[test]
    fn workflow_404_is_not_found() {
        let err = classify_status(404, "share code unknown");
        assert_eq!(err, SharingError::NotFound("share code unknown".into()));
        assert!(!err.is_retryable());
    }

    #[test]
    fn workflow_statuses_map_to_kinds() {
        assert_eq!(classify_status(400, "x").code(), "VALIDATION");
        assert_eq!(classify_status(409, "x").code(), "CONFLICT");
        assert_eq!(classify_status(403, "x").code(), "ACCESS_EXPIRED");
        assert_eq!(classify_status(500, "x").code(), "TRANSIENT");
    }

    #[test]
    fn auth_is_never_retryable() {
        let err = SharingError::Auth { status: 401 };
        assert!(!err.is_retryable());
        assert!(err.is_access_expired());
    }

    #[test]
    fn malformed_response_is_not_retryable() {
        assert!(!SharingError::MalformedResponse("bad json".into()).is_retryable());
    }
}
