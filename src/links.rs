//! Shareable links for the doctor-facing web pages.

use reqwest::Url;

use crate::error::{SharingError, SharingResult};
use crate::models::{AccessToken, ShareCode};

fn build(base_url: &str, path: &str, key: &str, value: &str) -> SharingResult<String> {
    let joined = format!("{}{path}", base_url.trim_end_matches('/'));
    let mut url = Url::parse(&joined)
        .map_err(|e| SharingError::Validation(format!("invalid base URL {base_url:?}: {e}")))?;
    url.query_pairs_mut().append_pair(key, value);
    Ok(url.into())
}

/// Link a patient hands to a doctor to start an access request.
pub fn build_doctor_request_url(base_url: &str, code: &ShareCode) -> SharingResult<String> {
    build(base_url, "/doctor/request", "code", code.as_str())
}

/// Link a doctor opens to read the shared history.
pub fn build_shared_history_url(base_url: &str, token: &AccessToken) -> SharingResult<String> {
    build(base_url, "/shared/history", "token", token.as_str())
}
