//! Remote sharing API boundary.
//!
//! Components take an implementation of these traits at construction.
//! [`http::HttpSharingClient`] talks to the deployed edge functions;
//! [`memory::InMemorySharingService`] is a complete in-process backend used
//! by tests and local runs.

use std::future::Future;

use crate::error::SharingResult;
use crate::models::{AccessOverview, AccessToken, ShareCode, SharedHistoryResponse};

pub mod http;
pub mod memory;
pub mod types;

pub use http::HttpSharingClient;
pub use memory::{FrequencyShape, HistoryShape, InMemorySharingService};
pub use types::{RequestAccessResponse, SharedHistoryQuery};

/// Access-request endpoints. All but `request_access` act as the signed-in patient.
pub trait AccessApi {
    /// `POST request-access`
    fn request_access(
        &self,
        share_code: &ShareCode,
        doctor_name: &str,
    ) -> impl Future<Output = SharingResult<RequestAccessResponse>> + Send;

    /// `POST grant-access`
    fn grant_access(
        &self,
        request_id: &str,
    ) -> impl Future<Output = SharingResult<AccessToken>> + Send;

    /// `POST revoke-access`
    fn revoke_access(&self, doctor_id: &str) -> impl Future<Output = SharingResult<()>> + Send;

    /// `GET access-requests`
    fn list_access(&self) -> impl Future<Output = SharingResult<AccessOverview>> + Send;
}

/// Token-scoped history endpoint; no patient session involved.
pub trait SharedHistoryApi {
    /// `GET shared-history`
    fn shared_history(
        &self,
        query: &SharedHistoryQuery,
    ) -> impl Future<Output = SharingResult<SharedHistoryResponse>> + Send;
}
