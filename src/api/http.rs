use reqwest::{RequestBuilder, Response};

use super::types::{
    error_message, GrantAccessBody, GrantAccessResponse, RequestAccessBody, RevokeAccessBody,
};
use super::{AccessApi, RequestAccessResponse, SharedHistoryApi, SharedHistoryQuery};
use crate::config::SharingConfig;
use crate::error::{classify_history_status, classify_status, SharingError, SharingResult};
use crate::models::{AccessOverview, AccessToken, ShareCode, SharedHistoryResponse};

/// Maps a rejected status and its message to an error kind.
type StatusClassifier = fn(u16, &str) -> SharingError;

/// HTTP client for the sharing edge functions.
#[derive(Debug, Clone)]
pub struct HttpSharingClient {
    config: SharingConfig,
    client: reqwest::Client,
}

impl HttpSharingClient {
    pub fn new(config: SharingConfig) -> SharingResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("symtrack/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SharingError::Transient(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &SharingConfig {
        &self.config
    }

    pub fn endpoint(&self, name: &str) -> String {
        format!("{}/functions/v1/{name}", self.config.base_url)
    }

    fn with_api_key(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => builder.header("apikey", key),
            None => builder,
        }
    }

    /// Patient endpoints need the session; without one the call cannot be authorized.
    fn as_patient(&self, builder: RequestBuilder) -> SharingResult<RequestBuilder> {
        let session = self
            .config
            .session_token
            .as_deref()
            .ok_or(SharingError::Auth { status: 401 })?;
        Ok(self.with_api_key(builder).bearer_auth(session))
    }

    async fn send(
        &self,
        endpoint: &'static str,
        builder: RequestBuilder,
        classify: StatusClassifier,
    ) -> SharingResult<Response> {
        let response = builder.send().await.map_err(|e| {
            tracing::warn!(endpoint = endpoint, error = %e, "Sharing request failed");
            SharingError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message(status.as_u16(), &body);
        tracing::debug!(
            endpoint = endpoint,
            status = status.as_u16(),
            message = %message,
            "Sharing request rejected"
        );
        Err(classify(status.as_u16(), &message))
    }
}

impl AccessApi for HttpSharingClient {
    async fn request_access(
        &self,
        share_code: &ShareCode,
        doctor_name: &str,
    ) -> SharingResult<RequestAccessResponse> {
        let body = RequestAccessBody {
            share_code: share_code.as_str(),
            doctor_name,
        };
        let builder = self
            .with_api_key(self.client.post(self.endpoint("request-access")))
            .json(&body);
        let response = self.send("request-access", builder, classify_status).await?;
        Ok(response.json().await?)
    }

    async fn grant_access(&self, request_id: &str) -> SharingResult<AccessToken> {
        let builder = self
            .as_patient(self.client.post(self.endpoint("grant-access")))?
            .json(&GrantAccessBody { request_id });
        let response = self.send("grant-access", builder, classify_status).await?;
        let parsed: GrantAccessResponse = response.json().await?;
        parsed
            .access_token
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
            .ok_or_else(|| {
                SharingError::MalformedResponse("grant-access returned no access_token".into())
            })
    }

    async fn revoke_access(&self, doctor_id: &str) -> SharingResult<()> {
        let builder = self
            .as_patient(self.client.post(self.endpoint("revoke-access")))?
            .json(&RevokeAccessBody { doctor_id });
        self.send("revoke-access", builder, classify_status).await?;
        Ok(())
    }

    async fn list_access(&self) -> SharingResult<AccessOverview> {
        let builder = self.as_patient(self.client.get(self.endpoint("access-requests")))?;
        let response = self.send("access-requests", builder, classify_status).await?;
        Ok(response.json().await?)
    }
}

impl SharedHistoryApi for HttpSharingClient {
    async fn shared_history(
        &self,
        query: &SharedHistoryQuery,
    ) -> SharingResult<SharedHistoryResponse> {
        let builder = self
            .with_api_key(self.client.get(self.endpoint("shared-history")))
            .query(&query.query_pairs());
        let response = self.send("shared-history", builder, classify_history_status).await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn client(config: SharingConfig) -> HttpSharingClient {
        HttpSharingClient::new(config).unwrap()
    }

    #[test]
    fn endpoints_live_under_functions_v1() {
        let c = client(SharingConfig::new("https://abc.example.co/"));
        assert_eq!(c.endpoint("grant-access"), "https://abc.example.co/functions/v1/grant-access");
        assert_eq!(
            c.endpoint("shared-history"),
            "https://abc.example.co/functions/v1/shared-history"
        );
    }

    #[test]
    fn client_keeps_config() {
        let c = client(SharingConfig::new("http://localhost:54321").with_timeout_secs(5));
        assert_eq!(c.config().timeout_secs, 5);
    }

    #[tokio::test]
    async fn patient_calls_without_session_are_unauthorized() {
        let c = client(SharingConfig::new("http://127.0.0.1:9"));
        assert_eq!(c.grant_access("req_1").await.unwrap_err(), SharingError::Auth { status: 401 });
        assert_eq!(c.revoke_access("doc_1").await.unwrap_err(), SharingError::Auth { status: 401 });
        assert_eq!(c.list_access().await.unwrap_err(), SharingError::Auth { status: 401 });
    }

    #[tokio::test]
    async fn unreachable_server_is_transient() {
        let c = client(SharingConfig::new("http://127.0.0.1:9").with_timeout_secs(2));
        let code = ShareCode::parse("AB12CD34").unwrap();
        let err = c.request_access(&code, "Dr. Pérez").await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {err:?}");
    }

    /// Serves one canned response on a loopback port and returns its base URL.
    async fn serve_once(status_line: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let body = r#"{"error":"not found"}"#;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn not_found_is_classified_per_endpoint() {
        let c = client(SharingConfig::new(&serve_once("404 Not Found").await));
        let code = ShareCode::parse("AB12CD34").unwrap();
        let err = c.request_access(&code, "Dr. Pérez").await.unwrap_err();
        assert_eq!(err, SharingError::NotFound("not found".into()));

        let c = client(SharingConfig::new(&serve_once("404 Not Found").await));
        let query = SharedHistoryQuery::for_window(
            AccessToken::new("tok"),
            7,
            chrono::Utc::now().date_naive(),
            10,
        );
        let err = c.shared_history(&query).await.unwrap_err();
        assert!(matches!(err, SharingError::Transient(_)), "unexpected error: {err:?}");
    }

    #[tokio::test]
    async fn forbidden_history_is_access_expired() {
        let c = client(SharingConfig::new(&serve_once("403 Forbidden").await));
        let query = SharedHistoryQuery::for_window(
            AccessToken::new("tok"),
            7,
            chrono::Utc::now().date_naive(),
            10,
        );
        let err = c.shared_history(&query).await.unwrap_err();
        assert_eq!(err, SharingError::Auth { status: 403 });
    }
}
