//! HTTPS adapter for the hosted remote store.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ChangeBatch, OutboundRecord, RemoteStore, WriteResult};
use crate::error::{Error, Result};
use crate::model::TenantId;
use crate::tenant::{AuthSession, IdentityLookup};

/// Remote store reached over HTTPS with a bearer token.
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct WriteRequest<'a> {
    records: &'a [OutboundRecord],
}

#[derive(Debug, Deserialize)]
struct WriteResponse {
    results: Vec<WriteResult>,
}

#[derive(Debug, Deserialize)]
struct CompanyResponse {
    company_id: Option<String>,
}

impl HttpRemoteStore {
    /// Create a client for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the HTTP client cannot be built.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ledger-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                debug!(status = %status, error = %e, "Could not read error body");
                String::new()
            }
        };
        Err(classify_status(status, &body))
    }
}

/// Map a failed HTTP status to the sync error taxonomy.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> Error {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };

    match status.as_u16() {
        401 | 403 => Error::Unauthorized(detail),
        400 | 409 | 422 => Error::Validation(detail),
        408 | 429 | 500..=599 => Error::TransientNetwork(detail),
        _ => Error::Other(format!("unexpected response {detail}")),
    }
}

fn transport_error(e: &reqwest::Error) -> Error {
    if e.is_decode() {
        Error::Other(format!("malformed response: {e}"))
    } else {
        // connect, timeout, reset, TLS
        Error::TransientNetwork(e.to_string())
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn write(&self, tenant: &TenantId, records: &[OutboundRecord]) -> Result<Vec<WriteResult>> {
        let url = self.url(&format!("/tenants/{tenant}/records"));
        debug!(tenant = %tenant, count = records.len(), "POST records");

        let response = self
            .authorize(self.client.post(&url))
            .json(&WriteRequest { records })
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let body: WriteResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(&e))?;
        Ok(body.results)
    }

    async fn read_changes_since(
        &self,
        tenant: &TenantId,
        watermark: i64,
        limit: usize,
    ) -> Result<ChangeBatch> {
        let url = self.url(&format!("/tenants/{tenant}/changes"));
        debug!(tenant = %tenant, since = watermark, limit, "GET changes");

        let response = self
            .authorize(self.client.get(&url))
            .query(&[("since", watermark.to_string()), ("limit", limit.to_string())])
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(&e))
    }
}

#[async_trait]
impl IdentityLookup for HttpRemoteStore {
    async fn company_for_session(&self, session: &AuthSession) -> Result<Option<String>> {
        let response = self
            .client
            .get(self.url("/session/company"))
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: CompanyResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(&e))?;
        Ok(body.company_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, ""),
            Error::TransientNetwork(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            Error::TransientNetwork(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNPROCESSABLE_ENTITY, "bad amount"),
            Error::Validation(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::CONFLICT, ""),
            Error::Validation(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            Error::Unauthorized(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::IM_A_TEAPOT, ""),
            Error::Other(_)
        ));
    }

    #[test]
    fn test_missing_body_falls_back_to_status_line() {
        let Error::Validation(detail) = classify_status(StatusCode::UNPROCESSABLE_ENTITY, "") else {
            panic!("expected validation error");
        };
        assert_eq!(detail, StatusCode::UNPROCESSABLE_ENTITY.to_string());

        let Error::Validation(detail) = classify_status(StatusCode::UNPROCESSABLE_ENTITY, "bad amount") else {
            panic!("expected validation error");
        };
        assert!(detail.ends_with(": bad amount"));
    }

    #[test]
    fn test_base_url_normalized() {
        let store =
            HttpRemoteStore::new("https://ledger.example.com/api/", None, Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            store.url("/session/company"),
            "https://ledger.example.com/api/session/company"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        // Nothing listens on port 9 of the loopback interface
        let store =
            HttpRemoteStore::new("http://127.0.0.1:9", None, Duration::from_millis(500)).unwrap();
        let tenant = TenantId::parse("7d444840-9dc0-11d1-b245-5ffdce74fad2").unwrap();
        let err = store.read_changes_since(&tenant, 0, 10).await.unwrap_err();
        assert!(err.is_transient());
    }
}
