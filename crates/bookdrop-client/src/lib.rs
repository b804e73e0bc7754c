//! HTTP adapter for the remote library-import service.
//!
//! Implements [`RemoteLibrary`] over the service's REST surface. All calls
//! carry a bearer token and are bounded by a 30 second request timeout; an
//! unconfigured client fails fast without touching the network.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use bookdrop_core::{
    config::Config,
    domain::{
        ImportOutcome, ImportTarget, Library, NotificationSummary, Page, StagedFile, StagedStatus,
    },
    ports::RemoteLibrary,
    ApiError, ApiResult,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Structured error body the service sends for failed requests.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    path: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FinalizeRequest<'a> {
    file_ids: &'a [i64],
}

/// REST client for the remote library service.
pub struct LibraryClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl LibraryClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client build");
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            http,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.library_api_url, &cfg.library_api_token)
    }

    fn ensure_configured(&self) -> ApiResult<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(ApiError::Unconfigured)
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends the request and maps failures: transport errors become
    /// [`ApiError::Network`], non-2xx responses are classified from the
    /// status and error body.
    async fn execute(&self, req: reqwest::RequestBuilder) -> ApiResult<reqwest::Response> {
        let resp = req
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let err = classify_error(status.as_u16(), &body);
        error!(status = status.as_u16(), error = %err, "library API request failed");
        Err(err)
    }

    async fn decode<T: DeserializeOwned>(&self, resp: reqwest::Response) -> ApiResult<T> {
        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| {
            warn!(status, error = %e, "failed to decode library API response");
            ApiError::BadRequest {
                message: format!("failed to decode response: {e}"),
                status,
            }
        })
    }
}

#[async_trait]
impl RemoteLibrary for LibraryClient {
    fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.token.is_empty()
    }

    async fn rescan(&self) -> ApiResult<()> {
        self.ensure_configured()?;
        debug!("triggering bookdrop rescan");
        self.execute(self.http.post(self.url("/api/v1/bookdrop/rescan")))
            .await?;
        Ok(())
    }

    async fn staged_files(
        &self,
        status: Option<StagedStatus>,
        page: u32,
        size: u32,
    ) -> ApiResult<Page<StagedFile>> {
        self.ensure_configured()?;

        let mut req = self
            .http
            .get(self.url("/api/v1/bookdrop/files"))
            .query(&[("page", page), ("size", size)]);
        if let Some(status) = status {
            req = req.query(&[("status", status.as_str())]);
        }

        let resp = self.execute(req).await?;
        self.decode(resp).await
    }

    async fn finalize(&self, file_ids: &[i64], target: ImportTarget) -> ApiResult<ImportOutcome> {
        self.ensure_configured()?;

        let mut req = self
            .http
            .post(self.url("/api/v1/bookdrop/imports/finalize"))
            .json(&FinalizeRequest { file_ids });
        if let Some(library_id) = target.library_id {
            req = req.query(&[("defaultLibraryId", library_id)]);
        }
        if let Some(path_id) = target.path_id {
            req = req.query(&[("defaultPathId", path_id)]);
        }

        info!(
            file_count = file_ids.len(),
            library_id = ?target.library_id,
            path_id = ?target.path_id,
            "finalizing staged files"
        );

        let resp = self.execute(req).await?;
        let outcome: ImportOutcome = self.decode(resp).await?;
        info!(
            imported = outcome.imported_count,
            failed = outcome.failed_count,
            "finalize completed"
        );
        Ok(outcome)
    }

    async fn notification_summary(&self) -> ApiResult<NotificationSummary> {
        self.ensure_configured()?;
        let resp = self
            .execute(self.http.get(self.url("/api/v1/bookdrop/notification")))
            .await?;
        self.decode(resp).await
    }

    async fn libraries(&self) -> ApiResult<Vec<Library>> {
        self.ensure_configured()?;
        let resp = self
            .execute(self.http.get(self.url("/api/v1/libraries")))
            .await?;
        self.decode(resp).await
    }
}

/// Maps an HTTP failure status plus its body into an [`ApiError`].
///
/// Uses the structured `message` field when the body parses; otherwise falls
/// back to quoting the raw body.
fn classify_error(status: u16, body: &str) -> ApiError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = if parsed.message.is_empty() {
        format!("API request failed with status {status}: {body}")
    } else {
        parsed.message
    };

    match status {
        401 => ApiError::InvalidCredential,
        403 => ApiError::Forbidden { message },
        404 => ApiError::NotFound { message },
        400 => ApiError::BadRequest {
            message,
            status: 400,
        },
        500 => ApiError::Internal { message },
        503 => ApiError::ServiceUnavailable { message },
        _ => ApiError::BadRequest { message, status },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRUCTURED: &str = r#"{
        "message": "Bookdrop file not found",
        "status": 404,
        "path": "/api/v1/bookdrop/imports/finalize",
        "timestamp": "2024-01-01T00:00:00Z",
        "error": "Not Found"
    }"#;

    #[test]
    fn structured_body_message_wins() {
        let err = classify_error(404, STRUCTURED);
        assert_eq!(
            err,
            ApiError::NotFound {
                message: "Bookdrop file not found".to_string()
            }
        );
    }

    #[test]
    fn unauthorized_maps_to_invalid_credential_regardless_of_body() {
        let err = classify_error(401, "whatever");
        assert_eq!(err, ApiError::InvalidCredential);
    }

    #[test]
    fn unstructured_body_falls_back_to_quoting_it() {
        let err = classify_error(400, "<html>bad gateway-ish</html>");
        match err {
            ApiError::BadRequest { message, status } => {
                assert_eq!(status, 400);
                assert!(message.contains("status 400"));
                assert!(message.contains("<html>"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn five_hundreds_map_to_server_side_variants() {
        assert!(matches!(
            classify_error(500, r#"{"message":"boom"}"#),
            ApiError::Internal { ref message } if message == "boom"
        ));
        assert!(matches!(
            classify_error(503, "{}"),
            ApiError::ServiceUnavailable { .. }
        ));
    }

    #[test]
    fn unexpected_status_carries_the_status_through() {
        let err = classify_error(418, r#"{"message":"teapot"}"#);
        assert_eq!(
            err,
            ApiError::BadRequest {
                message: "teapot".to_string(),
                status: 418
            }
        );
    }

    #[test]
    fn finalize_request_uses_camel_case_field() {
        let body = serde_json::to_string(&FinalizeRequest {
            file_ids: &[1, 2, 3],
        })
        .unwrap();
        assert_eq!(body, r#"{"fileIds":[1,2,3]}"#);
    }

    #[test]
    fn error_body_tolerates_partial_documents() {
        let parsed: ErrorBody = serde_json::from_str(r#"{"message":"m"}"#).unwrap();
        assert_eq!(parsed.message, "m");
        assert_eq!(parsed.status, 0);
        assert!(parsed.path.is_empty());
        assert!(parsed.timestamp.is_empty());
        assert!(parsed.error.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_client_fails_fast_without_network() {
        let client = LibraryClient::new("", "");
        assert!(!client.is_configured());

        assert_eq!(client.rescan().await.unwrap_err(), ApiError::Unconfigured);
        assert_eq!(
            client.staged_files(None, 0, 50).await.unwrap_err(),
            ApiError::Unconfigured
        );
        assert_eq!(
            client
                .finalize(&[1], ImportTarget::default())
                .await
                .unwrap_err(),
            ApiError::Unconfigured
        );
        assert_eq!(
            client.notification_summary().await.unwrap_err(),
            ApiError::Unconfigured
        );
        assert_eq!(client.libraries().await.unwrap_err(), ApiError::Unconfigured);
    }

    #[test]
    fn trailing_slash_is_trimmed_from_base_url() {
        let client = LibraryClient::new("http://lib.example/", "t");
        assert_eq!(
            client.url("/api/v1/bookdrop/rescan"),
            "http://lib.example/api/v1/bookdrop/rescan"
        );
    }
}
