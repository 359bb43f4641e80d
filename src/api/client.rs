//! REST client for the advisory platform.
//!
//! Every request carries the session's bearer token. Responses are
//! normalized through [`crate::api::wire`] before they reach callers.

use crate::aggregation::ClientSource;
use crate::api::{ApiError, ApiResult};
use crate::api::wire::{
    filename_from_content_disposition, sanitize_filename, unwrap_list, unwrap_object,
};
use crate::models::{
    AdvisorClientLink, DashboardStats, Diagnostic, DiagnosticStatus, DiagnosticStatusReply,
    Engagement, User,
};
use crate::polling::DiagnosticSource;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_DISPOSITION};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Connection settings for the API client.
#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Authenticated client for the platform's REST endpoints.
pub struct ApiClient {
    config: ApiClientConfig,
    http_client: reqwest::Client,
}

impl ApiClient {
    /// Create a client that authenticates every request with `token`.
    pub fn new(config: ApiClientConfig, token: &str) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| ApiError::Transport("token contains invalid header characters".into()))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        debug!("API client ready for {}", config.base_url);

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn map_send_error(&self, err: reqwest::Error) -> ApiError {
        ApiError::from_reqwest(err, &self.config.base_url, self.config.timeout_seconds)
    }

    async fn check_status(response: reqwest::Response) -> ApiResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::from_status(status, body))
    }

    async fn get_json(&self, path: &str) -> ApiResult<Value> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// `GET /api/users/me`
    pub async fn current_user(&self) -> ApiResult<User> {
        unwrap_object(self.get_json("/api/users/me").await?, "user")
    }

    /// `GET /api/engagements`
    pub async fn engagements(&self) -> ApiResult<Vec<Engagement>> {
        let value = self.get_json("/api/engagements").await?;
        let engagements: Vec<Engagement> = unwrap_list(value, &["engagements"])?;
        Ok(engagements.into_iter().map(Engagement::normalized).collect())
    }

    /// `GET /api/dashboard/stats`
    pub async fn dashboard_stats(&self) -> ApiResult<DashboardStats> {
        unwrap_object(self.get_json("/api/dashboard/stats").await?, "stats")
    }

    /// `GET /api/diagnostics/engagement/{id}`
    pub async fn diagnostics_for(&self, engagement_id: &str) -> ApiResult<Vec<Diagnostic>> {
        let value = self
            .get_json(&format!("/api/diagnostics/engagement/{}", engagement_id))
            .await?;
        unwrap_list(value, &["diagnostics"])
    }

    /// Download a diagnostic file into `dir`, named after the server's
    /// `Content-Disposition` hint. Returns the written path.
    pub async fn download_file(
        &self,
        diagnostic_id: &str,
        file_id: &str,
        dir: &Path,
    ) -> ApiResult<PathBuf> {
        let url = self.url(&format!(
            "/api/diagnostics/{}/files/{}/download",
            diagnostic_id, file_id
        ));
        debug!("GET {}", url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = Self::check_status(response).await?;

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition)
            .or_else(|| sanitize_filename(file_id))
            .unwrap_or_else(|| "download.bin".to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let target = write_atomically(dir, &filename, &bytes)?;
        info!("Downloaded {} ({} bytes)", target.display(), bytes.len());
        Ok(target)
    }
}

/// Write through a temp file in the same directory so a failed download
/// never leaves a truncated file under the final name.
fn write_atomically(dir: &Path, filename: &str, bytes: &[u8]) -> ApiResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let target = dir.join(filename);

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.persist(&target).map_err(|e| ApiError::Io(e.error))?;

    Ok(target)
}

#[async_trait]
impl ClientSource for ApiClient {
    async fn admin_users(&self) -> ApiResult<Vec<User>> {
        let value = self.get_json("/api/users?role=client").await?;
        unwrap_list(value, &["users"])
    }

    async fn firm_clients(&self, firm_id: &str) -> ApiResult<Vec<User>> {
        let value = self
            .get_json(&format!("/api/users/firm/{}/clients", firm_id))
            .await?;
        unwrap_list(value, &["clients", "users"])
    }

    async fn advisor_clients(&self, advisor_id: &str) -> ApiResult<Vec<AdvisorClientLink>> {
        let value = self
            .get_json(&format!("/api/advisor-client/advisor/{}", advisor_id))
            .await?;
        unwrap_list(value, &["clients", "associations"])
    }

    async fn engagements(&self) -> ApiResult<Vec<Engagement>> {
        ApiClient::engagements(self).await
    }
}

#[async_trait]
impl DiagnosticSource for ApiClient {
    async fn list(&self, engagement_id: &str) -> ApiResult<Vec<Diagnostic>> {
        self.diagnostics_for(engagement_id).await
    }

    async fn status(&self, diagnostic_id: &str) -> ApiResult<DiagnosticStatus> {
        let value = self
            .get_json(&format!("/api/diagnostics/{}/status", diagnostic_id))
            .await?;
        let reply: DiagnosticStatusReply = unwrap_object(value, "diagnostic")?;
        Ok(reply.status)
    }

    async fn details(&self, diagnostic_id: &str) -> ApiResult<Diagnostic> {
        let value = self
            .get_json(&format!("/api/diagnostics/{}", diagnostic_id))
            .await?;
        unwrap_object(value, "diagnostic")
    }

    async fn submit(&self, diagnostic_id: &str) -> ApiResult<()> {
        let url = self.url(&format!("/api/diagnostics/{}/submit", diagnostic_id));
        debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Self::check_status(response).await?;
        Ok(())
    }
}
