use std::time::Duration;

use dashboard_core::{
    DocumentJobSnapshot, DocumentPage, DocumentPhaseKey, DocumentQuery, DocumentSummary,
    HarvestJobSnapshot, HarvestRequest, JobAction, JobId, SiteId, SiteSummary,
};
use dashboard_logging::{dashboard_debug, dashboard_trace};
use reqwest::header::CONTENT_TYPE;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::types::map_reqwest_error;
use crate::ApiError;

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// The harvesting backend as seen by the dashboard.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn start_document_phase(&self, key: DocumentPhaseKey) -> Result<JobId, ApiError>;

    /// Status of a document phase job. Any non-success status means the job
    /// is gone and maps to [`ApiError::NotFound`].
    async fn document_job_status(&self, job_id: &JobId) -> Result<DocumentJobSnapshot, ApiError>;

    /// Returns the new tracking id a resume may hand out.
    async fn document_job_action(
        &self,
        job_id: &JobId,
        action: JobAction,
    ) -> Result<Option<JobId>, ApiError>;

    async fn start_harvest(&self, request: &HarvestRequest) -> Result<JobId, ApiError>;

    async fn harvest_status(&self, job_id: &JobId) -> Result<HarvestJobSnapshot, ApiError>;

    async fn stop_harvest(&self, job_id: &JobId) -> Result<(), ApiError>;

    async fn export_harvest(&self, job_id: &JobId) -> Result<Value, ApiError>;

    async fn list_sites(&self) -> Result<Vec<SiteSummary>, ApiError>;

    async fn list_documents(
        &self,
        site_id: SiteId,
        query: &DocumentQuery,
    ) -> Result<DocumentPage, ApiError>;
}

#[derive(Debug, Deserialize)]
struct JobAccepted {
    #[serde(default)]
    job_id: Option<JobId>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SitesBody {
    #[serde(default)]
    sites: Vec<SiteSummary>,
}

#[derive(Debug, Deserialize)]
struct DocumentsBody {
    #[serde(default)]
    items: Vec<DocumentSummary>,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    collections: Vec<String>,
}

/// [`Backend`] over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(settings: &ClientSettings) -> Result<Self, ApiError> {
        let base_url = Url::parse(settings.base_url.trim())
            .map_err(|err| ApiError::InvalidUrl(format!("{}: {err}", settings.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(settings.base_url.clone()));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(map_reqwest_error)?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Response, ApiError> {
        dashboard_trace!("GET {url}");
        self.client.get(url).send().await.map_err(map_reqwest_error)
    }

    async fn post(&self, url: Url, body: Option<Vec<u8>>) -> Result<Response, ApiError> {
        dashboard_trace!("POST {url}");
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }
        request.send().await.map_err(map_reqwest_error)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
}

/// Builds the error for a non-success response, keeping the body's `error`
/// message when there is one.
async fn rejection(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let message = match response.bytes().await {
        Ok(bytes) => serde_json::from_slice::<ErrorBody>(&bytes)
            .ok()
            .and_then(|body| body.error),
        Err(_) => None,
    };
    ApiError::Status { status, message }
}

/// Reads a `{job_id}` / `{error}` acknowledgement. An empty body is a plain
/// acceptance.
async fn acknowledgement(response: Response) -> Result<Option<JobId>, ApiError> {
    if !response.status().is_success() {
        return Err(rejection(response).await);
    }
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let body: JobAccepted =
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))?;
    match body.error {
        Some(message) => Err(ApiError::Rejected(message)),
        None => Ok(body.job_id),
    }
}

#[async_trait::async_trait]
impl Backend for HttpBackend {
    async fn start_document_phase(&self, key: DocumentPhaseKey) -> Result<JobId, ApiError> {
        let document_id = key.document_id.to_string();
        let url = self.endpoint(&[
            "documents",
            &document_id,
            "phase",
            key.phase.as_str(),
            "start",
        ])?;
        let response = self.post(url, None).await?;
        acknowledgement(response).await?.ok_or(ApiError::MissingJobId)
    }

    async fn document_job_status(&self, job_id: &JobId) -> Result<DocumentJobSnapshot, ApiError> {
        let url = self.endpoint(&["documents", "jobs", job_id.as_str()])?;
        let response = self.get(url).await?;
        if !response.status().is_success() {
            dashboard_debug!("document job {job_id} answered {}", response.status());
            return Err(ApiError::NotFound);
        }
        read_json(response).await
    }

    async fn document_job_action(
        &self,
        job_id: &JobId,
        action: JobAction,
    ) -> Result<Option<JobId>, ApiError> {
        let url = self.endpoint(&["documents", "jobs", job_id.as_str(), action.as_str()])?;
        let response = self.post(url, None).await?;
        let new_job_id = acknowledgement(response).await?;
        Ok(new_job_id.filter(|_| action == JobAction::Resume))
    }

    async fn start_harvest(&self, request: &HarvestRequest) -> Result<JobId, ApiError> {
        let url = self.endpoint(&["harvest"])?;
        let body = serde_json::to_vec(request).map_err(|err| ApiError::Encode(err.to_string()))?;
        let response = self.post(url, Some(body)).await?;
        acknowledgement(response).await?.ok_or(ApiError::MissingJobId)
    }

    async fn harvest_status(&self, job_id: &JobId) -> Result<HarvestJobSnapshot, ApiError> {
        let url = self.endpoint(&["harvest", job_id.as_str()])?;
        let response = self.get(url).await?;
        if !response.status().is_success() {
            dashboard_debug!("harvest job {job_id} answered {}", response.status());
            return Err(ApiError::NotFound);
        }
        read_json(response).await
    }

    async fn stop_harvest(&self, job_id: &JobId) -> Result<(), ApiError> {
        let url = self.endpoint(&["harvest", job_id.as_str(), "stop"])?;
        let response = self.post(url, None).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(rejection(response).await)
        }
    }

    async fn export_harvest(&self, job_id: &JobId) -> Result<Value, ApiError> {
        let url = self.endpoint(&["harvest", job_id.as_str(), "export"])?;
        let response = self.get(url).await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        let payload: Value = read_json(response).await?;
        match payload.get("error").and_then(Value::as_str) {
            Some(message) => Err(ApiError::Rejected(message.to_string())),
            None => Ok(payload),
        }
    }

    async fn list_sites(&self) -> Result<Vec<SiteSummary>, ApiError> {
        let url = self.endpoint(&["sites"])?;
        let response = self.get(url).await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        let body: SitesBody = read_json(response).await?;
        Ok(body.sites)
    }

    async fn list_documents(
        &self,
        site_id: SiteId,
        query: &DocumentQuery,
    ) -> Result<DocumentPage, ApiError> {
        let site = site_id.to_string();
        let mut url = self.endpoint(&["sites", &site, "documents"])?;
        url.query_pairs_mut()
            .extend_pairs(query.to_pairs().iter().map(|(name, value)| (*name, value.as_str())));
        let response = self.get(url).await?;
        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        let body: DocumentsBody = read_json(response).await?;
        Ok(DocumentPage {
            items: body.items,
            total: body.total,
            page: query.page.max(1),
            page_size: query.page_size.max(1),
            collections: body.collections,
        })
    }
}
