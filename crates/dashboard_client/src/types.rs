use dashboard_core::Failure;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    /// Non-success status on a status endpoint: the job is gone.
    #[error("job not found or terminated")]
    NotFound,
    #[error("http status {status}")]
    Status { status: u16, message: Option<String> },
    /// Success status whose payload carried an `error` field.
    #[error("{0}")]
    Rejected(String),
    #[error("response carried no job id")]
    MissingJobId,
    #[error("invalid response body: {0}")]
    Decode(String),
    #[error("could not encode request body: {0}")]
    Encode(String),
}

impl From<ApiError> for Failure {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound => Failure::NotFound,
            ApiError::Status { message, .. } => Failure::BackendRejected { message },
            ApiError::Rejected(message) => Failure::BackendRejected {
                message: Some(message),
            },
            ApiError::MissingJobId => Failure::BackendRejected { message: None },
            other => Failure::Network(other.to_string()),
        }
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::Timeout(err.to_string());
    }
    if err.is_builder() {
        return ApiError::InvalidUrl(err.to_string());
    }
    ApiError::Network(err.to_string())
}
