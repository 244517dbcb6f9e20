use std::time::Duration;

/// Errors that can occur when talking to the cloud provider API.
///
/// # Examples
///
/// ```rust
/// use idleness_cloud::error::CloudApiError;
///
/// let err = CloudApiError::RetriesExhausted { attempts: 3, status: 503 };
/// assert!(err.to_string().contains("3 attempts"));
/// assert_eq!(err.status(), Some(503));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum CloudApiError {
    /// Non-2xx status code from the API.
    #[error("cloud API HTTP error: status={status}, body={body}")]
    Http { status: u16, body: String },

    /// Every attempt allowed by the retry policy answered with a retryable status.
    #[error("cloud API still failing after {attempts} attempts: last status={status}")]
    RetriesExhausted { attempts: u32, status: u16 },

    /// The overall call budget elapsed, retries included.
    #[error("cloud API call timed out after {0:?}")]
    Timeout(Duration),

    /// An underlying HTTP transport error from `reqwest`.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response payload could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No bearer token could be obtained for the request.
    #[error("access token error: {0}")]
    Token(String),

    /// A resource URL or endpoint could not be interpreted.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A listing handed back a page token it had already issued, or never ended.
    #[error("pagination error: {0}")]
    Pagination(String),
}

impl CloudApiError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            CloudApiError::Http { status, .. } | CloudApiError::RetriesExhausted { status, .. } => {
                Some(*status)
            }
            CloudApiError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, CloudApiError>;
