use crate::error::{CloudApiError, Result};
use crate::retry::{run_with_retries, RetryPolicy};
use crate::token::TokenSource;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// HTTP client shared by every collector. Responses whose status is in the
/// policy's retry set are re-issued with backoff; the whole call, retries
/// included, is bounded by `timeout`.
#[derive(Clone)]
pub struct RetryingClient {
    client: Client,
    policy: Arc<RetryPolicy>,
    timeout: Duration,
    token: Arc<TokenSource>,
}

impl RetryingClient {
    pub fn new(policy: RetryPolicy, timeout: Duration, token: TokenSource) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(concat!("idleness-exporter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            policy: Arc::new(policy),
            timeout,
            token: Arc::new(token),
        })
    }

    /// GET `url` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let this = self;
        let call = run_with_retries(&self.policy, move |_attempt| this.get_once::<T>(url, query));

        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CloudApiError::Timeout(self.timeout)),
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let mut request = self.client.get(url).query(query);
        if let Some(token) = self.token.bearer(&self.client).await? {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(CloudApiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}
