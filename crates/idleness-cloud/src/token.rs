use crate::error::{CloudApiError, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Tokens are refreshed this long before the metadata server says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Where the bearer token attached to provider calls comes from.
pub enum TokenSource {
    /// Unauthenticated calls (local emulators, tests).
    None,
    Static(String),
    /// Default service account of the GCE metadata server.
    Metadata {
        endpoint: String,
        cache: Mutex<Option<CachedToken>>,
    },
}

pub struct CachedToken {
    value: String,
    refresh_at: Instant,
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

impl TokenSource {
    pub fn metadata(endpoint: impl Into<String>) -> Self {
        TokenSource::Metadata {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            cache: Mutex::new(None),
        }
    }

    pub async fn bearer(&self, client: &Client) -> Result<Option<String>> {
        match self {
            TokenSource::None => Ok(None),
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::Metadata { endpoint, cache } => {
                let mut cached = cache.lock().await;
                if let Some(token) = cached.as_ref() {
                    if Instant::now() < token.refresh_at {
                        return Ok(Some(token.value.clone()));
                    }
                }

                let fresh = fetch_metadata_token(client, endpoint).await?;
                let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_MARGIN);
                *cached = Some(CachedToken {
                    value: fresh.access_token.clone(),
                    refresh_at: Instant::now() + lifetime,
                });
                Ok(Some(fresh.access_token))
            }
        }
    }
}

async fn fetch_metadata_token(client: &Client, endpoint: &str) -> Result<MetadataToken> {
    let url = format!("{endpoint}/instance/service-accounts/default/token");
    let response = client
        .get(&url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| CloudApiError::Token(format!("metadata server unreachable: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CloudApiError::Token(format!(
            "metadata server answered {status}"
        )));
    }

    response
        .json::<MetadataToken>()
        .await
        .map_err(|e| CloudApiError::Token(format!("malformed metadata token: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn static_and_none_sources() {
        let client = Client::new();
        assert_eq!(TokenSource::None.bearer(&client).await.unwrap(), None);
        assert_eq!(
            TokenSource::Static("abc".into()).bearer(&client).await.unwrap(),
            Some("abc".to_string())
        );
    }

    #[tokio::test]
    async fn metadata_token_is_cached_until_expiry() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/computeMetadata/v1/instance/service-accounts/default/token",
            get(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::json!({
                        "access_token": "ya29.token",
                        "expires_in": 3599,
                        "token_type": "Bearer"
                    }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        let source = TokenSource::metadata(format!("http://{addr}/computeMetadata/v1/"));
        let client = Client::new();
        for _ in 0..3 {
            assert_eq!(
                source.bearer(&client).await.unwrap().as_deref(),
                Some("ya29.token")
            );
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreachable_metadata_server_is_a_token_error() {
        let source = TokenSource::metadata("http://127.0.0.1:1/computeMetadata/v1");
        let err = source.bearer(&Client::new()).await.unwrap_err();
        assert!(matches!(err, CloudApiError::Token(_)));
    }
}
