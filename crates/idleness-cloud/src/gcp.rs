use crate::api::ComputeApi;
use crate::error::{CloudApiError, Result};
use crate::models::{Cluster, Disk, Instance, ListPage, Region, Snapshot};
use crate::transport::RetryingClient;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use url::Url;

const PAGE_TOKEN: &str = "pageToken";
const MAX_PAGES: usize = 10_000;

/// `ComputeApi` backed by the Compute Engine and Dataproc REST endpoints.
pub struct GcpClient {
    http: RetryingClient,
    compute_endpoint: String,
    dataproc_endpoint: String,
}

impl GcpClient {
    pub fn new(
        http: RetryingClient,
        compute_endpoint: &str,
        dataproc_endpoint: &str,
    ) -> Result<Self> {
        for endpoint in [compute_endpoint, dataproc_endpoint] {
            Url::parse(endpoint)
                .map_err(|e| CloudApiError::InvalidUrl(format!("{endpoint}: {e}")))?;
        }

        Ok(Self {
            http,
            compute_endpoint: compute_endpoint.trim_end_matches('/').to_string(),
            dataproc_endpoint: dataproc_endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Follows `nextPageToken` until the provider stops returning one.
    ///
    /// A token seen twice, or more than `MAX_PAGES` pages, fails the listing.
    async fn list_all<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        let mut pages = 0usize;

        loop {
            let page: ListPage<T> = match page_token.as_deref() {
                Some(token) => self.http.get_json(url, &[(PAGE_TOKEN, token)]).await?,
                None => self.http.get_json(url, &[]).await?,
            };
            pages += 1;
            items.extend(page.items);

            let token = match page.next_page_token {
                Some(token) if !token.is_empty() => token,
                _ => break,
            };
            if !seen_tokens.insert(token.clone()) {
                tracing::warn!(url, pages, token = %token, "Page token repeated");
                return Err(CloudApiError::Pagination(format!(
                    "{url}: page token {token} repeated after {pages} pages"
                )));
            }
            if pages >= MAX_PAGES {
                tracing::warn!(url, pages, "Page limit reached");
                return Err(CloudApiError::Pagination(format!(
                    "{url}: more than {MAX_PAGES} pages"
                )));
            }
            page_token = Some(token);
        }

        tracing::debug!(url, pages, count = items.len(), "Listed resources");
        Ok(items)
    }
}

#[async_trait]
impl ComputeApi for GcpClient {
    async fn list_regions(&self, project: &str) -> Result<Vec<Region>> {
        let url = format!("{}/projects/{project}/regions", self.compute_endpoint);
        self.list_all(&url).await
    }

    async fn list_instances(&self, project: &str, zone: &str) -> Result<Vec<Instance>> {
        let url = format!("{}/projects/{project}/zones/{zone}/instances", self.compute_endpoint);
        self.list_all(&url).await
    }

    async fn list_disks(&self, project: &str, zone: &str) -> Result<Vec<Disk>> {
        let url = format!("{}/projects/{project}/zones/{zone}/disks", self.compute_endpoint);
        self.list_all(&url).await
    }

    async fn list_snapshots(&self, project: &str) -> Result<Vec<Snapshot>> {
        let url = format!("{}/projects/{project}/global/snapshots", self.compute_endpoint);
        self.list_all(&url).await
    }

    async fn list_clusters(&self, project: &str, region: &str) -> Result<Vec<Cluster>> {
        let url = format!(
            "{}/projects/{project}/regions/{region}/clusters",
            self.dataproc_endpoint
        );
        self.list_all(&url).await
    }
}
