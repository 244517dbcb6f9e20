//! Project id discovery at startup.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

const METADATA_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    project_id: Option<String>,
}

/// Resolves the project to monitor: the configured id, then the credentials
/// file, then the metadata server. Fails when none of them yields one.
pub async fn resolve_project_id(
    configured: Option<&str>,
    credentials_path: Option<&Path>,
    metadata_endpoint: &str,
) -> Result<String> {
    if let Some(project) = configured.map(str::trim).filter(|p| !p.is_empty()) {
        return Ok(project.to_string());
    }

    if let Some(path) = credentials_path {
        match project_from_credentials(path) {
            Ok(Some(project)) => {
                tracing::info!(project = %project, path = %path.display(), "Project id taken from credentials file");
                return Ok(project);
            }
            Ok(None) => tracing::debug!(path = %path.display(), "Credentials file carries no project id"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to read credentials file"),
        }
    }

    let project = project_from_metadata(metadata_endpoint)
        .await
        .context("unable to determine the project id: set project_id or GCP_PROJECT_ID")?;
    tracing::info!(project = %project, "Project id taken from metadata server");
    Ok(project)
}

pub fn project_from_credentials(path: &Path) -> Result<Option<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read '{}'", path.display()))?;
    let credentials: CredentialsFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse '{}'", path.display()))?;
    Ok(credentials
        .project_id
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty()))
}

pub async fn project_from_metadata(endpoint: &str) -> Result<String> {
    let client = Client::builder()
        .use_rustls_tls()
        .timeout(METADATA_TIMEOUT)
        .build()?;
    let url = format!("{}/project/project-id", endpoint.trim_end_matches('/'));

    let response = client
        .get(&url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .with_context(|| format!("metadata server unreachable at {url}"))?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        bail!("metadata server answered {status}: {body}");
    }

    let project = body.trim().to_string();
    if project.is_empty() {
        bail!("metadata server returned an empty project id");
    }
    Ok(project)
}
