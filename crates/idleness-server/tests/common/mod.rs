#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use idleness_cloud::fake::FakeComputeApi;
use idleness_cloud::models::Snapshot;
use idleness_collector::{CollectorContext, CollectorRegistry};
use idleness_server::app;
use idleness_server::state::AppState;
use std::sync::Arc;
use tower::util::ServiceExt;

pub struct TestContext {
    pub state: AppState,
    pub app: axum::Router,
    pub api: Arc<FakeComputeApi>,
}

const DISK_URL: &str = "https://www.googleapis.com/compute/v1/projects/demo/zones/us-east1-b/disks";

pub fn snapshot(name: &str, disk: &str, days_ago: i64) -> Snapshot {
    Snapshot {
        id: format!("id-{name}"),
        name: name.to_string(),
        source_disk: format!("{DISK_URL}/{disk}"),
        source_disk_id: format!("disk-{disk}"),
        creation_timestamp: (Utc::now() - Duration::days(days_ago)).to_rfc3339(),
    }
}

/// Two monitored zones in us-east1 plus one unmonitored region.
pub fn fixture() -> FakeComputeApi {
    FakeComputeApi::new()
        .with_region("us-east1", &["us-east1-b", "us-east1-c"])
        .with_region("europe-west1", &["europe-west1-b"])
        .with_instance("us-east1-b", "web", "RUNNING")
        .with_instance("us-east1-c", "batch", "TERMINATED")
        .with_instance("europe-west1-b", "eu", "RUNNING")
        .with_disk("us-east1-b", "web-boot", 1)
        .with_disk("us-east1-c", "scratch", 0)
        .with_snapshot_page(vec![snapshot("data-old", "data", 10), snapshot("data-new", "data", 2)])
        .with_snapshot_page(vec![snapshot("data-old", "data", 10)])
        .with_cluster("us-east1", "etl", Some("us-east1-b"), "RUNNING")
}

pub fn build_test_context(api: FakeComputeApi, registry: CollectorRegistry) -> TestContext {
    let api = Arc::new(api);
    let context = CollectorContext {
        project: "demo".to_string(),
        monitored_regions: vec!["us-east1".to_string()],
        api: api.clone(),
    };
    let state = AppState::new(registry, context);
    let app = app::build_http_app(state.clone());
    TestContext { state, app, api }
}

pub fn default_context(api: FakeComputeApi) -> TestContext {
    build_test_context(api, CollectorRegistry::with_builtin().unwrap())
}

pub async fn get(app: &axum::Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(body.to_vec()).unwrap())
}

/// Sample lines of an exposition, without comments.
pub fn series(body: &str) -> Vec<&str> {
    body.lines()
        .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
        .collect()
}
