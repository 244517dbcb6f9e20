use crate::logging::TraceId;
use crate::render;
use crate::state::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use idleness_collector::sink::channel;
use serde::Serialize;

const LANDING_PAGE: &str = r#"<html>
<head><title>GCP Idleness Exporter</title></head>
<body>
<h1>GCP Idleness Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
</body>
</html>
"#;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: i64,
    project: String,
    collectors: Vec<&'static str>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

async fn index() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (Utc::now() - state.start_time).num_seconds(),
        project: state.context.project.clone(),
        collectors: state.registry.enabled_names(),
    })
}

/// Runs every enabled collector and renders whatever they produced. Failed
/// collectors show up through the scrape success gauge only.
async fn metrics(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> Response {
    let aggregate = state.registry.instantiate_enabled(&state.context);
    aggregate.describe();

    let (sink, mut drain) = channel();
    let summary = aggregate.collect(&sink).await;
    drop(sink);
    let samples = drain.drain();

    tracing::info!(
        trace_id = %trace_id.0,
        project = %state.context.project,
        samples = samples.len(),
        succeeded = summary.succeeded.len(),
        failed = ?summary.failed,
        "Scrape finished"
    );

    match render::render(samples) {
        Ok(body) => ([(header::CONTENT_TYPE, render::CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            tracing::error!(trace_id = %trace_id.0, error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("failed to encode metrics: {e}")).into_response()
        }
    }
}
