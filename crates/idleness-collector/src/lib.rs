//! Collector framework of the idleness exporter.
//!
//! Each [`Collector`] inspects one category of cloud resources and pushes
//! samples onto a shared [`MetricSink`]. The [`CollectorRegistry`] decides
//! which collectors run for a scrape and the [`AggregateCollector`] runs them
//! side by side.

pub mod aggregate;
pub mod compute;
pub mod dataproc;
pub mod registry;
pub mod sink;
pub mod snapshot;

use anyhow::Result;
use async_trait::async_trait;
use idleness_cloud::ComputeApi;
use std::sync::Arc;

pub use aggregate::{AggregateCollector, CollectSummary};
pub use registry::{CollectorRegistry, RegistryError};
pub use sink::{MetricDrain, MetricSink};

/// A check over one category of provider resources.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Metric names this collector may emit. Informational only.
    fn list_metrics(&self) -> Vec<&'static str>;

    /// Fetches the current state and emits samples onto `sink`.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing useful could be collected. Samples
    /// already emitted stay in the sink.
    async fn update(&self, sink: &MetricSink) -> Result<()>;
}

/// What every collector constructor receives.
#[derive(Clone)]
pub struct CollectorContext {
    pub project: String,
    pub monitored_regions: Vec<String>,
    pub api: Arc<dyn ComputeApi>,
}

/// Builds a collector for one scrape.
pub type CollectorFactory = fn(&CollectorContext) -> Result<Arc<dyn Collector>>;
