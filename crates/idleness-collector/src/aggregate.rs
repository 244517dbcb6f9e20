use crate::sink::MetricSink;
use crate::Collector;
use idleness_common::MetricDesc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

pub const SCRAPE_SUCCESS: MetricDesc = MetricDesc::new(
    "idleness_scrape_collector_success",
    "whether the collector succeeded during the last scrape",
    &["collector"],
);

pub const SCRAPE_DURATION: MetricDesc = MetricDesc::new(
    "idleness_scrape_collector_duration_seconds",
    "how long the collector took during the last scrape",
    &["collector"],
);

pub const BUILD_INFO: MetricDesc = MetricDesc::new(
    "idleness_exporter_build_info",
    "build information of the running exporter",
    &["version"],
);

pub(crate) struct Instantiated {
    pub(crate) name: &'static str,
    pub(crate) collector: Arc<dyn Collector>,
    pub(crate) gate: Arc<Mutex<()>>,
}

/// Outcome of one [`AggregateCollector::collect`] run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollectSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

/// The collectors instantiated for one scrape.
pub struct AggregateCollector {
    collectors: Vec<Instantiated>,
}

impl AggregateCollector {
    pub(crate) fn new(collectors: Vec<Instantiated>) -> Self {
        Self { collectors }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name).collect()
    }

    /// Logs each collector with the metrics it may emit.
    pub fn describe(&self) {
        for entry in &self.collectors {
            tracing::info!(
                collector = entry.name,
                metrics = ?entry.collector.list_metrics(),
                "Collector enabled"
            );
        }
    }

    /// Runs every collector concurrently and waits for all of them. A failing
    /// collector only loses its own samples.
    pub async fn collect(&self, sink: &MetricSink) -> CollectSummary {
        let mut tasks = JoinSet::new();
        for entry in &self.collectors {
            let name = entry.name;
            let collector = entry.collector.clone();
            let gate = entry.gate.clone();
            let sink = sink.clone();
            tasks.spawn(async move {
                let _serialized = gate.lock().await;
                let started = Instant::now();
                let result = collector.update(&sink).await;
                (name, result, started.elapsed())
            });
        }

        let mut summary = CollectSummary::default();
        while let Some(joined) = tasks.join_next().await {
            let (name, result, elapsed) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(error = %e, "Collector task aborted");
                    continue;
                }
            };

            let success = match result {
                Ok(()) => {
                    tracing::debug!(collector = name, elapsed_ms = elapsed.as_millis() as u64, "Collector succeeded");
                    summary.succeeded.push(name.to_string());
                    1.0
                }
                Err(e) => {
                    tracing::error!(collector = name, error = %e, "Collector failed");
                    summary.failed.push(name.to_string());
                    0.0
                }
            };
            sink.gauge(&SCRAPE_SUCCESS, success, &[name]);
            sink.gauge(&SCRAPE_DURATION, elapsed.as_secs_f64(), &[name]);
        }
        sink.gauge(&BUILD_INFO, 1.0, &[env!("CARGO_PKG_VERSION")]);

        summary.succeeded.sort();
        summary.failed.sort();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CollectorRegistry;
    use crate::sink::channel;
    use crate::CollectorContext;
    use async_trait::async_trait;
    use idleness_cloud::fake::FakeComputeApi;
    use idleness_common::MetricSample;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const SAMPLE: MetricDesc = MetricDesc::new("sample_value", "sample", &["project"]);

    struct Emitting;

    #[async_trait]
    impl Collector for Emitting {
        fn list_metrics(&self) -> Vec<&'static str> {
            vec![SAMPLE.name]
        }

        async fn update(&self, sink: &MetricSink) -> anyhow::Result<()> {
            sink.gauge(&SAMPLE, 1.0, &["demo"]);
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Collector for Failing {
        fn list_metrics(&self) -> Vec<&'static str> {
            vec![]
        }

        async fn update(&self, _sink: &MetricSink) -> anyhow::Result<()> {
            anyhow::bail!("provider unavailable")
        }
    }

    static IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);
    static MAX_IN_FLIGHT: AtomicUsize = AtomicUsize::new(0);

    struct Slow;

    #[async_trait]
    impl Collector for Slow {
        fn list_metrics(&self) -> Vec<&'static str> {
            vec![]
        }

        async fn update(&self, _sink: &MetricSink) -> anyhow::Result<()> {
            let now = IN_FLIGHT.fetch_add(1, Ordering::SeqCst) + 1;
            MAX_IN_FLIGHT.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            IN_FLIGHT.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn emitting(_: &CollectorContext) -> anyhow::Result<Arc<dyn Collector>> {
        Ok(Arc::new(Emitting))
    }

    fn failing(_: &CollectorContext) -> anyhow::Result<Arc<dyn Collector>> {
        Ok(Arc::new(Failing))
    }

    fn slow(_: &CollectorContext) -> anyhow::Result<Arc<dyn Collector>> {
        Ok(Arc::new(Slow))
    }

    fn ctx() -> CollectorContext {
        CollectorContext {
            project: "demo".to_string(),
            monitored_regions: vec![],
            api: Arc::new(FakeComputeApi::new()),
        }
    }

    fn value_of(samples: &[MetricSample], name: &str, collector: &str) -> Option<f64> {
        samples
            .iter()
            .find(|s| s.name == name && s.label("collector") == Some(collector))
            .map(|s| s.value)
    }

    #[tokio::test]
    async fn failing_collector_does_not_block_siblings() {
        let mut registry = CollectorRegistry::new();
        registry.register("emitting", true, emitting).unwrap();
        registry.register("failing", true, failing).unwrap();

        let (sink, mut drain) = channel();
        let summary = registry.instantiate_enabled(&ctx()).collect(&sink).await;
        let samples = drain.drain();

        assert_eq!(summary.succeeded, vec!["emitting"]);
        assert_eq!(summary.failed, vec!["failing"]);
        assert!(samples.iter().any(|s| s.name == "sample_value"));
        assert_eq!(value_of(&samples, SCRAPE_SUCCESS.name, "emitting"), Some(1.0));
        assert_eq!(value_of(&samples, SCRAPE_SUCCESS.name, "failing"), Some(0.0));
        assert!(value_of(&samples, SCRAPE_DURATION.name, "failing").is_some());
        assert!(samples.iter().any(|s| s.name == BUILD_INFO.name));
    }

    #[tokio::test]
    async fn overlapping_scrapes_serialize_each_collector() {
        let mut registry = CollectorRegistry::new();
        registry.register("slow", true, slow).unwrap();
        let registry = Arc::new(registry);

        let mut scrapes = JoinSet::new();
        for _ in 0..4 {
            let registry = registry.clone();
            scrapes.spawn(async move {
                let (sink, _drain) = channel();
                registry.instantiate_enabled(&ctx()).collect(&sink).await
            });
        }
        while let Some(summary) = scrapes.join_next().await {
            assert_eq!(summary.unwrap().succeeded, vec!["slow"]);
        }

        assert_eq!(MAX_IN_FLIGHT.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unreadable_region_list_marks_zonal_collector_failed() {
        let mut registry = CollectorRegistry::with_builtin().unwrap();
        registry
            .apply_selection(true, &["gce_is_machine_running".to_string()], &[])
            .unwrap();
        let ctx = CollectorContext {
            project: "demo".to_string(),
            monitored_regions: vec!["us-east1".to_string()],
            api: Arc::new(
                FakeComputeApi::new()
                    .with_region("us-east1", &["us-east1-b"])
                    .with_instance("us-east1-b", "web", "RUNNING")
                    .fail_region_list(),
            ),
        };

        let (sink, mut drain) = channel();
        let summary = registry.instantiate_enabled(&ctx).collect(&sink).await;
        let samples = drain.drain();

        assert!(summary.succeeded.is_empty());
        assert_eq!(summary.failed, vec!["gce_is_machine_running"]);
        assert!(!samples.iter().any(|s| s.name == "gce_is_machine_running"));
        assert_eq!(
            value_of(&samples, SCRAPE_SUCCESS.name, "gce_is_machine_running"),
            Some(0.0)
        );
    }
}
