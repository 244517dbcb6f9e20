//! Collectors over the zonal instance and disk inventory.

use crate::registry::{CollectorRegistry, RegistryError};
use crate::sink::MetricSink;
use crate::{Collector, CollectorContext};
use anyhow::{Context, Result};
use async_trait::async_trait;
use idleness_cloud::fanout::{Inventory, RegionalFetcher, ResourceKind};
use idleness_cloud::resolver::zone_from_url;
use idleness_common::MetricDesc;
use std::sync::Arc;

const ZONAL_LABELS: &[&str] = &["project", "zone", "name"];

pub const MACHINE_RUNNING: MetricDesc = MetricDesc::new(
    "gce_is_machine_running",
    "tells whether the VM is running",
    ZONAL_LABELS,
);

pub const DISK_ATTACHED: MetricDesc = MetricDesc::new(
    "gce_is_disk_attached",
    "tells whether the Disk is attached to some machine",
    ZONAL_LABELS,
);

pub const LEGACY_MACHINE_RUNNING: MetricDesc = MetricDesc::new(
    "gce_machine_running",
    "tells whether the VM is running",
    ZONAL_LABELS,
);

pub const LEGACY_DISK_ATTACHED: MetricDesc = MetricDesc::new(
    "gce_disk_attached",
    "tells whether the Disk is attached to some machine",
    ZONAL_LABELS,
);

/// A metric derived from one resource kind of the zonal inventory.
#[derive(Debug, Clone, Copy)]
enum ZonalMetric {
    /// 1 when the instance status is `RUNNING`.
    MachineRunning(&'static MetricDesc),
    /// Number of instances the disk is attached to.
    DiskAttached(&'static MetricDesc),
}

impl ZonalMetric {
    fn desc(&self) -> &'static MetricDesc {
        match self {
            ZonalMetric::MachineRunning(desc) | ZonalMetric::DiskAttached(desc) => desc,
        }
    }

    fn kind(&self) -> ResourceKind {
        match self {
            ZonalMetric::MachineRunning(_) => ResourceKind::Instances,
            ZonalMetric::DiskAttached(_) => ResourceKind::Disks,
        }
    }

    fn emit(&self, project: &str, inventory: &Inventory, sink: &MetricSink) {
        match self {
            ZonalMetric::MachineRunning(desc) => {
                for instance in &inventory.instances {
                    let running = if instance.status == "RUNNING" { 1.0 } else { 0.0 };
                    let zone = zone_from_url(&instance.zone);
                    sink.gauge(desc, running, &[project, &zone, &instance.name]);
                }
            }
            ZonalMetric::DiskAttached(desc) => {
                for disk in &inventory.disks {
                    let zone = zone_from_url(&disk.zone);
                    sink.gauge(desc, disk.users.len() as f64, &[project, &zone, &disk.name]);
                }
            }
        }
    }
}

/// Fans out over the monitored zones once per update and derives its
/// metrics from the merged inventory.
pub struct ZonalCollector {
    project: String,
    monitored_regions: Vec<String>,
    fetcher: RegionalFetcher,
    metrics: &'static [ZonalMetric],
}

impl ZonalCollector {
    fn new(ctx: &CollectorContext, metrics: &'static [ZonalMetric]) -> Self {
        Self {
            project: ctx.project.clone(),
            monitored_regions: ctx.monitored_regions.clone(),
            fetcher: RegionalFetcher::new(ctx.api.clone()),
            metrics,
        }
    }

    fn kinds(&self) -> Vec<ResourceKind> {
        let mut kinds: Vec<ResourceKind> = Vec::new();
        for metric in self.metrics {
            if !kinds.contains(&metric.kind()) {
                kinds.push(metric.kind());
            }
        }
        kinds
    }
}

#[async_trait]
impl Collector for ZonalCollector {
    fn list_metrics(&self) -> Vec<&'static str> {
        self.metrics.iter().map(|m| m.desc().name).collect()
    }

    async fn update(&self, sink: &MetricSink) -> Result<()> {
        let inventory = self
            .fetcher
            .fetch(&self.project, &self.monitored_regions, &self.kinds())
            .await
            .with_context(|| format!("failed to list regions for project {}", self.project))?;
        for metric in self.metrics {
            metric.emit(&self.project, &inventory, sink);
        }
        Ok(())
    }
}

const IS_MACHINE_RUNNING: &[ZonalMetric] = &[ZonalMetric::MachineRunning(&MACHINE_RUNNING)];
const IS_DISK_ATTACHED: &[ZonalMetric] = &[ZonalMetric::DiskAttached(&DISK_ATTACHED)];
const COMPUTE_ENGINE: &[ZonalMetric] = &[
    ZonalMetric::MachineRunning(&LEGACY_MACHINE_RUNNING),
    ZonalMetric::DiskAttached(&LEGACY_DISK_ATTACHED),
];

fn machine_running(ctx: &CollectorContext) -> Result<Arc<dyn Collector>> {
    Ok(Arc::new(ZonalCollector::new(ctx, IS_MACHINE_RUNNING)))
}

fn disk_attached(ctx: &CollectorContext) -> Result<Arc<dyn Collector>> {
    Ok(Arc::new(ZonalCollector::new(ctx, IS_DISK_ATTACHED)))
}

fn compute_engine(ctx: &CollectorContext) -> Result<Arc<dyn Collector>> {
    Ok(Arc::new(ZonalCollector::new(ctx, COMPUTE_ENGINE)))
}

pub fn register(registry: &mut CollectorRegistry) -> Result<(), RegistryError> {
    registry.register("gce_is_machine_running", true, machine_running)?;
    registry.register("gce_is_disk_attached", true, disk_attached)?;
    // Superseded by the two collectors above.
    registry.register("compute_engine", false, compute_engine)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::channel;
    use idleness_cloud::fake::{Call, FakeComputeApi};

    fn ctx(api: FakeComputeApi) -> CollectorContext {
        CollectorContext {
            project: "demo".to_string(),
            monitored_regions: vec!["us-east1".to_string()],
            api: Arc::new(api),
        }
    }

    fn fixture() -> FakeComputeApi {
        FakeComputeApi::new()
            .with_region("us-east1", &["us-east1-b", "us-east1-c"])
            .with_region("asia-east1", &["asia-east1-a"])
            .with_instance("us-east1-b", "web", "RUNNING")
            .with_instance("us-east1-c", "batch", "TERMINATED")
            .with_instance("asia-east1-a", "far", "RUNNING")
            .with_disk("us-east1-b", "web-boot", 1)
            .with_disk("us-east1-c", "orphan", 0)
    }

    #[tokio::test]
    async fn machine_running_reports_status_per_instance() {
        let collector = machine_running(&ctx(fixture())).unwrap();
        let (sink, mut drain) = channel();
        collector.update(&sink).await.unwrap();

        let mut samples: Vec<_> = drain
            .drain()
            .into_iter()
            .map(|s| {
                (
                    s.label("zone").unwrap_or_default().to_string(),
                    s.label("name").unwrap_or_default().to_string(),
                    s.value,
                )
            })
            .collect();
        samples.sort_by(|a, b| a.1.cmp(&b.1));

        assert_eq!(
            samples,
            vec![
                ("us-east1-c".to_string(), "batch".to_string(), 0.0),
                ("us-east1-b".to_string(), "web".to_string(), 1.0),
            ]
        );
    }

    #[tokio::test]
    async fn disk_attached_counts_users_and_skips_instance_listing() {
        let api = Arc::new(fixture());
        let collector = ZonalCollector::new(
            &CollectorContext {
                project: "demo".to_string(),
                monitored_regions: vec!["us-east1".to_string()],
                api: api.clone(),
            },
            IS_DISK_ATTACHED,
        );
        let (sink, mut drain) = channel();
        collector.update(&sink).await.unwrap();

        let samples = drain.drain();
        assert_eq!(samples.len(), 2);
        let orphan = samples.iter().find(|s| s.label("name") == Some("orphan")).unwrap();
        assert_eq!(orphan.value, 0.0);
        assert_eq!(orphan.name, "gce_is_disk_attached");
        assert!(!api.calls().iter().any(|c| matches!(c, Call::Instances(_))));
    }

    #[tokio::test]
    async fn legacy_collector_emits_both_metrics() {
        let collector = compute_engine(&ctx(fixture())).unwrap();
        assert_eq!(
            collector.list_metrics(),
            vec!["gce_machine_running", "gce_disk_attached"]
        );

        let (sink, mut drain) = channel();
        collector.update(&sink).await.unwrap();
        let samples = drain.drain();
        assert_eq!(samples.iter().filter(|s| s.name == "gce_machine_running").count(), 2);
        assert_eq!(samples.iter().filter(|s| s.name == "gce_disk_attached").count(), 2);
    }

    #[tokio::test]
    async fn region_list_failure_fails_the_update() {
        let collector = machine_running(&ctx(fixture().fail_region_list())).unwrap();
        let (sink, mut drain) = channel();

        let err = collector.update(&sink).await.unwrap_err();
        assert!(err.to_string().contains("failed to list regions for project demo"));
        assert!(drain.drain().is_empty());
    }
}
