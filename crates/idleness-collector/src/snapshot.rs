//! Collectors over the project's snapshot inventory.

use crate::registry::{CollectorRegistry, RegistryError};
use crate::sink::MetricSink;
use crate::{Collector, CollectorContext};
use anyhow::{Context, Result};
use async_trait::async_trait;
use idleness_cloud::snapshot::{SnapshotAggregator, SnapshotReport};
use idleness_common::MetricDesc;
use std::sync::Arc;

pub const SNAPSHOT_AGE_DAYS: MetricDesc = MetricDesc::new(
    "gce_disk_snapshot_age_days",
    "tells how many days the snapshot has",
    &["project", "disk", "snapshot"],
);

pub const SNAPSHOT_AMOUNT: MetricDesc = MetricDesc::new(
    "gce_disk_snapshot_amount",
    "tells how many snapshots the Disk has",
    &["project", "disk"],
);

pub const OLD_SNAPSHOT: MetricDesc = MetricDesc::new(
    "gce_is_old_snapshot",
    "tells whether the Disk has unnecessary old snapshots",
    &["project", "disk", "snapshot"],
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnapshotMetric {
    AgeDays,
    Amount,
    Old,
}

impl SnapshotMetric {
    fn desc(self) -> &'static MetricDesc {
        match self {
            SnapshotMetric::AgeDays => &SNAPSHOT_AGE_DAYS,
            SnapshotMetric::Amount => &SNAPSHOT_AMOUNT,
            SnapshotMetric::Old => &OLD_SNAPSHOT,
        }
    }

    fn emit(self, project: &str, report: &SnapshotReport, sink: &MetricSink) {
        let desc = self.desc();
        match self {
            SnapshotMetric::AgeDays => {
                for age in &report.ages {
                    sink.gauge(desc, age.age_days, &[project, &age.disk, &age.snapshot]);
                }
            }
            SnapshotMetric::Amount => {
                for (disk, snapshots) in &report.disks {
                    sink.gauge(desc, snapshots.count as f64, &[project, disk]);
                }
            }
            SnapshotMetric::Old => {
                for redundant in &report.redundant {
                    sink.gauge(desc, 1.0, &[project, &redundant.disk, &redundant.snapshot]);
                }
            }
        }
    }
}

/// Lists the project's snapshots once per update and emits the configured
/// subset of snapshot metrics.
pub struct SnapshotCollector {
    project: String,
    aggregator: SnapshotAggregator,
    metrics: &'static [SnapshotMetric],
}

impl SnapshotCollector {
    fn new(ctx: &CollectorContext, metrics: &'static [SnapshotMetric]) -> Self {
        Self {
            project: ctx.project.clone(),
            aggregator: SnapshotAggregator::new(ctx.api.clone()),
            metrics,
        }
    }
}

#[async_trait]
impl Collector for SnapshotCollector {
    fn list_metrics(&self) -> Vec<&'static str> {
        self.metrics.iter().map(|m| m.desc().name).collect()
    }

    async fn update(&self, sink: &MetricSink) -> Result<()> {
        let report = self
            .aggregator
            .aggregate(&self.project)
            .await
            .with_context(|| format!("error requesting disk snapshots for project {}", self.project))?;

        for metric in self.metrics {
            metric.emit(&self.project, &report, sink);
        }
        Ok(())
    }
}

const DISK_SNAPSHOT: &[SnapshotMetric] = &[SnapshotMetric::AgeDays, SnapshotMetric::Amount];
const AGE_DAYS_ONLY: &[SnapshotMetric] = &[SnapshotMetric::AgeDays];
const AMOUNT_ONLY: &[SnapshotMetric] = &[SnapshotMetric::Amount];
const OLD_ONLY: &[SnapshotMetric] = &[SnapshotMetric::Old];

fn disk_snapshot(ctx: &CollectorContext) -> Result<Arc<dyn Collector>> {
    Ok(Arc::new(SnapshotCollector::new(ctx, DISK_SNAPSHOT)))
}

fn snapshot_age_days(ctx: &CollectorContext) -> Result<Arc<dyn Collector>> {
    Ok(Arc::new(SnapshotCollector::new(ctx, AGE_DAYS_ONLY)))
}

fn snapshot_amount(ctx: &CollectorContext) -> Result<Arc<dyn Collector>> {
    Ok(Arc::new(SnapshotCollector::new(ctx, AMOUNT_ONLY)))
}

fn old_snapshot(ctx: &CollectorContext) -> Result<Arc<dyn Collector>> {
    Ok(Arc::new(SnapshotCollector::new(ctx, OLD_ONLY)))
}

pub fn register(registry: &mut CollectorRegistry) -> Result<(), RegistryError> {
    registry.register("gce_disk_snapshot", true, disk_snapshot)?;
    registry.register("gce_is_old_snapshot", true, old_snapshot)?;
    // Single-metric variants of gce_disk_snapshot; enabling them alongside it
    // yields duplicate series.
    registry.register("gce_disk_snapshot_age_days", false, snapshot_age_days)?;
    registry.register("gce_disk_snapshot_amount", false, snapshot_amount)?;
    Ok(())
}
