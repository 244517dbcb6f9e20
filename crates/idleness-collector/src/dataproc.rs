use crate::registry::{CollectorRegistry, RegistryError};
use crate::sink::MetricSink;
use crate::{Collector, CollectorContext};
use anyhow::Result;
use async_trait::async_trait;
use idleness_cloud::resolver::zone_from_url;
use idleness_cloud::ComputeApi;
use idleness_common::MetricDesc;
use std::sync::Arc;
use tokio::task::JoinSet;

pub const CLUSTER_RUNNING: MetricDesc = MetricDesc::new(
    "dataproc_is_cluster_running",
    "tells whether the Dataproc cluster is running",
    &["project", "region", "zone", "name"],
);

/// Lists Dataproc clusters of every monitored region, one task per region.
pub struct DataprocCollector {
    project: String,
    monitored_regions: Vec<String>,
    api: Arc<dyn ComputeApi>,
}

#[async_trait]
impl Collector for DataprocCollector {
    fn list_metrics(&self) -> Vec<&'static str> {
        vec![CLUSTER_RUNNING.name]
    }

    async fn update(&self, sink: &MetricSink) -> Result<()> {
        let mut tasks = JoinSet::new();
        for region in &self.monitored_regions {
            let api = self.api.clone();
            let project = self.project.clone();
            let region = region.clone();
            let sink = sink.clone();
            tasks.spawn(async move {
                let clusters = match api.list_clusters(&project, &region).await {
                    Ok(clusters) => clusters,
                    Err(e) => {
                        tracing::error!(project = %project, region = %region, error = %e, "Failed to list Dataproc clusters");
                        return;
                    }
                };

                for cluster in clusters {
                    let zone_uri = &cluster.config.gce_cluster_config.zone_uri;
                    // Dataproc on GKE carries no zone.
                    let zone = if zone_uri.is_empty() {
                        String::new()
                    } else {
                        zone_from_url(zone_uri)
                    };
                    let zone = if zone.is_empty() { region.clone() } else { zone };

                    let running = if cluster.status.state == "RUNNING" { 1.0 } else { 0.0 };
                    sink.gauge(
                        &CLUSTER_RUNNING,
                        running,
                        &[&project, &region, &zone, &cluster.cluster_name],
                    );
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!(project = %self.project, error = %e, "Dataproc region task aborted");
            }
        }
        Ok(())
    }
}

fn cluster_running(ctx: &CollectorContext) -> Result<Arc<dyn Collector>> {
    Ok(Arc::new(DataprocCollector {
        project: ctx.project.clone(),
        monitored_regions: ctx.monitored_regions.clone(),
        api: ctx.api.clone(),
    }))
}

pub fn register(registry: &mut CollectorRegistry) -> Result<(), RegistryError> {
    registry.register("dataproc_is_cluster_running", true, cluster_running)
}
