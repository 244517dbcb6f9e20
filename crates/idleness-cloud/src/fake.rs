//! In-memory `ComputeApi` with failure injection and call recording.

use crate::api::ComputeApi;
use crate::error::{CloudApiError, Result};
use crate::models::{
    Cluster, ClusterConfig, ClusterStatus, Disk, GceClusterConfig, Instance, Region, Snapshot,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

const BASE: &str = "https://www.googleapis.com/compute/v1/projects/fake";

/// A provider call as seen by [`FakeComputeApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Regions,
    Instances(String),
    Disks(String),
    Snapshots,
    Clusters(String),
}

#[derive(Default)]
pub struct FakeComputeApi {
    regions: Vec<Region>,
    instances: BTreeMap<String, Vec<Instance>>,
    disks: BTreeMap<String, Vec<Disk>>,
    snapshot_pages: Vec<Vec<Snapshot>>,
    clusters: BTreeMap<String, Vec<Cluster>>,
    failing_zones: BTreeSet<String>,
    failing_cluster_regions: BTreeSet<String>,
    fail_regions: bool,
    fail_snapshots: bool,
    calls: Mutex<Vec<Call>>,
}

fn unavailable() -> CloudApiError {
    CloudApiError::Http {
        status: 500,
        body: "injected failure".to_string(),
    }
}

pub fn zone_url(zone: &str) -> String {
    format!("{BASE}/zones/{zone}")
}

impl FakeComputeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, name: &str, zones: &[&str]) -> Self {
        self.regions.push(Region {
            name: name.to_string(),
            status: "UP".to_string(),
            zones: zones.iter().map(|z| zone_url(z)).collect(),
        });
        self
    }

    pub fn with_instance(mut self, zone: &str, name: &str, status: &str) -> Self {
        self.instances.entry(zone.to_string()).or_default().push(Instance {
            id: format!("{zone}-{name}"),
            name: name.to_string(),
            zone: zone_url(zone),
            status: status.to_string(),
        });
        self
    }

    /// Adds a disk attached to `users` instances.
    pub fn with_disk(mut self, zone: &str, name: &str, users: usize) -> Self {
        self.disks.entry(zone.to_string()).or_default().push(Disk {
            id: format!("{zone}-{name}"),
            name: name.to_string(),
            zone: zone_url(zone),
            users: (0..users)
                .map(|i| format!("{BASE}/zones/{zone}/instances/user-{i}"))
                .collect(),
        });
        self
    }

    /// Snapshot pages are returned concatenated, overlaps included.
    pub fn with_snapshot_page(mut self, page: Vec<Snapshot>) -> Self {
        self.snapshot_pages.push(page);
        self
    }

    pub fn with_cluster(mut self, region: &str, name: &str, zone: Option<&str>, state: &str) -> Self {
        self.clusters.entry(region.to_string()).or_default().push(Cluster {
            cluster_name: name.to_string(),
            config: ClusterConfig {
                gce_cluster_config: GceClusterConfig {
                    zone_uri: zone.map(zone_url).unwrap_or_default(),
                },
            },
            status: ClusterStatus {
                state: state.to_string(),
            },
        });
        self
    }

    pub fn fail_zone(mut self, zone: &str) -> Self {
        self.failing_zones.insert(zone.to_string());
        self
    }

    pub fn fail_cluster_region(mut self, region: &str) -> Self {
        self.failing_cluster_regions.insert(region.to_string());
        self
    }

    pub fn fail_region_list(mut self) -> Self {
        self.fail_regions = true;
        self
    }

    pub fn fail_snapshots(mut self) -> Self {
        self.fail_snapshots = true;
        self
    }

    /// Calls received so far, in arrival order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }
}

#[async_trait]
impl ComputeApi for FakeComputeApi {
    async fn list_regions(&self, _project: &str) -> Result<Vec<Region>> {
        self.record(Call::Regions);
        tokio::task::yield_now().await;
        if self.fail_regions {
            return Err(unavailable());
        }
        Ok(self.regions.clone())
    }

    async fn list_instances(&self, _project: &str, zone: &str) -> Result<Vec<Instance>> {
        self.record(Call::Instances(zone.to_string()));
        tokio::task::yield_now().await;
        if self.failing_zones.contains(zone) {
            return Err(unavailable());
        }
        Ok(self.instances.get(zone).cloned().unwrap_or_default())
    }

    async fn list_disks(&self, _project: &str, zone: &str) -> Result<Vec<Disk>> {
        self.record(Call::Disks(zone.to_string()));
        tokio::task::yield_now().await;
        if self.failing_zones.contains(zone) {
            return Err(unavailable());
        }
        Ok(self.disks.get(zone).cloned().unwrap_or_default())
    }

    async fn list_snapshots(&self, _project: &str) -> Result<Vec<Snapshot>> {
        self.record(Call::Snapshots);
        tokio::task::yield_now().await;
        if self.fail_snapshots {
            return Err(unavailable());
        }
        Ok(self.snapshot_pages.concat())
    }

    async fn list_clusters(&self, _project: &str, region: &str) -> Result<Vec<Cluster>> {
        self.record(Call::Clusters(region.to_string()));
        tokio::task::yield_now().await;
        if self.failing_cluster_regions.contains(region) {
            return Err(unavailable());
        }
        Ok(self.clusters.get(region).cloned().unwrap_or_default())
    }
}
