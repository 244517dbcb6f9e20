use crate::error::Result;
use crate::models::{Cluster, Disk, Instance, Region, Snapshot};
use async_trait::async_trait;

/// Read-only view of the provider inventory the collectors need.
///
/// Every list call returns all pages. Implementations must be shareable
/// across concurrently running collectors.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn list_regions(&self, project: &str) -> Result<Vec<Region>>;

    async fn list_instances(&self, project: &str, zone: &str) -> Result<Vec<Instance>>;

    async fn list_disks(&self, project: &str, zone: &str) -> Result<Vec<Disk>>;

    /// Project-global snapshot list.
    async fn list_snapshots(&self, project: &str) -> Result<Vec<Snapshot>>;

    /// Dataproc clusters of one region.
    async fn list_clusters(&self, project: &str, region: &str) -> Result<Vec<Cluster>>;
}
