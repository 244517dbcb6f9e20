//! Concurrent region/zone fan-out over the monitored scope.
//!
//! One task lists the zones of each monitored region; one task per distinct
//! zone then lists the requested resource kinds. Results come back through
//! the `JoinSet` and are merged by this task alone after every spawned task
//! has finished.

use crate::api::ComputeApi;
use crate::error::Result;
use crate::models::{Disk, Instance};
use crate::resolver::{zone_from_url, zone_region};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tokio::task::JoinSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Instances,
    Disks,
}

/// Merged instance and disk inventory of every monitored zone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    pub instances: Vec<Instance>,
    pub disks: Vec<Disk>,
}

/// Resources of one zone as returned by the zone task.
#[derive(Default)]
struct ZoneInventory {
    instances: Vec<Instance>,
    disks: Vec<Disk>,
}

pub struct RegionalFetcher {
    api: Arc<dyn ComputeApi>,
}

impl RegionalFetcher {
    pub fn new(api: Arc<dyn ComputeApi>) -> Self {
        Self { api }
    }

    /// Lists `kinds` across every zone of the monitored regions.
    ///
    /// Fails only when the region list itself cannot be read. Failures of
    /// one region or one zone are logged and only shrink the result.
    pub async fn fetch(
        &self,
        project: &str,
        monitored_regions: &[String],
        kinds: &[ResourceKind],
    ) -> Result<Inventory> {
        let zones = self.monitored_zones(project, monitored_regions).await?;
        if zones.is_empty() || kinds.is_empty() {
            return Ok(Inventory::default());
        }

        let mut tasks = JoinSet::new();
        for zone in zones {
            let api = self.api.clone();
            let project = project.to_string();
            let kinds = kinds.to_vec();
            tasks.spawn(async move { fetch_zone(api.as_ref(), &project, &zone, &kinds).await });
        }

        let mut inventory = Inventory::default();
        let mut seen_instances = HashSet::new();
        let mut seen_disks = HashSet::new();
        while let Some(joined) = tasks.join_next().await {
            let zone_inventory = match joined {
                Ok(zone_inventory) => zone_inventory,
                Err(e) => {
                    tracing::error!(project, error = %e, "Zone task panicked");
                    continue;
                }
            };
            for instance in zone_inventory.instances {
                if seen_instances.insert(identity(&instance.id, &instance.zone, &instance.name)) {
                    inventory.instances.push(instance);
                }
            }
            for disk in zone_inventory.disks {
                if seen_disks.insert(identity(&disk.id, &disk.zone, &disk.name)) {
                    inventory.disks.push(disk);
                }
            }
        }

        tracing::debug!(
            project,
            instances = inventory.instances.len(),
            disks = inventory.disks.len(),
            "Fan-out complete"
        );
        Ok(inventory)
    }

    /// Distinct zones that belong to a monitored region.
    pub async fn monitored_zones(
        &self,
        project: &str,
        monitored_regions: &[String],
    ) -> Result<BTreeSet<String>> {
        let regions = self.api.list_regions(project).await.inspect_err(|e| {
            tracing::error!(project, error = %e, "Failed to list regions");
        })?;

        let mut tasks = JoinSet::new();
        for region in regions {
            if !monitored_regions.iter().any(|r| *r == region.name) {
                continue;
            }
            tasks.spawn(async move {
                let mut zones = Vec::new();
                for zone_url in &region.zones {
                    let zone = zone_from_url(zone_url);
                    if zone.is_empty() {
                        continue;
                    }
                    if zone_region(&zone) != region.name {
                        tracing::warn!(
                            region = %region.name,
                            zone = %zone,
                            "Zone does not belong to its listed region, skipping"
                        );
                        continue;
                    }
                    zones.push(zone);
                }
                zones
            });
        }

        let mut zones = BTreeSet::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(region_zones) => zones.extend(region_zones),
                Err(e) => tracing::error!(project, error = %e, "Region task panicked"),
            }
        }
        Ok(zones)
    }
}

async fn fetch_zone(
    api: &dyn ComputeApi,
    project: &str,
    zone: &str,
    kinds: &[ResourceKind],
) -> ZoneInventory {
    let mut result = ZoneInventory::default();
    let want_instances = kinds.contains(&ResourceKind::Instances);
    let want_disks = kinds.contains(&ResourceKind::Disks);

    let (instances, disks) = tokio::join!(
        async {
            if want_instances {
                Some(api.list_instances(project, zone).await)
            } else {
                None
            }
        },
        async {
            if want_disks {
                Some(api.list_disks(project, zone).await)
            } else {
                None
            }
        }
    );

    match instances {
        Some(Ok(instances)) => result.instances = instances,
        Some(Err(e)) => tracing::warn!(project, zone, error = %e, "Failed to list instances"),
        None => {}
    }
    match disks {
        Some(Ok(disks)) => result.disks = disks,
        Some(Err(e)) => tracing::warn!(project, zone, error = %e, "Failed to list disks"),
        None => {}
    }
    result
}

/// Provider id when present, otherwise zone and name.
fn identity(id: &str, zone: &str, name: &str) -> String {
    if id.is_empty() {
        format!("{zone}/{name}")
    } else {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Call, FakeComputeApi};

    fn two_region_fixture() -> FakeComputeApi {
        FakeComputeApi::new()
            .with_region("us-east1", &["us-east1-b", "us-east1-c"])
            .with_region("europe-west1", &["europe-west1-b", "europe-west1-d"])
            .with_instance("us-east1-b", "vm-a", "RUNNING")
            .with_instance("us-east1-c", "vm-b", "TERMINATED")
            .with_instance("europe-west1-b", "vm-eu", "RUNNING")
            .with_disk("us-east1-b", "disk-a", 1)
            .with_disk("us-east1-c", "disk-b", 0)
            .with_disk("europe-west1-d", "disk-eu", 1)
    }

    fn monitored() -> Vec<String> {
        vec!["us-east1".to_string()]
    }

    const ALL: &[ResourceKind] = &[ResourceKind::Instances, ResourceKind::Disks];

    #[tokio::test]
    async fn queries_only_monitored_zones_and_merges_without_duplicates() {
        for _ in 0..20 {
            let api = Arc::new(two_region_fixture());
            let fetcher = RegionalFetcher::new(api.clone());

            let inventory = fetcher.fetch("demo", &monitored(), ALL).await.unwrap();

            let mut instances: Vec<_> = inventory.instances.iter().map(|i| i.name.as_str()).collect();
            instances.sort();
            let mut disks: Vec<_> = inventory.disks.iter().map(|d| d.name.as_str()).collect();
            disks.sort();
            assert_eq!(instances, vec!["vm-a", "vm-b"]);
            assert_eq!(disks, vec!["disk-a", "disk-b"]);

            for call in api.calls() {
                match call {
                    Call::Instances(zone) | Call::Disks(zone) => {
                        assert!(zone.starts_with("us-east1-"), "queried {zone}")
                    }
                    _ => {}
                }
            }
            let instance_calls = api
                .calls()
                .into_iter()
                .filter(|c| matches!(c, Call::Instances(_)))
                .count();
            assert_eq!(instance_calls, 2);
        }
    }

    #[tokio::test]
    async fn failing_zone_contributes_nothing() {
        let api = Arc::new(two_region_fixture().fail_zone("us-east1-c"));
        let inventory = RegionalFetcher::new(api)
            .fetch("demo", &monitored(), ALL)
            .await
            .unwrap();

        assert_eq!(inventory.instances.len(), 1);
        assert_eq!(inventory.instances[0].name, "vm-a");
        assert_eq!(inventory.disks.len(), 1);
        assert_eq!(inventory.disks[0].name, "disk-a");
    }

    #[tokio::test]
    async fn region_list_failure_fails_the_fetch() {
        let api = Arc::new(two_region_fixture().fail_region_list());
        let result = RegionalFetcher::new(api.clone())
            .fetch("demo", &monitored(), ALL)
            .await;

        assert!(result.is_err());
        assert_eq!(api.calls(), vec![Call::Regions]);
    }

    #[tokio::test]
    async fn zone_outside_its_region_is_skipped() {
        let api = Arc::new(
            FakeComputeApi::new()
                .with_region("us-east1", &["us-east1-b", "us-west1-a"])
                .with_instance("us-east1-b", "vm-a", "RUNNING")
                .with_instance("us-west1-a", "vm-w", "RUNNING"),
        );
        let zones = RegionalFetcher::new(api)
            .monitored_zones("demo", &monitored())
            .await
            .unwrap();

        assert_eq!(zones.into_iter().collect::<Vec<_>>(), vec!["us-east1-b"]);
    }

    #[tokio::test]
    async fn only_requested_kinds_are_listed() {
        let api = Arc::new(two_region_fixture());
        let inventory = RegionalFetcher::new(api.clone())
            .fetch("demo", &monitored(), &[ResourceKind::Disks])
            .await
            .unwrap();

        assert!(inventory.instances.is_empty());
        assert_eq!(inventory.disks.len(), 2);
        assert!(!api.calls().iter().any(|c| matches!(c, Call::Instances(_))));
    }

    #[tokio::test]
    async fn repeated_fetch_is_stable() {
        let api = Arc::new(two_region_fixture());
        let fetcher = RegionalFetcher::new(api);

        let mut first = fetcher.fetch("demo", &monitored(), ALL).await.unwrap();
        let mut second = fetcher.fetch("demo", &monitored(), ALL).await.unwrap();
        for inv in [&mut first, &mut second] {
            inv.instances.sort_by(|a, b| a.name.cmp(&b.name));
            inv.disks.sort_by(|a, b| a.name.cmp(&b.name));
        }
        assert_eq!(first, second);
    }
}
