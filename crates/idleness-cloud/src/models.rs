//! Request-scoped copies of the provider resources the collectors read.
//!
//! Field names follow the provider's JSON (camelCase). Everything defaults so
//! that partially populated records still decode.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    /// Fully-qualified zone URLs (`.../zones/us-east1-b`).
    #[serde(default)]
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Zone URL of the instance.
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub zone: String,
    /// Instance URLs the disk is attached to.
    #[serde(default)]
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Disk URL (`.../zones/<zone>/disks/<name>`).
    #[serde(default)]
    pub source_disk: String,
    #[serde(default)]
    pub source_disk_id: String,
    /// RFC 3339 creation time.
    #[serde(default)]
    pub creation_timestamp: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(default)]
    pub cluster_name: String,
    #[serde(default)]
    pub config: ClusterConfig,
    #[serde(default)]
    pub status: ClusterStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    #[serde(default)]
    pub gce_cluster_config: GceClusterConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GceClusterConfig {
    /// Empty for clusters that carry no zone, e.g. Dataproc on GKE.
    #[serde(default)]
    pub zone_uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default)]
    pub state: String,
}

/// One page of a provider list call. Compute lists use `items`, Dataproc
/// uses `clusters`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage<T> {
    #[serde(default = "Vec::new", alias = "clusters")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_compute_snapshot_page() {
        let page: ListPage<Snapshot> = serde_json::from_value(serde_json::json!({
            "kind": "compute#snapshotList",
            "items": [{
                "id": "42",
                "name": "snap-1",
                "sourceDisk": "https://www.googleapis.com/compute/v1/projects/p/zones/us-east1-b/disks/data",
                "sourceDiskId": "777",
                "creationTimestamp": "2024-01-01T10:00:00.000-07:00"
            }],
            "nextPageToken": "abc"
        }))
        .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].source_disk_id, "777");
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
    }

    #[test]
    fn decodes_dataproc_cluster_page_without_zone() {
        let page: ListPage<Cluster> = serde_json::from_value(serde_json::json!({
            "clusters": [{
                "clusterName": "etl",
                "config": {},
                "status": { "state": "RUNNING" }
            }]
        }))
        .unwrap();

        assert_eq!(page.items[0].cluster_name, "etl");
        assert_eq!(page.items[0].config.gce_cluster_config.zone_uri, "");
        assert_eq!(page.items[0].status.state, "RUNNING");
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn empty_list_response_has_no_items() {
        let page: ListPage<Disk> = serde_json::from_str("{}").unwrap();
        assert!(page.items.is_empty());
    }

    #[derive(Debug, Deserialize)]
    struct Named {
        name: String,
    }

    #[test]
    fn page_items_need_no_default_impl() {
        let page: ListPage<Named> =
            serde_json::from_str(r#"{"items":[{"name":"a"}],"nextPageToken":"t"}"#).unwrap();
        assert_eq!(page.items[0].name, "a");

        let empty: ListPage<Named> = serde_json::from_str("{}").unwrap();
        assert!(empty.items.is_empty());
    }
}
