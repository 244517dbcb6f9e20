//! Snapshot inventory of a project: per-snapshot age, per-disk counts and
//! the adjacent-pair "old snapshot" scan.

use crate::api::ComputeApi;
use crate::error::Result;
use crate::models::Snapshot;
use crate::resolver::disk_from_url;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotAge {
    pub disk: String,
    pub snapshot: String,
    pub age_days: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiskSnapshots {
    pub count: u64,
    /// `None` when no snapshot of the disk had a readable timestamp.
    pub newest_age_days: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedundantSnapshot {
    pub disk: String,
    pub snapshot: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotReport {
    pub ages: Vec<SnapshotAge>,
    /// Keyed by source disk name.
    pub disks: BTreeMap<String, DiskSnapshots>,
    pub redundant: Vec<RedundantSnapshot>,
}

impl SnapshotReport {
    /// Builds the report from a raw (possibly overlapping) snapshot listing.
    pub fn build(snapshots: Vec<Snapshot>, now: DateTime<Utc>) -> Self {
        let snapshots = dedup_by_name(snapshots);
        let mut report = SnapshotReport::default();

        for snapshot in &snapshots {
            let disk = disk_from_url(&snapshot.source_disk);
            let entry = report.disks.entry(disk.clone()).or_default();
            entry.count += 1;

            let Some(age_days) = snapshot_age_days(&snapshot.creation_timestamp, now) else {
                tracing::warn!(
                    snapshot = %snapshot.name,
                    timestamp = %snapshot.creation_timestamp,
                    "Failed to parse snapshot creation timestamp"
                );
                continue;
            };
            entry.newest_age_days = Some(match entry.newest_age_days {
                Some(current) => current.min(age_days),
                None => age_days,
            });
            report.ages.push(SnapshotAge {
                disk,
                snapshot: snapshot.name.clone(),
                age_days,
            });
        }

        report.redundant = find_redundant(snapshots);
        report
    }
}

/// Keeps the first occurrence of every snapshot name.
pub fn dedup_by_name(snapshots: Vec<Snapshot>) -> Vec<Snapshot> {
    let mut seen = HashSet::new();
    snapshots
        .into_iter()
        .filter(|s| seen.insert(s.name.clone()))
        .collect()
}

/// Whole days elapsed since `creation_timestamp` (RFC 3339), never negative.
pub fn snapshot_age_days(creation_timestamp: &str, now: DateTime<Utc>) -> Option<f64> {
    let created = DateTime::parse_from_rfc3339(creation_timestamp).ok()?;
    let hours = (now - created.with_timezone(&Utc)).num_seconds() as f64 / 3600.0;
    Some((hours / 24.0).floor().max(0.0))
}

/// Flags superseded snapshots by comparing neighbours after a stable sort on
/// the source disk id. Of two adjacent snapshots of the same disk the older
/// one is flagged; on equal timestamps the second one is. A flagged snapshot
/// is not examined again.
///
/// Only adjacent pairs are compared, so in a run of three or more snapshots
/// of one disk some older snapshots may go unflagged.
pub fn find_redundant(mut snapshots: Vec<Snapshot>) -> Vec<RedundantSnapshot> {
    snapshots.sort_by(|a, b| a.source_disk_id.cmp(&b.source_disk_id));

    let mut reported: HashSet<&str> = HashSet::new();
    let mut redundant = Vec::new();
    for pair in snapshots.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        if reported.contains(current.name.as_str()) || current.source_disk_id != next.source_disk_id {
            continue;
        }

        let older = match compare_created(current, next) {
            Ordering::Less => current,
            Ordering::Equal | Ordering::Greater => next,
        };
        if reported.insert(older.name.as_str()) {
            redundant.push(RedundantSnapshot {
                disk: disk_from_url(&older.source_disk),
                snapshot: older.name.clone(),
            });
        }
    }
    redundant
}

fn compare_created(a: &Snapshot, b: &Snapshot) -> Ordering {
    match (
        DateTime::parse_from_rfc3339(&a.creation_timestamp),
        DateTime::parse_from_rfc3339(&b.creation_timestamp),
    ) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.creation_timestamp.cmp(&b.creation_timestamp),
    }
}

pub struct SnapshotAggregator {
    api: Arc<dyn ComputeApi>,
}

impl SnapshotAggregator {
    pub fn new(api: Arc<dyn ComputeApi>) -> Self {
        Self { api }
    }

    pub async fn aggregate(&self, project: &str) -> Result<SnapshotReport> {
        self.aggregate_at(project, Utc::now()).await
    }

    pub async fn aggregate_at(&self, project: &str, now: DateTime<Utc>) -> Result<SnapshotReport> {
        let snapshots = self.api.list_snapshots(project).await?;
        tracing::debug!(project, listed = snapshots.len(), "Listed snapshots");
        Ok(SnapshotReport::build(snapshots, now))
    }
}
