//! Short-name extraction from fully-qualified provider resource URLs.
//!
//! Failures never propagate: an empty string means "unknown" and callers keep
//! going with it.

use url::Url;

pub const ZONES: &str = "zones";
pub const REGIONS: &str = "regions";
pub const DISKS: &str = "disks";

/// Returns the path segment that follows the last `keyword` segment of
/// `resource_url`, or an empty string when there is none.
pub fn segment_after(resource_url: &str, keyword: &str) -> String {
    let url = match Url::parse(resource_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(url = %resource_url, keyword, error = %e, "Failed to parse resource URL");
            return String::new();
        }
    };

    let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
    let found = segments
        .windows(2)
        .filter(|pair| pair[0] == keyword && !pair[1].is_empty())
        .map(|pair| pair[1])
        .last();

    match found {
        Some(segment) => segment.to_string(),
        None => {
            tracing::warn!(url = %resource_url, keyword, "Resource URL has no segment after keyword");
            String::new()
        }
    }
}

pub fn zone_from_url(resource_url: &str) -> String {
    segment_after(resource_url, ZONES)
}

pub fn region_from_url(resource_url: &str) -> String {
    segment_after(resource_url, REGIONS)
}

pub fn disk_from_url(resource_url: &str) -> String {
    segment_after(resource_url, DISKS)
}

/// Region that contains `zone` (`us-east1-b` -> `us-east1`).
pub fn zone_region(zone: &str) -> &str {
    match zone.rsplit_once('-') {
        Some((region, suffix)) if !region.is_empty() && !suffix.is_empty() => region,
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_is_extracted_from_compute_url() {
        assert_eq!(
            zone_from_url("https://host/compute/v1/projects/p/zones/us-east1-a"),
            "us-east1-a"
        );
        assert_eq!(
            zone_from_url("https://www.googleapis.com/compute/v1/projects/project-id/zones/asia-east1-a"),
            "asia-east1-a"
        );
    }

    #[test]
    fn missing_keyword_yields_empty() {
        assert_eq!(zone_from_url("https://someurl/"), "");
        assert_eq!(disk_from_url("https://someurl/"), "");
    }

    #[test]
    fn unparsable_url_yields_empty() {
        assert_eq!(zone_from_url("not a url"), "");
        assert_eq!(zone_from_url(""), "");
    }

    #[test]
    fn trailing_keyword_yields_empty() {
        assert_eq!(zone_from_url("https://host/projects/p/zones"), "");
        assert_eq!(zone_from_url("https://host/projects/p/zones/"), "");
    }

    #[test]
    fn disk_name_follows_zone_in_disk_url() {
        let url = "https://www.googleapis.com/compute/v1/projects/project/zones/us-central1-c/disks/disk";
        assert_eq!(disk_from_url(url), "disk");
        assert_eq!(zone_from_url(url), "us-central1-c");
    }

    #[test]
    fn region_is_extracted_from_region_url() {
        assert_eq!(
            region_from_url("https://host/compute/v1/projects/p/regions/europe-west1"),
            "europe-west1"
        );
    }

    #[test]
    fn zone_region_strips_zone_suffix() {
        assert_eq!(zone_region("us-east1-b"), "us-east1");
        assert_eq!(zone_region("europe-west4-a"), "europe-west4");
        assert_eq!(zone_region("zoneless"), "");
        assert_eq!(zone_region(""), "");
    }
}
