use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricError {
    #[error("metric {metric} expects {expected} label values, got {got}")]
    LabelMismatch {
        metric: String,
        expected: usize,
        got: usize,
    },
}

/// Static description of a metric family: name, help text and the ordered
/// label names every sample of the family must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricDesc {
    pub name: &'static str,
    pub help: &'static str,
    pub labels: &'static [&'static str],
}

impl MetricDesc {
    pub const fn new(
        name: &'static str,
        help: &'static str,
        labels: &'static [&'static str],
    ) -> Self {
        Self { name, help, labels }
    }
}

/// Value type of an emitted sample. Every collector in this exporter reports
/// point-in-time state, so gauges are the only kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Gauge,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Gauge => write!(f, "gauge"),
        }
    }
}

/// A single `(name, labels, value)` observation.
///
/// # Examples
///
/// ```
/// use idleness_common::types::{MetricDesc, MetricError, MetricSample};
///
/// const RUNNING: MetricDesc = MetricDesc::new(
///     "gce_is_machine_running",
///     "tells whether the VM is running",
///     &["project", "zone", "name"],
/// );
///
/// let sample = MetricSample::gauge(&RUNNING, 1.0, &["p", "us-east1-b", "vm-1"]).unwrap();
/// assert_eq!(sample.label("zone"), Some("us-east1-b"));
/// assert!(matches!(
///     MetricSample::gauge(&RUNNING, 1.0, &["p"]),
///     Err(MetricError::LabelMismatch { expected: 3, got: 1, .. })
/// ));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl MetricSample {
    /// Builds a gauge sample, pairing `label_values` positionally with the
    /// descriptor's label names.
    pub fn gauge(
        desc: &MetricDesc,
        value: f64,
        label_values: &[&str],
    ) -> Result<Self, MetricError> {
        if desc.labels.len() != label_values.len() {
            return Err(MetricError::LabelMismatch {
                metric: desc.name.to_string(),
                expected: desc.labels.len(),
                got: label_values.len(),
            });
        }

        let labels = desc
            .labels
            .iter()
            .zip(label_values)
            .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
            .collect();

        Ok(Self {
            name: desc.name.to_string(),
            help: desc.help.to_string(),
            kind: MetricKind::Gauge,
            labels,
            value,
        })
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Identity of the series this sample belongs to.
    pub fn series_key(&self) -> String {
        let mut key = self.name.clone();
        for (k, v) in &self.labels {
            key.push('|');
            key.push_str(k);
            key.push('=');
            key.push_str(v);
        }
        key
    }
}
