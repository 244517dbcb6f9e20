//! Prometheus text exposition of a drained metric sink.

use idleness_common::{MetricKind, MetricSample};
use prometheus::proto::{Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, TextEncoder};
use std::collections::{BTreeMap, HashSet};

pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Groups samples into families by name. A series seen twice keeps its
/// first value.
pub fn families(samples: Vec<MetricSample>) -> Vec<MetricFamily> {
    let mut seen = HashSet::new();
    let mut grouped: BTreeMap<String, (String, MetricKind, Vec<Metric>)> = BTreeMap::new();

    for sample in samples {
        if !seen.insert(sample.series_key()) {
            tracing::warn!(metric = %sample.name, labels = ?sample.labels, "Duplicate series dropped");
            continue;
        }

        let labels: Vec<LabelPair> = sample
            .labels
            .iter()
            .map(|(name, value)| {
                let mut pair = LabelPair::default();
                pair.set_name(name.clone());
                pair.set_value(value.clone());
                pair
            })
            .collect();

        let mut metric = Metric::default();
        metric.set_label(labels.into());
        match sample.kind {
            MetricKind::Gauge => {
                let mut gauge = Gauge::default();
                gauge.set_value(sample.value);
                metric.set_gauge(gauge);
            }
        }

        grouped
            .entry(sample.name)
            .or_insert_with(|| (sample.help, sample.kind, Vec::new()))
            .2
            .push(metric);
    }

    grouped
        .into_iter()
        .map(|(name, (help, kind, metrics))| {
            let mut family = MetricFamily::default();
            family.set_name(name);
            family.set_help(help);
            family.set_field_type(match kind {
                MetricKind::Gauge => MetricType::GAUGE,
            });
            family.set_metric(metrics.into());
            family
        })
        .collect()
}

pub fn render(samples: Vec<MetricSample>) -> anyhow::Result<String> {
    let families = families(samples);
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
