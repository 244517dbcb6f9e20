use idleness_common::{MetricDesc, MetricSample};
use tokio::sync::mpsc;

/// Append-only handle collectors emit samples through. Cheap to clone; every
/// clone feeds the same [`MetricDrain`].
#[derive(Clone)]
pub struct MetricSink {
    tx: mpsc::UnboundedSender<MetricSample>,
}

pub struct MetricDrain {
    rx: mpsc::UnboundedReceiver<MetricSample>,
}

pub fn channel() -> (MetricSink, MetricDrain) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MetricSink { tx }, MetricDrain { rx })
}

impl MetricSink {
    /// Emits a gauge. Samples whose label values do not match the descriptor
    /// are dropped with a warning.
    pub fn gauge(&self, desc: &MetricDesc, value: f64, label_values: &[&str]) {
        match MetricSample::gauge(desc, value, label_values) {
            Ok(sample) => self.emit(sample),
            Err(e) => tracing::warn!(metric = desc.name, error = %e, "Dropping malformed sample"),
        }
    }

    pub fn emit(&self, sample: MetricSample) {
        if self.tx.send(sample).is_err() {
            tracing::debug!("Metric drain closed, sample discarded");
        }
    }
}

impl MetricDrain {
    /// Takes every sample emitted so far.
    pub fn drain(&mut self) -> Vec<MetricSample> {
        let mut samples = Vec::new();
        while let Ok(sample) = self.rx.try_recv() {
            samples.push(sample);
        }
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UP: MetricDesc = MetricDesc::new("up", "up", &["project"]);

    #[test]
    fn clones_feed_one_drain() {
        let (sink, mut drain) = channel();
        let other = sink.clone();

        sink.gauge(&UP, 1.0, &["a"]);
        other.gauge(&UP, 0.0, &["b"]);

        let samples = drain.drain();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].label("project"), Some("b"));
        assert!(drain.drain().is_empty());
    }

    #[test]
    fn malformed_sample_is_dropped() {
        let (sink, mut drain) = channel();
        sink.gauge(&UP, 1.0, &["a", "extra"]);
        assert!(drain.drain().is_empty());
    }
}
