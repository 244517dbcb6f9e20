pub mod types;

pub use types::{MetricDesc, MetricError, MetricKind, MetricSample};
