pub mod api;
pub mod error;
pub mod fanout;
pub mod gcp;
pub mod models;
pub mod resolver;
pub mod retry;
pub mod snapshot;
pub mod token;
pub mod transport;

#[cfg(any(test, feature = "fake"))]
pub mod fake;

pub use api::ComputeApi;
pub use error::{CloudApiError, Result};
pub use fanout::{Inventory, RegionalFetcher, ResourceKind};
pub use gcp::GcpClient;
pub use retry::RetryPolicy;
pub use snapshot::{SnapshotAggregator, SnapshotReport};
pub use token::TokenSource;
pub use transport::RetryingClient;
