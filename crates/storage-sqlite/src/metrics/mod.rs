mod model;
mod repository;

pub use model::{FetchLogDB, MetricsSnapshotDB, ProviderConfigDB};
pub use repository::MetricsRepository;
