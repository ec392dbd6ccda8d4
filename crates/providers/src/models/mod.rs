//! Data models shared across providers.

mod metric;

pub use metric::{
    percent_change, ChangeDirection, MetricData, MetricType, MetricValue, ProviderMetrics,
    NEUTRAL_CHANGE_THRESHOLD,
};

/// Provider identifier (e.g., "attio", "ga4", "notion").
pub type ProviderId = String;
