//! Normalized metric model shared by every provider.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Changes within this band either side of zero count as flat.
pub const NEUTRAL_CHANGE_THRESHOLD: f64 = 0.1;

/// Semantic type of a metric, used by consumers to pick a formatter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Currency,
    Count,
    Percentage,
    Duration,
    Text,
}

impl MetricType {
    /// Parses a user-entered type label, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "currency" => Some(Self::Currency),
            "count" => Some(Self::Count),
            "percentage" => Some(Self::Percentage),
            "duration" => Some(Self::Duration),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

/// Direction of a period-over-period change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDirection {
    Up,
    Down,
    Neutral,
}

impl ChangeDirection {
    /// Derives the direction from a signed change.
    ///
    /// ```
    /// use metricsdeck_providers::ChangeDirection;
    ///
    /// assert_eq!(ChangeDirection::from_change(20.0), ChangeDirection::Up);
    /// assert_eq!(ChangeDirection::from_change(-0.5), ChangeDirection::Down);
    /// assert_eq!(ChangeDirection::from_change(0.05), ChangeDirection::Neutral);
    /// ```
    pub fn from_change(change: f64) -> Self {
        if change > NEUTRAL_CHANGE_THRESHOLD {
            Self::Up
        } else if change < -NEUTRAL_CHANGE_THRESHOLD {
            Self::Down
        } else {
            Self::Neutral
        }
    }
}

/// A metric reading: either a number or free text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricData {
    Number(f64),
    Text(String),
}

impl MetricData {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<f64> for MetricData {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for MetricData {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<usize> for MetricData {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<String> for MetricData {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MetricData {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// A named measurement with its type, label and optional change.
///
/// `change_direction` is only ever set through [`MetricValue::with_change`],
/// which keeps it consistent with the sign of `change`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub value: MetricData,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_direction: Option<ChangeDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl MetricValue {
    pub fn new(value: impl Into<MetricData>, metric_type: MetricType, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            metric_type,
            label: label.into(),
            change: None,
            change_direction: None,
            unit: None,
        }
    }

    pub fn count(value: impl Into<MetricData>, label: impl Into<String>) -> Self {
        Self::new(value, MetricType::Count, label)
    }

    pub fn currency(value: f64, label: impl Into<String>) -> Self {
        Self::new(value, MetricType::Currency, label)
    }

    pub fn percentage(value: f64, label: impl Into<String>) -> Self {
        Self::new(value, MetricType::Percentage, label)
    }

    pub fn duration(value: f64, label: impl Into<String>) -> Self {
        Self::new(value, MetricType::Duration, label)
    }

    pub fn text(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(MetricData::Text(value.into()), MetricType::Text, label)
    }

    /// Attaches a signed period-over-period change and its direction.
    pub fn with_change(mut self, change: f64) -> Self {
        self.change = Some(change);
        self.change_direction = Some(ChangeDirection::from_change(change));
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// A normalized snapshot produced by one provider fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetrics {
    pub provider_id: String,
    /// Logical moment the snapshot represents.
    pub timestamp: DateTime<Utc>,
    pub metrics: BTreeMap<String, MetricValue>,
    /// Pass-through payload (e.g. CRM deals) never interpreted by the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ProviderMetrics {
    pub fn new(provider_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            provider_id: provider_id.into(),
            timestamp,
            metrics: BTreeMap::new(),
            metadata: None,
        }
    }

    /// Inserts a metric, replacing any existing value under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: MetricValue) -> &mut Self {
        self.metrics.insert(key.into(), value);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }
}

/// Period-over-period change as a percentage of the previous value.
///
/// A zero previous value yields zero rather than a division error.
///
/// ```
/// use metricsdeck_providers::percent_change;
///
/// assert_eq!(percent_change(120.0, 100.0), 20.0);
/// assert_eq!(percent_change(50.0, 0.0), 0.0);
/// ```
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}
