//! GA4 Data API request and response models.

use serde::{Deserialize, Serialize};

/// Body for `properties/{id}:batchRunReports`.
#[derive(Debug, Serialize)]
pub struct BatchRunReportsRequest {
    pub requests: Vec<RunReportRequest>,
}

/// Body for `properties/{id}:runReport`, and one entry of a batch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportRequest {
    pub date_ranges: Vec<DateRange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dimensions: Vec<Named>,
    pub metrics: Vec<Named>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_bys: Vec<OrderBy>,
}

impl RunReportRequest {
    /// activeUsers and sessions over the given ranges.
    pub fn traffic(date_ranges: Vec<DateRange>) -> Self {
        Self {
            date_ranges,
            dimensions: Vec::new(),
            metrics: vec![Named::new("activeUsers"), Named::new("sessions")],
            order_bys: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: &'static str,
    pub end_date: &'static str,
}

impl DateRange {
    pub const fn new(start_date: &'static str, end_date: &'static str) -> Self {
        Self {
            start_date,
            end_date,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Named {
    pub name: &'static str,
}

impl Named {
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderBy {
    pub dimension: DimensionOrder,
    pub desc: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionOrder {
    pub dimension_name: &'static str,
}

/// Response from `batchRunReports`.
#[derive(Debug, Default, Deserialize)]
pub struct BatchRunReportsResponse {
    #[serde(default)]
    pub reports: Vec<RunReportResponse>,
}

/// Response from `runReport`.
#[derive(Debug, Default, Deserialize)]
pub struct RunReportResponse {
    #[serde(default)]
    pub rows: Vec<ReportRow>,
    // Note: dimensionHeaders, metricHeaders and rowCount exist but rows are
    // read positionally
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    #[serde(default)]
    pub dimension_values: Vec<ReportValue>,
    #[serde(default)]
    pub metric_values: Vec<ReportValue>,
}

impl ReportRow {
    pub fn dimension(&self, index: usize) -> Option<&str> {
        self.dimension_values.get(index).map(|v| v.value.as_str())
    }

    /// Integer metric at `index`. Missing or unparseable values read as zero.
    pub fn metric(&self, index: usize) -> f64 {
        self.metric_values
            .get(index)
            .and_then(|v| v.value.trim().parse::<i64>().ok())
            .unwrap_or(0) as f64
    }
}

/// GA4 sends every dimension and metric value as a string.
#[derive(Debug, Default, Deserialize)]
pub struct ReportValue {
    #[serde(default)]
    pub value: String,
}
