//! Attio API request and response models.
//!
//! Records are deserialized one at a time from the raw `data` array so that
//! a single malformed record can be skipped without failing the batch.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body for `POST /objects/{slug}/records/query`.
#[derive(Debug, Serialize)]
pub struct AttioQueryRequest {
    pub filter: serde_json::Map<String, Value>,
    pub limit: u32,
    pub offset: u32,
}

impl AttioQueryRequest {
    pub fn all(limit: u32) -> Self {
        Self {
            filter: serde_json::Map::new(),
            limit,
            offset: 0,
        }
    }
}

/// Response wrapper for the records query endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct AttioQueryResponse {
    #[serde(default)]
    pub data: Vec<Value>,
}

/// A single CRM record.
#[derive(Debug, Deserialize)]
pub struct AttioRecord {
    pub id: AttioRecordId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub values: HashMap<String, Vec<AttioAttributeValue>>,
}

#[derive(Debug, Deserialize)]
pub struct AttioRecordId {
    pub record_id: String,
    // Note: workspace_id and object_id exist but are not needed
}

/// One historical value of an attribute. The most recent comes first.
#[derive(Debug, Deserialize)]
pub struct AttioAttributeValue {
    #[serde(default)]
    pub active_from: Option<DateTime<Utc>>,
    /// Plain value for text, number and similar attributes.
    #[serde(default)]
    pub value: Option<Value>,
    /// Status attributes carry their title here.
    #[serde(default)]
    pub status: Option<AttioTitled>,
    /// Select attributes carry their title here.
    #[serde(default)]
    pub option: Option<AttioTitled>,
    /// Currency attributes carry their amount here.
    #[serde(default)]
    pub currency_value: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct AttioTitled {
    pub title: String,
}

impl AttioAttributeValue {
    /// Textual reading of the value, if it has one.
    pub fn as_text(&self) -> Option<&str> {
        let text = match &self.value {
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
        .or_else(|| self.status.as_ref().map(|s| s.title.as_str()))
        .or_else(|| self.option.as_ref().map(|o| o.title.as_str()))?;

        let text = text.trim();
        (!text.is_empty()).then_some(text)
    }

    /// Numeric reading of the value: a bare number, or an object holding
    /// `value`/`currency_value`.
    pub fn as_number(&self) -> Option<f64> {
        let from_value = match &self.value {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::Object(map)) => map
                .get("value")
                .or_else(|| map.get("currency_value"))
                .and_then(Value::as_f64),
            _ => None,
        };
        from_value.or(self.currency_value)
    }
}

/// Pipeline stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PipelineStage {
    #[serde(rename = "Chasing")]
    Chasing,
    #[serde(rename = "Scheduling")]
    Scheduling,
    #[serde(rename = "Intro call")]
    IntroCall,
    #[serde(rename = "Demo")]
    Demo,
    #[serde(rename = "Evaluation")]
    Evaluation,
    #[serde(rename = "Signing")]
    Signing,
    #[serde(rename = "Pilot")]
    Pilot,
    #[serde(rename = "Won")]
    Won,
    #[serde(rename = "26Q1 Follow-up")]
    Q1FollowUp,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 9] = [
        Self::Chasing,
        Self::Scheduling,
        Self::IntroCall,
        Self::Demo,
        Self::Evaluation,
        Self::Signing,
        Self::Pilot,
        Self::Won,
        Self::Q1FollowUp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chasing => "Chasing",
            Self::Scheduling => "Scheduling",
            Self::IntroCall => "Intro call",
            Self::Demo => "Demo",
            Self::Evaluation => "Evaluation",
            Self::Signing => "Signing",
            Self::Pilot => "Pilot",
            Self::Won => "Won",
            Self::Q1FollowUp => "26Q1 Follow-up",
        }
    }

    /// Matches the stage title exactly as Attio reports it.
    pub fn parse(title: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.as_str() == title)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deal parsed out of a CRM record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttioDeal {
    pub record_id: String,
    pub company_name: String,
    pub stage: PipelineStage,
    pub deal_value: Option<f64>,
    #[serde(skip)]
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub stage_changed_at: DateTime<Utc>,
    pub days_in_stage: i64,
    pub web_url: Option<String>,
}
