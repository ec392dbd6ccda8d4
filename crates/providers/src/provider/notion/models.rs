//! Notion API response models.
//!
//! Property values are modelled only for the property types the metrics
//! database uses; every other type deserializes to [`NotionProperty::Other`].

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Body for `POST /databases/{id}/query`.
#[derive(Debug, Serialize)]
pub struct NotionQueryRequest {
    pub sorts: Vec<NotionSort>,
    pub page_size: u32,
}

#[derive(Debug, Serialize)]
pub struct NotionSort {
    pub timestamp: &'static str,
    pub direction: &'static str,
}

impl NotionQueryRequest {
    /// Newest pages first.
    pub fn newest_first(page_size: u32) -> Self {
        Self {
            sorts: vec![NotionSort {
                timestamp: "created_time",
                direction: "descending",
            }],
            page_size,
        }
    }
}

/// Response from the database query endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct NotionQueryResponse {
    #[serde(default)]
    pub results: Vec<NotionResult>,
    #[serde(default)]
    pub has_more: bool,
}

/// One query result: a page, or the raw JSON of a result that is not one.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum NotionResult {
    Page(NotionPage),
    Malformed(Value),
}

/// A database row.
#[derive(Debug, Deserialize)]
pub struct NotionPage {
    pub id: String,
    pub created_time: DateTime<Utc>,
    pub properties: NotionProperties,
}

/// Page properties keyed by column name, in the order the API sent them.
#[derive(Debug, Default)]
pub struct NotionProperties(Vec<(String, NotionProperty)>);

impl NotionProperties {
    pub fn get(&self, name: &str) -> Option<&NotionProperty> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, p)| p)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn values(&self) -> impl Iterator<Item = &NotionProperty> {
        self.0.iter().map(|(_, p)| p)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }
}

impl<'de> Deserialize<'de> for NotionProperties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PropertiesVisitor;

        impl<'de> Visitor<'de> for PropertiesVisitor {
            type Value = NotionProperties;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of Notion page properties")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, NotionProperty>()? {
                    entries.push(entry);
                }
                Ok(NotionProperties(entries))
            }
        }

        deserializer.deserialize_map(PropertiesVisitor)
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotionProperty {
    Title {
        #[serde(default)]
        title: Vec<RichText>,
    },
    RichText {
        #[serde(default)]
        rich_text: Vec<RichText>,
    },
    Number {
        number: Option<f64>,
    },
    Select {
        select: Option<SelectOption>,
    },
    Date {
        date: Option<DateValue>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectOption {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DateValue {
    pub start: String,
}

impl NotionProperty {
    pub fn is_title(&self) -> bool {
        matches!(self, Self::Title { .. })
    }

    pub fn is_rich_text(&self) -> bool {
        matches!(self, Self::RichText { .. })
    }

    /// Concatenated plain text of a title or rich-text property.
    pub fn plain_text(&self) -> Option<String> {
        let parts = match self {
            Self::Title { title } => title,
            Self::RichText { rich_text } => rich_text,
            _ => return None,
        };
        let text: String = parts.iter().map(|t| t.plain_text.as_str()).collect();
        (!text.is_empty()).then_some(text)
    }

    /// First segment of a title property.
    pub fn title_text(&self) -> Option<&str> {
        match self {
            Self::Title { title } => title
                .first()
                .map(|t| t.plain_text.as_str())
                .filter(|t| !t.is_empty()),
            _ => None,
        }
    }

    pub fn number(&self) -> Option<f64> {
        match self {
            Self::Number { number } => *number,
            _ => None,
        }
    }

    pub fn select_name(&self) -> Option<&str> {
        match self {
            Self::Select {
                select: Some(option),
            } => Some(option.name.as_str()),
            _ => None,
        }
    }

    /// Start of a date property. Date-only values are read as midnight UTC.
    pub fn date_start(&self) -> Option<DateTime<Utc>> {
        let start = match self {
            Self::Date { date: Some(date) } => date.start.as_str(),
            _ => return None,
        };

        if let Ok(datetime) = DateTime::parse_from_rfc3339(start) {
            return Some(datetime.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(start, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc())
    }
}
