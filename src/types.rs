use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Raw event fragment as handed over by a site scraper.
/// Nothing in here is trusted; only a non-empty `title` is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEventFragment {
    pub title: String,
    pub date_text: String,
    pub time_text: String,
    pub description: String,
    pub location_text: String,
    pub image_url: String,
    pub source_url: String,
    pub price_text: String,
}

impl RawEventFragment {
    pub fn new(title: impl Into<String>, date_text: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            date_text: date_text.into(),
            ..Default::default()
        }
    }

    pub fn with_time(mut self, time_text: impl Into<String>) -> Self {
        self.time_text = time_text.into();
        self
    }

    pub fn with_location(mut self, location_text: impl Into<String>) -> Self {
        self.location_text = location_text.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Venue reference data. Looked up or defaulted, never mutated by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Venue {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub coordinates: Coordinates,
}

/// Validated, store-ready event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalEvent {
    /// Identity digest over venue name, title and start day
    pub id: String,
    pub title: String,
    pub description: String,
    pub categories: BTreeSet<String>,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    pub venue: Venue,
    pub image_url: Option<String>,
    pub official_website: String,
    pub source_url: String,
    pub price: Option<String>,
    pub last_updated: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fragment_tolerates_missing_fields() {
        let fragment: RawEventFragment = serde_json::from_value(json!({
            "title": "Farmers Market",
            "dateText": "July 4, 2025"
        }))
        .unwrap();

        assert_eq!(fragment.title, "Farmers Market");
        assert_eq!(fragment.date_text, "July 4, 2025");
        assert!(fragment.location_text.is_empty());
        assert!(fragment.price_text.is_empty());
    }

    #[test]
    fn test_venue_uses_document_field_names() {
        let venue = Venue {
            name: "Celebration Square".to_string(),
            postal_code: "L5B 3C1".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&venue).unwrap();
        assert_eq!(value["postalCode"], "L5B 3C1");
        assert_eq!(value["coordinates"]["latitude"], 0.0);
    }
}
