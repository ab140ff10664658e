// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-night accommodation and meal configuration, keyed by night key
/// (e.g. "night_01"). Administrator-edited server-side; read-only locally.
pub type EventConfig = BTreeMap<String, NightConfig>;

/// Hotel or camping availability and cost for one night.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LodgingOption {
    pub available: bool,
    pub cost: f64,
}

/// Meal availability and cost for one night.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MealOption {
    pub available: bool,
    pub cost: f64,
}

/// An optional paid activity offered on a given night.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub name: String,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NightConfig {
    pub date: Option<NaiveDate>,
    pub location: Option<String>,
    pub hotel: LodgingOption,
    pub camping: LodgingOption,
    pub dinner: MealOption,
    pub breakfast: MealOption,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl NightConfig {
    pub fn location_display(&self) -> String {
        self.location.clone().unwrap_or_else(|| "-".to_string())
    }
}

// Raw backend shapes for the nights document

#[derive(Debug, Clone, Deserialize)]
pub struct NightsResponse {
    #[serde(default)]
    pub nights: BTreeMap<String, NightRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NightRecord {
    pub date: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "hotelAvailable")]
    pub hotel_available: Option<bool>,
    #[serde(rename = "hotelCost")]
    pub hotel_cost: Option<f64>,
    #[serde(rename = "campingAvailable")]
    pub camping_available: Option<bool>,
    #[serde(rename = "campingCost")]
    pub camping_cost: Option<f64>,
    #[serde(rename = "dinnerAvailable")]
    pub dinner_available: Option<bool>,
    #[serde(rename = "dinnerCost")]
    pub dinner_cost: Option<f64>,
    #[serde(rename = "breakfastAvailable")]
    pub breakfast_available: Option<bool>,
    #[serde(rename = "breakfastCost")]
    pub breakfast_cost: Option<f64>,
    #[serde(default)]
    pub activities: Vec<ActivityRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityRecord {
    pub name: Option<String>,
    pub cost: Option<f64>,
}

impl NightRecord {
    /// Convert the raw backend record into a total config entry.
    /// Absent options become unavailable with zero cost.
    pub fn to_night_config(&self) -> NightConfig {
        NightConfig {
            date: self
                .date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
            location: self.location.clone(),
            hotel: LodgingOption {
                available: self.hotel_available.unwrap_or(false),
                cost: self.hotel_cost.unwrap_or(0.0),
            },
            camping: LodgingOption {
                available: self.camping_available.unwrap_or(false),
                cost: self.camping_cost.unwrap_or(0.0),
            },
            dinner: MealOption {
                available: self.dinner_available.unwrap_or(false),
                cost: self.dinner_cost.unwrap_or(0.0),
            },
            breakfast: MealOption {
                available: self.breakfast_available.unwrap_or(false),
                cost: self.breakfast_cost.unwrap_or(0.0),
            },
            activities: self
                .activities
                .iter()
                .filter_map(|a| {
                    a.name.as_ref().map(|name| Activity {
                        name: name.clone(),
                        cost: a.cost.unwrap_or(0.0),
                    })
                })
                .collect(),
        }
    }
}

impl NightsResponse {
    pub fn to_event_config(&self) -> EventConfig {
        self.nights
            .iter()
            .map(|(key, record)| (key.clone(), record.to_night_config()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_night_config_defaults() {
        let record: NightRecord = serde_json::from_str(r#"{"location": "Passo Stelvio"}"#)
            .expect("Failed to parse night record JSON");
        let config = record.to_night_config();
        assert_eq!(config.location_display(), "Passo Stelvio");
        assert!(!config.hotel.available);
        assert_eq!(config.hotel.cost, 0.0);
        assert!(config.activities.is_empty());
        assert!(config.date.is_none());
    }

    #[test]
    fn test_to_event_config_keeps_night_keys() {
        let response: NightsResponse = serde_json::from_str(
            r#"{
                "nights": {
                    "night_02": {"hotelAvailable": true, "hotelCost": 45.0},
                    "night_01": {"date": "2026-06-12", "campingAvailable": true}
                }
            }"#,
        )
        .expect("Failed to parse nights response JSON");

        let config = response.to_event_config();
        let keys: Vec<&str> = config.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["night_01", "night_02"]);
        assert!(config["night_01"].camping.available);
        assert_eq!(
            config["night_01"].date,
            NaiveDate::from_ymd_opt(2026, 6, 12)
        );
        assert_eq!(config["night_02"].hotel.cost, 45.0);
    }

    #[test]
    fn test_activities_without_name_are_skipped() {
        let record: NightRecord = serde_json::from_str(
            r#"{"activities": [{"cost": 20.0}, {"name": "Rafting", "cost": 55.0}]}"#,
        )
        .expect("Failed to parse night record JSON");
        let config = record.to_night_config();
        assert_eq!(config.activities.len(), 1);
        assert_eq!(config.activities[0].name, "Rafting");
    }
}
