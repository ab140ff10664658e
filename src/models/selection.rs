// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Accommodation choice for one night.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accommodation {
    Hotel,
    Camping,
}

impl std::fmt::Display for Accommodation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Accommodation::Hotel => write!(f, "Hotel"),
            Accommodation::Camping => write!(f, "Camping"),
        }
    }
}

/// The authenticated user's choices for a single night.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NightSelection {
    pub accommodation: Option<Accommodation>,
    #[serde(default)]
    pub dinner: bool,
    #[serde(default)]
    pub breakfast: bool,
    pub roommate_preference: Option<String>,
    #[serde(default)]
    pub activities: Vec<String>,
}

impl NightSelection {
    pub fn accommodation_display(&self) -> String {
        match self.accommodation {
            Some(a) => a.to_string(),
            None => "own arrangement".to_string(),
        }
    }
}

/// The user's per-night selections document.
///
/// The one bidirectional dataset: reads come from sync; writes go to the
/// backend as a single-night partial update, after which the whole document
/// is re-fetched into the cache. Local state is never merged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UserSelections {
    pub user_id: String,
    #[serde(default)]
    pub nights: BTreeMap<String, NightSelection>,
}

// Raw backend shapes for the selections document

#[derive(Debug, Clone, Deserialize)]
pub struct SelectionsRecord {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub nights: BTreeMap<String, NightSelectionRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NightSelectionRecord {
    pub accommodation: Option<String>,
    pub dinner: Option<bool>,
    pub breakfast: Option<bool>,
    #[serde(rename = "roommatePreference")]
    pub roommate_preference: Option<String>,
    #[serde(default)]
    pub activities: Vec<String>,
}

impl NightSelectionRecord {
    pub fn to_night_selection(&self) -> NightSelection {
        let accommodation = match self.accommodation.as_deref() {
            Some("hotel") => Some(Accommodation::Hotel),
            Some("camping") => Some(Accommodation::Camping),
            _ => None,
        };

        NightSelection {
            accommodation,
            dinner: self.dinner.unwrap_or(false),
            breakfast: self.breakfast.unwrap_or(false),
            roommate_preference: self.roommate_preference.clone().filter(|r| !r.is_empty()),
            activities: self.activities.clone(),
        }
    }
}

impl SelectionsRecord {
    pub fn to_user_selections(&self, fallback_user_id: &str) -> UserSelections {
        UserSelections {
            user_id: self
                .user_id
                .clone()
                .unwrap_or_else(|| fallback_user_id.to_string()),
            nights: self
                .nights
                .iter()
                .map(|(key, record)| (key.clone(), record.to_night_selection()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_accommodation_means_own_arrangement() {
        let record: NightSelectionRecord =
            serde_json::from_str(r#"{"accommodation": "hammock"}"#)
                .expect("Failed to parse selection record JSON");
        let selection = record.to_night_selection();
        assert!(selection.accommodation.is_none());
        assert_eq!(selection.accommodation_display(), "own arrangement");
    }

    #[test]
    fn test_to_user_selections_fallback_user_id() {
        let record: SelectionsRecord = serde_json::from_str(
            r#"{"nights": {"night_01": {"accommodation": "hotel", "dinner": true}}}"#,
        )
        .expect("Failed to parse selections record JSON");
        let selections = record.to_user_selections("u7");
        assert_eq!(selections.user_id, "u7");
        let night = &selections.nights["night_01"];
        assert_eq!(night.accommodation, Some(Accommodation::Hotel));
        assert!(night.dinner);
        assert!(!night.breakfast);
    }
}
