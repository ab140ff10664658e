// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

use crate::utils::format_phone;

/// Emergency contact for a rider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: Option<String>,
}

/// A tour participant as cached locally.
///
/// The backend is the source of truth; this copy is fully replaced on each
/// sync and never mutated locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rider {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub nickname: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub motorcycle: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
    #[serde(default)]
    pub skills: Vec<String>,
}

impl Rider {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn display_name(&self) -> String {
        match self.nickname {
            Some(ref nick) if !nick.is_empty() => {
                format!("{} \"{}\" {}", self.first_name, nick, self.last_name)
            }
            _ => self.full_name(),
        }
    }

    pub fn phone_display(&self) -> Option<String> {
        self.phone.as_deref().map(format_phone)
    }

    pub fn motorcycle_display(&self) -> String {
        self.motorcycle.clone().unwrap_or_else(|| "-".to_string())
    }
}

/// Raw rider document shape as returned by the backend.
///
/// Fields arrive loosely validated; conversion to [`Rider`] applies defaults
/// in one place so call sites never handle absent fields themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiderRecord {
    pub id: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    #[serde(rename = "lastName")]
    pub last_name: Option<String>,
    #[serde(rename = "nickName", alias = "nickname")]
    pub nickname: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "photoUrl")]
    pub photo_url: Option<String>,
    pub motorcycle: Option<String>,
    #[serde(rename = "emergencyContactName")]
    pub emergency_contact_name: Option<String>,
    #[serde(rename = "emergencyContactPhone")]
    pub emergency_contact_phone: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
}

impl RiderRecord {
    /// Convert the raw backend record into a total domain entity.
    pub fn to_rider(&self) -> Rider {
        let emergency_contact = self
            .emergency_contact_name
            .as_ref()
            .filter(|n| !n.trim().is_empty())
            .map(|name| EmergencyContact {
                name: name.clone(),
                phone: self.emergency_contact_phone.clone(),
            });

        Rider {
            id: self.id.clone().unwrap_or_default(),
            first_name: self.first_name.clone().unwrap_or_default(),
            last_name: self.last_name.clone().unwrap_or_default(),
            nickname: self.nickname.clone().filter(|n| !n.is_empty()),
            phone: self.phone.clone(),
            email: self.email.clone(),
            photo_url: self.photo_url.clone(),
            motorcycle: self.motorcycle.clone(),
            emergency_contact,
            skills: self.skills.clone(),
        }
    }
}
