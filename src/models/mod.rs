//! Data models for tour entities.
//!
//! This module contains all the data structures mirrored from the backend
//! into the local cache:
//!
//! - `Rider`: tour participants with contact and motorcycle info
//! - `EventConfig` / `NightConfig`: per-night accommodation and meal options
//! - `UserSelections` / `NightSelection`: the user's per-night choices
//! - `Announcement`: tour announcements with priority and recency ordering
//! - `RiderDocuments`: uploaded document metadata keyed by kind
//!
//! Each entity has a raw `*Record` counterpart matching the loosely-typed
//! backend shape; conversion applies defaults at the sync boundary.

pub mod announcement;
pub mod document;
pub mod event;
pub mod rider;
pub mod selection;

pub use announcement::{sort_by_recency, Announcement, AnnouncementRecord, Priority};
pub use document::{DocumentKind, DocumentUpload, DocumentsRecord, RiderDocuments};
pub use event::{Activity, EventConfig, LodgingOption, MealOption, NightConfig, NightsResponse};
pub use rider::{EmergencyContact, Rider, RiderRecord};
pub use selection::{Accommodation, NightSelection, SelectionsRecord, UserSelections};
