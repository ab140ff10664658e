//! Local caching module for offline data access.
//!
//! This module provides the `CacheStore` for persisting tour data locally
//! as one JSON file per dataset key. Every stored value is a
//! complete-replacement snapshot of its backend source as of the last
//! successful sync; datasets fail and refresh independently.
//!
//! Cached datasets:
//! - Roster and the user's own profile
//! - Per-night event configuration
//! - User selections
//! - Announcements
//! - Rider documents
//! - Sync metadata (the staleness clock)

pub mod store;

pub use store::{CacheStore, SyncMeta};
