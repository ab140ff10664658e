use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

use crate::models::{Announcement, EventConfig, Rider, RiderDocuments, UserSelections};

/// Consider the cache stale five minutes after the last successful sync.
/// All datasets share this one clock; there is no per-dataset staleness.
const SYNC_STALE_MINUTES: i64 = 5;

// Fixed storage keys, one per mirrored dataset.
pub const KEY_ROSTER: &str = "roster";
pub const KEY_EVENT_CONFIG: &str = "event_config";
pub const KEY_USER_SELECTIONS: &str = "user_selections";
pub const KEY_USER_PROFILE: &str = "user_profile";
pub const KEY_ANNOUNCEMENTS: &str = "announcements";
pub const KEY_RIDER_DOCUMENTS: &str = "rider_documents";
pub const KEY_META: &str = "meta";

/// Every key the store manages, in the order they are scrubbed on sign-out.
pub const ALL_KEYS: [&str; 7] = [
    KEY_ROSTER,
    KEY_EVENT_CONFIG,
    KEY_USER_SELECTIONS,
    KEY_USER_PROFILE,
    KEY_ANNOUNCEMENTS,
    KEY_RIDER_DOCUMENTS,
    KEY_META,
];

/// Singleton sync metadata record. The sole state consulted by the
/// staleness gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncMeta {
    pub last_sync_at: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub push_token: Option<String>,
}

impl SyncMeta {
    /// True when a non-forced sync should run. No sync yet means stale.
    pub fn is_stale(&self) -> bool {
        match self.last_sync_at {
            Some(at) => (Utc::now() - at).num_minutes() >= SYNC_STALE_MINUTES,
            None => true,
        }
    }

    pub fn age_display(&self) -> String {
        let Some(at) = self.last_sync_at else {
            return "never".to_string();
        };
        let minutes = (Utc::now() - at).num_minutes();
        if minutes < 1 {
            // Covers clock skew too
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            if minutes % 60 >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            if (minutes % 1440) / 60 >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Durable on-device key-value store: one JSON file per dataset key under
/// the per-tour cache directory. Values are complete-replacement snapshots;
/// the store never merges.
pub struct CacheStore {
    cache_dir: PathBuf,
}

impl CacheStore {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", key))
    }

    /// Read a value. Any failure (missing file, unreadable file, parse
    /// error) is a cache miss, logged but never an error to the caller.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.key_path(key);
        if !path.exists() {
            return None;
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(key = key, error = %e, "Failed to read cache file, treating as miss");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = key, error = %e, "Failed to parse cache file, treating as miss");
                None
            }
        }
    }

    /// Write a value, replacing whatever snapshot was there. Failures
    /// propagate so the caller can decide what to do with them.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let path = self.key_path(key);
        let contents = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write cache file: {}", key))?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<()> {
        let path = self.key_path(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to delete cache file: {}", key))?;
        }
        Ok(())
    }

    /// Scrub every dataset, including sync metadata. Used exactly once, on
    /// sign-out.
    pub fn clear_all(&self) -> Result<()> {
        for key in ALL_KEYS {
            self.delete(key)?;
        }
        Ok(())
    }

    // ===== Typed dataset accessors =====

    pub fn load_roster(&self) -> Option<Vec<Rider>> {
        self.load(KEY_ROSTER)
    }

    pub fn save_roster(&self, roster: &[Rider]) -> Result<()> {
        self.save(KEY_ROSTER, &roster)
    }

    pub fn load_event_config(&self) -> Option<EventConfig> {
        self.load(KEY_EVENT_CONFIG)
    }

    pub fn save_event_config(&self, config: &EventConfig) -> Result<()> {
        self.save(KEY_EVENT_CONFIG, config)
    }

    pub fn load_user_selections(&self) -> Option<UserSelections> {
        self.load(KEY_USER_SELECTIONS)
    }

    pub fn save_user_selections(&self, selections: &UserSelections) -> Result<()> {
        self.save(KEY_USER_SELECTIONS, selections)
    }

    pub fn load_user_profile(&self) -> Option<Rider> {
        self.load(KEY_USER_PROFILE)
    }

    pub fn save_user_profile(&self, profile: &Rider) -> Result<()> {
        self.save(KEY_USER_PROFILE, profile)
    }

    pub fn load_announcements(&self) -> Option<Vec<Announcement>> {
        self.load(KEY_ANNOUNCEMENTS)
    }

    pub fn save_announcements(&self, announcements: &[Announcement]) -> Result<()> {
        self.save(KEY_ANNOUNCEMENTS, &announcements)
    }

    pub fn load_rider_documents(&self) -> Option<RiderDocuments> {
        self.load(KEY_RIDER_DOCUMENTS)
    }

    pub fn save_rider_documents(&self, documents: &RiderDocuments) -> Result<()> {
        self.save(KEY_RIDER_DOCUMENTS, documents)
    }

    /// Load sync metadata, defaulting to the never-synced record.
    pub fn load_meta(&self) -> SyncMeta {
        self.load(KEY_META).unwrap_or_default()
    }

    pub fn save_meta(&self, meta: &SyncMeta) -> Result<()> {
        self.save(KEY_META, meta)
    }

    /// Raw bytes of a cache file, for snapshot comparisons.
    pub fn raw_contents(&self, key: &str) -> Option<Vec<u8>> {
        std::fs::read(self.key_path(key)).ok()
    }
}

// ============================================================================
// Tests
// ============================================================================
