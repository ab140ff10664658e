//! tourcache - offline-first cache and sync client for motorcycle tour data.
//!
//! Keeps a local snapshot of a tour's roster, per-night event configuration,
//! the rider's own selections and documents, and announcements, refreshed
//! from the backend whenever the device is online and the cache has gone
//! stale. Every read is served from the cache so the data is usable with no
//! connectivity at all.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod net;
pub mod sync;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use cache::{CacheStore, SyncMeta};
pub use config::Config;
pub use net::ConnectivityObserver;
pub use sync::{SyncEngine, SyncSnapshot, Synchronizer};
