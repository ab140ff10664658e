//! Offline data synchronization.
//!
//! The synchronizer mirrors a fixed, enumerated set of backend datasets
//! into the local cache store. Each dataset has its own routine; all
//! routines of a sync pass start together and run to completion
//! independently, so one failed fetch never cancels or invalidates the
//! others. The [`engine::SyncEngine`] decides when passes run.

pub mod engine;

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::cache::CacheStore;
use crate::models::{
    self, Announcement, EventConfig, NightSelection, Rider, RiderDocuments, UserSelections,
};

pub use engine::{SyncEngine, SyncSnapshot};

/// Backend contract for the mirrored datasets.
///
/// `ApiClient` is the production implementation; tests substitute an
/// in-memory fake with failure injection.
pub trait Backend: Send + Sync + 'static {
    fn fetch_riders(&self, tour_id: &str)
        -> impl Future<Output = Result<Vec<Rider>>> + Send;

    fn fetch_rider(
        &self,
        tour_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<Rider>>> + Send;

    fn fetch_night_config(
        &self,
        tour_id: &str,
    ) -> impl Future<Output = Result<EventConfig>> + Send;

    fn fetch_selections(
        &self,
        tour_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<UserSelections>> + Send;

    fn update_night_selection(
        &self,
        tour_id: &str,
        user_id: &str,
        night_key: &str,
        selection: &NightSelection,
    ) -> impl Future<Output = Result<()>> + Send;

    fn fetch_announcements(
        &self,
        tour_id: &str,
    ) -> impl Future<Output = Result<Vec<Announcement>>> + Send;

    fn fetch_documents(
        &self,
        tour_id: &str,
        user_id: &str,
    ) -> impl Future<Output = Result<RiderDocuments>> + Send;
}

impl Backend for ApiClient {
    async fn fetch_riders(&self, tour_id: &str) -> Result<Vec<Rider>> {
        ApiClient::fetch_riders(self, tour_id).await
    }

    async fn fetch_rider(&self, tour_id: &str, user_id: &str) -> Result<Option<Rider>> {
        ApiClient::fetch_rider(self, tour_id, user_id).await
    }

    async fn fetch_night_config(&self, tour_id: &str) -> Result<EventConfig> {
        ApiClient::fetch_night_config(self, tour_id).await
    }

    async fn fetch_selections(&self, tour_id: &str, user_id: &str) -> Result<UserSelections> {
        ApiClient::fetch_selections(self, tour_id, user_id).await
    }

    async fn update_night_selection(
        &self,
        tour_id: &str,
        user_id: &str,
        night_key: &str,
        selection: &NightSelection,
    ) -> Result<()> {
        ApiClient::update_night_selection(self, tour_id, user_id, night_key, selection).await
    }

    async fn fetch_announcements(&self, tour_id: &str) -> Result<Vec<Announcement>> {
        ApiClient::fetch_announcements(self, tour_id).await
    }

    async fn fetch_documents(&self, tour_id: &str, user_id: &str) -> Result<RiderDocuments> {
        ApiClient::fetch_documents(self, tour_id, user_id).await
    }
}

/// Result of one sync pass across all datasets.
#[derive(Debug, Default)]
pub struct PassSummary {
    pub succeeded: usize,
    pub failed: Vec<&'static str>,
}

impl PassSummary {
    fn record(&mut self, dataset: &'static str, result: Result<()>) {
        match result {
            Ok(()) => {
                debug!(dataset, "Dataset synced");
                self.succeeded += 1;
            }
            Err(e) => {
                warn!(dataset, error = %e, "Dataset sync failed, keeping previous snapshot");
                self.failed.push(dataset);
            }
        }
    }

    /// Every routine failed - the backend is effectively unreachable.
    pub fn all_failed(&self) -> bool {
        self.succeeded == 0 && !self.failed.is_empty()
    }
}

/// One fetch-and-overwrite routine per dataset.
pub struct Synchronizer<B> {
    backend: B,
    store: Arc<CacheStore>,
}

impl<B: Backend> Synchronizer<B> {
    pub fn new(backend: B, store: Arc<CacheStore>) -> Self {
        Self { backend, store }
    }

    async fn sync_roster(&self, tour_id: &str) -> Result<()> {
        let roster = self.backend.fetch_riders(tour_id).await?;
        self.store.save_roster(&roster)
    }

    async fn sync_event_config(&self, tour_id: &str) -> Result<()> {
        let config = self.backend.fetch_night_config(tour_id).await?;
        self.store.save_event_config(&config)
    }

    async fn sync_selections(&self, tour_id: &str, user_id: &str) -> Result<()> {
        let selections = self.backend.fetch_selections(tour_id, user_id).await?;
        self.store.save_user_selections(&selections)
    }

    /// Point query by user id; a rider record that does not exist keeps the
    /// previous profile snapshot (the roster entry may lag registration).
    async fn sync_profile(&self, tour_id: &str, user_id: &str) -> Result<()> {
        match self.backend.fetch_rider(tour_id, user_id).await? {
            Some(profile) => self.store.save_user_profile(&profile),
            None => {
                debug!(user_id, "No profile record on backend");
                Ok(())
            }
        }
    }

    async fn sync_announcements(&self, tour_id: &str) -> Result<()> {
        let mut announcements = self.backend.fetch_announcements(tour_id).await?;
        models::sort_by_recency(&mut announcements);
        self.store.save_announcements(&announcements)
    }

    async fn sync_documents(&self, tour_id: &str, user_id: &str) -> Result<()> {
        let documents = self.backend.fetch_documents(tour_id, user_id).await?;
        self.store.save_rider_documents(&documents)
    }

    /// Run every dataset routine concurrently and report per-dataset
    /// outcomes. Failures are isolated: each failed dataset simply keeps
    /// its previous snapshot for this pass.
    pub async fn run_pass(&self, tour_id: &str, user_id: &str) -> PassSummary {
        let (roster, config, selections, profile, announcements, documents) = tokio::join!(
            self.sync_roster(tour_id),
            self.sync_event_config(tour_id),
            self.sync_selections(tour_id, user_id),
            self.sync_profile(tour_id, user_id),
            self.sync_announcements(tour_id),
            self.sync_documents(tour_id, user_id),
        );

        let mut summary = PassSummary::default();
        summary.record("roster", roster);
        summary.record("event_config", config);
        summary.record("user_selections", selections);
        summary.record("user_profile", profile);
        summary.record("announcements", announcements);
        summary.record("rider_documents", documents);
        summary
    }

    /// Write one night's selection to the backend, then re-fetch the whole
    /// selections document into the cache. No local merge.
    pub async fn write_selection(
        &self,
        tour_id: &str,
        user_id: &str,
        night_key: &str,
        selection: &NightSelection,
    ) -> Result<()> {
        self.backend
            .update_night_selection(tour_id, user_id, night_key, selection)
            .await?;
        self.sync_selections(tour_id, user_id).await
    }
}
