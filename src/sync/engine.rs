//! Sync orchestration.
//!
//! Two externally visible states: idle-with-cache (the store is served
//! as-is, possibly stale) and syncing (a pass is in flight while the cache
//! keeps being served). A pass runs when a session exists, the device is
//! online, and the shared staleness clock says it is due - or immediately
//! on a forced refresh. A transition back to online while stale re-runs
//! the same path, which is the only dataset-level retry mechanism.
//!
//! Passes are not cancellable; overlapping writes to the same key are
//! last-write-wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::models::{Announcement, EventConfig, NightSelection, Rider, RiderDocuments, UserSelections};

use super::{Backend, Synchronizer};

/// Aggregate read-model handed to UI callers. Built from the store on
/// demand; always available, even offline or mid-sync.
#[derive(Debug, Clone)]
pub struct SyncSnapshot {
    pub roster: Vec<Rider>,
    pub event_config: EventConfig,
    pub user_selections: Option<UserSelections>,
    pub user_profile: Option<Rider>,
    pub announcements: Vec<Announcement>,
    pub rider_documents: RiderDocuments,
    pub syncing: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub is_online: bool,
}

pub struct SyncEngine<B> {
    synchronizer: Synchronizer<B>,
    store: Arc<CacheStore>,
    tour_id: String,
    user_id: Option<String>,
    online_rx: watch::Receiver<bool>,
    syncing: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl<B: Backend> SyncEngine<B> {
    pub fn new(
        backend: B,
        store: Arc<CacheStore>,
        tour_id: String,
        user_id: Option<String>,
        online_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            synchronizer: Synchronizer::new(backend, Arc::clone(&store)),
            store,
            tour_id,
            user_id,
            online_rx,
            syncing: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn is_online(&self) -> bool {
        *self.online_rx.borrow()
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Relaxed)
    }

    /// Read the current cache into an aggregate snapshot.
    pub fn snapshot(&self) -> SyncSnapshot {
        let meta = self.store.load_meta();
        SyncSnapshot {
            roster: self.store.load_roster().unwrap_or_default(),
            event_config: self.store.load_event_config().unwrap_or_default(),
            user_selections: self.store.load_user_selections(),
            user_profile: self.store.load_user_profile(),
            announcements: self.store.load_announcements().unwrap_or_default(),
            rider_documents: self.store.load_rider_documents().unwrap_or_default(),
            syncing: self.is_syncing(),
            last_sync_at: meta.last_sync_at,
            error: self.last_error.lock().expect("error lock poisoned").clone(),
            is_online: self.is_online(),
        }
    }

    /// Run a sync pass if a session exists, the device is online, and the
    /// staleness threshold has elapsed. Returns whether a pass ran.
    pub async fn sync_if_stale(&self) -> Result<bool> {
        if self.user_id.is_none() {
            debug!("No session, not syncing");
            return Ok(false);
        }
        if !self.is_online() {
            debug!("Offline, serving cache only");
            return Ok(false);
        }
        if !self.store.load_meta().is_stale() {
            debug!("Cache is fresh, skipping sync");
            return Ok(false);
        }
        self.sync_pass().await?;
        Ok(true)
    }

    /// Manual refresh: bypasses the staleness gate.
    pub async fn refresh(&self) -> Result<()> {
        self.sync_pass().await
    }

    async fn sync_pass(&self) -> Result<()> {
        let Some(ref user_id) = self.user_id else {
            debug!("No session, not syncing");
            return Ok(());
        };

        info!(tour = %self.tour_id, "Sync pass starting");
        self.syncing.store(true, Ordering::Relaxed);
        let summary = self.synchronizer.run_pass(&self.tour_id, user_id).await;
        self.syncing.store(false, Ordering::Relaxed);

        if summary.all_failed() {
            let message = "Sync failed: backend unreachable".to_string();
            *self.last_error.lock().expect("error lock poisoned") = Some(message.clone());
            return Err(anyhow::anyhow!(message));
        }

        if !summary.failed.is_empty() {
            warn!(failed = ?summary.failed, "Sync pass completed with failures");
        } else {
            info!(datasets = summary.succeeded, "Sync pass complete");
        }

        // Settle advances the shared clock even when some datasets failed;
        // the failed ones keep serving their previous snapshots.
        let mut meta = self.store.load_meta();
        meta.last_sync_at = Some(Utc::now());
        meta.user_id = Some(user_id.clone());
        self.store.save_meta(&meta)?;

        *self.last_error.lock().expect("error lock poisoned") = None;
        Ok(())
    }

    /// Watch connectivity transitions and re-sync when the device comes
    /// back online with a stale cache. Runs until the observer is dropped.
    pub async fn watch_connectivity(self: Arc<Self>) {
        let mut rx = self.online_rx.clone();
        loop {
            // Check the current state first so a transition that landed
            // before this task was polled is not missed.
            let online = *rx.borrow_and_update();
            if online && self.store.load_meta().is_stale() {
                info!("Online with stale cache, syncing");
                if let Err(e) = self.sync_if_stale().await {
                    warn!(error = %e, "Sync on connectivity change failed");
                }
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Push one night's selection to the backend and refresh the cached
    /// selections document from the authoritative copy.
    pub async fn submit_night_selection(
        &self,
        night_key: &str,
        selection: &NightSelection,
    ) -> Result<()> {
        let Some(ref user_id) = self.user_id else {
            anyhow::bail!("Not signed in");
        };
        self.synchronizer
            .write_selection(&self.tour_id, user_id, night_key, selection)
            .await
    }

    /// Remember the device push token in sync metadata.
    pub fn set_push_token(&self, token: Option<String>) -> Result<()> {
        let mut meta = self.store.load_meta();
        meta.push_token = token;
        self.store.save_meta(&meta)
    }

    /// Sign-out: scrub every cached dataset, sync metadata included.
    pub fn sign_out(&self) -> Result<()> {
        info!("Signing out, clearing cache");
        self.store.clear_all()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::{KEY_ANNOUNCEMENTS, KEY_EVENT_CONFIG, KEY_ROSTER};
    use crate::cache::SyncMeta;
    use crate::models::Priority;
    use chrono::Duration;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct FakeBackend {
        riders: Mutex<Vec<Rider>>,
        config: Mutex<EventConfig>,
        selections: Mutex<UserSelections>,
        profile: Mutex<Option<Rider>>,
        announcements: Mutex<Vec<Announcement>>,
        documents: Mutex<RiderDocuments>,
        fail_roster: AtomicBool,
        fail_all: AtomicBool,
        roster_fetches: AtomicUsize,
    }

    impl FakeBackend {
        fn check(&self, dataset_down: bool) -> Result<()> {
            if self.fail_all.load(Ordering::Relaxed) || dataset_down {
                anyhow::bail!("backend down");
            }
            Ok(())
        }
    }

    impl Backend for Arc<FakeBackend> {
        async fn fetch_riders(&self, _tour_id: &str) -> Result<Vec<Rider>> {
            self.roster_fetches.fetch_add(1, Ordering::Relaxed);
            self.check(self.fail_roster.load(Ordering::Relaxed))?;
            Ok(self.riders.lock().expect("lock").clone())
        }

        async fn fetch_rider(&self, _tour_id: &str, _user_id: &str) -> Result<Option<Rider>> {
            self.check(false)?;
            Ok(self.profile.lock().expect("lock").clone())
        }

        async fn fetch_night_config(&self, _tour_id: &str) -> Result<EventConfig> {
            self.check(false)?;
            Ok(self.config.lock().expect("lock").clone())
        }

        async fn fetch_selections(&self, _tour_id: &str, _user_id: &str) -> Result<UserSelections> {
            self.check(false)?;
            Ok(self.selections.lock().expect("lock").clone())
        }

        async fn update_night_selection(
            &self,
            _tour_id: &str,
            _user_id: &str,
            night_key: &str,
            selection: &NightSelection,
        ) -> Result<()> {
            self.check(false)?;
            self.selections
                .lock()
                .expect("lock")
                .nights
                .insert(night_key.to_string(), selection.clone());
            Ok(())
        }

        async fn fetch_announcements(&self, _tour_id: &str) -> Result<Vec<Announcement>> {
            self.check(false)?;
            Ok(self.announcements.lock().expect("lock").clone())
        }

        async fn fetch_documents(&self, _tour_id: &str, _user_id: &str) -> Result<RiderDocuments> {
            self.check(false)?;
            Ok(self.documents.lock().expect("lock").clone())
        }
    }

    fn rider(id: &str) -> Rider {
        Rider {
            id: id.to_string(),
            first_name: "Maja".to_string(),
            last_name: "Lund".to_string(),
            nickname: None,
            phone: None,
            email: None,
            photo_url: None,
            motorcycle: None,
            emergency_contact: None,
            skills: vec![],
        }
    }

    fn announcement(id: &str, priority: Priority, created_at_millis: i64) -> Announcement {
        Announcement {
            id: id.to_string(),
            title: format!("title {}", id),
            body: String::new(),
            priority,
            created_at: DateTime::from_timestamp_millis(created_at_millis).expect("timestamp"),
        }
    }

    fn engine_with(
        backend: Arc<FakeBackend>,
        online: bool,
    ) -> (
        tempfile::TempDir,
        Arc<SyncEngine<Arc<FakeBackend>>>,
        watch::Sender<bool>,
    ) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(CacheStore::new(dir.path().to_path_buf()).expect("store"));
        let (tx, rx) = watch::channel(online);
        let engine = SyncEngine::new(
            backend,
            store,
            "tour1".to_string(),
            Some("u1".to_string()),
            rx,
        );
        (dir, Arc::new(engine), tx)
    }

    #[tokio::test]
    async fn test_full_replacement_and_announcement_reorder() {
        let backend = Arc::new(FakeBackend::default());
        *backend.announcements.lock().expect("lock") = vec![
            announcement("a1", Priority::High, 100),
            announcement("a2", Priority::Normal, 200),
        ];
        let (_dir, engine, _tx) = engine_with(Arc::clone(&backend), true);

        // Seed a stale cache containing only the older announcement
        engine
            .store()
            .save_announcements(&[announcement("a1", Priority::High, 100)])
            .expect("seed");

        engine.refresh().await.expect("refresh");

        let snapshot = engine.snapshot();
        let ids: Vec<&str> = snapshot.announcements.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a2", "a1"]);
        assert!(snapshot.last_sync_at.is_some());
        assert!(snapshot.error.is_none());
    }

    #[tokio::test]
    async fn test_repeated_sync_is_idempotent() {
        let backend = Arc::new(FakeBackend::default());
        *backend.riders.lock().expect("lock") = vec![rider("r1"), rider("r2")];
        *backend.announcements.lock().expect("lock") =
            vec![announcement("a1", Priority::Normal, 100)];
        let (_dir, engine, _tx) = engine_with(backend, true);

        engine.refresh().await.expect("first refresh");
        let roster_before = engine.store().raw_contents(KEY_ROSTER).expect("roster bytes");
        let config_before = engine.store().raw_contents(KEY_EVENT_CONFIG).expect("config bytes");
        let announcements_before = engine
            .store()
            .raw_contents(KEY_ANNOUNCEMENTS)
            .expect("announcement bytes");
        let first_sync = engine.store().load_meta().last_sync_at.expect("first sync at");

        engine.refresh().await.expect("second refresh");
        assert_eq!(engine.store().raw_contents(KEY_ROSTER).expect("bytes"), roster_before);
        assert_eq!(engine.store().raw_contents(KEY_EVENT_CONFIG).expect("bytes"), config_before);
        assert_eq!(
            engine.store().raw_contents(KEY_ANNOUNCEMENTS).expect("bytes"),
            announcements_before
        );
        let second_sync = engine.store().load_meta().last_sync_at.expect("second sync at");
        assert!(second_sync >= first_sync);
    }

    #[tokio::test]
    async fn test_staleness_gate_limits_fetch_waves() {
        let backend = Arc::new(FakeBackend::default());
        let (_dir, engine, _tx) = engine_with(Arc::clone(&backend), true);

        assert!(engine.sync_if_stale().await.expect("first"));
        assert_eq!(backend.roster_fetches.load(Ordering::Relaxed), 1);

        // Within the window: no second wave
        assert!(!engine.sync_if_stale().await.expect("second"));
        assert_eq!(backend.roster_fetches.load(Ordering::Relaxed), 1);

        // Rewind the shared clock past the threshold
        engine
            .store()
            .save_meta(&SyncMeta {
                last_sync_at: Some(Utc::now() - Duration::minutes(6)),
                user_id: Some("u1".to_string()),
                push_token: None,
            })
            .expect("rewind meta");

        assert!(engine.sync_if_stale().await.expect("third"));
        assert_eq!(backend.roster_fetches.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_datasets_fresh() {
        let backend = Arc::new(FakeBackend::default());
        *backend.riders.lock().expect("lock") = vec![rider("r1")];
        let (_dir, engine, _tx) = engine_with(Arc::clone(&backend), true);
        engine.refresh().await.expect("seed refresh");

        // Roster goes down; announcements change
        backend.fail_roster.store(true, Ordering::Relaxed);
        *backend.riders.lock().expect("lock") = vec![rider("r2")];
        *backend.announcements.lock().expect("lock") =
            vec![announcement("a9", Priority::High, 900)];

        engine.refresh().await.expect("partial pass still settles");

        let snapshot = engine.snapshot();
        // Failed dataset keeps its previous snapshot
        assert_eq!(snapshot.roster.len(), 1);
        assert_eq!(snapshot.roster[0].id, "r1");
        // Healthy datasets updated in the same pass
        assert_eq!(snapshot.announcements.len(), 1);
        assert_eq!(snapshot.announcements[0].id, "a9");
        assert!(snapshot.error.is_none());
        assert!(snapshot.last_sync_at.is_some());
    }

    #[tokio::test]
    async fn test_total_failure_reports_error_and_keeps_meta() {
        let backend = Arc::new(FakeBackend::default());
        let (_dir, engine, _tx) = engine_with(Arc::clone(&backend), true);
        engine.refresh().await.expect("seed refresh");
        let meta_before = engine.store().load_meta().last_sync_at;

        backend.fail_all.store(true, Ordering::Relaxed);
        assert!(engine.refresh().await.is_err());

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.last_sync_at, meta_before);
        assert!(snapshot.error.is_some());
        assert!(!snapshot.syncing);
    }

    #[tokio::test]
    async fn test_sign_out_clears_everything() {
        let backend = Arc::new(FakeBackend::default());
        *backend.riders.lock().expect("lock") = vec![rider("r1")];
        let (_dir, engine, _tx) = engine_with(backend, true);
        engine.refresh().await.expect("refresh");

        engine.sign_out().expect("sign out");

        let snapshot = engine.snapshot();
        assert!(snapshot.roster.is_empty());
        assert!(snapshot.user_selections.is_none());
        assert!(snapshot.last_sync_at.is_none());
    }

    #[tokio::test]
    async fn test_offline_at_mount_serves_cache_without_fetching() {
        let backend = Arc::new(FakeBackend::default());
        let (_dir, engine, _tx) = engine_with(Arc::clone(&backend), false);
        engine.store().save_roster(&[rider("r1")]).expect("seed");

        assert!(!engine.sync_if_stale().await.expect("offline sync skipped"));
        assert_eq!(backend.roster_fetches.load(Ordering::Relaxed), 0);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.roster.len(), 1);
        assert!(!snapshot.is_online);
    }

    #[tokio::test]
    async fn test_reconnect_while_stale_triggers_sync() {
        let backend = Arc::new(FakeBackend::default());
        let (_dir, engine, tx) = engine_with(Arc::clone(&backend), false);

        let watcher = tokio::spawn(Arc::clone(&engine).watch_connectivity());
        tx.send(true).expect("go online");

        // Give the watcher a moment to run the pass
        for _ in 0..50 {
            if backend.roster_fetches.load(Ordering::Relaxed) > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(backend.roster_fetches.load(Ordering::Relaxed), 1);

        drop(tx);
        watcher.await.expect("watcher ends when sender drops");
    }

    #[tokio::test]
    async fn test_push_token_survives_sync_but_not_sign_out() {
        let backend = Arc::new(FakeBackend::default());
        let (_dir, engine, _tx) = engine_with(backend, true);

        engine.set_push_token(Some("apns-token-1".to_string())).expect("set token");
        assert_eq!(
            engine.store().load_meta().push_token.as_deref(),
            Some("apns-token-1")
        );

        engine.refresh().await.expect("refresh");
        assert_eq!(
            engine.store().load_meta().push_token.as_deref(),
            Some("apns-token-1")
        );

        engine.sign_out().expect("sign out");
        assert!(engine.store().load_meta().push_token.is_none());
    }

    #[tokio::test]
    async fn test_selection_write_back_refetches_document() {
        let backend = Arc::new(FakeBackend::default());
        let (_dir, engine, _tx) = engine_with(backend, true);

        let selection = NightSelection {
            accommodation: Some(crate::models::Accommodation::Camping),
            dinner: true,
            ..Default::default()
        };
        engine
            .submit_night_selection("night_03", &selection)
            .await
            .expect("submit");

        let cached = engine.store().load_user_selections().expect("selections cached");
        assert_eq!(cached.nights["night_03"], selection);
    }
}
