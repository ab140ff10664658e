//! API client for communicating with the tour backend REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! requests to fetch roster, night configuration, selections, announcement,
//! and document data for a tour.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{header, Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::SessionData;
use crate::models::{
    Announcement, AnnouncementRecord, DocumentsRecord, EventConfig, NightSelection,
    NightsResponse, Rider, RiderDocuments, RiderRecord, SelectionsRecord, UserSelections,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL for the hosted tour backend
const DEFAULT_API_BASE_URL: &str = "https://api.tourbase.app";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(rename = "userId")]
    user_id: String,
}

/// API client for the tour backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client. `base_url` falls back to the hosted backend.
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.unwrap_or(DEFAULT_API_BASE_URL).trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    /// Authenticate against the backend and return session data
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<SessionData> {
        let url = format!("{}/auth/login", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "username": username,
                "password": password,
            }))
            .send()
            .await
            .context("Failed to send authentication request")?;

        let response = Self::check_response(response).await?;

        let login: LoginResponse = response
            .json()
            .await
            .context("Failed to parse login response")?;

        Ok(SessionData {
            token: login.token,
            user_id: login.user_id,
            username: username.to_string(),
            created_at: Utc::now(),
        })
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status() == StatusCode::TOO_MANY_REQUESTS {
            // Rate limited - signal to retry
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.auth_headers()?)
                .send()
                .await
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response
                        .json()
                        .await
                        .with_context(|| format!("Failed to parse JSON response from {}", url));
                }
                None => {
                    // Rate limited
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    /// GET returning the raw body, for endpoints whose response shape
    /// varies and is parsed by the caller.
    async fn get_text(&self, url: &str) -> Result<String> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.auth_headers()?)
                .send()
                .await
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response
                        .text()
                        .await
                        .with_context(|| format!("Failed to read response body from {}", url));
                }
                None => {
                    // Rate limited
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    /// GET that treats 404 as "document does not exist yet".
    async fn get_optional<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .headers(self.auth_headers()?)
                .send()
                .await
                .with_context(|| format!("Failed to send GET request to {}", url))?;

            if response.status() == StatusCode::NOT_FOUND {
                debug!(url = url, "Document not found, treating as absent");
                return Ok(None);
            }

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let parsed = response
                        .json()
                        .await
                        .with_context(|| format!("Failed to parse JSON response from {}", url))?;
                    return Ok(Some(parsed));
                }
                None => {
                    // Rate limited
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn patch<B: Serialize>(&self, url: &str, body: &B) -> Result<()> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .patch(url)
                .headers(self.auth_headers()?)
                .json(body)
                .send()
                .await
                .with_context(|| format!("Failed to send PATCH request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(_) => return Ok(()),
                None => {
                    // Rate limited
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    // ===== Data Fetching Methods =====

    /// Fetch the full rider roster for the tour
    pub async fn fetch_riders(&self, tour_id: &str) -> Result<Vec<Rider>> {
        let url = format!("{}/tours/{}/riders", self.base_url, tour_id);
        let text = self.get_text(&url).await?;

        // Try to parse as array directly first, then as wrapped object
        if let Ok(records) = serde_json::from_str::<Vec<RiderRecord>>(&text) {
            return Ok(records.iter().map(|r| r.to_rider()).collect());
        }

        #[derive(Deserialize)]
        struct RidersWrapper {
            #[serde(default, alias = "data")]
            riders: Vec<RiderRecord>,
        }

        let wrapper: RidersWrapper =
            serde_json::from_str(&text).context("Failed to parse roster response")?;
        debug!(count = wrapper.riders.len(), "Parsed wrapped roster response");
        Ok(wrapper.riders.iter().map(|r| r.to_rider()).collect())
    }

    /// Fetch one rider by id (used for the authenticated user's own profile)
    pub async fn fetch_rider(&self, tour_id: &str, user_id: &str) -> Result<Option<Rider>> {
        let url = format!("{}/tours/{}/riders/{}", self.base_url, tour_id, user_id);
        let record: Option<RiderRecord> = self.get_optional(&url).await?;
        Ok(record.map(|r| r.to_rider()))
    }

    /// Fetch the per-night accommodation and meal configuration document
    pub async fn fetch_night_config(&self, tour_id: &str) -> Result<EventConfig> {
        let url = format!("{}/tours/{}/nights", self.base_url, tour_id);
        let response: NightsResponse = self.get(&url).await?;
        Ok(response.to_event_config())
    }

    /// Fetch the user's selections document. A missing document (new user)
    /// is an empty set of selections, not an error.
    pub async fn fetch_selections(&self, tour_id: &str, user_id: &str) -> Result<UserSelections> {
        let url = format!("{}/tours/{}/selections/{}", self.base_url, tour_id, user_id);
        let record: Option<SelectionsRecord> = self.get_optional(&url).await?;
        Ok(match record {
            Some(record) => record.to_user_selections(user_id),
            None => UserSelections {
                user_id: user_id.to_string(),
                ..Default::default()
            },
        })
    }

    /// Write one night's selection back to the backend as a partial-field
    /// update. The server merges it into the selections document; callers
    /// re-fetch the document afterwards rather than merging locally.
    pub async fn update_night_selection(
        &self,
        tour_id: &str,
        user_id: &str,
        night_key: &str,
        selection: &NightSelection,
    ) -> Result<()> {
        let url = format!("{}/tours/{}/selections/{}", self.base_url, tour_id, user_id);
        let body = serde_json::json!({
            "nights": { night_key: selection }
        });
        self.patch(&url, &body).await
    }

    /// Fetch all announcements for the tour. Ordering is recomputed by the
    /// caller; the backend query order is not relied upon.
    pub async fn fetch_announcements(&self, tour_id: &str) -> Result<Vec<Announcement>> {
        let url = format!("{}/tours/{}/announcements", self.base_url, tour_id);
        let text = self.get_text(&url).await?;

        if let Ok(records) = serde_json::from_str::<Vec<AnnouncementRecord>>(&text) {
            return Ok(records.iter().map(|r| r.to_announcement()).collect());
        }

        #[derive(Deserialize)]
        struct AnnouncementsWrapper {
            #[serde(default, alias = "data")]
            announcements: Vec<AnnouncementRecord>,
        }

        let wrapper: AnnouncementsWrapper =
            serde_json::from_str(&text).context("Failed to parse announcements response")?;
        Ok(wrapper.announcements.iter().map(|r| r.to_announcement()).collect())
    }

    /// Fetch the user's document bundle. A backend record that does not
    /// exist yet (new user) is "no documents", not an error.
    pub async fn fetch_documents(&self, tour_id: &str, user_id: &str) -> Result<RiderDocuments> {
        let url = format!(
            "{}/tours/{}/riders/{}/documents",
            self.base_url, tour_id, user_id
        );
        let record: Option<DocumentsRecord> = self.get_optional(&url).await?;
        Ok(record.map(|r| r.to_rider_documents()).unwrap_or_default())
    }
}
