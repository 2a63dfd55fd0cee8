//! HTTP client for end-to-end tests
//!
//! This module wraps reqwest and provides methods for all server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use reqwest::Response;
use serde_json::{json, Value};
use std::time::Duration;

/// HTTP test client with cookie-based session management
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
}

impl TestClient {
    /// Creates a new unauthenticated client
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true) // Automatically handle session cookies
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self { client, base_url }
    }

    /// Creates a client logged in with the given credentials
    ///
    /// # Panics
    ///
    /// Panics if authentication fails (indicates test infrastructure problem).
    pub async fn authenticated_as(base_url: String, email: &str, password: &str) -> Self {
        let client = Self::new(base_url);

        let response = client.login(email, password).await;
        assert_eq!(
            response.status(),
            reqwest::StatusCode::CREATED,
            "Authentication of {} failed: {:?}",
            email,
            response.text().await
        );

        client
    }

    /// Creates a client pre-authenticated as a regular user
    pub async fn authenticated(base_url: String) -> Self {
        Self::authenticated_as(base_url, TEST_USER, TEST_PASS).await
    }

    /// Creates a client pre-authenticated as the other regular user
    pub async fn authenticated_other(base_url: String) -> Self {
        Self::authenticated_as(base_url, OTHER_USER, OTHER_PASS).await
    }

    /// Creates a client pre-authenticated as an admin user
    pub async fn authenticated_admin(base_url: String) -> Self {
        Self::authenticated_as(base_url, ADMIN_USER, ADMIN_PASS).await
    }

    // ========================================================================
    // Authentication Endpoints
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .expect("Home request failed")
    }

    /// POST /v1/auth/login
    pub async fn login(&self, email: &str, password: &str) -> Response {
        self.client
            .post(format!("{}/v1/auth/login", self.base_url))
            .json(&json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .expect("Login request failed")
    }

    /// GET /v1/auth/logout
    pub async fn logout(&self) -> Response {
        self.client
            .get(format!("{}/v1/auth/logout", self.base_url))
            .send()
            .await
            .expect("Logout request failed")
    }

    // ========================================================================
    // Song Endpoints
    // ========================================================================

    /// POST /v1/songs
    pub async fn create_song(&self, artist: &str, title: &str) -> Response {
        self.create_song_raw(json!({ "artist": artist, "title": title }))
            .await
    }

    /// POST /v1/songs with an arbitrary body
    pub async fn create_song_raw(&self, body: Value) -> Response {
        self.client
            .post(format!("{}/v1/songs", self.base_url))
            .json(&body)
            .send()
            .await
            .expect("Create song request failed")
    }

    /// Creates a song and returns its id
    ///
    /// # Panics
    ///
    /// Panics if the song is not created.
    pub async fn create_song_id(&self, artist: &str, title: &str) -> String {
        let response = self.create_song(artist, title).await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let body: Value = response.json().await.expect("Invalid create song body");
        body["data"]["id"]
            .as_str()
            .expect("Created song has no id")
            .to_string()
    }

    /// GET /v1/songs?{query}
    pub async fn list_songs(&self, query: &str) -> Response {
        let url = if query.is_empty() {
            format!("{}/v1/songs", self.base_url)
        } else {
            format!("{}/v1/songs?{}", self.base_url, query)
        };
        self.client
            .get(url)
            .send()
            .await
            .expect("List songs request failed")
    }

    /// GET /v1/songs/{id}
    pub async fn get_song(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/v1/songs/{}", self.base_url, id))
            .send()
            .await
            .expect("Get song request failed")
    }

    /// DELETE /v1/songs/{id}
    pub async fn delete_song(&self, id: &str) -> Response {
        self.client
            .delete(format!("{}/v1/songs/{}", self.base_url, id))
            .send()
            .await
            .expect("Delete song request failed")
    }

    /// POST /v1/songs/{id}/reanalyze
    pub async fn reanalyze_song(&self, id: &str) -> Response {
        self.client
            .post(format!("{}/v1/songs/{}/reanalyze", self.base_url, id))
            .send()
            .await
            .expect("Reanalyze request failed")
    }

    /// GET /v1/songs/{id}/status
    pub async fn get_song_status(&self, id: &str) -> Response {
        self.client
            .get(format!("{}/v1/songs/{}/status", self.base_url, id))
            .send()
            .await
            .expect("Song status request failed")
    }

    /// Polls the status endpoint until the song is completed or failed and
    /// returns the last (status code, body).
    ///
    /// # Panics
    ///
    /// Panics if the analysis doesn't finish within the timeout.
    pub async fn wait_for_analysis(&self, id: &str) -> (reqwest::StatusCode, Value) {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(ANALYSIS_TIMEOUT_MS);

        loop {
            let response = self.get_song_status(id).await;
            let code = response.status();
            let body: Value = response.json().await.expect("Invalid status body");
            if matches!(body["status"].as_str(), Some("completed") | Some("error")) {
                return (code, body);
            }
            if start.elapsed() > timeout {
                panic!(
                    "Song {} was not analyzed within {}ms, last status {}",
                    id, ANALYSIS_TIMEOUT_MS, body
                );
            }
            tokio::time::sleep(Duration::from_millis(STATUS_POLL_INTERVAL_MS)).await;
        }
    }

    // ========================================================================
    // User Endpoints
    // ========================================================================

    /// POST /v1/users
    pub async fn register_user(&self, email: &str, password: &str, first_name: &str) -> Response {
        self.client
            .post(format!("{}/v1/users", self.base_url))
            .json(&json!({
                "email": email,
                "password": password,
                "first_name": first_name,
                "last_name": "",
            }))
            .send()
            .await
            .expect("Register request failed")
    }

    /// GET /v1/users/me
    pub async fn get_me(&self) -> Response {
        self.client
            .get(format!("{}/v1/users/me", self.base_url))
            .send()
            .await
            .expect("Get me request failed")
    }

    /// GET /v1/users?{query}
    pub async fn list_users(&self, query: &str) -> Response {
        self.client
            .get(format!("{}/v1/users?{}", self.base_url, query))
            .send()
            .await
            .expect("List users request failed")
    }

    /// GET /v1/users/{id}
    pub async fn get_user(&self, id: u64) -> Response {
        self.client
            .get(format!("{}/v1/users/{}", self.base_url, id))
            .send()
            .await
            .expect("Get user request failed")
    }

    /// PUT /v1/users/{id}
    pub async fn update_user(&self, id: u64, body: Value) -> Response {
        self.client
            .put(format!("{}/v1/users/{}", self.base_url, id))
            .json(&body)
            .send()
            .await
            .expect("Update user request failed")
    }

    /// DELETE /v1/users/{id}
    pub async fn delete_user(&self, id: u64) -> Response {
        self.client
            .delete(format!("{}/v1/users/{}", self.base_url, id))
            .send()
            .await
            .expect("Delete user request failed")
    }

    /// Returns the id of the logged in user
    pub async fn my_id(&self) -> u64 {
        let body: Value = self.get_me().await.json().await.expect("Invalid me body");
        body["id"].as_u64().expect("User has no id")
    }
}
