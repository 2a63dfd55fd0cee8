//! Musixmatch-compatible HTTP client.

use super::{LyricsError, LyricsProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const FORMAT_JSON: &str = "json";

pub struct MusixmatchClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct MusixmatchEnvelope {
    message: MusixmatchMessage,
}

#[derive(Debug, Deserialize)]
struct MusixmatchMessage {
    header: MusixmatchHeader,
    /// An object on success, an empty array on most errors.
    #[serde(default)]
    body: Value,
}

#[derive(Debug, Deserialize)]
struct MusixmatchHeader {
    status_code: u16,
}

/// Extracts the lyrics body out of a `matcher.lyrics.get` payload.
fn parse_lyrics_payload(payload: &str) -> Result<String, LyricsError> {
    let envelope: MusixmatchEnvelope = serde_json::from_str(payload)
        .map_err(|e| LyricsError::Request(format!("invalid response: {}", e)))?;
    if envelope.message.header.status_code != 200 {
        debug!(
            "Lyrics API replied with status code {}",
            envelope.message.header.status_code
        );
        return Err(LyricsError::NotFound);
    }
    Ok(envelope
        .message
        .body
        .pointer("/lyrics/lyrics_body")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string())
}

fn parse_track_payload(payload: &str) -> Result<bool, LyricsError> {
    let envelope: MusixmatchEnvelope = serde_json::from_str(payload)
        .map_err(|e| LyricsError::Request(format!("invalid response: {}", e)))?;
    Ok(envelope.message.header.status_code == 200
        && envelope.message.body.pointer("/track").is_some())
}

fn map_request_error(e: reqwest::Error) -> LyricsError {
    if e.is_timeout() {
        LyricsError::Timeout
    } else {
        LyricsError::Request(e.to_string())
    }
}

impl MusixmatchClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            timeout,
        }
    }

    async fn get_method(
        &self,
        method: &str,
        artist: &str,
        title: &str,
    ) -> Result<String, LyricsError> {
        let url = format!("{}/{}", self.base_url, method);
        debug!(method = method, artist = artist, title = title, "Calling lyrics API");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("q_artist", artist),
                ("q_track", title),
                ("format", FORMAT_JSON),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!("Lyrics API {} returned HTTP {}", method, status);
        }
        response.text().await.map_err(map_request_error)
    }
}

#[async_trait]
impl LyricsProvider for MusixmatchClient {
    fn name(&self) -> &str {
        "musixmatch"
    }

    async fn get_lyrics(&self, artist: &str, title: &str) -> Result<String, LyricsError> {
        let payload = self.get_method("matcher.lyrics.get", artist, title).await?;
        parse_lyrics_payload(&payload)
    }

    async fn track_exists(&self, artist: &str, title: &str) -> Result<bool, LyricsError> {
        let payload = self.get_method("matcher.track.get", artist, title).await?;
        parse_track_payload(&payload)
    }
}
