//! In-process stand-ins for the lyrics API and the LLM.
//!
//! Both answer from canned data and count how often they were called, so
//! tests can tell cache hits from real fetches.

use super::constants::*;
use async_trait::async_trait;
use songlens_server::analysis::llm::{
    CompletionOptions, CompletionResponse, FinishReason, LlmError, LlmProvider, Message,
};
use songlens_server::lyrics::{LyricsError, LyricsProvider};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const GARBLED_LYRICS: &str = "static static static";

pub struct FakeLyricsProvider {
    pub calls: Arc<AtomicUsize>,
}

impl FakeLyricsProvider {
    fn lookup(artist: &str, title: &str) -> Option<&'static str> {
        let matches =
            |a: &str, t: &str| artist.eq_ignore_ascii_case(a) && title.eq_ignore_ascii_case(t);
        if matches(KNOWN_ARTIST, KNOWN_TITLE) {
            Some(KNOWN_LYRICS)
        } else if matches(EMPTY_ARTIST, EMPTY_TITLE) {
            Some("")
        } else if matches(GARBLED_ARTIST, GARBLED_TITLE) {
            Some(GARBLED_LYRICS)
        } else {
            None
        }
    }
}

#[async_trait]
impl LyricsProvider for FakeLyricsProvider {
    fn name(&self) -> &str {
        "fake-lyrics"
    }

    async fn get_lyrics(&self, artist: &str, title: &str) -> Result<String, LyricsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Self::lookup(artist, title)
            .map(str::to_string)
            .ok_or(LyricsError::NotFound)
    }

    async fn track_exists(&self, artist: &str, title: &str) -> Result<bool, LyricsError> {
        Ok(Self::lookup(artist, title).is_some())
    }
}

pub struct FakeLlmProvider {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl LlmProvider for FakeLlmProvider {
    fn name(&self) -> &str {
        "fake-llm"
    }

    fn model(&self) -> &str {
        "fake-model"
    }

    fn has_usable_credentials(&self) -> bool {
        true
    }

    async fn complete(
        &self,
        messages: &[Message],
        _options: &CompletionOptions,
    ) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let content = if prompt.contains(KNOWN_LYRICS) {
            serde_json::json!({
                "summary": KNOWN_SUMMARY,
                "countries": KNOWN_COUNTRIES,
            })
            .to_string()
        } else if prompt.contains(GARBLED_LYRICS) {
            "Here you go\nsummary: \"Mostly static\"\ncountries: [\"Atlantis\"]\n".to_string()
        } else {
            r#"{"summary": "A song.", "countries": []}"#.to_string()
        };
        Ok(CompletionResponse {
            content,
            finish_reason: FinishReason::Stop,
        })
    }
}
