use super::llm::{CompletionOptions, LlmError, LlmProvider};
use super::parser::{ParsedAnalysis, StructuredJsonParser, SUMMARY_PLACEHOLDER};
use super::prompt::build_messages;
use crate::cache::{analysis_cache_key, Cache};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const MESSAGE_FROM_CACHE: &str = "Analysis fetched from cache";
pub const MESSAGE_ANALYZED: &str = "Lyrics analyzed successfully";
pub const MESSAGE_PARTIAL: &str = "Lyrics analyzed with partial results";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub summary: String,
    pub countries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    pub analysis: Analysis,
    pub message: &'static str,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("No lyrics to analyze")]
    EmptyLyrics,

    #[error("Invalid OpenAI API key configuration")]
    InvalidApiKey,

    #[error("Invalid response format from the LLM")]
    InvalidFormat,

    #[error("Error analyzing lyrics: {0}")]
    Provider(#[from] LlmError),
}

/// Asks the LLM for a summary of some lyrics and the countries they mention.
pub struct LyricsAnalyzer {
    provider: Arc<dyn LlmProvider>,
    cache: Arc<dyn Cache>,
    parser: StructuredJsonParser,
    options: CompletionOptions,
    cache_ttl: Duration,
}

impl LyricsAnalyzer {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        cache: Arc<dyn Cache>,
        options: CompletionOptions,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            parser: StructuredJsonParser::default(),
            options,
            cache_ttl,
        }
    }

    fn cached(&self, cache_key: &str) -> Option<Analysis> {
        let raw = self.cache.get(cache_key)?;
        match serde_json::from_str(&raw) {
            Ok(analysis) => Some(analysis),
            Err(err) => {
                warn!("Discarding unreadable cached analysis {}: {}", cache_key, err);
                self.cache.delete(cache_key);
                None
            }
        }
    }

    fn store(&self, cache_key: &str, analysis: &Analysis) {
        match serde_json::to_string(analysis) {
            Ok(raw) => self.cache.set(cache_key, raw, self.cache_ttl),
            Err(err) => error!("Failed to serialize analysis for caching: {}", err),
        }
    }

    pub async fn analyze_lyrics(&self, lyrics: &str) -> Result<AnalysisOutcome, AnalysisError> {
        if lyrics.trim().is_empty() {
            warn!("No lyrics provided for analysis");
            return Err(AnalysisError::EmptyLyrics);
        }

        let cache_key = analysis_cache_key(lyrics);
        if let Some(analysis) = self.cached(&cache_key) {
            info!("Analysis fetched from cache");
            return Ok(AnalysisOutcome {
                analysis,
                message: MESSAGE_FROM_CACHE,
            });
        }

        if !self.provider.has_usable_credentials() {
            error!(
                "Refusing to call {}: API key is missing or is a project key",
                self.provider.name()
            );
            return Err(AnalysisError::InvalidApiKey);
        }

        debug!(
            "Analyzing {} bytes of lyrics with {}",
            lyrics.len(),
            self.provider.model()
        );
        let response = self
            .provider
            .complete(&build_messages(lyrics), &self.options)
            .await
            .map_err(|err| {
                error!("Error analyzing lyrics: {}", err);
                AnalysisError::from(err)
            })?;

        match self.parser.parse(&response.content)? {
            ParsedAnalysis::Structured(analysis) => {
                self.store(&cache_key, &analysis);
                info!("Lyrics successfully analyzed and cached");
                Ok(AnalysisOutcome {
                    analysis,
                    message: MESSAGE_ANALYZED,
                })
            }
            ParsedAnalysis::Recovered(analysis) => {
                if analysis.summary != SUMMARY_PLACEHOLDER {
                    self.store(&cache_key, &analysis);
                    info!("Partial analysis results cached");
                }
                Ok(AnalysisOutcome {
                    analysis,
                    message: MESSAGE_PARTIAL,
                })
            }
        }
    }

    /// Drops the cached analysis of some lyrics.
    pub fn forget(&self, lyrics: &str) -> bool {
        self.cache.delete(&analysis_cache_key(lyrics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::llm::{CompletionResponse, FinishReason, MockLlmProvider};
    use crate::cache::InMemoryCache;

    const TTL: Duration = Duration::from_secs(60);

    fn provider_answering(content: &'static str, times: usize) -> MockLlmProvider {
        let mut provider = MockLlmProvider::new();
        provider.expect_name().return_const("mock".to_string());
        provider.expect_model().return_const("mock-model".to_string());
        provider.expect_has_usable_credentials().return_const(true);
        provider.expect_complete().times(times).returning(move |_, _| {
            Ok(CompletionResponse {
                content: content.to_string(),
                finish_reason: FinishReason::Stop,
            })
        });
        provider
    }

    fn analyzer(provider: MockLlmProvider, cache: Arc<InMemoryCache>) -> LyricsAnalyzer {
        LyricsAnalyzer::new(Arc::new(provider), cache, CompletionOptions::default(), TTL)
    }

    #[tokio::test]
    async fn analysis_is_cached_by_lyrics() {
        let provider = provider_answering(
            r#"{"summary": "A song about travel", "countries": ["France", "Italy"]}"#,
            1,
        );
        let cache = Arc::new(InMemoryCache::new());
        let analyzer = analyzer(provider, cache.clone());

        let first = analyzer.analyze_lyrics("We went to France").await.unwrap();
        assert_eq!(first.message, MESSAGE_ANALYZED);
        assert_eq!(first.analysis.countries, vec!["France", "Italy"]);

        let second = analyzer.analyze_lyrics("We went to France").await.unwrap();
        assert_eq!(second.message, MESSAGE_FROM_CACHE);
        assert_eq!(second.analysis, first.analysis);
        assert!(cache.get(&analysis_cache_key("We went to France")).is_some());
    }

    #[tokio::test]
    async fn empty_lyrics_never_reach_the_provider() {
        let mut provider = MockLlmProvider::new();
        provider.expect_complete().never();
        let analyzer = analyzer(provider, Arc::new(InMemoryCache::new()));

        let err = analyzer.analyze_lyrics("  \n").await.unwrap_err();
        assert_eq!(err, AnalysisError::EmptyLyrics);
        assert_eq!(err.to_string(), "No lyrics to analyze");
    }

    #[tokio::test]
    async fn unusable_key_is_rejected_before_request() {
        let mut provider = MockLlmProvider::new();
        provider.expect_name().return_const("mock".to_string());
        provider.expect_has_usable_credentials().return_const(false);
        provider.expect_complete().never();
        let analyzer = analyzer(provider, Arc::new(InMemoryCache::new()));

        let err = analyzer.analyze_lyrics("la la").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid OpenAI API key configuration");
    }

    #[tokio::test]
    async fn provider_failure_is_wrapped() {
        let mut provider = MockLlmProvider::new();
        provider.expect_name().return_const("mock".to_string());
        provider.expect_model().return_const("mock-model".to_string());
        provider.expect_has_usable_credentials().return_const(true);
        provider
            .expect_complete()
            .returning(|_, _| Err(LlmError::Timeout));
        let cache = Arc::new(InMemoryCache::new());
        let analyzer = analyzer(provider, cache.clone());

        let err = analyzer.analyze_lyrics("la la").await.unwrap_err();
        assert_eq!(err.to_string(), "Error analyzing lyrics: Request timeout");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn partial_results_are_cached_only_with_a_summary() {
        let cache = Arc::new(InMemoryCache::new());
        let scraped = analyzer(
            provider_answering("summary: Love in Paris\ncountries: [France]", 1),
            cache.clone(),
        );
        let outcome = scraped.analyze_lyrics("Paris").await.unwrap();
        assert_eq!(outcome.message, MESSAGE_PARTIAL);
        assert_eq!(outcome.analysis.summary, "Love in Paris");
        assert_eq!(outcome.analysis.countries, vec!["France"]);
        assert_eq!(cache.len(), 1);

        let unreadable = analyzer(provider_answering("no idea", 2), cache.clone());
        for _ in 0..2 {
            let outcome = unreadable.analyze_lyrics("Rome").await.unwrap();
            assert_eq!(outcome.analysis.summary, SUMMARY_PLACEHOLDER);
            assert!(outcome.analysis.countries.is_empty());
        }
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn non_object_response_fails() {
        let analyzer = analyzer(
            provider_answering(r#"["France"]"#, 1),
            Arc::new(InMemoryCache::new()),
        );
        let err = analyzer.analyze_lyrics("la la").await.unwrap_err();
        assert_eq!(err, AnalysisError::InvalidFormat);
    }

    #[tokio::test]
    async fn forget_drops_the_cached_analysis() {
        let cache = Arc::new(InMemoryCache::new());
        let analyzer = analyzer(
            provider_answering(r#"{"summary": "s", "countries": []}"#, 2),
            cache.clone(),
        );
        analyzer.analyze_lyrics("la").await.unwrap();
        assert!(analyzer.forget("la"));
        assert!(!analyzer.forget("la"));
        let again = analyzer.analyze_lyrics("la").await.unwrap();
        assert_eq!(again.message, MESSAGE_ANALYZED);
    }
}
