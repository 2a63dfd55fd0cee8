//! Turns the raw LLM completion into an [`Analysis`].
//!
//! The completion is expected to be a JSON object. When it is not valid JSON
//! at all, a [`ParseFallback`] strategy tries to recover what it can from the
//! text.

use super::analyzer::{Analysis, AnalysisError};
use serde_json::Value;
use tracing::warn;

pub const SUMMARY_PLACEHOLDER: &str = "Unable to generate summary for this song.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedAnalysis {
    /// The completion was a well formed JSON object.
    Structured(Analysis),
    /// The completion could not be parsed, the fallback recovered this.
    Recovered(Analysis),
}

impl ParsedAnalysis {
    pub fn analysis(&self) -> &Analysis {
        match self {
            ParsedAnalysis::Structured(a) | ParsedAnalysis::Recovered(a) => a,
        }
    }
}

/// Recovers an analysis from a completion that is not valid JSON.
pub trait ParseFallback: Send + Sync {
    fn name(&self) -> &str;
    fn recover(&self, content: &str) -> Analysis;
}

/// Scrapes the text following the `summary` and `countries` tokens.
///
/// The summary is the rest of the line after the first `summary` token,
/// trimmed of quotes, colons, commas and spaces. The countries are the
/// comma separated items of the first `[...]` after the `countries` token.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextScrapeFallback;

impl TextScrapeFallback {
    fn scrape_summary(content: &str) -> Option<String> {
        let after = content.split("summary").nth(1)?;
        let line = after.split('\n').next().unwrap_or_default();
        Some(line.trim_matches(|c| matches!(c, '"' | ':' | ' ' | ',')).to_string())
    }

    fn scrape_countries(content: &str) -> Vec<String> {
        let Some(after) = content.split("countries").nth(1) else {
            return vec![];
        };
        let after = after.trim();
        let (Some(open), Some(close)) = (after.find('['), after.find(']')) else {
            return vec![];
        };
        if close <= open {
            return vec![];
        }
        after[open + 1..close]
            .split(',')
            .map(|c| c.trim_matches(|ch| matches!(ch, ' ' | '"' | '\'')))
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl ParseFallback for TextScrapeFallback {
    fn name(&self) -> &str {
        "text-scrape"
    }

    fn recover(&self, content: &str) -> Analysis {
        Analysis {
            summary: Self::scrape_summary(content)
                .unwrap_or_else(|| SUMMARY_PLACEHOLDER.to_string()),
            countries: Self::scrape_countries(content),
        }
    }
}

pub struct StructuredJsonParser {
    fallback: Box<dyn ParseFallback>,
}

impl Default for StructuredJsonParser {
    fn default() -> Self {
        Self::new(Box::new(TextScrapeFallback))
    }
}

impl StructuredJsonParser {
    pub fn new(fallback: Box<dyn ParseFallback>) -> Self {
        Self { fallback }
    }

    pub fn parse(&self, content: &str) -> Result<ParsedAnalysis, AnalysisError> {
        let value: Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    "Failed to parse JSON from LLM response ({}), using {} fallback",
                    err,
                    self.fallback.name()
                );
                return Ok(ParsedAnalysis::Recovered(self.fallback.recover(content)));
            }
        };

        let Value::Object(mut object) = value else {
            warn!("LLM returned a non-object JSON response");
            return Err(AnalysisError::InvalidFormat);
        };

        let summary = match object.remove("summary") {
            None => SUMMARY_PLACEHOLDER.to_string(),
            Some(Value::String(s)) => s,
            Some(_) => SUMMARY_PLACEHOLDER.to_string(),
        };
        let countries = match object.remove("countries") {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => vec![],
        };

        Ok(ParsedAnalysis::Structured(Analysis { summary, countries }))
    }
}
