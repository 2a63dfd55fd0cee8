//! Lyrics analysis through an LLM.

mod analyzer;
pub mod llm;
mod parser;
mod prompt;

pub use analyzer::{Analysis, AnalysisError, AnalysisOutcome, LyricsAnalyzer};
pub use parser::{
    ParseFallback, ParsedAnalysis, StructuredJsonParser, TextScrapeFallback, SUMMARY_PLACEHOLDER,
};
pub use prompt::{build_user_prompt, SYSTEM_PROMPT};
