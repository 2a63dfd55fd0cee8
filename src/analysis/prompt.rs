//! Prompt sent to the LLM for each analysis.

use super::llm::Message;

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that analyzes song lyrics.";

pub fn build_user_prompt(lyrics: &str) -> String {
    format!(
        r#"Analyze the following song lyrics and provide:
1. A one-sentence summary of what the song is about
2. A list of all countries mentioned in the lyrics

Lyrics:
{lyrics}

Respond in JSON format:
{{
    "summary": "One sentence that summarizes what the song is about",
    "countries": ["Country1", "Country2", ...]
}}"#
    )
}

pub fn build_messages(lyrics: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(build_user_prompt(lyrics)),
    ]
}
