//! Short natural-language descriptions for memes.

use crate::domain::{ChatPrompt, TextGenerator};
use crate::models::normalize_subject;
use std::sync::Arc;
use tracing;

/// Returned whenever the text-generation service cannot produce a description.
pub const FALLBACK_DESCRIPTION: &str = "No description available.";

const SYSTEM_INSTRUCTION: &str =
    "You are a knowledgeable assistant that provides concise, accurate descriptions of internet memes.";
const MAX_OUTPUT_TOKENS: u32 = 150;
const TEMPERATURE: f32 = 0.7;

/// Wraps a `TextGenerator` and never fails: errors and blank completions
/// turn into `FALLBACK_DESCRIPTION`.
#[derive(Clone)]
pub struct DescriptionGenerator {
    generator: Arc<dyn TextGenerator>,
}

impl DescriptionGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Builds the prompt for a raw meme identifier such as `Michael-Jackson-Popcorn`.
    pub fn prompt_for(raw_name: &str) -> ChatPrompt {
        let subject = normalize_subject(raw_name);
        ChatPrompt {
            system: SYSTEM_INSTRUCTION.to_string(),
            user: format!(
                "Write a brief, engaging 1-2 sentence description of the '{}' meme. \
                 Explain its typical usage and cultural significance. Keep it concise but informative.",
                subject
            ),
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: TEMPERATURE,
        }
    }

    pub async fn describe(&self, raw_name: &str) -> String {
        let prompt = Self::prompt_for(raw_name);
        match self.generator.complete(&prompt).await {
            Ok(text) if !text.trim().is_empty() => {
                let description = text.trim().to_string();
                tracing::info!(name = %raw_name, %description, "Generated description");
                description
            }
            Ok(_) => {
                tracing::warn!(name = %raw_name, "Blank description returned, using fallback");
                FALLBACK_DESCRIPTION.to_string()
            }
            Err(e) => {
                tracing::error!(name = %raw_name, error = %e, "Error getting description, using fallback");
                FALLBACK_DESCRIPTION.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GenerationError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Scripted {
        reply: Result<&'static str, u16>,
        seen: Mutex<Vec<ChatPrompt>>,
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn complete(&self, prompt: &ChatPrompt) -> Result<String, GenerationError> {
            self.seen.lock().unwrap().push(prompt.clone());
            self.reply
                .map(str::to_string)
                .map_err(|status| GenerationError::Status { status, body: "slow down".into() })
        }
    }

    fn generator(reply: Result<&'static str, u16>) -> (Arc<Scripted>, DescriptionGenerator) {
        let scripted = Arc::new(Scripted { reply, seen: Mutex::new(Vec::new()) });
        (scripted.clone(), DescriptionGenerator::new(scripted))
    }

    #[test]
    fn prompt_embeds_the_normalized_subject() {
        let prompt = DescriptionGenerator::prompt_for("Michael-Jackson-Popcorn");
        assert!(prompt.user.contains("'Michael Jackson Popcorn' meme"));
        assert_eq!(prompt.system, SYSTEM_INSTRUCTION);
        assert_eq!(prompt.max_tokens, 150);
    }

    #[tokio::test]
    async fn completion_is_trimmed() {
        let (scripted, describer) = generator(Ok("  A dog in awe.\n"));
        assert_eq!(describer.describe("doge").await, "A dog in awe.");
        assert_eq!(scripted.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn service_failure_yields_fallback() {
        let (_, describer) = generator(Err(429));
        assert_eq!(describer.describe("doge").await, FALLBACK_DESCRIPTION);
    }

    #[tokio::test]
    async fn blank_completion_yields_fallback() {
        let (_, describer) = generator(Ok("   "));
        assert_eq!(describer.describe("doge").await, FALLBACK_DESCRIPTION);
    }
}
