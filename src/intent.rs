use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ExtractorConfig;
use crate::parser::LocalParser;

/// Casual phrases that short-circuit extraction before any network call.
const IGNORE_PHRASES: &[&str] = &["hi", "hello", "hey", "thanks", "good morning", "good evening"];

const INSTRUCTION: &str = r#"You are an intent extractor for a business directory chatbot.

Your task:
1. From the user message, identify:
   - "service": the business, brand, or type of service they are looking for
   - "location": city or region if mentioned
2. If vague like "Supreme International" still classify it as service.
3. If it is casual talk and not a search query, return:
   { "ignore": true }

Strictly return JSON only. No extra text."#;

/// A directory search request derived from free text.
/// `service` is never empty; absence of an `Intent` means "not a query".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub service: String,
    pub location: Option<String>,
    pub keywords: Vec<String>,
}

impl Intent {
    /// Validate and normalize a raw service/location pair. Returns `None`
    /// when the trimmed service is empty. Keywords are the service tokens,
    /// lowercased, longer than two characters, in order.
    pub fn from_parts(service: Option<&str>, location: Option<&str>) -> Option<Self> {
        let service = service?.trim();
        if service.is_empty() {
            return None;
        }

        let keywords = service
            .split_whitespace()
            .map(|k| k.to_lowercase())
            .filter(|k| k.len() > 2)
            .collect();

        let location = location
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string);

        Some(Self {
            service: service.to_string(),
            location,
            keywords,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// What the extraction service is asked to return.
#[derive(Debug, Deserialize)]
struct ExtractorVerdict {
    #[serde(default)]
    service: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    ignore: bool,
}

/// Turns raw text into an `Intent` via the remote extraction service,
/// falling back to the deterministic local parser when the service is
/// unconfigured or unreachable. Never raises past its boundary.
pub struct IntentExtractor {
    client: reqwest::Client,
    config: ExtractorConfig,
    parser: LocalParser,
}

impl IntentExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            config,
            parser: LocalParser::new(),
        }
    }

    pub async fn extract(&self, text: &str) -> Option<Intent> {
        if is_small_talk(text) {
            debug!("Skipping small talk: {}", text);
            return None;
        }

        if self.config.api_key.is_empty() {
            return self.extract_local(text);
        }

        match self.extract_remote(text).await {
            // A successful "not a query" verdict is final.
            Ok(intent) => intent,
            Err(e) => {
                warn!("Extractor unavailable, using local parser: {:#}", e);
                self.extract_local(text)
            }
        }
    }

    fn extract_local(&self, text: &str) -> Option<Intent> {
        let parsed = self.parser.parse(text);
        Intent::from_parts(parsed.service.as_deref(), parsed.location.as_deref())
    }

    async fn extract_remote(&self, text: &str) -> Result<Option<Intent>> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: format!("{}\n\nMessage: \"{}\"", INSTRUCTION, text),
            }],
        };

        let url = format!("{}/chat/completions", self.config.base_url);
        debug!("Sending extraction request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .context("Failed to send request to extraction service")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Extraction service error ({}): {}", status, error_body);
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse extraction service response")?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(intent_from_reply(&content))
    }
}

/// Parse the service's reply text into an `Intent`, failing closed on any
/// malformed payload. The reply may wrap its JSON object in prose, so only
/// the first `{` .. last `}` slice is parsed.
fn intent_from_reply(content: &str) -> Option<Intent> {
    let json = json_object_slice(content)?;
    let verdict: ExtractorVerdict = match serde_json::from_str(json) {
        Ok(v) => v,
        Err(e) => {
            warn!("Extractor returned malformed JSON: {}", e);
            return None;
        }
    };

    if verdict.ignore {
        return None;
    }

    Intent::from_parts(verdict.service.as_deref(), verdict.location.as_deref())
}

fn json_object_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Phrase containment on word boundaries, so "hi" does not fire inside
/// "delhi".
pub fn is_small_talk(text: &str) -> bool {
    let normalized: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = normalized.split_whitespace().collect();
    let padded = format!(" {} ", words.join(" "));
    IGNORE_PHRASES
        .iter()
        .any(|p| padded.contains(&format!(" {} ", p)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn greetings_yield_no_intent_without_network() {
        // base_url points nowhere reachable; the gate must trip first.
        let extractor = IntentExtractor::new(ExtractorConfig {
            api_key: "test-key".to_string(),
            base_url: "http://127.0.0.1:1".to_string(),
            ..Default::default()
        });

        for text in ["hi", "Hello there", "THANKS", "good morning all"] {
            assert_eq!(extractor.extract(text).await, None, "input: {}", text);
        }
    }

    #[tokio::test]
    async fn unconfigured_extractor_falls_back_to_local_parser() {
        let extractor = IntentExtractor::new(ExtractorConfig::default());

        let intent = extractor
            .extract("looking for a plumber near Delhi")
            .await
            .unwrap();
        assert_eq!(intent.service, "a plumber");
        assert_eq!(intent.location.as_deref(), Some("delhi"));
        assert_eq!(intent.keywords, vec!["plumber"]);
    }

    #[test]
    fn small_talk_gate_respects_word_boundaries() {
        assert!(is_small_talk("hi"));
        assert!(is_small_talk("thanks, bot!"));
        assert!(!is_small_talk("looking for a plumber near Delhi"));
        assert!(!is_small_talk("this shop"));
    }

    #[test]
    fn keywords_drop_short_tokens_and_preserve_order() {
        let intent = Intent::from_parts(Some("AC Repair and Service"), None).unwrap();
        assert_eq!(intent.keywords, vec!["repair", "and", "service"]);
    }

    #[test]
    fn empty_service_means_no_intent() {
        assert_eq!(Intent::from_parts(Some("   "), Some("delhi")), None);
        assert_eq!(Intent::from_parts(None, Some("delhi")), None);
    }

    #[test]
    fn blank_location_is_normalized_to_none() {
        let intent = Intent::from_parts(Some("plumber"), Some("  ")).unwrap();
        assert_eq!(intent.location, None);
    }

    #[test]
    fn reply_json_is_sliced_out_of_surrounding_prose() {
        let intent = intent_from_reply(
            "Sure! Here is the result:\n{\"service\": \"plumber\", \"location\": \"delhi\"}\nHope that helps.",
        )
        .unwrap();
        assert_eq!(intent.service, "plumber");
        assert_eq!(intent.location.as_deref(), Some("delhi"));
    }

    #[test]
    fn ignore_verdict_yields_no_intent() {
        assert_eq!(intent_from_reply("{\"ignore\": true}"), None);
    }

    #[test]
    fn missing_braces_or_garbage_fail_closed() {
        assert_eq!(intent_from_reply("no json here"), None);
        assert_eq!(intent_from_reply("{not valid json}"), None);
        assert_eq!(intent_from_reply("} backwards {"), None);
        assert_eq!(intent_from_reply("{\"service\": \"  \"}"), None);
    }
}
