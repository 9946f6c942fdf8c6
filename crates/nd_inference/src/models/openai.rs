use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use nd_core::{ConsolidatedStory, Error, Result, Summarizer, Summary, DEFAULT_CATEGORY, NEUTRAL_IMPACT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-5";
const MAX_CONTENT_CHARS: usize = 3000;
const MAX_KEY_POINTS: usize = 4;

const SYSTEM_PROMPT: &str =
    "You are an expert AI/technology news analyst. Provide concise, accurate summaries of tech news articles.";

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    max_completion_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: String,
}

pub struct OpenAiSummarizer {
    client: Arc<Client>,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiSummarizer {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::InvalidConfig("OPENAI_API_KEY is not set".to_string()))?;
        Ok(Self {
            client: Arc::new(Client::new()),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn prompt(story: &ConsolidatedStory, allowed_categories: &[String]) -> String {
        let content: String = story.canonical_body.chars().take(MAX_CONTENT_CHARS).collect();
        format!(
            r#"Please analyze the following AI/technology news article and provide a comprehensive summary.

Article text:
Title: {title}

Content: {content}

Please provide your response in JSON format with the following structure:
{{
    "summary": "A concise 2-3 sentence summary of the main story",
    "key_points": ["bullet point 1", "bullet point 2", "bullet point 3"],
    "impact_score": 7,
    "category": "category name"
}}

Guidelines:
- Keep the summary concise but informative (50-100 words)
- Include 2-4 key points that capture the most important aspects
- Rate impact on a scale of 1-10 (1=minor news, 10=major breakthrough)
- Categorize as one of: {categories}
- Focus on what's new or significant about this story"#,
            title = story.canonical_title,
            content = content,
            categories = allowed_categories
                .iter()
                .map(|c| format!("\"{}\"", c))
                .collect::<Vec<_>>()
                .join(", "),
        )
    }
}

impl fmt::Debug for OpenAiSummarizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiSummarizer")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn summarize(&self, story: &ConsolidatedStory, allowed_categories: &[String]) -> Result<Summary> {
        if story.canonical_title.trim().is_empty() && story.canonical_body.trim().is_empty() {
            return Err(Error::EnrichmentUnavailable("story has no content to summarize".to_string()));
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Self::prompt(story, allowed_categories),
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
            max_completion_tokens: 500,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::EnrichmentUnavailable("empty completion".to_string()))?;
        debug!(title = %story.canonical_title, "Received summary completion");

        let raw: Value = serde_json::from_str(&content)?;
        Ok(validate_summary(&raw, allowed_categories))
    }
}

/// Coerce a model reply into a [`Summary`]: trimmed text, at most four key
/// points, impact clamped to 1..=10, and a category from `allowed_categories`.
pub fn validate_summary(raw: &Value, allowed_categories: &[String]) -> Summary {
    let summary_text = match raw.get("summary") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) if !other.is_null() => other.to_string(),
        _ => String::new(),
    };

    let key_points = raw
        .get("key_points")
        .and_then(Value::as_array)
        .map(|points| {
            points
                .iter()
                .take(MAX_KEY_POINTS)
                .map(|p| match p {
                    Value::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let impact_score = raw
        .get("impact_score")
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        })
        .map(|n| n.trunc().clamp(1.0, 10.0) as u8)
        .unwrap_or(NEUTRAL_IMPACT);

    let category_label = raw
        .get("category")
        .and_then(Value::as_str)
        .filter(|c| allowed_categories.iter().any(|allowed| allowed == c))
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string();

    Summary {
        summary_text,
        key_points,
        impact_score,
        category_label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn allowed() -> Vec<String> {
        vec!["AI Research".to_string(), "Robotics".to_string(), "Other".to_string()]
    }

    #[test]
    fn test_validate_well_formed_reply() {
        let raw = json!({
            "summary": "  A lab released a model.  ",
            "key_points": ["one", "two"],
            "impact_score": 8,
            "category": "AI Research"
        });
        let summary = validate_summary(&raw, &allowed());
        assert_eq!(summary.summary_text, "A lab released a model.");
        assert_eq!(summary.key_points, vec!["one", "two"]);
        assert_eq!(summary.impact_score, 8);
        assert_eq!(summary.category_label, "AI Research");
    }

    #[test]
    fn test_validate_clamps_and_defaults() {
        let raw = json!({
            "summary": "s",
            "key_points": ["1", "2", "3", "4", "5", "6"],
            "impact_score": 42,
            "category": "Crypto"
        });
        let summary = validate_summary(&raw, &allowed());
        assert_eq!(summary.key_points.len(), 4);
        assert_eq!(summary.impact_score, 10);
        assert_eq!(summary.category_label, "Other");

        let summary = validate_summary(&json!({"impact_score": "not a number"}), &allowed());
        assert_eq!(summary.impact_score, NEUTRAL_IMPACT);
        assert!(summary.key_points.is_empty());

        let summary = validate_summary(&json!({"impact_score": -3}), &allowed());
        assert_eq!(summary.impact_score, 1);
    }

    #[test]
    fn test_requires_api_key() {
        assert!(OpenAiSummarizer::new(None).is_err());
        assert!(OpenAiSummarizer::new(Some("  ".to_string())).is_err());
        let model = OpenAiSummarizer::new(Some("sk-test".to_string())).unwrap();
        assert!(!format!("{:?}", model).contains("sk-test"));
    }
}
