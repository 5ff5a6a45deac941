//! HTTP plumbing for the OpenAI-compatible API family: chat completions
//! (used by the reasoner) and embeddings (used by the vector store).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone)]
pub struct LlmClient {
    api_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl LlmClient {
    pub fn new(api_url: String, api_key: Option<String>, model: String, temperature: f32) -> Self {
        Self {
            api_url,
            api_key,
            model,
            temperature,
            client: reqwest::Client::new(),
        }
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        // API key header only when configured (not needed for local models)
        match &self.api_key {
            Some(key) if !key.is_empty() => {
                req.header("Authorization", format!("Bearer {}", key))
            }
            _ => req,
        }
    }

    /// Generate a completion using the OpenAI chat-completions format.
    pub async fn generate(&self, messages: Vec<Message>) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_url);

        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: Some(self.temperature),
            max_tokens: Some(2000),
        };

        let req = self.authorize(self.client.post(&url).json(&request));

        let response = req.send().await.context("Failed to send LLM request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read body".to_string());
            anyhow::bail!("LLM API returned error {}: {}", status, body);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        completion
            .choices
            .first()
            .map(|c| c.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("No response from LLM"))
    }

    /// Generate a completion and parse it as JSON, tolerating the usual
    /// model sloppiness (reasoning preambles, markdown fences, prose
    /// around the object).
    pub async fn generate_json<T>(&self, messages: Vec<Message>) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let response = self.generate(messages).await?;
        parse_json(&response)
    }

    /// Embed a batch of texts. Returns one vector per input, in order.
    pub async fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embeddings", self.api_url);

        let request = EmbeddingRequest {
            model: model.to_string(),
            input: texts.to_vec(),
        };

        let req = self.authorize(self.client.post(&url).json(&request));

        let response = req.send().await.context("Failed to send embedding request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read body".to_string());
            anyhow::bail!("Embedding API returned error {}: {}", status, body);
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .context("Failed to parse embedding response")?;

        if parsed.data.len() != texts.len() {
            anyhow::bail!(
                "Embedding API returned {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            );
        }

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

/// Parse a JSON value out of raw model output.
pub fn parse_json<T>(response: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    if let Ok(parsed) = serde_json::from_str::<T>(response) {
        return Ok(parsed);
    }

    // Reasoning models sometimes prepend a <think> block
    let cleaned = if let Some(think_end) = response.rfind("</think>") {
        &response[think_end + 8..]
    } else {
        response
    };

    if let Ok(parsed) = serde_json::from_str::<T>(cleaned.trim()) {
        return Ok(parsed);
    }

    let json_content = if let Some(start) = cleaned.find("```json") {
        let after_start = &cleaned[start + 7..];
        if let Some(end) = after_start.find("```") {
            after_start[..end].trim()
        } else {
            cleaned
        }
    } else if let Some(start) = cleaned.find('{') {
        if let Some(end) = cleaned.rfind('}') {
            &cleaned[start..=end]
        } else {
            cleaned
        }
    } else {
        cleaned
    };

    serde_json::from_str::<T>(json_content.trim()).context(format!(
        "Failed to parse JSON. Extracted: {} | Original: {}",
        json_content,
        response.chars().take(500).collect::<String>()
    ))
}

/// Pull a trailing `confidence: 0.x` marker out of a free-text answer.
///
/// Models asked for a confidence level sometimes emit it as a prose line
/// instead of JSON; this recovers it. Out-of-range values are clamped.
pub fn extract_confidence(answer: &str) -> Option<f32> {
    let re = regex_lite::Regex::new(r"(?i)confidence[^0-9]*([01](?:\.\d+)?)").ok()?;
    let caps = re.captures_iter(answer).last()?;
    let value: f32 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Probe {
        useful: bool,
        confidence: f32,
    }

    #[test]
    fn parses_clean_json() {
        let probe: Probe = parse_json(r#"{"useful": true, "confidence": 0.9}"#).unwrap();
        assert!(probe.useful);
    }

    #[test]
    fn parses_json_in_markdown_fence() {
        let raw = "Here you go:\n```json\n{\"useful\": false, \"confidence\": 0.2}\n```";
        let probe: Probe = parse_json(raw).unwrap();
        assert!(!probe.useful);
    }

    #[test]
    fn parses_json_after_think_block() {
        let raw = "<think>hmm, the docs look thin</think>{\"useful\": false, \"confidence\": 0.3}";
        let probe: Probe = parse_json(raw).unwrap();
        assert!((probe.confidence - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn parses_json_embedded_in_prose() {
        let raw = "Sure. {\"useful\": true, \"confidence\": 0.85} Hope that helps!";
        let probe: Probe = parse_json(raw).unwrap();
        assert!(probe.useful);
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_json::<Probe>("no structure here at all").is_err());
    }

    #[test]
    fn extracts_trailing_confidence_line() {
        let answer = "Pokémon Gold and Silver were released in 1999.\n\nConfidence: 0.95";
        assert_eq!(extract_confidence(answer), Some(0.95));
    }

    #[test]
    fn extracts_last_confidence_marker() {
        let answer = "confidence: 0.2 was my first guess, but final confidence: 0.8";
        assert_eq!(extract_confidence(answer), Some(0.8));
    }

    #[test]
    fn no_confidence_marker_yields_none() {
        assert_eq!(extract_confidence("released in 1999"), None);
    }
}
