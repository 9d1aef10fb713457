use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Document text is clipped before prompting.
const MAX_PROMPT_CHARS: usize = 5000;

static JSON_OBJECT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Fields the refinement pass may contribute. Rule-based values always take
/// precedence; these only fill gaps.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct LlmInfo {
    #[serde(default)]
    pub technical_specs: Option<String>,
    #[serde(default)]
    pub delivery: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub ministry: Option<String>,
}

/// Thin chat-completions wrapper. Without an API key every call is a no-op
/// (`Ok(None)`) and the rule-based pipeline stands alone; transport errors
/// surface as `Err` so the caller can tell "unavailable" from "no data".
pub struct LlmClient {
    api_key: Option<String>,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl LlmClient {
    pub fn new(api_key: Option<String>, model: String, base_url: String) -> Self {
        LlmClient {
            api_key: api_key.filter(|k| !k.is_empty()),
            model,
            base_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Self {
        let api_key = std::env::var("LLM_API_KEY")
            .ok()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        if api_key.as_deref().map_or(true, str::is_empty) {
            warn!("LLM_API_KEY not set, LLM refinement disabled");
        }
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        let base_url = std::env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        LlmClient::new(api_key, model, base_url)
    }

    pub fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        let key = self.api_key.as_ref().ok_or_else(|| anyhow!("llm disabled"))?;
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0.3,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let value: serde_json::Value = resp.json().await?;
        value["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("malformed chat completion response"))
    }

    /// Structured extraction over the leading slice of the document.
    pub async fn extract_structured_info(&self, text: &str) -> Result<Option<LlmInfo>> {
        if !self.enabled() {
            return Ok(None);
        }
        let snippet: String = text.chars().take(MAX_PROMPT_CHARS).collect();
        let system = "You are a tender information extraction expert. \
                      Extract fields from tender documents and return strict JSON.";
        let user = format!(
            "Extract from this tender document text:\n\n{}\n\n\
             Extract ONLY these fields:\n\
             1. Technical specifications (if present)\n\
             2. Delivery deadline or period\n\
             3. Project name\n\
             4. Ministry or issuing department\n\n\
             Return JSON with keys: technical_specs, delivery, project_name, ministry",
            snippet
        );
        let reply = self.chat(system, &user).await?;
        debug!("llm structured reply: {} chars", reply.len());
        Ok(parse_llm_json(&reply))
    }

    /// Reformat raw specification lines into clean bullet points.
    pub async fn format_specs(&self, raw_specs: &[String]) -> Result<Option<String>> {
        if !self.enabled() || raw_specs.is_empty() {
            return Ok(None);
        }
        let system = "You are a technical specification formatter. \
                      Produce clean, non-redundant bullet points.";
        let user = format!(
            "Format the following technical specifications into clean bullet points, \
             removing redundancy and keeping technical details precise:\n\n{}",
            raw_specs.join("\n")
        );
        let reply = self.chat(system, &user).await?;
        let trimmed = reply.trim();
        if trimmed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(trimmed.to_string()))
        }
    }
}

/// Pull the first JSON object out of a chat reply (models wrap JSON in prose
/// or code fences more often than not).
pub fn parse_llm_json(reply: &str) -> Option<LlmInfo> {
    let candidate = JSON_OBJECT_RE.find(reply)?;
    match serde_json::from_str(candidate.as_str()) {
        Ok(info) => Some(info),
        Err(e) => {
            warn!("failed to parse LLM JSON reply: {}", e);
            None
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_json_with_surrounding_prose() {
        let reply = r#"Sure, here is the data:
{"technical_specs": "3 core cable", "delivery": null, "project_name": "Rural Phase II", "ministry": "Ministry of Power"}
Let me know if you need more."#;
        let info = parse_llm_json(reply).unwrap();
        assert_eq!(info.technical_specs.as_deref(), Some("3 core cable"));
        assert_eq!(info.delivery, None);
        assert_eq!(info.ministry.as_deref(), Some("Ministry of Power"));
    }

    #[test]
    fn parse_json_missing_keys_defaults() {
        let info = parse_llm_json(r#"{"project_name": "X"}"#).unwrap();
        assert!(info.technical_specs.is_none());
        assert_eq!(info.project_name.as_deref(), Some("X"));
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(parse_llm_json("no structured data here").is_none());
        assert!(parse_llm_json("{broken json").is_none());
    }

    #[tokio::test]
    async fn disabled_client_contributes_nothing() {
        let client = LlmClient::new(None, DEFAULT_MODEL.into(), DEFAULT_BASE_URL.into());
        assert!(!client.enabled());
        let info = client.extract_structured_info("some tender text").await.unwrap();
        assert!(info.is_none());
        let formatted = client.format_specs(&["a: b".into()]).await.unwrap();
        assert!(formatted.is_none());
    }
}
