//! OpenAI-compatible chat-completions oracle

use std::time::Duration;

use ckg_core::{ChatPrompt, CodeOracle, OracleError, OracleReply, TokenUsage};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// Base URL or full `/chat/completions` URL
    pub endpoint: Option<String>,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub request_timeout_secs: u64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "gpt-4o".to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            temperature: Some(0.0),
            max_tokens: None,
            request_timeout_secs: 180,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

impl From<OpenAiUsage> for TokenUsage {
    fn from(usage: OpenAiUsage) -> Self {
        TokenUsage::new(
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
        )
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

impl OpenAiResponse {
    fn into_reply(self) -> Result<OracleReply, OracleError> {
        let choice = self
            .choices
            .first()
            .ok_or_else(|| OracleError::Malformed("response did not include choices".into()))?;
        let usage = self.usage.map(TokenUsage::from).unwrap_or_default();
        Ok(OracleReply::new(extract_text(&choice.message.content)).with_usage(usage))
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiOracle {
    client: Client,
    url: String,
    api_key: String,
    settings: OracleSettings,
}

impl OpenAiOracle {
    /// Build a client, reading the API key from `settings.api_key_env`
    pub fn from_env(settings: OracleSettings) -> Result<Self, OracleError> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| OracleError::MissingCredentials(settings.api_key_env.clone()))?;
        Self::with_api_key(settings, api_key)
    }

    pub fn with_api_key(settings: OracleSettings, api_key: impl Into<String>) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| OracleError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: resolve_chat_endpoint(settings.endpoint.as_deref(), DEFAULT_ENDPOINT),
            api_key: api_key.into(),
            settings,
        })
    }

    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn payload(&self, prompt: &ChatPrompt) -> Value {
        let mut payload = json!({
            "model": self.settings.model,
            "messages": prompt.messages,
        });
        if let Some(temp) = self.settings.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = self.settings.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        payload
    }
}

#[async_trait::async_trait]
impl CodeOracle for OpenAiOracle {
    async fn invoke(&self, prompt: &ChatPrompt) -> Result<OracleReply, OracleError> {
        tracing::debug!("POST {} ({:?}, {} messages)", self.url, prompt.kind, prompt.messages.len());
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.payload(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout {
                        secs: self.settings.request_timeout_secs,
                    }
                } else {
                    OracleError::Transport(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status,
                body: truncate(&body, 320),
            });
        }

        let body: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(format!("invalid response: {e}")))?;
        let reply = body.into_reply()?;
        tracing::debug!(
            "Oracle used {} prompt and {} completion tokens",
            reply.usage.prompt_tokens,
            reply.usage.completion_tokens
        );
        Ok(reply)
    }
}

fn resolve_chat_endpoint(endpoint: Option<&str>, default_endpoint: &str) -> String {
    let endpoint = endpoint.unwrap_or(default_endpoint);
    if endpoint.contains("/chat/completions") {
        endpoint.to_string()
    } else {
        format!("{}/chat/completions", endpoint.trim_end_matches('/'))
    }
}

/// Plain string content, or the concatenated text parts of a content array
fn extract_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

pub(crate) fn truncate(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{truncated}...")
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ckg_core::{ChatMessage, PromptKind};

    #[test]
    fn endpoint_resolution() {
        assert_eq!(
            resolve_chat_endpoint(Some("http://localhost:8000/v1/"), DEFAULT_ENDPOINT),
            "http://localhost:8000/v1/chat/completions"
        );
        assert_eq!(resolve_chat_endpoint(None, DEFAULT_ENDPOINT), DEFAULT_ENDPOINT);
    }

    #[test]
    fn truncates_long_bodies() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }

    #[test]
    fn content_parts_are_joined() {
        let content = json!([{"type": "text", "text": "a"}, {"type": "text", "text": "b"}]);
        assert_eq!(extract_text(&content), "ab");
        assert_eq!(extract_text(&json!("plain")), "plain");
    }

    #[test]
    fn usage_is_carried_with_the_text() {
        let body: OpenAiResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "done"}}],
            "usage": {"prompt_tokens": 812, "completion_tokens": 64, "total_tokens": 876}
        }))
        .unwrap();
        let reply = body.into_reply().unwrap();
        assert_eq!(reply.text, "done");
        assert_eq!(reply.usage, TokenUsage::new(812, 64));
    }

    #[test]
    fn missing_usage_counts_nothing() {
        let body: OpenAiResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": "x"}}]})).unwrap();
        assert_eq!(body.into_reply().unwrap().usage, TokenUsage::default());

        let empty: OpenAiResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(empty.into_reply(), Err(OracleError::Malformed(_))));
    }

    #[test]
    fn payload_carries_roles() {
        let oracle = OpenAiOracle::with_api_key(OracleSettings::default(), "k").unwrap();
        let prompt = ChatPrompt::new(PromptKind::Logic)
            .with_message(ChatMessage::system("s"))
            .with_message(ChatMessage::user("u"));
        let payload = oracle.payload(&prompt);
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "u");
        assert_eq!(payload["model"], "gpt-4o");
    }

    #[test]
    fn missing_key_is_reported() {
        let settings = OracleSettings {
            api_key_env: "CKG_TEST_KEY_THAT_IS_NOT_SET".into(),
            ..OracleSettings::default()
        };
        assert!(matches!(
            OpenAiOracle::from_env(settings),
            Err(OracleError::MissingCredentials(_))
        ));
    }
}
