//! LLM API Providers
//!
//! Groq serves an OpenAI-compatible chat completions API, so one client
//! covers it (and any other OpenAI-compatible endpoint via `GROQ_BASE_URL`).

use super::*;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_TEMPERATURE: f32 = 1.0;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Configuration
// ============================================================================

/// LLM configuration loaded from environment
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: Option<f32>,
    /// Completion token cap; the provider default applies when unset.
    pub max_tokens: Option<u32>,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("GROQ_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let temperature = match lookup("LLM_TEMPERATURE") {
            Some(raw) => Some(raw.trim().parse::<f32>().map_err(|_| {
                ConfigError::Invalid(format!("LLM_TEMPERATURE is not a number: {raw:?}"))
            })?),
            None => Some(DEFAULT_TEMPERATURE),
        };

        let max_tokens = match lookup("LLM_MAX_TOKENS") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<u32>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| {
                        ConfigError::Invalid(format!(
                            "LLM_MAX_TOKENS is not a positive integer: {raw:?}"
                        ))
                    })?,
            ),
            None => None,
        };

        let timeout_secs = match lookup("LLM_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                ConfigError::Invalid(format!("LLM_TIMEOUT_SECS is not an integer: {raw:?}"))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_key,
            model: lookup("GROQ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: lookup("GROQ_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            temperature,
            max_tokens,
            timeout_secs,
        })
    }

    /// Create Groq config
    pub fn groq(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("GROQ_API_KEY is not set; add it to the environment or a .env file")]
    MissingApiKey,
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Groq (OpenAI-compatible) client
// ============================================================================

pub struct GroqClient {
    client: Client,
    config: LlmConfig,
}

impl GroqClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    fn request_body(&self, request: &ChatRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_to_wire).collect();

        let mut body = json!({
            "model": self.config.model,
            "messages": messages,
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = json!(match request.tool_choice {
                ToolChoice::Auto => "auto",
                ToolChoice::None => "none",
            });
        }

        if let Some(temp) = request.temperature.or(self.config.temperature) {
            body["temperature"] = json!(temp);
        }
        if let Some(max_tokens) = request.max_tokens.or(self.config.max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }

        body
    }
}

fn message_to_wire(message: &Message) -> Value {
    match message {
        Message::System(content) | Message::User(content) => json!({
            "role": message.role(),
            "content": content,
        }),
        Message::Assistant {
            content,
            tool_calls,
        } => {
            let mut out = json!({
                "role": "assistant",
                "content": content,
            });
            if !tool_calls.is_empty() {
                out["tool_calls"] = json!(tool_calls
                    .iter()
                    .map(|c| json!({
                        "id": c.id,
                        "type": "function",
                        "function": {"name": c.name, "arguments": c.arguments},
                    }))
                    .collect::<Vec<_>>());
            }
            out
        }
        Message::Tool { call_id, content } => json!({
            "role": "tool",
            "tool_call_id": call_id,
            "content": content,
        }),
    }
}

/// Parse `choices[0]` of an OpenAI-style completion.
pub(crate) fn parse_completion(data: &Value) -> Result<ChatResponse, LlmError> {
    let choice = data["choices"]
        .get(0)
        .ok_or_else(|| LlmError::InvalidResponse("missing choices[0]".to_string()))?;
    let message = &choice["message"];

    let content = message["content"]
        .as_str()
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty());

    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for (idx, call) in calls.iter().enumerate() {
            let function = &call["function"];
            let name = function["name"]
                .as_str()
                .ok_or_else(|| LlmError::InvalidResponse("tool call without name".to_string()))?;
            let arguments = match &function["arguments"] {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            tool_calls.push(ToolCall {
                id: call["id"]
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("call_{idx}")),
                name: name.to_string(),
                arguments,
            });
        }
    }

    let finish_reason = match choice["finish_reason"].as_str() {
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    };

    Ok(ChatResponse {
        content,
        tool_calls,
        finish_reason,
        usage: Usage {
            prompt_tokens: data["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as usize,
            completion_tokens: data["usage"]["completion_tokens"].as_u64().unwrap_or(0) as usize,
        },
    })
}

#[async_trait]
impl ChatModel for GroqClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let body = self.request_body(request);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if response.status() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(LlmError::RateLimited {
                retry_after_ms: retry_after * 1000,
            });
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("{status}: {error_text}")));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let parsed = parse_completion(&data)?;
        tracing::debug!(
            model = %self.config.model,
            tool_calls = parsed.tool_calls.len(),
            prompt_tokens = parsed.usage.prompt_tokens,
            completion_tokens = parsed.usage.completion_tokens,
            "chat completion received"
        );
        Ok(parsed)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_config_requires_api_key() {
        let result = LlmConfig::from_lookup(lookup_from(&[]));
        assert!(matches!(result, Err(ConfigError::MissingApiKey)));
        let result = LlmConfig::from_lookup(lookup_from(&[("GROQ_API_KEY", "  ")]));
        assert!(matches!(result, Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn test_config_defaults() {
        let config = LlmConfig::from_lookup(lookup_from(&[("GROQ_API_KEY", "gsk_test")])).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.temperature, Some(1.0));
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.max_tokens, None);
        assert!(!format!("{config:?}").contains("gsk_test"));
    }

    #[test]
    fn test_config_reads_max_tokens() {
        let config = LlmConfig::from_lookup(lookup_from(&[
            ("GROQ_API_KEY", "k"),
            ("LLM_MAX_TOKENS", " 512 "),
        ]))
        .unwrap();
        assert_eq!(config.max_tokens, Some(512));

        for bad in ["0", "-3", "mucho"] {
            let result = LlmConfig::from_lookup(lookup_from(&[
                ("GROQ_API_KEY", "k"),
                ("LLM_MAX_TOKENS", bad),
            ]));
            assert!(matches!(result, Err(ConfigError::Invalid(_))), "{bad}");
        }
    }

    #[test]
    fn test_config_rejects_bad_numbers() {
        let result = LlmConfig::from_lookup(lookup_from(&[
            ("GROQ_API_KEY", "k"),
            ("LLM_TEMPERATURE", "warm"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn request_body_includes_tools_and_history() {
        let client = GroqClient::new(LlmConfig::groq("k", "m")).unwrap();
        let call = ToolCall {
            id: "call_1".into(),
            name: "lookup".into(),
            arguments: "{}".into(),
        };
        let request = ChatRequest::new(vec![
            Message::system("sys"),
            Message::user("hola"),
            Message::Assistant {
                content: None,
                tool_calls: vec![call],
            },
            Message::Tool {
                call_id: "call_1".into(),
                content: "{\"ok\":true}".into(),
            },
        ])
        .with_tools(
            vec![ToolSpec {
                name: "lookup".into(),
                description: "d".into(),
                parameters: json!({"type": "object"}),
            }],
            ToolChoice::None,
        );

        let body = client.request_body(&request);
        assert_eq!(body["model"], "m");
        assert_eq!(body["tool_choice"], "none");
        assert_eq!(body["tools"][0]["function"]["name"], "lookup");
        assert_eq!(body["messages"][2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(body["messages"][3]["tool_call_id"], "call_1");
        assert_eq!(body["temperature"], json!(1.0));
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn request_max_tokens_overrides_config() {
        let mut config = LlmConfig::groq("k", "m");
        config.max_tokens = Some(256);
        let client = GroqClient::new(config).unwrap();

        let body = client.request_body(&ChatRequest::new(vec![Message::user("hola")]));
        assert_eq!(body["max_tokens"], json!(256));

        let body = client
            .request_body(&ChatRequest::new(vec![Message::user("hola")]).with_max_tokens(Some(64)));
        assert_eq!(body["max_tokens"], json!(64));
    }

    #[test]
    fn parses_tool_calls_and_text() {
        let data = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "consulta", "arguments": "{\"limit\":3}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 4}
        });
        let parsed = parse_completion(&data).unwrap();
        assert_eq!(parsed.content, None);
        assert_eq!(parsed.finish_reason, FinishReason::ToolCalls);
        assert_eq!(parsed.tool_calls[0].arguments, "{\"limit\":3}");
        assert_eq!(parsed.usage.prompt_tokens, 10);

        let text = parse_completion(&json!({
            "choices": [{"message": {"content": "Hola"}, "finish_reason": "stop"}]
        }))
        .unwrap();
        assert_eq!(text.content.as_deref(), Some("Hola"));
        assert!(text.tool_calls.is_empty());
    }

    #[test]
    fn missing_choices_is_invalid() {
        assert!(matches!(
            parse_completion(&json!({"error": "x"})),
            Err(LlmError::InvalidResponse(_))
        ));
    }
}
