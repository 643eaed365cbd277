//! Completion service client.
//!
//! Speaks the OpenAI chat-completions API (also served by Azure OpenAI and
//! most local gateways) with a configurable base URL. Calls are not retried.

use crate::error::{AgentError, AgentResult};
use crate::llm::Prompt;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Longest slice of an error body kept in the error message.
const ERROR_BODY_LIMIT: usize = 200;

/// Something that turns a prompt into raw model text.
pub trait CompletionService: Send + Sync {
    fn complete(&self, prompt: &Prompt) -> impl Future<Output = AgentResult<String>> + Send;
}

/// OpenAI-compatible chat-completions client.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    api_key: String,
    model: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> AgentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentError::configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Request body for one prompt. Temperature is fixed at 0.
    pub fn request_body(&self, prompt: &Prompt) -> Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
            "temperature": 0.0
        })
    }

    /// Extract `choices[0].message.content`. Missing or blank content is
    /// unusable output.
    pub fn parse_response(json: &Value) -> AgentResult<String> {
        let content = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AgentError::completion("unusable output: missing choices[0].message.content", None)
            })?;

        if content.trim().is_empty() {
            return Err(AgentError::completion("unusable output: empty reply", None));
        }
        Ok(content.to_string())
    }

    fn map_send_error(&self, err: reqwest::Error) -> AgentError {
        if err.is_timeout() {
            AgentError::timeout("completion request", self.timeout.as_secs() as u32)
        } else {
            AgentError::from(err)
        }
    }
}

impl CompletionService for OpenAiClient {
    fn complete(&self, prompt: &Prompt) -> impl Future<Output = AgentResult<String>> + Send {
        let body = self.request_body(prompt);
        async move {
            debug!(model = %self.model, "Requesting completion");

            let resp = self
                .client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| self.map_send_error(e))?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                let snippet: String = text.chars().take(ERROR_BODY_LIMIT).collect();
                return Err(AgentError::completion(
                    format!("HTTP {}: {}", status, snippet),
                    Some(status.as_u16()),
                ));
            }

            let json: Value = resp.json().await.map_err(|e| self.map_send_error(e))?;
            Self::parse_response(&json)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new(
            "sk-test",
            "gpt-4o-mini",
            "https://api.openai.com/v1/",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_new_trims_base_url() {
        let c = client();
        assert_eq!(c.base_url(), "https://api.openai.com/v1");
        assert_eq!(c.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_request_body() {
        let prompt = Prompt {
            system: "rules".to_string(),
            user: "Question: q".to_string(),
        };
        let body = client().request_body(&prompt);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.0);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "rules");
        assert_eq!(body["messages"][1]["role"], "user");
    }

    #[test]
    fn test_parse_response() {
        let raw = serde_json::json!({
            "choices": [{"message": {"content": "SELECT COUNT(*) FROM products"}}]
        });
        assert_eq!(
            OpenAiClient::parse_response(&raw).unwrap(),
            "SELECT COUNT(*) FROM products"
        );
    }

    #[test]
    fn test_parse_response_unusable() {
        let missing = serde_json::json!({"choices": []});
        assert!(matches!(
            OpenAiClient::parse_response(&missing),
            Err(AgentError::Completion { .. })
        ));

        let blank = serde_json::json!({"choices": [{"message": {"content": "  "}}]});
        assert!(matches!(
            OpenAiClient::parse_response(&blank),
            Err(AgentError::Completion { .. })
        ));
    }
}
