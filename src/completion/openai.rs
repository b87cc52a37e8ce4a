//! OpenAI Responses API client
//!
//! Sends a single user message to `POST {base_url}/responses` and joins the
//! `output_text` parts of the reply.

use super::CompletionService;
use crate::config::OpenAiConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// OpenAI completion backend
#[derive(Clone)]
pub struct OpenAiCompletion {
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
    store: bool,
    client: Client,
}

impl OpenAiCompletion {
    /// Build a client from configuration. Fails when no API key is set.
    pub fn from_config(config: &OpenAiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| BotError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(DEFAULT_POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| BotError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_output_tokens: config.max_output_tokens,
            store: config.store,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/responses", self.base_url)
    }

    fn to_request<'a>(&'a self, prompt: &'a str) -> ResponsesRequest<'a> {
        ResponsesRequest {
            model: &self.model,
            input: vec![InputMessage {
                role: "user",
                content: prompt,
            }],
            text: TextOptions {
                format: TextFormat { kind: "text" },
            },
            temperature: self.temperature,
            top_p: self.top_p,
            max_output_tokens: self.max_output_tokens,
            store: self.store,
        }
    }

    /// Turn a non-2xx response into an upstream error, keeping the API's
    /// own message when the body parses.
    async fn handle_error(&self, response: reqwest::Response) -> BotError {
        let status = response.status().as_u16();
        let message = match response.json::<ApiErrorBody>().await {
            Ok(body) => body.error.message,
            Err(_) => "Unknown error".to_string(),
        };
        if status == 429 {
            BotError::Upstream(format!("OpenAI rate limit exceeded: {}", message))
        } else {
            BotError::Upstream(format!("OpenAI API error {}: {}", status, message))
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String> {
        tracing::info!(
            "OpenAI request: model={}, prompt_chars={}",
            self.model,
            prompt.chars().count()
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&self.to_request(prompt))
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("OpenAI response status: {}", status);
        if !status.is_success() {
            let err = self.handle_error(response).await;
            tracing::error!("OpenAI request failed: {}", err);
            return Err(err);
        }

        let reply: ResponsesReply = response.json().await?;
        let text = reply.output_text();
        tracing::info!("OpenAI response: {} chars", text.chars().count());
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<InputMessage<'a>>,
    text: TextOptions,
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
    store: bool,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct TextOptions {
    format: TextFormat,
}

#[derive(Debug, Serialize)]
struct TextFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

impl ResponsesReply {
    /// Concatenate every `output_text` part of every `message` item, trimmed.
    fn output_text(&self) -> String {
        self.output
            .iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content.iter())
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect::<String>()
            .trim()
            .to_string()
    }
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn config_for(server: &mockito::Server) -> OpenAiConfig {
        OpenAiConfig {
            api_key: Some("sk-test".to_string()),
            base_url: format!("{}/v1", server.url()),
            ..OpenAiConfig::default()
        }
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = OpenAiConfig::default();
        assert!(matches!(
            OpenAiCompletion::from_config(&config),
            Err(BotError::Config(_))
        ));
    }

    #[test]
    fn test_output_text_skips_non_text_parts() {
        let reply: ResponsesReply = serde_json::from_str(
            r#"{
                "output": [
                    {"type": "reasoning", "content": []},
                    {"type": "message", "content": [
                        {"type": "output_text", "text": "  Halo! "},
                        {"type": "refusal", "refusal": "no"},
                        {"type": "output_text", "text": "Apa kabar?  "}
                    ]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(reply.output_text(), "Halo! Apa kabar?");
    }

    #[tokio::test]
    async fn test_complete_posts_user_prompt() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/responses")
            .match_header("authorization", "Bearer sk-test")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "gpt-4.1-nano",
                "input": [{"role": "user", "content": "what is rendang?"}],
                "max_output_tokens": 2048,
                "store": true
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"output": [{"type": "message", "content": [{"type": "output_text", "text": "A beef stew."}]}]}"#,
            )
            .create_async()
            .await;

        let client = OpenAiCompletion::from_config(&config_for(&server)).unwrap();
        let text = client.complete("what is rendang?").await.unwrap();

        assert_eq!(text, "A beef stew.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_is_upstream() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/responses")
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": {"message": "Incorrect API key", "type": "invalid_request_error"}}"#)
            .create_async()
            .await;

        let client = OpenAiCompletion::from_config(&config_for(&server)).unwrap();
        match client.complete("hi").await {
            Err(BotError::Upstream(msg)) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("Incorrect API key"));
            }
            other => panic!("expected Upstream, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_output_is_empty_string() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/responses")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"output": []}"#)
            .create_async()
            .await;

        let client = OpenAiCompletion::from_config(&config_for(&server)).unwrap();
        assert_eq!(client.complete("hi").await.unwrap(), "");
    }
}
