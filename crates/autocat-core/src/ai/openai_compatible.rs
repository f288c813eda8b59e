//! OpenAI-compatible backend implementation
//!
//! Works with any server that implements the OpenAI chat completions API:
//! - OpenAI (https://api.openai.com/v1)
//! - vLLM (http://localhost:8000/v1)
//! - LocalAI (http://localhost:8080/v1)
//! - llama-server / llama.cpp (http://localhost:8080/v1)
//! - Ollama (http://localhost:11434/v1)
//!
//! The base URL includes the version segment; requests go to
//! `{base_url}/chat/completions`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::models::Completion;

use super::types::{FunctionSpec, InferenceRequest};
use super::ModelBackend;

/// OpenAI-compatible backend
#[derive(Clone)]
pub struct OpenAICompatibleBackend {
    http_client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAICompatibleBackend {
    /// Create a new OpenAI-compatible backend
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: None,
        }
    }

    /// Create with an API key
    pub fn with_api_key(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            api_key: Some(api_key.to_string()),
            ..Self::new(base_url, model)
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            ..Self::new(&config.base_url, &config.model)
        }
    }

    /// Create a new instance with a different model
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            model: model.to_string(),
            ..self.clone()
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref api_key) => builder.bearer_auth(api_key),
            None => builder,
        }
    }

    /// Make a chat completion request
    async fn chat_completion(&self, request: &InferenceRequest) -> Result<Completion> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: Some(0.1),
            tools: request.function.as_ref().map(|function| {
                vec![ToolDefinition {
                    kind: "function",
                    function,
                }]
            }),
            tool_choice: request.function.as_ref().map(|function| ToolChoice {
                kind: "function",
                function: ToolChoiceFunction {
                    name: &function.name,
                },
            }),
        };

        let response = self
            .authorized(
                self.http_client
                    .post(format!("{}/chat/completions", self.base_url))
                    .json(&body),
            )
            .send()
            .await
            .map_err(|e| Error::model(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Model {
                status: Some(status),
                body,
            });
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::model(format!("Unreadable model response: {}", e)))?;
        debug!(model = %self.model, response = %raw, "Chat completion response");

        let content = extract_content(&raw, request.function.is_some())?;
        Ok(Completion { raw, content })
    }
}

/// Pull the answer out of a chat completion body
///
/// With a function requested, the arguments of the first tool call (or legacy
/// `function_call`) win; plain content is the fallback.
fn extract_content(raw: &serde_json::Value, wants_function: bool) -> Result<String> {
    let parsed: ChatCompletionResponse = serde_json::from_value(raw.clone())
        .map_err(|e| Error::model(format!("Unexpected model response shape: {}", e)))?;

    if let Some(error) = parsed.error {
        return Err(Error::model(error.message));
    }

    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| Error::model("No response from model"))?;

    if wants_function {
        let arguments = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(|call| call.function.arguments)
            .or(message.function_call.map(|call| call.arguments));
        if let Some(arguments) = arguments {
            return Ok(arguments);
        }
    }

    message
        .content
        .ok_or_else(|| Error::model("Model response has no content"))
}

/// OpenAI chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolDefinition<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ToolDefinition<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: &'a FunctionSpec,
}

/// Forces the model to call one specific function
#[derive(Debug, Serialize)]
struct ToolChoice<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ToolChoiceFunction<'a>,
}

#[derive(Debug, Serialize)]
struct ToolChoiceFunction<'a> {
    name: &'a str,
}

/// OpenAI chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    message: String,
}

#[async_trait]
impl ModelBackend for OpenAICompatibleBackend {
    async fn infer(&self, request: &InferenceRequest) -> Result<Completion> {
        debug!(
            model = %self.model,
            function = request.function.as_ref().map(|f| f.name.as_str()),
            "Classifying"
        );
        self.chat_completion(request).await
    }

    async fn health_check(&self) -> bool {
        match self
            .authorized(self.http_client.get(format!("{}/models", self.base_url)))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backend_new_trims_trailing_slash() {
        let backend = OpenAICompatibleBackend::new("http://localhost:8080/v1/", "llama3.2");
        assert_eq!(backend.host(), "http://localhost:8080/v1");
        assert_eq!(backend.model(), "llama3.2");
    }

    #[test]
    fn test_backend_with_api_key() {
        let backend =
            OpenAICompatibleBackend::with_api_key("https://api.openai.com/v1", "gpt-4o", "sk-test");
        assert_eq!(backend.api_key, Some("sk-test".to_string()));
        assert_eq!(backend.with_model("gpt-4o-mini").model(), "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let backend = OpenAICompatibleBackend::new("http://localhost:99999", "llama3.2");
        assert!(!backend.health_check().await);
    }

    #[test]
    fn test_request_serialization_without_function() {
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: "Hello",
            }],
            temperature: Some(0.1),
            tools: None,
            tool_choice: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "Hello");
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
    }

    #[test]
    fn test_request_serialization_with_function() {
        let function = FunctionSpec {
            name: "classify_transaction".into(),
            description: "Classify".into(),
            parameters: json!({"type": "object"}),
        };
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: vec![],
            temperature: None,
            tools: Some(vec![ToolDefinition {
                kind: "function",
                function: &function,
            }]),
            tool_choice: Some(ToolChoice {
                kind: "function",
                function: ToolChoiceFunction {
                    name: &function.name,
                },
            }),
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["tools"][0]["type"], "function");
        assert_eq!(json["tools"][0]["function"]["name"], "classify_transaction");
        assert_eq!(json["tool_choice"]["function"]["name"], "classify_transaction");
    }

    #[test]
    fn test_extract_content_text() {
        let raw = json!({
            "id": "chatcmpl-123",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Groceries"},
                "finish_reason": "stop"
            }]
        });
        assert_eq!(extract_content(&raw, false).unwrap(), "Groceries");
    }

    #[test]
    fn test_extract_content_tool_call() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "classify_transaction", "arguments": "{\"category\":\"Vacation\"}"}
                    }]
                }
            }]
        });
        assert_eq!(
            extract_content(&raw, true).unwrap(),
            r#"{"category":"Vacation"}"#
        );
    }

    #[test]
    fn test_extract_content_legacy_function_call() {
        let raw = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": {"name": "classify_transaction", "arguments": "{}"}
                }
            }]
        });
        assert_eq!(extract_content(&raw, true).unwrap(), "{}");
    }

    #[test]
    fn test_extract_content_provider_error() {
        let raw = json!({"error": {"message": "model overloaded", "type": "server_error"}});
        let err = extract_content(&raw, false).unwrap_err();
        assert!(matches!(err, Error::Model { status: None, ref body } if body == "model overloaded"));
    }

    #[test]
    fn test_extract_content_no_choices() {
        let err = extract_content(&json!({"choices": []}), false).unwrap_err();
        assert!(matches!(err, Error::Model { status: None, .. }));
    }
}
