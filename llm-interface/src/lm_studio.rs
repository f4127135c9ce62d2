use engager_core::{CoreError, GenerationConfig, LlmError, ResponseGenerator};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::validation::validate_draft;

const PROVIDER: &str = "LM Studio";
const CONNECTION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);
/// Marks where the per-thread part of the response template begins.
const THREAD_CONTEXT_MARKER: &str = "THREAD CONTEXT:";

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: i32,
    pub stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Trimmed text of the first choice, if any.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .map(str::trim)
            .filter(|content| !content.is_empty())
    }
}

/// System prompt: the template up to the line that introduces the thread context.
pub fn system_prompt_from_template(template: &str) -> String {
    template
        .lines()
        .take_while(|line| !line.contains(THREAD_CONTEXT_MARKER))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

pub fn user_message(context: &str) -> String {
    format!(
        "Please write a helpful Reddit comment for this thread:\n\n{context}\n\n\
         Write a helpful, authentic response:"
    )
}

/// Reply drafting through LM Studio's OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct LmStudioClient {
    http_client: Client,
    api_url: String,
    model: String,
    temperature: f32,
    max_tokens: i32,
    system_prompt: String,
}

impl LmStudioClient {
    pub fn new(config: &GenerationConfig, template: &str) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let system_prompt = system_prompt_from_template(template);
        if system_prompt.is_empty() {
            return Err(LlmError::MissingTemplate {
                path: config.prompt_file.display().to_string(),
            }
            .into());
        }

        Ok(Self {
            http_client,
            api_url: config.api_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            system_prompt,
        })
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn models_url(&self) -> String {
        self.api_url.replace("/chat/completions", "/models")
    }

    pub fn build_request(&self, context: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: self.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_message(context),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        }
    }

    pub async fn check_connection(&self) -> Result<(), CoreError> {
        let response = self
            .http_client
            .get(self.models_url())
            .timeout(CONNECTION_CHECK_TIMEOUT)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!("LM Studio API test failed: {}", status);
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                status_code: status.as_u16(),
            }
            .into());
        }

        info!("LM Studio API connection successful");
        Ok(())
    }
}

impl ResponseGenerator for LmStudioClient {
    async fn complete(&self, context: &str) -> Result<String, CoreError> {
        let request = self.build_request(context);
        let response = self
            .http_client
            .post(&self.api_url)
            .json(&request)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("LM Studio API error: {} - {}", status, body);
            return Err(LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                status_code: status.as_u16(),
            }
            .into());
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            error!("Failed to parse LM Studio response: {}", e);
            LlmError::InvalidResponseFormat {
                provider: PROVIDER.to_string(),
            }
        })?;

        let draft = completion
            .first_content()
            .ok_or_else(|| LlmError::EmptyCompletion {
                provider: PROVIDER.to_string(),
            })?
            .to_string();

        validate_draft(&draft)?;

        info!("Generated response ({} chars)", draft.chars().count());
        debug!(
            "Response preview: {}",
            draft.chars().take(100).collect::<String>()
        );
        Ok(draft)
    }
}

fn request_error(error: reqwest::Error) -> CoreError {
    if error.is_timeout() {
        LlmError::RequestTimeout {
            provider: PROVIDER.to_string(),
        }
        .into()
    } else if error.is_connect() {
        error!("Cannot connect to LM Studio - ensure it's running");
        LlmError::ServiceUnavailable {
            provider: PROVIDER.to_string(),
        }
        .into()
    } else {
        CoreError::Network(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = "You are a knowledgeable car-leasing enthusiast.\n\
                            Keep replies under 150 words.\n\
                            \n\
                            THREAD CONTEXT:\n\
                            Subreddit: {subreddit}\n\
                            Title: {title}\n";

    fn config() -> GenerationConfig {
        GenerationConfig {
            api_url: "http://localhost:1234/v1/chat/completions".to_string(),
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn test_system_prompt_stops_at_thread_context() {
        let prompt = system_prompt_from_template(TEMPLATE);
        assert_eq!(
            prompt,
            "You are a knowledgeable car-leasing enthusiast.\nKeep replies under 150 words."
        );
        assert!(!prompt.contains("{title}"));
    }

    #[test]
    fn test_template_without_marker_is_used_whole() {
        assert_eq!(system_prompt_from_template("  Be brief.  \n"), "Be brief.");
    }

    #[test]
    fn test_empty_template_is_rejected() {
        let err = LmStudioClient::new(&config(), "THREAD CONTEXT:\n{title}").unwrap_err();
        assert!(matches!(err, CoreError::Llm(LlmError::MissingTemplate { .. })));
    }

    #[test]
    fn test_request_shape() {
        let client = LmStudioClient::new(&config(), TEMPLATE).unwrap();
        let request = client.build_request("Subreddit: r/leasing\nThread Title: Fees?");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].role, "user");
        assert!(request.messages[1].content.contains("Thread Title: Fees?"));
        assert!(!request.stream);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["max_tokens"], -1);
        assert_eq!(body["model"], "meta-llama-3.1-8b-instruct");
    }

    #[test]
    fn test_models_url() {
        let client = LmStudioClient::new(&config(), TEMPLATE).unwrap();
        assert_eq!(client.models_url(), "http://localhost:1234/v1/models");
    }

    #[test]
    fn test_first_content() {
        let raw = r#"{"choices": [{"index": 0, "message": {"role": "assistant", "content": "  Hello there  "}}]}"#;
        let completion: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(completion.first_content(), Some("Hello there"));

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert_eq!(empty.first_content(), None);

        let blank: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "   "}}]}"#).unwrap();
        assert_eq!(blank.first_content(), None);
    }
}
