//! OpenAI-compatible chat-completion provider (Groq, OpenRouter, OpenAI).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::LlmProvider;
use crate::config::{AppConfig, ProviderPreset};
use crate::error::{ConfigError, ProviderError};
use crate::types::{ChatRequest, ChatResponse};

pub struct OpenAiCompatibleProvider {
    name: String,
    api_key: String,
    api_base: String,
    app_title: Option<String>,
    referer: Option<String>,
    client: reqwest::Client,
}

// --- API Request Types (OpenAI format) ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

// --- API Response Types ---

#[derive(Deserialize, Debug)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize, Debug)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ApiResponseMessage {
    content: Option<String>,
}

// --- Implementation ---

impl OpenAiCompatibleProvider {
    pub fn new(
        name: impl Into<String>,
        api_key: String,
        api_base: String,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            name: name.into(),
            api_key,
            api_base,
            app_title: None,
            referer: None,
            client,
        })
    }

    /// Build the provider described by `config`, authenticating with `api_key`.
    pub fn from_config(config: &AppConfig, api_key: String) -> Result<Self, ConfigError> {
        let name = match config.preset()? {
            ProviderPreset::Groq => "Groq",
            ProviderPreset::OpenRouter => "OpenRouter",
            ProviderPreset::OpenAiCompatible => "OpenAI-Compatible",
        };
        let provider = Self::new(
            name,
            api_key,
            config.api_base()?,
            Duration::from_secs(config.provider.request_timeout_secs),
        )?;
        Ok(provider.with_attribution(
            config.provider.app_title.clone(),
            config.provider.referer.clone(),
        ))
    }

    pub fn with_attribution(mut self, app_title: Option<String>, referer: Option<String>) -> Self {
        self.app_title = app_title;
        self.referer = referer;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }

    fn build_api_request<'a>(&self, request: &'a ChatRequest) -> ApiRequest<'a> {
        ApiRequest {
            model: &request.model,
            messages: request
                .messages
                .iter()
                .map(|msg| ApiMessage {
                    role: msg.role.as_str(),
                    content: &msg.content,
                })
                .collect(),
        }
    }

    fn parse_response(&self, body: &str) -> Result<ChatResponse, ProviderError> {
        let api_response: ApiResponse = serde_json::from_str(body)
            .map_err(|e| ProviderError::Malformed(format!("invalid JSON body: {e}")))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Malformed("no choices returned".to_string()))?;

        let content = choice
            .message
            .content
            .ok_or_else(|| ProviderError::Malformed("choice has no message content".to_string()))?;

        Ok(ChatResponse {
            content,
            model: api_response.model,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let url = self.endpoint();
        let api_request = self.build_api_request(request);

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&api_request);
        if let Some(title) = &self.app_title {
            builder = builder.header("X-Title", title);
        }
        if let Some(referer) = &self.referer {
            builder = builder.header("HTTP-Referer", referer);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status { status, body });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(&url, e))?;
        self.parse_response(&body)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
