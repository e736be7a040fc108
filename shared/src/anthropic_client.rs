use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::config::Settings;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// One block of a user message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

impl ContentBlock {
    pub fn text(txt: impl Into<String>) -> Self {
        ContentBlock::Text { text: txt.into() }
    }

    /// Inline image carried as base64 data.
    pub fn base64_image(media_type: impl Into<String>, data: String) -> Self {
        ContentBlock::Image {
            source: ImageSource {
                kind: "base64",
                media_type: media_type.into(),
                data,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    kind: &'static str,
    pub media_type: String,
    pub data: String,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a [ContentBlock],
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: [Message<'a>; 1],
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("network error: {0}")]
    Network(String),
    #[error("http error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("parse error: {0}")]
    Parse(serde_json::Error),
    #[error("no text response from model")]
    NoText,
}

/// A single-turn completion against a hosted model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends one user message made of `content` and returns the reply text.
    async fn complete(
        &self,
        system: Option<&str>,
        content: Vec<ContentBlock>,
        max_tokens: u32,
    ) -> Result<String, ModelError>;
}

/// Client for the Anthropic messages API.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(
        http: reqwest::Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    /// Builds a client from settings; `Ok(None)` when no usable API key is configured.
    pub fn from_settings(settings: &Settings) -> Result<Option<Self>, reqwest::Error> {
        let Some(key) = settings.anthropic_key() else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.http_timeout_secs))
            .build()?;
        Ok(Some(Self::new(
            http,
            key,
            settings.anthropic_api_base.clone(),
            settings.anthropic_model.clone(),
        )))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(
        &self,
        system: Option<&str>,
        content: Vec<ContentBlock>,
        max_tokens: u32,
    ) -> Result<String, ModelError> {
        let req = MessagesRequest {
            model: &self.model,
            max_tokens,
            system,
            messages: [Message {
                role: "user",
                content: &content,
            }],
        };

        let url = format!("{}/v1/messages", self.base_url);
        debug!("\u{2192} model request: model = {}, blocks = {}", req.model, content.len());
        let res = self
            .http
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                error!("network error to model API: {e}");
                ModelError::Network(e.to_string())
            })?;

        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;
        debug!(
            status = %status,
            "\u{2190} body = {}",
            String::from_utf8_lossy(&bytes[..bytes.len().min(1024)])
        );

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorEnvelope>(&bytes)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned());
            return Err(ModelError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: MessagesResponse = serde_json::from_slice(&bytes).map_err(ModelError::Parse)?;
        match parsed.content.into_iter().next() {
            Some(ResponseBlock { kind, text: Some(text) }) if kind == "text" => Ok(text),
            _ => Err(ModelError::NoText),
        }
    }
}
