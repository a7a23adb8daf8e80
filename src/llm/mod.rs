pub mod claude;
pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// A single prompt message sent to a provider
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatRequest {
    pub messages: Vec<LlmMessage>,
    pub model: String,
    pub stream: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChatResponse {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    pub delta: String,
    pub done: bool,
}

/// Unified LLM provider enum. Dispatches to OpenAI-compatible, Claude or Gemini backends.
#[derive(Debug, Clone)]
pub enum Provider {
    OpenAi(openai::OpenAiConfig),
    Claude(claude::ClaudeConfig),
    Ollama(openai::OpenAiConfig),
    Gemini(gemini::GeminiConfig),
}

impl Provider {
    pub fn openai(api_key: String) -> Self {
        Provider::OpenAi(openai::OpenAiConfig {
            api_key,
            base_url: openai::DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn claude(api_key: String) -> Self {
        Provider::Claude(claude::ClaudeConfig {
            api_key,
            base_url: claude::DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn ollama(host: String) -> Self {
        Provider::Ollama(openai::OpenAiConfig {
            api_key: String::new(),
            base_url: format!("{}/v1", host.trim_end_matches('/')),
        })
    }

    pub fn gemini(api_key: String) -> Self {
        Provider::Gemini(gemini::GeminiConfig {
            api_key,
            base_url: gemini::DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAi(_) => "openai",
            Provider::Claude(_) => "claude",
            Provider::Ollama(_) => "ollama",
            Provider::Gemini(_) => "gemini",
        }
    }

    /// Fail early when a hosted provider has no credential configured
    fn ensure_credentials(&self) -> Result<(), LlmError> {
        let key = match self {
            Provider::OpenAi(config) => &config.api_key,
            Provider::Claude(config) => &config.api_key,
            Provider::Gemini(config) => &config.api_key,
            Provider::Ollama(_) => return Ok(()),
        };
        if key.trim().is_empty() {
            return Err(LlmError::MissingApiKey(self.name()));
        }
        Ok(())
    }

    pub async fn chat(&self, http: &Client, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.ensure_credentials()?;
        match self {
            Provider::OpenAi(config) | Provider::Ollama(config) => {
                openai::chat(http, config, request).await
            }
            Provider::Claude(config) => claude::chat(http, config, request).await,
            Provider::Gemini(config) => gemini::chat(http, config, request).await,
        }
    }

    pub async fn chat_stream(
        &self,
        http: &Client,
        request: &ChatRequest,
        on_chunk: impl Fn(StreamChunk) + Send,
    ) -> Result<String, LlmError> {
        self.ensure_credentials()?;
        match self {
            Provider::OpenAi(config) | Provider::Ollama(config) => {
                openai::chat_stream(http, config, request, on_chunk).await
            }
            Provider::Claude(config) => claude::chat_stream(http, config, request, on_chunk).await,
            Provider::Gemini(config) => gemini::chat_stream(http, config, request, on_chunk).await,
        }
    }

    pub async fn embed(
        &self,
        http: &Client,
        texts: &[String],
        model: &str,
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        self.ensure_credentials()?;
        match self {
            Provider::OpenAi(config) | Provider::Ollama(config) => {
                openai::embed(http, config, texts, model).await
            }
            Provider::Gemini(config) => gemini::embed(http, config, texts, model).await,
            Provider::Claude(_) => Err(LlmError::Unsupported(
                "claude does not offer an embeddings endpoint".into(),
            )),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("{0} API key not configured")]
    MissingApiKey(&'static str),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

/// Turn a non-success HTTP response into [`LlmError::Api`]
pub(crate) async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    Err(LlmError::Api { status, message })
}

/// Accumulates streamed bytes and yields complete, trimmed lines.
///
/// Bytes are only decoded once a full line is present, so a multi-byte
/// character split across network chunks survives intact.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line[..pos]).trim().to_string())
    }
}

/// Text generation seam used by the index
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, messages: &[LlmMessage]) -> Result<String, LlmError>;

    /// Stream the answer to `on_chunk`. The default forwards the full answer as one delta.
    async fn generate_stream(
        &self,
        messages: &[LlmMessage],
        on_chunk: &(dyn Fn(StreamChunk) + Send + Sync),
    ) -> Result<String, LlmError> {
        let content = self.generate(messages).await?;
        on_chunk(StreamChunk {
            delta: content.clone(),
            done: false,
        });
        on_chunk(StreamChunk {
            delta: String::new(),
            done: true,
        });
        Ok(content)
    }
}

/// A provider bound to one chat model
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: Client,
    provider: Provider,
    model: String,
}

impl ChatClient {
    pub fn new(provider: Provider, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            provider,
            model: model.into(),
        }
    }

    fn request(&self, messages: &[LlmMessage], stream: bool) -> ChatRequest {
        ChatRequest {
            messages: messages.to_vec(),
            model: self.model.clone(),
            stream,
        }
    }
}

#[async_trait]
impl Generator for ChatClient {
    async fn generate(&self, messages: &[LlmMessage]) -> Result<String, LlmError> {
        tracing::debug!(provider = self.provider.name(), model = %self.model, "chat request");
        let response = self
            .provider
            .chat(&self.http, &self.request(messages, false))
            .await?;
        Ok(response.content)
    }

    async fn generate_stream(
        &self,
        messages: &[LlmMessage],
        on_chunk: &(dyn Fn(StreamChunk) + Send + Sync),
    ) -> Result<String, LlmError> {
        tracing::debug!(provider = self.provider.name(), model = %self.model, "streaming chat request");
        self.provider
            .chat_stream(&self.http, &self.request(messages, true), |chunk| on_chunk(chunk))
            .await
    }
}
