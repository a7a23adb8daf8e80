//! Google Gemini client for the Generative Language API (API-key auth).

use super::{check_status, ChatRequest, ChatResponse, LineBuffer, LlmError, StreamChunk};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const TEMPERATURE: f32 = 0.1;
const MAX_OUTPUT_TOKENS: u32 = 2048;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Serialize)]
struct BatchEmbedRequest {
    requests: Vec<EmbedRequest>,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    content: Content,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Model id without the `models/` resource prefix
fn model_id(model: &str) -> &str {
    model.strip_prefix("models/").unwrap_or(model)
}

fn text_content(role: Option<&str>, text: &str) -> Content {
    Content {
        role: role.map(str::to_string),
        parts: vec![Part {
            text: text.to_string(),
        }],
    }
}

/// Gemini knows `user` and `model` turns; system prompts go to `systemInstruction`.
fn build_request(request: &ChatRequest) -> GenerateRequest {
    let system: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .collect();

    let contents = request
        .messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| {
            let role = if m.role == "assistant" { "model" } else { "user" };
            text_content(Some(role), &m.content)
        })
        .collect();

    GenerateRequest {
        contents,
        system_instruction: (!system.is_empty()).then(|| text_content(None, &system.join("\n\n"))),
        generation_config: GenerationConfig {
            temperature: TEMPERATURE,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        },
    }
}

fn response_text(response: GenerateResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<Vec<_>>().join(""))
        .unwrap_or_default()
}

fn post(http: &Client, config: &GeminiConfig, model: &str, method: &str) -> RequestBuilder {
    http.post(format!(
        "{}/models/{}:{}",
        config.base_url,
        model_id(model),
        method
    ))
    .header("Content-Type", "application/json")
    .header("x-goog-api-key", &config.api_key)
}

pub async fn chat(
    http: &Client,
    config: &GeminiConfig,
    request: &ChatRequest,
) -> Result<ChatResponse, LlmError> {
    let resp = post(http, config, &request.model, "generateContent")
        .json(&build_request(request))
        .send()
        .await?;
    let resp = check_status(resp).await?;

    let data: GenerateResponse = resp.json().await?;
    let content = response_text(data);
    if content.is_empty() {
        return Err(LlmError::Parse("No text in Gemini response".into()));
    }

    Ok(ChatResponse { content })
}

pub async fn chat_stream(
    http: &Client,
    config: &GeminiConfig,
    request: &ChatRequest,
    on_chunk: impl Fn(StreamChunk) + Send,
) -> Result<String, LlmError> {
    let resp = post(http, config, &request.model, "streamGenerateContent")
        .query(&[("alt", "sse")])
        .json(&build_request(request))
        .send()
        .await?;
    let resp = check_status(resp).await?;

    let mut full_content = String::new();
    let mut stream = resp.bytes_stream();
    let mut buffer = LineBuffer::default();

    while let Some(chunk) = stream.next().await {
        buffer.push(&chunk?);

        while let Some(line) = buffer.next_line() {
            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };
            let Ok(parsed) = serde_json::from_str::<GenerateResponse>(data) else {
                continue;
            };
            let text = response_text(parsed);
            if !text.is_empty() {
                full_content.push_str(&text);
                on_chunk(StreamChunk {
                    delta: text,
                    done: false,
                });
            }
        }
    }

    on_chunk(StreamChunk {
        delta: String::new(),
        done: true,
    });
    Ok(full_content)
}

/// Embed a batch of texts with `batchEmbedContents`
pub async fn embed(
    http: &Client,
    config: &GeminiConfig,
    texts: &[String],
    model: &str,
) -> Result<Vec<Vec<f32>>, LlmError> {
    let body = BatchEmbedRequest {
        requests: texts
            .iter()
            .map(|text| EmbedRequest {
                model: format!("models/{}", model_id(model)),
                content: text_content(None, text),
            })
            .collect(),
    };

    let resp = post(http, config, model, "batchEmbedContents")
        .json(&body)
        .send()
        .await?;
    let resp = check_status(resp).await?;

    let data: BatchEmbedResponse = resp.json().await?;
    Ok(data.embeddings.into_iter().map(|e| e.values).collect())
}
