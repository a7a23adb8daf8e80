use super::{check_status, ChatRequest, ChatResponse, LineBuffer, LlmError, StreamChunk};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ClaudeMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ClaudeMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ClaudeResponse {
    content: Vec<ClaudeContent>,
}

#[derive(Deserialize)]
struct ClaudeContent {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ClaudeStreamEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: ClaudeDelta },
    #[serde(rename = "message_stop")]
    MessageStop {},
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ClaudeDelta {
    text: Option<String>,
}

/// System messages move to the top-level `system` field; the rest stay in order.
fn build_request(request: &ChatRequest) -> ClaudeRequest {
    let system: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .collect();

    let messages: Vec<ClaudeMessage> = request
        .messages
        .iter()
        .filter(|m| m.role != "system")
        .map(|m| ClaudeMessage {
            role: m.role.clone(),
            content: m.content.clone(),
        })
        .collect();

    ClaudeRequest {
        model: request.model.clone(),
        max_tokens: MAX_TOKENS,
        messages,
        stream: request.stream,
        system: (!system.is_empty()).then(|| system.join("\n\n")),
    }
}

fn post(http: &Client, config: &ClaudeConfig) -> RequestBuilder {
    http.post(format!("{}/v1/messages", config.base_url))
        .header("Content-Type", "application/json")
        .header("x-api-key", &config.api_key)
        .header("anthropic-version", API_VERSION)
}

pub async fn chat(
    http: &Client,
    config: &ClaudeConfig,
    request: &ChatRequest,
) -> Result<ChatResponse, LlmError> {
    let resp = post(http, config)
        .json(&build_request(request))
        .send()
        .await?;
    let resp = check_status(resp).await?;

    let data: ClaudeResponse = resp.json().await?;
    let content = data
        .content
        .into_iter()
        .map(|c| c.text)
        .collect::<Vec<_>>()
        .join("");

    Ok(ChatResponse { content })
}

pub async fn chat_stream(
    http: &Client,
    config: &ClaudeConfig,
    request: &ChatRequest,
    on_chunk: impl Fn(StreamChunk) + Send,
) -> Result<String, LlmError> {
    let resp = post(http, config)
        .json(&build_request(request))
        .send()
        .await?;
    let resp = check_status(resp).await?;

    let mut full_content = String::new();
    let mut stream = resp.bytes_stream();
    let mut buffer = LineBuffer::default();

    'outer: while let Some(chunk) = stream.next().await {
        buffer.push(&chunk?);

        while let Some(line) = buffer.next_line() {
            let Some(data) = line.strip_prefix("data: ") else {
                continue;
            };
            match serde_json::from_str::<ClaudeStreamEvent>(data) {
                Ok(ClaudeStreamEvent::ContentBlockDelta { delta }) => {
                    if let Some(text) = delta.text {
                        full_content.push_str(&text);
                        on_chunk(StreamChunk {
                            delta: text,
                            done: false,
                        });
                    }
                }
                Ok(ClaudeStreamEvent::MessageStop {}) => break 'outer,
                Ok(ClaudeStreamEvent::Other) | Err(_) => {}
            }
        }
    }

    on_chunk(StreamChunk {
        delta: String::new(),
        done: true,
    });
    Ok(full_content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmMessage;

    #[test]
    fn test_build_request_extracts_system() {
        let request = ChatRequest {
            messages: vec![
                LlmMessage::system("Answer from the documents."),
                LlmMessage::user("What is this about?"),
            ],
            model: "claude-sonnet-4-20250514".into(),
            stream: true,
        };

        let body = build_request(&request);
        assert_eq!(body.system.as_deref(), Some("Answer from the documents."));
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.messages[0].role, "user");
        assert!(body.stream);
    }

    #[test]
    fn test_build_request_without_system() {
        let request = ChatRequest {
            messages: vec![LlmMessage::user("hi")],
            model: "m".into(),
            stream: false,
        };
        let body = serde_json::to_value(build_request(&request)).unwrap();
        assert!(body.get("system").is_none());
        assert_eq!(body["max_tokens"], MAX_TOKENS);
    }

    #[test]
    fn test_stream_event_parsing() {
        let event: ClaudeStreamEvent = serde_json::from_str(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
        )
        .unwrap();
        assert!(matches!(event, ClaudeStreamEvent::ContentBlockDelta { delta } if delta.text.as_deref() == Some("Hi")));

        let event: ClaudeStreamEvent = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(event, ClaudeStreamEvent::Other));
    }
}
