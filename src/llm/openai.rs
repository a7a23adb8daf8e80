use super::{check_status, ChatRequest, ChatResponse, LineBuffer, LlmError, StreamChunk};
use futures::StreamExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    stream: bool,
}

#[derive(Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiStreamResponse {
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

fn build_request(request: &ChatRequest) -> OpenAiRequest {
    OpenAiRequest {
        model: request.model.clone(),
        messages: request
            .messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.clone(),
                content: m.content.clone(),
            })
            .collect(),
        stream: request.stream,
    }
}

fn post(http: &Client, config: &OpenAiConfig, path: &str) -> RequestBuilder {
    let req = http
        .post(format!("{}/{}", config.base_url, path))
        .header("Content-Type", "application/json");

    if config.api_key.is_empty() {
        req
    } else {
        req.header("Authorization", format!("Bearer {}", config.api_key))
    }
}

pub async fn chat(
    http: &Client,
    config: &OpenAiConfig,
    request: &ChatRequest,
) -> Result<ChatResponse, LlmError> {
    let resp = post(http, config, "chat/completions")
        .json(&build_request(request))
        .send()
        .await?;
    let resp = check_status(resp).await?;

    let data: OpenAiResponse = resp.json().await?;
    let content = data
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .unwrap_or_default();

    Ok(ChatResponse { content })
}

/// What one `data:` line of the completion stream carries. The final chunk
/// may carry both text and a finish reason.
#[derive(Debug, Default, PartialEq)]
struct StreamEvent {
    delta: Option<String>,
    done: bool,
}

fn parse_stream_line(line: &str) -> StreamEvent {
    let Some(data) = line.strip_prefix("data: ") else {
        return StreamEvent::default();
    };
    if data == "[DONE]" {
        return StreamEvent {
            delta: None,
            done: true,
        };
    }

    match serde_json::from_str::<OpenAiStreamResponse>(data) {
        Ok(parsed) => match parsed.choices.into_iter().next() {
            Some(choice) => StreamEvent {
                delta: choice.delta.content.filter(|c| !c.is_empty()),
                done: choice.finish_reason.is_some(),
            },
            None => StreamEvent::default(),
        },
        Err(_) => StreamEvent::default(),
    }
}

pub async fn chat_stream(
    http: &Client,
    config: &OpenAiConfig,
    request: &ChatRequest,
    on_chunk: impl Fn(StreamChunk) + Send,
) -> Result<String, LlmError> {
    let resp = post(http, config, "chat/completions")
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
            let event = parse_stream_line(&line);
            if let Some(content) = event.delta {
                full_content.push_str(&content);
                on_chunk(StreamChunk {
                    delta: content,
                    done: false,
                });
            }
            if event.done {
                break 'outer;
            }
        }
    }

    on_chunk(StreamChunk {
        delta: String::new(),
        done: true,
    });
    Ok(full_content)
}

/// Generate embeddings through the OpenAI-compatible `/embeddings` endpoint
pub async fn embed(
    http: &Client,
    config: &OpenAiConfig,
    texts: &[String],
    model: &str,
) -> Result<Vec<Vec<f32>>, LlmError> {
    let resp = post(http, config, "embeddings")
        .json(&EmbeddingRequest { model, input: texts })
        .send()
        .await?;
    let resp = check_status(resp).await?;

    let data: EmbeddingResponse = resp.json().await?;
    Ok(data.data.into_iter().map(|d| d.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmMessage;

    fn delta(text: &str) -> StreamEvent {
        StreamEvent {
            delta: Some(text.into()),
            done: false,
        }
    }

    #[test]
    fn test_parse_stream_line() {
        let done = StreamEvent {
            delta: None,
            done: true,
        };
        assert_eq!(
            parse_stream_line(r#"data: {"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#),
            delta("Hel")
        );
        assert_eq!(
            parse_stream_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#),
            done
        );
        assert_eq!(parse_stream_line("data: [DONE]"), done);
        assert_eq!(parse_stream_line(": keep-alive"), StreamEvent::default());
        assert_eq!(parse_stream_line("data: not json"), StreamEvent::default());
    }

    #[test]
    fn test_final_chunk_keeps_its_text() {
        assert_eq!(
            parse_stream_line(r#"data: {"choices":[{"delta":{"content":"end."},"finish_reason":"stop"}]}"#),
            StreamEvent {
                delta: Some("end.".into()),
                done: true,
            }
        );
    }

    #[test]
    fn test_build_request_keeps_roles() {
        let request = ChatRequest {
            messages: vec![LlmMessage::system("be brief"), LlmMessage::user("hi")],
            model: "gpt-4o-mini".into(),
            stream: true,
        };
        let body = serde_json::to_value(build_request(&request)).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
    }
}
