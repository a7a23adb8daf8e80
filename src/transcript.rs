use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Download name for the JSON export
pub const JSON_EXPORT_FILE: &str = "chat_history.json";
/// Download name for the plain-text export
pub const TEXT_EXPORT_FILE: &str = "chat_history.txt";

const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Capitalised label used in the text export
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Wall-clock time of day, `HH:MM:SS`
    pub time: String,
    #[serde(skip, default = "Local::now")]
    pub recorded_at: DateTime<Local>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>, at: DateTime<Local>) -> Self {
        Self {
            role,
            content: content.into(),
            time: at.format(TIME_FORMAT).to_string(),
            recorded_at: at,
        }
    }
}

impl PartialEq for ChatMessage {
    fn eq(&self, other: &Self) -> bool {
        self.role == other.role && self.content == other.content && self.time == other.time
    }
}

/// Append-only chat history of one session
#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Record a question and its answer together
    pub fn push_exchange(&mut self, question: ChatMessage, answer: ChatMessage) {
        debug_assert_eq!(question.role, Role::User);
        debug_assert_eq!(answer.role, Role::Assistant);
        self.messages.push(question);
        self.messages.push(answer);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// Pretty-printed JSON array of `{role, content, time}` objects
pub fn export_json(messages: &[ChatMessage]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(messages)
}

/// Read a JSON export back
pub fn parse_json_export(json: &str) -> Result<Vec<ChatMessage>, serde_json::Error> {
    serde_json::from_str(json)
}

/// `"<Role> [<time>]:\n<content>"` per message, separated by a blank line
pub fn export_text(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("{} [{}]:\n{}", m.role.label(), m.time, m.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}
