//! Application settings.
//!
//! Values come from the settings table first, then from the environment, then
//! from built-in defaults.

use crate::db::Database;
use crate::embedding::EmbeddingClient;
use crate::index::{IndexBuilder, IndexOptions};
use crate::llm::{claude, gemini, openai, ChatClient, Provider};
use std::collections::HashMap;
use std::sync::Arc;

pub const DEFAULT_CHAT_MODEL: &str = "gemini/gemini-1.5-flash";
pub const DEFAULT_EMBEDDING_MODEL: &str = "gemini/text-embedding-004";
const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

pub const SETTING_KEYS: &[&str] = &[
    "gemini_api_key",
    "openai_api_key",
    "openai_base_url",
    "claude_api_key",
    "claude_base_url",
    "ollama_host",
    "chat_model",
    "embedding_model",
    "chunk_size",
    "chunk_overlap",
    "top_k",
];

/// Environment variable consulted when a setting is not stored
fn env_var_for(key: &str) -> Option<&'static str> {
    match key {
        "gemini_api_key" => Some("GOOGLE_API_KEY"),
        "openai_api_key" => Some("OPENAI_API_KEY"),
        "openai_base_url" => Some("OPENAI_BASE_URL"),
        "claude_api_key" => Some("ANTHROPIC_API_KEY"),
        "ollama_host" => Some("OLLAMA_HOST"),
        "chat_model" => Some("DOC_CHAT_MODEL"),
        "embedding_model" => Some("DOC_CHAT_EMBEDDING_MODEL"),
        _ => None,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("settings database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Unknown setting key: {0}")]
    UnknownKey(String),
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("{0}")]
    Unsupported(String),
}

/// Reject unknown keys and malformed numbers before they are stored
pub fn validate_setting(key: &str, value: &str) -> Result<(), ConfigError> {
    if !SETTING_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey(key.to_string()));
    }
    if matches!(key, "chunk_size" | "chunk_overlap" | "top_k") {
        parse_count(key, value, key != "chunk_overlap")?;
    }
    Ok(())
}

fn parse_count(key: &str, value: &str, positive: bool) -> Result<usize, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let n: usize = value
        .trim()
        .parse()
        .map_err(|_| invalid("expected a whole number"))?;
    if positive && n == 0 {
        return Err(invalid("must be greater than zero"));
    }
    Ok(n)
}

/// Mask API keys for display
pub fn mask_secret(key: &str, value: &str) -> String {
    if !key.ends_with("_api_key") {
        return value.to_string();
    }
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "********".to_string()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    /// Stored settings with the process environment as fallback
    pub fn load(db: &Database) -> Result<Self, ConfigError> {
        Self::load_with_env(db, |name| std::env::var(name).ok())
    }

    pub fn load_with_env(
        db: &Database,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        for key in SETTING_KEYS {
            let value = match db.get_setting(key)? {
                Some(v) => Some(v),
                None => env_var_for(key).and_then(|name| env(name)),
            };
            if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
                values.insert(key.to_string(), value);
            }
        }
        Ok(Self { values })
    }

    pub fn from_values<K: Into<String>, V: Into<String>>(
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn chat_model(&self) -> &str {
        self.get("chat_model").unwrap_or(DEFAULT_CHAT_MODEL)
    }

    pub fn embedding_model(&self) -> &str {
        self.get("embedding_model").unwrap_or(DEFAULT_EMBEDDING_MODEL)
    }

    pub fn index_options(&self) -> Result<IndexOptions, ConfigError> {
        let defaults = IndexOptions::default();
        let count = |key: &str, default: usize, positive: bool| match self.get(key) {
            Some(value) => parse_count(key, value, positive),
            None => Ok(default),
        };

        let options = IndexOptions {
            chunk_size: count("chunk_size", defaults.chunk_size, true)?,
            chunk_overlap: count("chunk_overlap", defaults.chunk_overlap, false)?,
            top_k: count("top_k", defaults.top_k, true)?,
            batch_size: defaults.batch_size,
        };
        if options.chunk_overlap >= options.chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "chunk_overlap".into(),
                value: options.chunk_overlap.to_string(),
                reason: format!("must be smaller than chunk_size ({})", options.chunk_size),
            });
        }
        Ok(options)
    }

    /// Wire the configured chat and embedding models into an index builder
    pub fn index_builder(&self) -> Result<IndexBuilder, ConfigError> {
        let (chat_provider, chat_model) = resolve_provider(self.chat_model(), self);
        let (embed_provider, embed_model) = resolve_provider(self.embedding_model(), self);
        if matches!(embed_provider, Provider::Claude(_)) {
            return Err(ConfigError::Unsupported(format!(
                "{} cannot be used for embeddings; pick a gemini/, openai/ or ollama/ model",
                self.embedding_model()
            )));
        }

        Ok(IndexBuilder::new(
            Arc::new(EmbeddingClient::new(embed_provider, embed_model)),
            Arc::new(ChatClient::new(chat_provider, chat_model)),
            self.index_options()?,
        ))
    }
}

/// Resolve an LLM provider from a model string like "gemini/gemini-1.5-flash",
/// "openai/gpt-4o", "claude/...", "ollama/...". Unprefixed models use OpenAI.
///
/// A missing API key is only logged here; calls fail at the provider boundary.
pub fn resolve_provider(model: &str, config: &AppConfig) -> (Provider, String) {
    let api_key = |key: &str, provider: &str| {
        config.get(key).map(str::to_string).unwrap_or_else(|| {
            tracing::warn!("{} API key not configured ({})", provider, key);
            String::new()
        })
    };

    if let Some(model_id) = model.strip_prefix("ollama/") {
        let host = config.get("ollama_host").unwrap_or(DEFAULT_OLLAMA_HOST);
        (Provider::ollama(host.to_string()), model_id.to_string())
    } else if let Some(model_id) = model.strip_prefix("gemini/") {
        (
            Provider::Gemini(gemini::GeminiConfig {
                api_key: api_key("gemini_api_key", "Gemini"),
                base_url: gemini::DEFAULT_BASE_URL.to_string(),
            }),
            model_id.to_string(),
        )
    } else if let Some(model_id) = model.strip_prefix("claude/") {
        (
            Provider::Claude(claude::ClaudeConfig {
                api_key: api_key("claude_api_key", "Claude"),
                base_url: config
                    .get("claude_base_url")
                    .unwrap_or(claude::DEFAULT_BASE_URL)
                    .to_string(),
            }),
            model_id.to_string(),
        )
    } else {
        let model_id = model.strip_prefix("openai/").unwrap_or(model);
        (
            Provider::OpenAi(openai::OpenAiConfig {
                api_key: api_key("openai_api_key", "OpenAI"),
                base_url: config
                    .get("openai_base_url")
                    .unwrap_or(openai::DEFAULT_BASE_URL)
                    .to_string(),
            }),
            model_id.to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_setting_wins_over_env() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting("chat_model", "openai/gpt-4o-mini").unwrap();

        let config = AppConfig::load_with_env(&db, |name| match name {
            "DOC_CHAT_MODEL" => Some("ollama/llama3".into()),
            "GOOGLE_API_KEY" => Some("env-key".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.chat_model(), "openai/gpt-4o-mini");
        assert_eq!(config.get("gemini_api_key"), Some("env-key"));
        assert_eq!(config.embedding_model(), DEFAULT_EMBEDDING_MODEL);
    }

    #[test]
    fn test_blank_env_is_ignored() {
        let db = Database::open_in_memory().unwrap();
        let config = AppConfig::load_with_env(&db, |_| Some("  ".into())).unwrap();
        assert_eq!(config.get("gemini_api_key"), None);
        assert_eq!(config.chat_model(), DEFAULT_CHAT_MODEL);
    }

    #[test]
    fn test_resolve_provider_prefixes() {
        let config = AppConfig::from_values([
            ("gemini_api_key", "g-key"),
            ("ollama_host", "http://gpu-box:11434"),
        ]);

        let (provider, model) = resolve_provider("gemini/gemini-1.5-flash", &config);
        assert!(matches!(provider, Provider::Gemini(ref c) if c.api_key == "g-key"));
        assert_eq!(model, "gemini-1.5-flash");

        let (provider, model) = resolve_provider("ollama/llama3", &config);
        assert!(matches!(provider, Provider::Ollama(ref c) if c.base_url == "http://gpu-box:11434/v1"));
        assert_eq!(model, "llama3");

        let (provider, model) = resolve_provider("gpt-4o", &config);
        assert!(matches!(provider, Provider::OpenAi(ref c) if c.api_key.is_empty()));
        assert_eq!(model, "gpt-4o");

        let (provider, _) = resolve_provider("claude/claude-sonnet-4-20250514", &config);
        assert!(matches!(provider, Provider::Claude(_)));
    }

    #[test]
    fn test_index_options_defaults_and_overrides() {
        assert_eq!(
            AppConfig::default().index_options().unwrap(),
            IndexOptions::default()
        );

        let config = AppConfig::from_values([("chunk_size", "200"), ("chunk_overlap", "0"), ("top_k", "5")]);
        let options = config.index_options().unwrap();
        assert_eq!(options.chunk_size, 200);
        assert_eq!(options.chunk_overlap, 0);
        assert_eq!(options.top_k, 5);
    }

    #[test]
    fn test_index_options_rejects_bad_values() {
        let config = AppConfig::from_values([("chunk_size", "100"), ("chunk_overlap", "100")]);
        assert!(matches!(
            config.index_options(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "chunk_overlap"
        ));

        let config = AppConfig::from_values([("top_k", "zero")]);
        assert!(config.index_options().is_err());
    }

    #[test]
    fn test_claude_embeddings_rejected() {
        let config = AppConfig::from_values([("embedding_model", "claude/claude-haiku")]);
        assert!(matches!(config.index_builder(), Err(ConfigError::Unsupported(_))));
        assert!(AppConfig::default().index_builder().is_ok());
    }

    #[test]
    fn test_validate_setting() {
        assert!(validate_setting("top_k", "4").is_ok());
        assert!(validate_setting("chunk_overlap", "0").is_ok());
        assert!(matches!(validate_setting("top_k", "0"), Err(ConfigError::InvalidValue { .. })));
        assert!(matches!(validate_setting("theme", "dark"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("gemini_api_key", "AIzaSyA1234567890"), "AIza...7890");
        assert_eq!(mask_secret("openai_api_key", "short"), "********");
        assert_eq!(mask_secret("top_k", "3"), "3");
    }
}
