use crate::config::{self, AppConfig, SETTING_KEYS};
use crate::db::Database;

pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub embeddings: bool,
}

/// Stored settings, API keys masked
pub fn list(db: &Database) -> anyhow::Result<String> {
    let stored = db.list_settings()?;
    if stored.is_empty() {
        return Ok(format!(
            "No settings stored. Known keys: {}",
            SETTING_KEYS.join(", ")
        ));
    }
    Ok(stored
        .iter()
        .map(|(key, value)| format!("{} = {}", key, config::mask_secret(key, value)))
        .collect::<Vec<_>>()
        .join("\n"))
}

pub fn set(db: &Database, key: &str, value: &str) -> anyhow::Result<String> {
    config::validate_setting(key, value)?;
    db.set_setting(key, value)?;
    Ok(format!("{} saved", key))
}

pub fn unset(db: &Database, key: &str) -> anyhow::Result<String> {
    if !SETTING_KEYS.contains(&key) {
        return Err(config::ConfigError::UnknownKey(key.to_string()).into());
    }
    Ok(if db.delete_setting(key)? {
        format!("{} removed", key)
    } else {
        format!("{} was not set", key)
    })
}

/// Models usable with the configured credentials
pub fn available_models(config: &AppConfig) -> Vec<ModelInfo> {
    let mut models = Vec::new();

    if config.get("gemini_api_key").is_some() {
        models.extend([
            ModelInfo {
                id: "gemini/gemini-1.5-flash",
                name: "Gemini 1.5 Flash",
                embeddings: false,
            },
            ModelInfo {
                id: "gemini/gemini-1.5-pro",
                name: "Gemini 1.5 Pro",
                embeddings: false,
            },
            ModelInfo {
                id: "gemini/text-embedding-004",
                name: "Gemini text embedding 004",
                embeddings: true,
            },
        ]);
    }

    if config.get("openai_api_key").is_some() {
        models.extend([
            ModelInfo {
                id: "openai/gpt-4o",
                name: "GPT-4o",
                embeddings: false,
            },
            ModelInfo {
                id: "openai/gpt-4o-mini",
                name: "GPT-4o Mini",
                embeddings: false,
            },
            ModelInfo {
                id: "openai/text-embedding-3-small",
                name: "OpenAI text-embedding-3-small",
                embeddings: true,
            },
        ]);
    }

    if config.get("claude_api_key").is_some() {
        models.extend([
            ModelInfo {
                id: "claude/claude-sonnet-4-20250514",
                name: "Claude Sonnet 4",
                embeddings: false,
            },
            ModelInfo {
                id: "claude/claude-haiku-3-5-20241022",
                name: "Claude Haiku 3.5",
                embeddings: false,
            },
        ]);
    }

    // Ollama is local, no key needed
    models.extend([
        ModelInfo {
            id: "ollama/llama3",
            name: "Llama 3",
            embeddings: false,
        },
        ModelInfo {
            id: "ollama/nomic-embed-text",
            name: "Nomic Embed Text",
            embeddings: true,
        },
    ]);

    models
}

pub fn models(config: &AppConfig) -> String {
    let mut lines = vec![
        format!("chat_model = {}", config.chat_model()),
        format!("embedding_model = {}", config.embedding_model()),
        String::new(),
    ];
    for model in available_models(config) {
        let usage = if model.embeddings { "embeddings" } else { "chat" };
        lines.push(format!("{:<36} {} ({})", model.id, model.name, usage));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_list_unset() {
        let db = Database::open_in_memory().unwrap();
        assert!(list(&db).unwrap().starts_with("No settings stored."));

        set(&db, "gemini_api_key", "AIzaSyA1234567890").unwrap();
        set(&db, "top_k", "5").unwrap();
        assert_eq!(
            list(&db).unwrap(),
            "gemini_api_key = AIza...7890\ntop_k = 5"
        );

        assert_eq!(unset(&db, "top_k").unwrap(), "top_k removed");
        assert_eq!(unset(&db, "top_k").unwrap(), "top_k was not set");
    }

    #[test]
    fn test_invalid_settings_are_not_stored() {
        let db = Database::open_in_memory().unwrap();
        assert!(set(&db, "theme", "dark").is_err());
        assert!(set(&db, "chunk_size", "-1").is_err());
        assert!(unset(&db, "theme").is_err());
        assert!(db.list_settings().unwrap().is_empty());
    }

    #[test]
    fn test_available_models_follow_credentials() {
        let ids = |config: &AppConfig| -> Vec<&'static str> {
            available_models(config).iter().map(|m| m.id).collect()
        };

        let local_only = ids(&AppConfig::default());
        assert_eq!(local_only, vec!["ollama/llama3", "ollama/nomic-embed-text"]);

        let config = AppConfig::from_values([("claude_api_key", "sk-ant-123")]);
        assert!(ids(&config).contains(&"claude/claude-sonnet-4-20250514"));
        assert!(!ids(&config).contains(&"openai/gpt-4o"));
        assert!(models(&config).starts_with("chat_model = gemini/gemini-1.5-flash"));
    }
}
