use std::env;
use std::path::PathBuf;

pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_KNOWLEDGE_FILE: &str = "conocimiento.txt";

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub openai_api_url: String,
    pub openai_model: String,
    pub openai_temperature: f32,
    pub openai_timeout_secs: u64,
    pub openai_retry: bool,
    pub knowledge_file: PathBuf,
    pub bot_name: String,
}

impl Default for Config {
    fn default() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }
}

impl Config {
    /// Builds the configuration from `get`, which maps a variable name to its value.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let openai_api_key = get("OPENAI_API_KEY");

        let openai_api_url = get("OPENAI_API_URL")
            .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string());

        let openai_model = get("OPENAI_MODEL")
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());

        let openai_temperature = get("OPENAI_TEMPERATURE")
            .and_then(|v| v.trim().parse::<f32>().ok())
            .filter(|t| t.is_finite())
            .unwrap_or(0.7);

        let openai_timeout_secs = get("OPENAI_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(30);

        let openai_retry = get("OPENAI_RETRY")
            .unwrap_or_else(|| "true".to_string())
            .to_lowercase() == "true";

        let knowledge_file = get("CHATBOT_KNOWLEDGE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_KNOWLEDGE_FILE));

        let bot_name = get("CHATBOT_NAME").unwrap_or_else(|| "Bot".to_string());

        Self {
            openai_api_key,
            openai_api_url,
            openai_model,
            openai_temperature,
            openai_timeout_secs,
            openai_retry,
            knowledge_file,
            bot_name,
        }
    }

    /// Configuration with built-in defaults only, ignoring the environment.
    #[cfg(test)]
    pub fn builtin() -> Self {
        Self::from_lookup(|_| None)
    }
}

/// An empty key or the `not-configured` placeholder counts as unset.
pub fn is_usable_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key != "not-configured"
}
