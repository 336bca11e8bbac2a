use dotenvy::dotenv;
use std::env;

/// System prompt used when `WEBFORGE_SYSTEM_PROMPT` is unset. Asking for
/// fenced blocks keeps the extractor on its typed path instead of the
/// raw-text fallback.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert front-end developer. \
Turn the user's description into a single runnable app. \
Prefer a self-contained React component in a ```tsx fenced block \
(default export, Tailwind classes for styling); for static pages answer \
with a complete document in a ```html fenced block. \
Always wrap code in a fenced block tagged with its language and keep prose \
outside the fences short.";

pub struct Config {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
    pub system_prompt: String,
    pub max_retries: usize,
}

impl Config {
    pub fn load() -> Self {
        dotenv().ok();
        Self {
            api_key: env::var("WEBFORGE_API_KEY").unwrap_or_default(),
            endpoint: env::var("WEBFORGE_ENDPOINT")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: env::var("WEBFORGE_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            system_prompt: env::var("WEBFORGE_SYSTEM_PROMPT")
                .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_retries: env::var("WEBFORGE_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
        }
    }
}
