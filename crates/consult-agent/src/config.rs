use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Google Generative Language API (`generateContent` / `streamGenerateContent`).
    Gemini,
    /// OpenAI chat completions, or any server speaking the same protocol.
    OpenAi,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: LlmProvider,
    pub model_id: String,
    #[serde(default)]
    pub api_key: String,
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    8192
}

impl ModelConfig {
    pub fn new(provider: LlmProvider, model_id: impl Into<String>) -> Self {
        Self {
            provider,
            model_id: model_id.into(),
            api_key: String::new(),
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }

    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.provider {
                LlmProvider::Gemini => "https://generativelanguage.googleapis.com",
                LlmProvider::OpenAi => "https://api.openai.com",
            }
        }
    }

    /// Environment variable consulted when `api_key` is left empty.
    pub fn api_key_env(&self) -> &'static str {
        match self.provider {
            LlmProvider::Gemini => "GOOGLE_API_KEY",
            LlmProvider::OpenAi => "OPENAI_API_KEY",
        }
    }
}
