use anyhow::Context;
use consult_agent::{
    LlmClient, LlmOracle, LlmProvider, LlmSummarizer, ModelConfig, SessionConfig, SessionMode,
    SessionRunner, SessionServices, TurnBudget,
};
use consult_gateway::GatewayConfig;
use consult_memory::embedding::{EmbeddingBackend, EmbeddingConfig};
use consult_memory::store::VectorStoreConfig;
use consult_memory::Retriever;
use consult_session::{CommandRenderer, NoopRenderer, RendererConfig, ReportRenderer};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct ConsultConfig {
    #[serde(default = "default_chat")]
    pub chat: ModelConfig,
    #[serde(default = "default_summarizer")]
    pub summarizer: ModelConfig,
    /// Completion judge; the summarizer model when absent.
    pub oracle: Option<ModelConfig>,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub server: GatewayConfig,
    /// PDF conversion; reports stay markdown-only when absent.
    pub renderer: Option<RendererConfig>,
}

#[derive(Debug, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_max_continuations")]
    pub max_continuations: u32,
    pub max_turn_secs: Option<u64>,
    #[serde(default)]
    pub single_shot: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_continuations: default_max_continuations(),
            max_turn_secs: None,
            single_shot: false,
        }
    }
}

fn default_chat() -> ModelConfig {
    ModelConfig::new(LlmProvider::Gemini, "gemini-1.5-pro")
}

fn default_summarizer() -> ModelConfig {
    ModelConfig::new(LlmProvider::Gemini, "gemini-1.5-flash")
}

fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_max_continuations() -> u32 {
    8
}

impl Default for ConsultConfig {
    fn default() -> Self {
        Self {
            chat: default_chat(),
            summarizer: default_summarizer(),
            oracle: None,
            embedding: EmbeddingConfig::default(),
            vector_store: VectorStoreConfig::default(),
            session: SessionSettings::default(),
            server: GatewayConfig::default(),
            renderer: None,
        }
    }
}

impl ConsultConfig {
    /// Read `path`, or fall back to defaults when it does not exist.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Invalid config file '{}'", path.display()))?;
        Ok(config)
    }

    /// Fill empty API keys from the environment.
    pub fn resolve_keys(&mut self) {
        self.resolve_keys_with(|name| std::env::var(name).ok());
    }

    pub fn resolve_keys_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let models = [
            Some(&mut self.chat),
            Some(&mut self.summarizer),
            self.oracle.as_mut(),
        ];
        for model in models.into_iter().flatten() {
            if model.api_key.is_empty() {
                model.api_key = lookup(model.api_key_env()).unwrap_or_default();
            }
        }
        if self.embedding.provider == EmbeddingBackend::OpenAi && self.embedding.api_key.is_empty() {
            self.embedding.api_key = lookup("OPENAI_API_KEY").unwrap_or_default();
        }
        if self.vector_store.api_key.is_empty() {
            self.vector_store.api_key = lookup("PINECONE_API_KEY").unwrap_or_default();
        }
    }

    pub fn turn_budget(&self) -> TurnBudget {
        TurnBudget {
            max_continuations: self.session.max_continuations,
            max_duration: self.session.max_turn_secs.map(Duration::from_secs),
        }
    }

    pub fn session_config(&self, mode: SessionMode) -> SessionConfig {
        let mut config = SessionConfig::new(self.session.output_dir.clone());
        config.budget = self.turn_budget();
        config.mode = mode;
        config
    }

    /// Wire models, retrieval and rendering into a runner.
    pub async fn build_runner(&self, mode: SessionMode) -> anyhow::Result<SessionRunner> {
        if self.chat.api_key.is_empty() {
            warn!(env = self.chat.api_key_env(), "No API key for the chat model");
        }

        let chat = Arc::new(LlmClient::new(self.chat.clone()));
        let summarizer_client = Arc::new(LlmClient::new(self.summarizer.clone()));
        let oracle_client = match &self.oracle {
            Some(config) => Arc::new(LlmClient::new(config.clone())),
            None => summarizer_client.clone(),
        };

        let store = self
            .vector_store
            .build()
            .await
            .context("Failed to set up the vector store")?;
        let retriever = Retriever::new(
            self.embedding.build(),
            store,
            self.vector_store.namespace.clone(),
            self.vector_store.top_k,
        );

        let renderer: Arc<dyn ReportRenderer> = match &self.renderer {
            Some(config) => {
                info!(program = %config.program, "PDF rendering enabled");
                Arc::new(CommandRenderer::new(config.clone()))
            }
            None => Arc::new(NoopRenderer),
        };

        let services = SessionServices {
            chat,
            summarizer: Arc::new(LlmSummarizer::new(summarizer_client)),
            oracle: Arc::new(LlmOracle::new(oracle_client)),
            retriever: Arc::new(retriever),
            renderer,
        };
        Ok(SessionRunner::new(services, self.session_config(mode)))
    }
}
