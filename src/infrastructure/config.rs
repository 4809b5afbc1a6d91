use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::application::services::{GenerationLimits, PipelineSettings, PromptTemplates};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Everything loaded at startup: `app.yaml` plus `prompts.yaml`.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub config: Config,
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub rag: RagConfig,
    pub worker: WorkerConfig,
    pub cors: CorsConfig,
    pub redis_url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Gemini,
    #[default]
    Groq,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "gemini" => Ok(Self::Gemini),
            "groq" => Ok(Self::Groq),
            other => Err(ConfigError::Invalid {
                key: "llm.provider",
                reason: format!("unknown provider `{other}`"),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u64,
    pub timeout_seconds: u64,
    pub idle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
}

/// Which vector index backs retrieval. Decided once at startup.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum IndexConfig {
    InMemory {
        corpus_path: PathBuf,
    },
    Qdrant {
        url: String,
        collection: String,
        /// Model the collection was embedded with, as recorded by ingestion.
        #[serde(default)]
        embedding_model: Option<String>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub top_k: usize,
    pub history_window: usize,
    pub preview_chars: usize,
    pub corpus_name: String,
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub result_ttl_seconds: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub grounded_system: String,
    pub ungrounded_system: String,
    pub disclaimer: String,
    pub thinking: Vec<String>,
    pub empty_query: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            rag: RagConfig::default(),
            worker: WorkerConfig::default(),
            cors: CorsConfig::default(),
            redis_url: "redis://localhost:6379".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Groq,
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.1,
            max_tokens: 2048,
            timeout_seconds: 90,
            idle_timeout_seconds: 30,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimension: 1536,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::InMemory {
            corpus_path: PathBuf::from("data/corpus.json"),
        }
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            history_window: 4,
            preview_chars: 200,
            corpus_name: "DSM-5-TR".to_string(),
            channel_capacity: 64,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            result_ttl_seconds: 3600,
        }
    }
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            grounded_system: "You are a psychiatric clinical decision support assistant with expertise in \
                DSM-5-TR diagnostic criteria. Base your response ONLY on the numbered sources provided. \
                Structure answers clearly, present diagnostic criteria as numbered lists when applicable \
                and include diagnostic codes when discussing specific disorders."
                .to_string(),
            ungrounded_system: "You are a psychiatric clinical decision support assistant. No reference \
                sources could be retrieved for this question. Say plainly that your answer is not backed \
                by the reference corpus, keep it general, and do not invent citations or source numbers."
                .to_string(),
            disclaimer: "This is a clinical decision support tool and not a replacement for professional \
                psychiatric evaluation."
                .to_string(),
            thinking: vec![
                "Analyzing the question and retrieving DSM-5-TR criteria...".to_string(),
                "Querying the reference index for relevant sections...".to_string(),
            ],
            empty_query: "Please enter a question.".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `app.yaml` and `prompts.yaml` from `dir`; a missing file means
    /// defaults. Environment overrides are applied afterwards.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let mut config = Self {
            config: read_yaml(&dir.join("app.yaml"))?.unwrap_or_default(),
            prompts: read_yaml(&dir.join("prompts.yaml"))?.unwrap_or_default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// `CONFIG_DIR` or `./config`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".into());
        Self::load(dir)
    }

    pub fn apply_env(
        &mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let cfg = &mut self.config;
        if let Some(host) = var("SERVER_HOST") {
            cfg.server.host = host;
        }
        if let Some(port) = var("SERVER_PORT") {
            cfg.server.port = parse("SERVER_PORT", &port)?;
        }
        if let Some(url) = var("REDIS_URL") {
            cfg.redis_url = url;
        }
        if let Some(provider) = var("LLM_PROVIDER") {
            cfg.llm.provider = provider.parse()?;
        }
        if let Some(model) = var("LLM_MODEL") {
            cfg.llm.model = model;
        }
        if let Some(model) = var("EMBEDDING_MODEL") {
            cfg.embedding.model = model;
        }
        if let Some(concurrency) = var("WORKER_CONCURRENCY") {
            cfg.worker.concurrency = parse("WORKER_CONCURRENCY", &concurrency)?;
        }
        if let Some(path) = var("CORPUS_PATH") {
            cfg.index = IndexConfig::InMemory {
                corpus_path: PathBuf::from(path),
            };
        }
        if let Some(url) = var("QDRANT_URL") {
            let (collection, embedding_model) = match &cfg.index {
                IndexConfig::Qdrant {
                    collection,
                    embedding_model,
                    ..
                } => (collection.clone(), embedding_model.clone()),
                IndexConfig::InMemory { .. } => ("knowledge_base".to_string(), None),
            };
            cfg.index = IndexConfig::Qdrant {
                url,
                collection,
                embedding_model,
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let cfg = &self.config;
        let invalid = |key, reason: &str| {
            Err(ConfigError::Invalid {
                key,
                reason: reason.to_string(),
            })
        };

        if cfg.rag.top_k == 0 {
            return invalid("rag.top_k", "must be at least 1");
        }
        if cfg.rag.history_window == 0 {
            return invalid("rag.history_window", "must be at least 1");
        }
        if cfg.rag.preview_chars < 20 {
            return invalid("rag.preview_chars", "must be at least 20");
        }
        if cfg.llm.timeout_seconds == 0 || cfg.llm.idle_timeout_seconds == 0 {
            return invalid("llm.timeout_seconds", "timeouts must be non-zero");
        }
        if cfg.embedding.dimension == 0 {
            return invalid("embedding.dimension", "must be non-zero");
        }
        if cfg.worker.concurrency == 0 {
            return invalid("worker.concurrency", "must be at least 1");
        }
        Ok(())
    }

    pub fn prompt_templates(&self) -> PromptTemplates {
        PromptTemplates {
            grounded_system: self.prompts.grounded_system.clone(),
            ungrounded_system: self.prompts.ungrounded_system.clone(),
            disclaimer: self.prompts.disclaimer.clone(),
        }
    }

    pub fn generation_limits(&self) -> GenerationLimits {
        GenerationLimits {
            total: Duration::from_secs(self.config.llm.timeout_seconds),
            idle: Duration::from_secs(self.config.llm.idle_timeout_seconds),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        let disclaimer = self.prompts.disclaimer.trim();
        PipelineSettings {
            thinking_statuses: self.prompts.thinking.clone(),
            empty_query_message: self.prompts.empty_query.clone(),
            disclaimer: (!disclaimer.is_empty()).then(|| disclaimer.to_string()),
            channel_capacity: self.config.rag.channel_capacity,
        }
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_yaml::from_str(&text)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn test_parse_yaml_with_qdrant_backend() {
        let yaml = r#"
llm:
  provider: anthropic
  model: claude-sonnet-4-5
index:
  backend: qdrant
  url: http://qdrant:6334
  collection: dsm5
  embedding_model: text-embedding-3-small
rag:
  top_k: 3
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.provider, LlmProvider::Anthropic);
        assert_eq!(config.llm.timeout_seconds, 90);
        assert_eq!(config.rag.top_k, 3);
        assert_eq!(config.rag.history_window, 4);
        match config.index {
            IndexConfig::Qdrant {
                collection,
                embedding_model,
                ..
            } => {
                assert_eq!(collection, "dsm5");
                assert_eq!(embedding_model.as_deref(), Some("text-embedding-3-small"));
            }
            other => panic!("unexpected index {other:?}"),
        }
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("SERVER_PORT", "9000"),
            ("LLM_PROVIDER", "gemini"),
            ("QDRANT_URL", "http://localhost:6334"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.config.server.port, 9000);
        assert_eq!(config.config.llm.provider, LlmProvider::Gemini);
        assert!(matches!(config.config.index, IndexConfig::Qdrant { .. }));
    }

    #[test]
    fn test_bad_env_value_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|k| (k == "SERVER_PORT").then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SERVER_PORT", .. }));
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let mut config = AppConfig::default();
        config.config.rag.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path()).unwrap();
        assert_eq!(config.config.rag.corpus_name, "DSM-5-TR");
        assert_eq!(config.prompts.thinking.len(), 2);
    }

    #[test]
    fn test_prompts_file_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("prompts.yaml"), "disclaimer: ''\nthinking: [Searching...]\n")
            .unwrap();
        let config = AppConfig::load(dir.path()).unwrap();

        assert_eq!(config.prompts.thinking, vec!["Searching..."]);
        assert!(config.pipeline_settings().disclaimer.is_none());
    }
}
