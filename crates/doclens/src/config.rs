//! Configuration for the document Q&A pipeline

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "DOCLENS_CONFIG";

/// Config file picked up from the working directory when present
pub const DEFAULT_CONFIG_FILE: &str = "doclens.toml";

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Embedding backend configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Generation backend configuration
    pub llm: LlmConfig,
    /// Retrieval configuration
    pub retrieval: RetrievalConfig,
    /// Vector index configuration
    pub vector_db: VectorDbConfig,
    /// Ingestion processing configuration
    pub processing: ProcessingConfig,
    /// Index lifecycle configuration
    pub lifecycle: LifecycleConfig,
    /// Feedback store configuration
    pub feedback: FeedbackConfig,
}

impl RagConfig {
    /// Parse a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from `$DOCLENS_CONFIG` or `doclens.toml`, falling back
    /// to defaults, then apply `DOCLENS_*` environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            Err(_) => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DOCLENS_EMBEDDINGS_URL") {
            self.embeddings.base_url = url;
        }
        if let Some(model) = lookup("DOCLENS_EMBEDDINGS_MODEL") {
            self.embeddings.model = model;
        }
        if let Some(url) = lookup("DOCLENS_LLM_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = lookup("DOCLENS_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(key) = lookup("DOCLENS_API_KEY") {
            self.embeddings.api_key = Some(key.clone());
            self.llm.api_key = Some(key);
        }
        if let Some(port) = lookup("DOCLENS_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
    }

    /// Reject parameter combinations the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_tokens == 0 {
            return Err(Error::invalid_config("chunking.max_tokens must be > 0"));
        }
        if self.chunking.overlap_tokens >= self.chunking.max_tokens {
            return Err(Error::invalid_config(format!(
                "chunking.overlap_tokens ({}) must be smaller than chunking.max_tokens ({})",
                self.chunking.overlap_tokens, self.chunking.max_tokens
            )));
        }
        if self.retrieval.default_k == 0 {
            return Err(Error::invalid_config("retrieval.default_k must be >= 1"));
        }
        if self.embeddings.batch_size == 0 {
            return Err(Error::invalid_config("embeddings.batch_size must be >= 1"));
        }
        if self.embeddings.provider == BackendProvider::Hash && self.embeddings.dimensions == 0 {
            return Err(Error::invalid_config(
                "embeddings.dimensions must be set for the hash embedder",
            ));
        }
        if self.llm.provider == BackendProvider::Hash {
            return Err(Error::invalid_config(
                "llm.provider 'hash' is only valid for embeddings",
            ));
        }
        Ok(())
    }
}

/// Backend provider selection
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendProvider {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI-compatible HTTP API
    OpenAi,
    /// Deterministic offline feature hashing (embeddings only)
    Hash,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024,
        }
    }
}

/// Embedding backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Backend provider
    pub provider: BackendProvider,
    /// Backend base URL
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Embedding dimensions (768 for nomic-embed-text)
    pub dimensions: usize,
    /// Maximum texts per backend request
    pub batch_size: usize,
    /// Time box for a single backend request
    pub timeout_secs: u64,
    /// API key (OpenAI-compatible backends)
    pub api_key: Option<String>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: BackendProvider::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "nomic-embed-text".to_string(),
            dimensions: 768,
            batch_size: 32,
            timeout_secs: 60,
            api_key: None,
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum tokens (whitespace words) per chunk
    pub max_tokens: usize,
    /// Tokens shared between consecutive chunks
    pub overlap_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 200,
            overlap_tokens: 40,
        }
    }
}

/// Generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend provider
    pub provider: BackendProvider,
    /// Backend base URL
    pub base_url: String,
    /// Generation model name
    pub model: String,
    /// API key (OpenAI-compatible backends)
    pub api_key: Option<String>,
    /// Temperature for generation
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
    /// Delay before the first retry, doubled per attempt
    pub retry_backoff_ms: u64,
    /// Context window size (tokens)
    pub context_size: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: BackendProvider::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            api_key: None,
            temperature: 0.3,
            timeout_secs: 120,
            max_retries: 2,
            retry_backoff_ms: 1000,
            context_size: 4096,
        }
    }
}

/// Similarity metric used by the vector index
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    /// Score is the negated Euclidean distance
    Euclidean,
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks retrieved when the caller does not choose
    pub default_k: usize,
    /// Drop hits scoring below this value
    pub min_similarity: Option<f32>,
    /// Similarity metric
    pub metric: DistanceMetric,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 4,
            min_similarity: None,
            metric: DistanceMetric::Cosine,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorDbConfig {
    /// Persist the index snapshot between runs
    pub persist: bool,
    /// Snapshot location
    pub snapshot_path: PathBuf,
}

impl Default for VectorDbConfig {
    fn default() -> Self {
        Self {
            persist: false,
            snapshot_path: data_dir().join("index.json"),
        }
    }
}

/// Ingestion processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Documents ingested concurrently during a reconciliation round
    pub parallel_documents: usize,
    /// Time box for extracting a single file
    pub parse_timeout_secs: u64,
    /// Fall back to the `pdftotext` binary when in-process PDF extraction fails
    pub use_pdftotext: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_documents: num_cpus::get().clamp(1, 8),
            parse_timeout_secs: 120,
            use_pdftotext: true,
        }
    }
}

/// Index lifecycle configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Re-ingest a tracked name whose content fingerprint changed
    pub reindex_on_content_change: bool,
}

/// Feedback store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Record feedback at all
    pub enabled: bool,
    /// SQLite database path
    pub db_path: PathBuf,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: data_dir().join("feedback.db"),
        }
    }
}

fn data_dir() -> PathBuf {
    // Absolute path so relative working directories don't matter
    dirs::data_local_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")))
        .join("doclens")
}
