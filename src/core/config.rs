//! Configuration management for Quarry.
//!
//! Handles loading configuration from TOML files and applying
//! environment overrides.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable that overrides `database.url`.
pub const DATABASE_URL_ENV: &str = "QUARRY_DATABASE_URL";

/// Stand-in for secrets in printed configuration.
const REDACTED: &str = "********";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Relational store settings
    pub database: DatabaseConfig,

    /// Policy similarity index settings
    pub index: IndexConfig,

    /// Text-generation service settings
    pub llm: LlmConfig,

    /// Interactive loop settings
    pub repl: ReplConfig,
}

/// Relational store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Full connection URL. Takes precedence over the individual parts below.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Database host
    pub host: String,

    /// Database port
    pub port: u16,

    /// Database user
    pub user: String,

    /// Database password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Database name
    pub dbname: String,

    /// Catalog namespace to introspect
    pub schema: String,

    /// Upper bound on pooled connections
    pub max_connections: u32,

    /// Seconds to wait for a pooled connection before failing
    pub acquire_timeout_secs: u64,
}

/// Which embedding function the index was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// OpenAI embeddings API
    OpenAi,
    /// Offline feature-hashing embedder
    Hashing,
}

/// What to do when the similarity index cannot be queried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalPolicy {
    /// Abort the current question
    #[default]
    Propagate,
    /// Continue with empty evidence
    Empty,
}

/// Similarity index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the persisted index
    pub path: PathBuf,

    /// Embedding function used for queries
    pub embedder: EmbedderKind,

    /// Embedding model name (OpenAI embedder)
    pub embedding_model: String,

    /// Vector dimensions (hashing embedder)
    pub dimensions: usize,

    /// Behavior when retrieval fails
    pub on_failure: RetrievalPolicy,
}

/// Text-generation provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions
    OpenAi,
    /// Local Ollama server
    Ollama,
}

/// Text-generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider to use
    pub provider: ProviderKind,

    /// Model to use
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens per completion
    pub max_tokens: u32,

    /// Custom API base URL (OpenAI-compatible gateways, remote Ollama)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Interactive loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplConfig {
    /// Maximum number of result rows to print per answer
    pub max_display_rows: usize,

    /// Inputs that end the session (case-insensitive)
    pub exit_keywords: Vec<String>,

    /// Whether to print the model's reasoning for each query
    pub show_reasoning: bool,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.quarry.toml` in current directory
    /// 2. `~/.config/quarry/config.toml`
    /// 3. Falls back to defaults
    ///
    /// Environment overrides are applied afterwards.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(None)
    }

    /// Load configuration, preferring an explicit file when one is given.
    pub fn load_with(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::discover() {
                Some(path) => Self::load_from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Find the first config file that exists, if any.
    pub fn discover() -> Option<PathBuf> {
        let local_config = PathBuf::from(".quarry.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        Self::config_dir().map(|dir| dir.join("config.toml")).filter(|path| path.exists())
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.trim().is_empty() {
                self.database.url = Some(url);
            }
        }

        if self.llm.provider == ProviderKind::Ollama && self.llm.base_url.is_none() {
            if let Ok(host) = std::env::var("OLLAMA_HOST") {
                self.llm.base_url = Some(host);
            }
        }
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("quarry"))
    }

    /// Copy of this config that is safe to print: the password is masked
    /// and the URL keeps everything except its password.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.database.password.is_some() {
            config.database.password = Some(REDACTED.to_string());
        }
        config.database.url = config.database.url.map(|url| crate::store::redact_url(&url));
        config
    }
}

impl DatabaseConfig {
    /// Connection URL for the store.
    ///
    /// An explicit `url` wins; otherwise a `postgres://` URL is assembled from
    /// the individual parts with the password percent-encoded.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }

        let credentials = match &self.password {
            Some(password) => format!("{}:{}", self.user, urlencoding::encode(password)),
            None => self.user.clone(),
        };

        format!("postgres://{}@{}:{}/{}", credentials, self.host, self.port, self.dbname)
    }
}

impl IndexConfig {
    /// Index directory with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        let raw = self.path.to_string_lossy();
        PathBuf::from(shellexpand::tilde(&raw).into_owned())
    }
}

impl ReplConfig {
    /// Check whether an input line should end the session.
    pub fn is_exit(&self, input: &str) -> bool {
        let input = input.trim();
        self.exit_keywords.iter().any(|k| k.eq_ignore_ascii_case(input))
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: None,
            dbname: "postgres".to_string(),
            schema: "public".to_string(),
            max_connections: 5,
            acquire_timeout_secs: 30,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./sales_memory"),
            embedder: EmbedderKind::OpenAi,
            embedding_model: "text-embedding-ada-002".to_string(),
            dimensions: 256,
            on_failure: RetrievalPolicy::Propagate,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model: "gpt-4o".to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            base_url: None,
        }
    }
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            max_display_rows: 10,
            exit_keywords: vec!["exit".to_string(), "quit".to_string(), "q".to_string()],
            show_reasoning: false,
        }
    }
}
