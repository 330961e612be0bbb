//! Configuration management for Skylens.
//!
//! This module loads and merges configuration from multiple sources:
//! - Defaults
//! - Config file (.skylens/config.yaml)
//! - Environment variables (the deployment names: `RAG_PROVIDER`, `AOAI_*`, ...)
//! - Command-line flags
//!
//! The result is an immutable value built once at startup and passed by
//! reference into the retrieval and answering components.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Retrieval providers understood by the service.
pub const RAG_PROVIDERS: [&str; 4] = ["local", "azure", "ollama", "trigram"];

/// Generation backends understood by the answer composer.
pub const GENERATION_PROVIDERS: [&str; 3] = ["none", "azure", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .skylens/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// HTTP bind address
    pub bind_addr: String,

    /// Allowed CORS origins, "*" or comma separated
    pub allow_origins: String,

    /// METAR provider ("awc" or "avwx")
    pub metar_provider: String,

    /// AVWX API key
    pub avwx_api_key: Option<String>,

    /// Retrieval and answering settings
    pub rag: RagConfig,

    /// Azure OpenAI settings
    pub azure: AzureOpenAiConfig,

    /// Ollama settings
    pub ollama: OllamaConfig,

    /// Log level override
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Retrieval-augmented answering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Retrieval provider: "local", "azure", "ollama", "trigram"
    pub provider: String,

    /// Generation backend: "none", "azure", "ollama". When unset, "azure"
    /// retrieval implies azure generation and everything else implies none.
    pub generation_provider: Option<String>,

    /// Result cache TTL in seconds (0 disables the cache)
    pub cache_ttl_secs: u64,

    /// Maximum cached answers
    pub cache_max_entries: usize,

    /// Timeout for one embedding call
    pub embed_timeout_secs: u64,

    /// Timeout for one generation call
    pub generate_timeout_secs: u64,

    /// Minimum cosine similarity kept by the vector ranker
    pub min_vector_score: f32,

    /// JSONL corpus replacing the built-in curated notices
    pub corpus_path: Option<PathBuf>,

    /// Re-read the corpus source every N seconds
    pub corpus_refresh_secs: Option<u64>,

    /// Embedding dimensions override
    pub embedding_dimensions: Option<usize>,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            generation_provider: None,
            cache_ttl_secs: 300,
            cache_max_entries: 1024,
            embed_timeout_secs: 10,
            generate_timeout_secs: 30,
            min_vector_score: 0.20,
            corpus_path: None,
            corpus_refresh_secs: None,
            embedding_dimensions: None,
        }
    }
}

impl RagConfig {
    /// Resolve the generation backend, `None` meaning extractive answers only.
    pub fn generation_backend(&self) -> Option<&str> {
        match self.generation_provider.as_deref() {
            Some("none") => None,
            Some(provider) => Some(provider),
            None if self.provider == "azure" => Some("azure"),
            None => None,
        }
    }

    /// Whether retrieval uses embeddings.
    pub fn uses_vectors(&self) -> bool {
        self.provider != "local"
    }

    /// Embedding dimensions for the configured provider.
    pub fn dimensions(&self) -> usize {
        if let Some(dimensions) = self.embedding_dimensions {
            return dimensions;
        }
        match self.provider.as_str() {
            "azure" => 1536,
            "ollama" => 768,
            _ => 384,
        }
    }
}

/// Azure OpenAI configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureOpenAiConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_version: String,
    pub deployment_chat: String,
    pub deployment_embed: String,
}

impl Default for AzureOpenAiConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            api_version: "2024-08-01-preview".to_string(),
            deployment_chat: "gpt-4o".to_string(),
            deployment_embed: "text-embedding-3-small".to_string(),
        }
    }
}

/// Ollama configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub endpoint: String,
    pub model: String,
    pub embedding_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    server: Option<ServerSection>,
    rag: Option<RagSection>,
    azure: Option<AzureSection>,
    ollama: Option<OllamaSection>,
    weather: Option<WeatherSection>,
    logging: Option<LoggingSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerSection {
    bind: Option<String>,
    allow_origins: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RagSection {
    provider: Option<String>,
    generation_provider: Option<String>,
    cache_ttl_secs: Option<u64>,
    cache_max_entries: Option<usize>,
    embed_timeout_secs: Option<u64>,
    generate_timeout_secs: Option<u64>,
    min_vector_score: Option<f32>,
    corpus_path: Option<PathBuf>,
    corpus_refresh_secs: Option<u64>,
    embedding_dimensions: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureSection {
    endpoint: Option<String>,
    api_key_env: Option<String>,
    api_version: Option<String>,
    deployment_chat: Option<String>,
    deployment_embed: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OllamaSection {
    endpoint: Option<String>,
    model: Option<String>,
    embedding_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeatherSection {
    metar_provider: Option<String>,
    avwx_api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
    format: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            bind_addr: "0.0.0.0:8000".to_string(),
            allow_origins: "*".to_string(),
            metar_provider: "awc".to_string(),
            avwx_api_key: None,
            rag: RagConfig::default(),
            azure: AzureOpenAiConfig::default(),
            ollama: OllamaConfig::default(),
            log_level: None,
            log_json: false,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment and defaults.
    ///
    /// # Example
    /// ```no_run
    /// use skylens_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Provider: {}", config.rag.provider);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load configuration using `env` to look up environment variables.
    ///
    /// Environment variables:
    /// - `SKYLENS_WORKSPACE`, `SKYLENS_CONFIG`, `SKYLENS_BIND`
    /// - `RAG_PROVIDER`, `GENERATION_PROVIDER`, `NOTAM_CORPUS_PATH`
    /// - `AOAI_ENDPOINT`, `AOAI_API_KEY`, `AOAI_API_VERSION`,
    ///   `AOAI_DEPLOYMENT_CHAT`, `AOAI_DEPLOYMENT_EMBED`
    /// - `ALLOW_ORIGINS`, `METAR_PROVIDER`, `AVWX_API_KEY`
    /// - `LOG_LEVEL` (falls back to `RUST_LOG`), `NO_COLOR`
    pub fn load_with<F>(env: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(workspace) = env("SKYLENS_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }

        if let Some(config_file) = env("SKYLENS_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.skylens_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path, &env)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Some(bind) = env("SKYLENS_BIND") {
            config.bind_addr = bind;
        }
        if let Some(provider) = env("RAG_PROVIDER") {
            config.rag.provider = provider.to_lowercase();
        }
        if let Some(generation) = env("GENERATION_PROVIDER") {
            config.rag.generation_provider = Some(generation.to_lowercase());
        }
        if let Some(path) = env("NOTAM_CORPUS_PATH") {
            config.rag.corpus_path = Some(PathBuf::from(path));
        }
        if let Some(endpoint) = env("AOAI_ENDPOINT") {
            config.azure.endpoint = Some(endpoint);
        }
        if let Some(key) = env("AOAI_API_KEY") {
            config.azure.api_key = Some(key);
        }
        if let Some(version) = env("AOAI_API_VERSION") {
            config.azure.api_version = version;
        }
        if let Some(deployment) = env("AOAI_DEPLOYMENT_CHAT") {
            config.azure.deployment_chat = deployment;
        }
        if let Some(deployment) = env("AOAI_DEPLOYMENT_EMBED") {
            config.azure.deployment_embed = deployment;
        }
        if let Some(origins) = env("ALLOW_ORIGINS") {
            config.allow_origins = origins;
        }
        if let Some(provider) = env("METAR_PROVIDER") {
            config.metar_provider = provider;
        }
        if let Some(key) = env("AVWX_API_KEY") {
            config.avwx_api_key = Some(key);
        }
        if let Some(level) = env("LOG_LEVEL").or_else(|| env("RUST_LOG")) {
            config.log_level = Some(level);
        }
        if env("NO_COLOR").is_some() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml<F>(&self, path: &Path, env: &F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(server) = config_file.server {
            if let Some(bind) = server.bind {
                result.bind_addr = bind;
            }
            if let Some(origins) = server.allow_origins {
                result.allow_origins = origins;
            }
        }

        if let Some(rag) = config_file.rag {
            let target = &mut result.rag;
            if let Some(provider) = rag.provider {
                target.provider = provider.to_lowercase();
            }
            if rag.generation_provider.is_some() {
                target.generation_provider = rag.generation_provider.map(|p| p.to_lowercase());
            }
            if let Some(ttl) = rag.cache_ttl_secs {
                target.cache_ttl_secs = ttl;
            }
            if let Some(max) = rag.cache_max_entries {
                target.cache_max_entries = max;
            }
            if let Some(timeout) = rag.embed_timeout_secs {
                target.embed_timeout_secs = timeout;
            }
            if let Some(timeout) = rag.generate_timeout_secs {
                target.generate_timeout_secs = timeout;
            }
            if let Some(score) = rag.min_vector_score {
                target.min_vector_score = score;
            }
            if let Some(path) = rag.corpus_path {
                // Relative corpus paths are resolved against the workspace
                target.corpus_path = Some(if path.is_relative() {
                    result.workspace.join(path)
                } else {
                    path
                });
            }
            if rag.corpus_refresh_secs.is_some() {
                target.corpus_refresh_secs = rag.corpus_refresh_secs;
            }
            if rag.embedding_dimensions.is_some() {
                target.embedding_dimensions = rag.embedding_dimensions;
            }
        }

        if let Some(azure) = config_file.azure {
            if azure.endpoint.is_some() {
                result.azure.endpoint = azure.endpoint;
            }
            if let Some(key_env) = azure.api_key_env {
                result.azure.api_key = env(&key_env);
            }
            if let Some(version) = azure.api_version {
                result.azure.api_version = version;
            }
            if let Some(deployment) = azure.deployment_chat {
                result.azure.deployment_chat = deployment;
            }
            if let Some(deployment) = azure.deployment_embed {
                result.azure.deployment_embed = deployment;
            }
        }

        if let Some(ollama) = config_file.ollama {
            if let Some(endpoint) = ollama.endpoint {
                result.ollama.endpoint = endpoint;
            }
            if let Some(model) = ollama.model {
                result.ollama.model = model;
            }
            if let Some(model) = ollama.embedding_model {
                result.ollama.embedding_model = model;
            }
        }

        if let Some(weather) = config_file.weather {
            if let Some(provider) = weather.metar_provider {
                result.metar_provider = provider;
            }
            if let Some(key_env) = weather.avwx_api_key_env {
                result.avwx_api_key = env(&key_env);
            }
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
            if let Some(format) = logging.format {
                result.log_json = format.eq_ignore_ascii_case("json");
            }
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and YAML.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        bind_addr: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.rag.provider = provider.to_lowercase();
        }

        if let Some(bind_addr) = bind_addr {
            self.bind_addr = bind_addr;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .skylens directory.
    pub fn skylens_dir(&self) -> PathBuf {
        self.workspace.join(".skylens")
    }

    /// Parse CORS origins from the comma-separated setting.
    pub fn cors_origins(&self) -> Vec<String> {
        if self.allow_origins.trim() == "*" {
            return vec!["*".to_string()];
        }
        self.allow_origins
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect()
    }

    /// Whether Azure OpenAI credentials are present.
    pub fn has_aoai(&self) -> bool {
        self.azure.endpoint.as_deref().is_some_and(|e| !e.is_empty())
            && self.azure.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Whether an AVWX key is present.
    pub fn has_avwx(&self) -> bool {
        self.avwx_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Validate provider selection and credentials.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.rag.provider.as_str();
        if !RAG_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown RAG provider: {}. Supported: {}",
                provider,
                RAG_PROVIDERS.join(", ")
            )));
        }

        if let Some(generation) = self.rag.generation_provider.as_deref() {
            if !GENERATION_PROVIDERS.contains(&generation) {
                return Err(AppError::Config(format!(
                    "Unknown generation provider: {}. Supported: {}",
                    generation,
                    GENERATION_PROVIDERS.join(", ")
                )));
            }
        }

        let needs_azure =
            provider == "azure" || self.rag.generation_backend() == Some("azure");
        if needs_azure && !self.has_aoai() {
            return Err(AppError::Config(
                "Azure OpenAI requires AOAI_ENDPOINT and AOAI_API_KEY".to_string(),
            ));
        }

        if self.rag.cache_max_entries == 0 {
            return Err(AppError::Config(
                "rag.cacheMaxEntries must be at least 1".to_string(),
            ));
        }

        if self.rag.embed_timeout_secs == 0 || self.rag.generate_timeout_secs == 0 {
            return Err(AppError::Config(
                "Backend timeouts must be at least one second".to_string(),
            ));
        }

        Ok(())
    }
}
