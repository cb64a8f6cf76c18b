//! Layered configuration and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g. `APP_RETRIEVAL__K=6`).
//! Paths expand `~` and `${VAR}`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Load for the environment named by `RUST_ENV` (default `dev`).
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let config = Self::for_env(&env_name);
        config.settings()?;
        Ok(config)
    }

    pub fn for_env(env_name: &str) -> Self {
        let mut figment =
            Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::Configuration(format!("Failed to get '{}': {}", key, e)))
    }

    /// Extract and validate the full settings tree.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::Configuration(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathsConfig,
    pub models: ModelsConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub loader: LoaderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub docs_dir: String,
    pub index_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self { docs_dir: "docs".to_string(), index_dir: "vectorstore/lancedb".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub chat_model: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub api_base: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub embed_batch_size: usize,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chat_model: "gpt-4".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_dim: 1536,
            api_base: "https://api.openai.com/v1".to_string(),
            temperature: 0.0,
            request_timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: 500,
            embed_batch_size: 64,
        }
    }
}

/// Character-based window sizes for the recursive splitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1500, chunk_overlap: 200 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub k: usize,
    /// Candidates fetched per requested hit before the final re-sort.
    pub candidate_multiplier: usize,
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: 4, candidate_multiplier: 10, max_context_chars: 12_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub workers: usize,
    pub skip_unreadable: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { workers: 4, skip_unreadable: false }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(Error::Configuration(msg.to_string()));
        if self.chunking.chunk_size == 0 {
            return fail("chunking.chunk_size must be greater than zero");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return fail("chunking.chunk_overlap must be smaller than chunking.chunk_size");
        }
        if self.retrieval.k == 0 {
            return fail("retrieval.k must be greater than zero");
        }
        if self.retrieval.candidate_multiplier == 0 {
            return fail("retrieval.candidate_multiplier must be greater than zero");
        }
        if self.retrieval.max_context_chars == 0 {
            return fail("retrieval.max_context_chars must be greater than zero");
        }
        if self.models.embed_batch_size == 0 {
            return fail("models.embed_batch_size must be greater than zero");
        }
        if self.models.embedding_dim == 0 {
            return fail("models.embedding_dim must be greater than zero");
        }
        if self.loader.workers == 0 {
            return fail("loader.workers must be greater than zero");
        }
        Ok(())
    }

    pub fn docs_dir(&self) -> PathBuf {
        expand_path(&self.paths.docs_dir)
    }

    pub fn index_dir(&self) -> PathBuf {
        expand_path(&self.paths.index_dir)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
