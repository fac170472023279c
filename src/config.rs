use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_DATABASE_FILE: &str = "invoices.csv";
/// Default local embedding model (bge-base offers better retrieval
/// accuracy than MiniLM at acceptable load time)
const DEFAULT_EMBEDDING_MODEL: &str = "bge-base-en-v1.5";
/// Default timeout for embedding HTTP calls in seconds
const DEFAULT_EMBEDDING_TIMEOUT_SECS: u64 = 10;
const DEFAULT_VOCAB_TTL_SECS: i64 = 300;

/// Configuration for the embedding provider
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// "local", "http" or "none"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model name for embeddings (e.g., "bge-base-en-v1.5" locally, or
    /// the provider's model id over HTTP)
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Endpoint for the "http" provider (OpenAI embeddings shape)
    #[serde(default)]
    pub endpoint: String,

    /// Bearer token for the "http" provider
    #[serde(default)]
    pub api_key: Option<String>,

    /// Timeout for embedding HTTP calls in seconds
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            endpoint: String::new(),
            api_key: None,
            timeout_secs: DEFAULT_EMBEDDING_TIMEOUT_SECS,
        }
    }
}

fn default_provider() -> String {
    if cfg!(feature = "local-embed") {
        "local".to_string()
    } else {
        "none".to_string()
    }
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_embedding_timeout_secs() -> u64 {
    DEFAULT_EMBEDDING_TIMEOUT_SECS
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_file")]
    pub database_file: String,
    #[serde(default = "default_vocab_ttl_secs")]
    pub vocab_ttl_secs: i64,
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

fn default_database_file() -> String {
    DEFAULT_DATABASE_FILE.to_string()
}

fn default_vocab_ttl_secs() -> i64 {
    DEFAULT_VOCAB_TTL_SECS
}

impl Config {
    fn validate(&mut self) {
        if self.database_file.trim().is_empty() {
            self.database_file = default_database_file();
        }

        if self.vocab_ttl_secs < 0 {
            panic!(
                "vocab_ttl_secs must not be negative, got {}",
                self.vocab_ttl_secs
            );
        }

        match self.embedding.provider.as_str() {
            "local" | "http" | "none" => {}
            other => panic!("embedding.provider must be 'local', 'http' or 'none', got '{other}'"),
        }

        if self.embedding.provider == "http" && self.embedding.endpoint.trim().is_empty() {
            panic!("embedding.endpoint is required when embedding.provider is 'http'");
        }

        if self.embedding.timeout_secs == 0 {
            panic!("embedding.timeout_secs must be greater than 0");
        }
    }

    pub fn load_with(base_path: &str) -> Self {
        std::fs::create_dir_all(base_path).expect("couldnt create config directory");
        let config_path = Path::new(base_path).join("config.yaml");

        // create new if does not exist
        if !config_path.exists() {
            std::fs::write(
                &config_path,
                serde_yml::to_string(&Self::default()).unwrap(),
            )
            .expect("couldnt write default config");
        }

        let config_str =
            std::fs::read_to_string(&config_path).expect("config file is not valid utf8");
        let mut config: Self = serde_yml::from_str(&config_str).expect("config is malformed");

        config.base_path = base_path.to_string();

        config.validate();

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config).unwrap() {
            config.save();
        }

        config
    }

    pub fn save(&self) {
        let config_path = Path::new(&self.base_path).join("config.yaml");
        let config_str = serde_yml::to_string(&self).unwrap();
        std::fs::write(config_path, config_str).expect("couldnt save config");
    }

    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.base_path).join(&self.database_file)
    }

    pub fn cache_dir(&self) -> PathBuf {
        Path::new(&self.base_path).join("cache")
    }
}
