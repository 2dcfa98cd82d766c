//! Service configuration, read from the environment.

/// Connection and model configuration for the core's external collaborators.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared key-value store URL (`REDIS_URL`)
    pub redis_url: String,
    /// Vector store base URL (`QDRANT_URL`)
    pub qdrant_url: String,
    /// Embedding model name (`EMBED_MODEL`)
    pub embed_model: String,
    /// Embedding endpoint base URL (`OLLAMA_API_BASE_URL`)
    pub embed_base_url: String,
    /// LLM model name (`OPENAI_MODEL`)
    pub llm_model: String,
    /// LLM API key (`OPENAI_API_KEY`)
    pub llm_api_key: String,
    /// OpenAI-compatible LLM endpoint base URL (`OPENAI_API_BASE`)
    pub llm_api_base: String,
}

impl Config {
    /// Load configuration from the environment, with local-dev defaults for
    /// the service URLs. Model names have no sensible default and come back
    /// empty when unset.
    pub fn from_env() -> Self {
        Self {
            redis_url: env_or("REDIS_URL", "redis://127.0.0.1:6379"),
            qdrant_url: env_or("QDRANT_URL", "http://127.0.0.1:6333"),
            embed_model: env_or("EMBED_MODEL", ""),
            embed_base_url: env_or("OLLAMA_API_BASE_URL", "http://127.0.0.1:11434"),
            llm_model: env_or("OPENAI_MODEL", ""),
            llm_api_key: env_or("OPENAI_API_KEY", ""),
            llm_api_base: env_or("OPENAI_API_BASE", "https://api.deepseek.com/v1"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
