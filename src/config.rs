use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address
    pub bind_addr: String,
    /// Allow any origin; the browser frontend is served from another origin
    pub cors_permissive: bool,
    /// Full-text search index connection
    pub index: IndexConfig,
    /// Cross-encoder reranker configuration
    pub reranker: RerankerConfig,
    /// LLM provider configuration
    pub llm: LlmConfig,
    /// Per-request pipeline defaults
    pub pipeline: PipelineDefaults,
}

/// Connection settings for the Elasticsearch-compatible index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Base URL of the cluster. If None, the index is treated as unavailable.
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Index queried by the search flows.
    pub index_name: String,
    /// Fields matched by the multi-field query.
    pub search_fields: Vec<String>,
    pub timeout_secs: u64,
}

/// Configuration for the cross-encoder reranker sidecar (e.g. llama-server or
/// a text-embeddings-inference server exposing `/v1/rerank`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// Base URL for the reranker API (e.g. "http://127.0.0.1:8082").
    pub base_url: Option<String>,
    /// Model name to send in the rerank request.
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "ollama" or "openai"
    pub provider: String,
    /// Base URL for the LLM API
    pub base_url: String,
    /// Model used for summaries
    pub chat_model: String,
    /// API key (only needed for cloud providers)
    pub api_key: Option<String>,
    /// Upper bound on generated tokens per summary
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
}

/// Defaults applied when a request does not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDefaults {
    /// Hits requested from the index
    pub retrieval_size: usize,
    /// Documents kept after reranking
    pub rerank_top_k: usize,
    /// Word budget for the summary context
    pub token_budget: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            cors_permissive: true,
            index: IndexConfig::default(),
            reranker: RerankerConfig::default(),
            llm: LlmConfig::default(),
            pipeline: PipelineDefaults::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            username: None,
            password: None,
            index_name: "serp-ai".to_string(),
            search_fields: vec!["text".to_string()],
            timeout_secs: 30,
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: "cross-encoder/ms-marco-MiniLM-L-6-v2".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            chat_model: "llama3.2".to_string(),
            api_key: None,
            max_output_tokens: 1024,
            timeout_secs: 300,
        }
    }
}

impl Default for PipelineDefaults {
    fn default() -> Self {
        Self {
            retrieval_size: 100,
            rerank_top_k: 5,
            token_budget: 2000,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("PAPER_SEARCH_BIND_ADDR") {
            config.bind_addr = addr;
        }
        if let Some(val) = lookup("CORS_PERMISSIVE") {
            config.cors_permissive = matches!(val.trim(), "1" | "true" | "yes");
        }

        // Index
        if let Some(url) = lookup("ELASTIC_URL").or_else(|| lookup("ELASTIC_URL_PROD")) {
            config.index.url = Some(url);
        }
        if let Some(key) = lookup("ELASTIC_API_KEY").or_else(|| lookup("API_KEY")) {
            config.index.api_key = Some(key);
        }
        if let Some(user) = lookup("ELASTIC_USERNAME") {
            config.index.username = Some(user);
        }
        if let Some(pass) = lookup("ELASTIC_PASSWORD") {
            config.index.password = Some(pass);
        }
        if let Some(name) = lookup("ELASTIC_INDEX") {
            config.index.index_name = name;
        }
        if let Some(fields) = lookup("SEARCH_FIELDS") {
            let fields: Vec<String> = fields
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from)
                .collect();
            if !fields.is_empty() {
                config.index.search_fields = fields;
            }
        }
        if let Some(v) = parse_var(&lookup, "ELASTIC_TIMEOUT_SECS") {
            config.index.timeout_secs = v;
        }

        // Reranker
        if let Some(url) = lookup("RERANKER_BASE_URL") {
            config.reranker.base_url = Some(url);
        }
        if let Some(model) = lookup("CROSS_ENCODER_MODEL") {
            config.reranker.model = model;
        }
        if let Some(v) = parse_var(&lookup, "RERANKER_TIMEOUT_SECS") {
            config.reranker.timeout_secs = v;
        }

        // LLM
        if let Some(provider) = lookup("LLM_PROVIDER") {
            config.llm.provider = provider;
        }
        if let Some(url) = lookup("LLM_BASE_URL") {
            config.llm.base_url = url;
        }
        if let Some(model) = lookup("LLM_CHAT_MODEL") {
            config.llm.chat_model = model;
        }
        if let Some(key) = lookup("LLM_API_KEY") {
            config.llm.api_key = Some(key);
        }
        if let Some(v) = parse_var(&lookup, "LLM_MAX_OUTPUT_TOKENS") {
            config.llm.max_output_tokens = v;
        }
        if let Some(v) = parse_var(&lookup, "LLM_TIMEOUT_SECS") {
            config.llm.timeout_secs = v;
        }

        // Pipeline defaults
        if let Some(v) = parse_var(&lookup, "RETRIEVAL_SIZE") {
            config.pipeline.retrieval_size = v;
        }
        if let Some(v) = parse_var(&lookup, "RERANK_TOP_K") {
            config.pipeline.rerank_top_k = v;
        }
        if let Some(v) = parse_var(&lookup, "CONTEXT_TOKEN_BUDGET") {
            config.pipeline.token_budget = v;
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
