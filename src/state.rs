use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::AgentClient;
use crate::error::{AppError, Result};
#[cfg(feature = "embeddings")]
use crate::core::{embeddings::EmbeddingModel, search::SearchIndex};

/// Configuration for the application
#[derive(Clone, Debug)]
pub struct Config {
    /// Base directory for downloaded assets and JSON stores
    pub drive_dir: PathBuf,
    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
    /// Allowed file extensions for uploaded images
    pub allowed_extensions: Vec<String>,
    /// Number of search hits returned per query
    pub top_k: usize,
    /// Hosted agent configuration
    pub agent: AgentConfig,
}

/// Settings for the hosted agent service
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Base URL of the agent REST API
    pub base_url: String,
    /// Bearer token for the agent API
    pub api_key: String,
    /// Identifier of the preconfigured assistant
    pub assistant_id: String,
    /// Optional vector store bound to new threads for file search
    pub vector_store_id: Option<String>,
    /// Fixed interval between run status polls
    pub poll_interval: Duration,
    /// Attempts when backing off on an already-active run
    pub max_backoff_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            drive_dir: PathBuf::from("drive"),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_upload_size: 20 * 1024 * 1024, // 20MB
            allowed_extensions: vec!["jpg", "jpeg", "png", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            top_k: 5,
            agent: AgentConfig::default(),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: String::from("https://api.openai.com/v1"),
            api_key: String::new(),
            assistant_id: String::new(),
            vector_store_id: None,
            poll_interval: Duration::from_secs(2),
            max_backoff_attempts: 5,
        }
    }
}

impl Config {
    /// Build a configuration from environment variables.
    ///
    /// `AGENT_API_KEY` and `ASSISTANT_ID` are required; everything else
    /// falls back to the defaults above.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        config.agent.api_key = std::env::var("AGENT_API_KEY")
            .map_err(|_| AppError::Config("AGENT_API_KEY is not set".to_string()))?;
        config.agent.assistant_id = std::env::var("ASSISTANT_ID")
            .map_err(|_| AppError::Config("ASSISTANT_ID is not set".to_string()))?;
        config.agent.vector_store_id = std::env::var("VECTORSTORE_ID").ok();

        if let Ok(url) = std::env::var("AGENT_BASE_URL") {
            config.agent.base_url = url.trim_end_matches('/').to_string();
        }
        if let Ok(dir) = std::env::var("SHOPSIGHT_DRIVE_DIR") {
            config.drive_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("SHOPSIGHT_BIND") {
            config.bind_addr = addr
                .parse()
                .map_err(|e| AppError::Config(format!("invalid SHOPSIGHT_BIND: {}", e)))?;
        }
        if let Ok(k) = std::env::var("SHOPSIGHT_TOP_K") {
            config.top_k = k
                .parse()
                .map_err(|e| AppError::Config(format!("invalid SHOPSIGHT_TOP_K: {}", e)))?;
        }
        if let Ok(secs) = std::env::var("SHOPSIGHT_POLL_INTERVAL_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| AppError::Config(format!("invalid SHOPSIGHT_POLL_INTERVAL_SECS: {}", e)))?;
            config.agent.poll_interval = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Path of the order ledger JSON file
    pub fn orders_file(&self) -> PathBuf {
        self.drive_dir.join("orders.json")
    }

    /// Path of the thread registry JSON file
    pub fn threads_file(&self) -> PathBuf {
        self.drive_dir.join("threads.json")
    }

    /// Directory holding per-thread chat history files
    pub fn history_dir(&self) -> PathBuf {
        self.drive_dir.join("chat_history")
    }

    /// Path of the TorchScript image encoder checkpoint
    pub fn checkpoint_file(&self) -> PathBuf {
        self.drive_dir.join("clip_image_encoder.pt")
    }

    /// Path of the serialized embedding bank
    pub fn bank_file(&self) -> PathBuf {
        self.drive_dir.join("embedding_bank.json")
    }

    /// Path of the product catalog CSV
    pub fn catalog_file(&self) -> PathBuf {
        self.drive_dir.join("catalog.csv")
    }
}

/// Application state that can be shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Client for the hosted agent API
    pub agent: AgentClient,
    /// Shared embedding model instance (tch modules are not Sync)
    #[cfg(feature = "embeddings")]
    pub model: tokio::sync::Mutex<EmbeddingModel>,
    /// Precomputed embedding bank and catalog
    #[cfg(feature = "embeddings")]
    pub index: SearchIndex,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Load the model and search index and assemble the shared state.
    #[cfg(feature = "embeddings")]
    pub fn initialize(config: Config) -> Result<Arc<Self>> {
        let agent = AgentClient::new(config.agent.clone());
        let model = EmbeddingModel::load(&config.checkpoint_file())?;
        let index = SearchIndex::load(&config.bank_file(), &config.catalog_file())?;

        Ok(Arc::new(Self {
            config,
            agent,
            model: tokio::sync::Mutex::new(model),
            index,
        }))
    }

    /// Assemble the shared state without the embedding stack.
    #[cfg(not(feature = "embeddings"))]
    pub fn initialize(config: Config) -> Result<Arc<Self>> {
        let agent = AgentClient::new(config.agent.clone());
        Ok(Arc::new(Self { config, agent }))
    }

    /// Handle on the order ledger file
    pub fn ledger(&self) -> crate::models::order::OrderLedger {
        crate::models::order::OrderLedger::new(self.config.orders_file())
    }

    /// Handle on the thread registry file
    pub fn threads(&self) -> crate::models::thread::ThreadRegistry {
        crate::models::thread::ThreadRegistry::new(self.config.threads_file())
    }

    /// Handle on the chat history directory
    pub fn history(&self) -> crate::models::chat::ChatHistoryStore {
        crate::models::chat::ChatHistoryStore::new(self.config.history_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_paths() {
        let config = Config::default();
        assert_eq!(config.orders_file(), PathBuf::from("drive/orders.json"));
        assert_eq!(config.threads_file(), PathBuf::from("drive/threads.json"));
        assert_eq!(config.history_dir(), PathBuf::from("drive/chat_history"));
        assert_eq!(config.top_k, 5);
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_requires_credentials() {
        std::env::remove_var("AGENT_API_KEY");
        std::env::remove_var("ASSISTANT_ID");
        assert!(matches!(Config::from_env(), Err(AppError::Config(_))));
    }

    #[test]
    #[serial_test::serial]
    fn test_from_env_overrides() {
        std::env::set_var("AGENT_API_KEY", "sk-test");
        std::env::set_var("ASSISTANT_ID", "asst_test");
        std::env::set_var("SHOPSIGHT_TOP_K", "7");
        std::env::set_var("AGENT_BASE_URL", "https://agent.example.com/v1/");

        let config = Config::from_env().unwrap();
        assert_eq!(config.agent.api_key, "sk-test");
        assert_eq!(config.top_k, 7);
        // Trailing slash is trimmed
        assert_eq!(config.agent.base_url, "https://agent.example.com/v1");

        std::env::remove_var("AGENT_API_KEY");
        std::env::remove_var("ASSISTANT_ID");
        std::env::remove_var("SHOPSIGHT_TOP_K");
        std::env::remove_var("AGENT_BASE_URL");
    }

    #[test]
    fn test_default_agent_config() {
        let agent = AgentConfig::default();
        assert_eq!(agent.base_url, "https://api.openai.com/v1");
        assert_eq!(agent.poll_interval, Duration::from_secs(2));
        assert_eq!(agent.max_backoff_attempts, 5);
    }
}
