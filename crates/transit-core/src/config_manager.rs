use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("Failed to read config: {0}")]
    ReadError(String),

    #[error("Failed to parse config: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration for the transit concierge
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TransitConfig {
    /// Tier thresholds and cache lifetimes
    #[serde(default)]
    pub layer: LayerConfig,

    /// Prompt budget defaults
    #[serde(default)]
    pub token: TokenConfig,

    /// Model identifiers per agent tier
    #[serde(default)]
    pub models: ModelConfig,

    /// Route resolution data sources
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Per-tier timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Streaming channel settings
    #[serde(default)]
    pub stream: StreamConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Cascade tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Template result cache lifetime in milliseconds
    #[serde(default = "default_template_cache_ttl_ms")]
    pub template_cache_ttl_ms: u64,

    /// Operational status snapshot lifetime in seconds
    #[serde(default = "default_status_cache_ttl_secs")]
    pub status_cache_ttl_secs: u64,

    /// Minimum similarity for vector search hits
    #[serde(default = "default_rag_threshold")]
    pub rag_threshold: f64,

    /// Maximum vector search hits
    #[serde(default = "default_rag_top_k")]
    pub rag_top_k: usize,

    /// Graph hops used to widen the retrieval filter
    #[serde(default = "default_graph_rag_hops")]
    pub graph_rag_hops: usize,

    /// Cap on node IDs produced by graph expansion
    #[serde(default = "default_graph_rag_max_nodes")]
    pub graph_rag_max_nodes: usize,

    /// Minimum skill confidence accepted from the registry
    #[serde(default = "default_skill_min_confidence")]
    pub skill_min_confidence: f64,

    /// Number of skill candidates the registry may try
    #[serde(default = "default_skill_max_candidates")]
    pub skill_max_candidates: usize,
}

impl LayerConfig {
    pub fn template_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.template_cache_ttl_ms)
    }

    pub fn status_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.status_cache_ttl_secs)
    }
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            template_cache_ttl_ms: default_template_cache_ttl_ms(),
            status_cache_ttl_secs: default_status_cache_ttl_secs(),
            rag_threshold: default_rag_threshold(),
            rag_top_k: default_rag_top_k(),
            graph_rag_hops: default_graph_rag_hops(),
            graph_rag_max_nodes: default_graph_rag_max_nodes(),
            skill_min_confidence: default_skill_min_confidence(),
            skill_max_candidates: default_skill_max_candidates(),
        }
    }
}

/// Prompt budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Prompt profile: "aggressive", "balanced", "quality"
    #[serde(default = "default_token_profile")]
    pub default_profile: String,

    /// Response mode: "concise", "standard", "detailed"
    #[serde(default = "default_response_mode")]
    pub default_response_mode: String,

    #[serde(default = "default_context_tokens")]
    pub default_context_tokens: usize,

    /// Character budget for the retrieval summary block
    #[serde(default = "default_rag_summary_max_chars")]
    pub rag_summary_max_chars: usize,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            default_profile: default_token_profile(),
            default_response_mode: default_response_mode(),
            default_context_tokens: default_context_tokens(),
            rag_summary_max_chars: default_rag_summary_max_chars(),
        }
    }
}

/// Model identifiers reported in traces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_general_model")]
    pub general_agent: String,

    #[serde(default = "default_fast_model")]
    pub fast_agent: String,

    #[serde(default = "default_general_model")]
    pub status_agent: String,

    #[serde(default = "default_general_model")]
    pub route_agent: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            general_agent: default_general_model(),
            fast_agent: default_fast_model(),
            status_agent: default_general_model(),
            route_agent: default_general_model(),
        }
    }
}

/// Route resolution configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoutingConfig {
    /// Optional JSON file replacing the built-in place specs
    #[serde(default)]
    pub place_specs_path: Option<PathBuf>,
}

/// Timeouts applied to each external call in the cascade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Status and weather fetches
    #[serde(default = "default_context_fetch_ms")]
    pub context_fetch_ms: u64,

    #[serde(default = "default_skill_ms")]
    pub skill_ms: u64,

    /// Embedding plus vector search
    #[serde(default = "default_retrieval_ms")]
    pub retrieval_ms: u64,

    /// Time allowed for an agent to open its stream
    #[serde(default = "default_agent_connect_secs")]
    pub agent_connect_secs: u64,

    /// Whole-request deadline; the stream closes when it expires
    #[serde(default = "default_request_deadline_secs")]
    pub request_deadline_secs: u64,
}

impl TimeoutConfig {
    pub fn context_fetch(&self) -> Duration {
        Duration::from_millis(self.context_fetch_ms)
    }

    pub fn skill(&self) -> Duration {
        Duration::from_millis(self.skill_ms)
    }

    pub fn retrieval(&self) -> Duration {
        Duration::from_millis(self.retrieval_ms)
    }

    pub fn agent_connect(&self) -> Duration {
        Duration::from_secs(self.agent_connect_secs)
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_deadline_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            context_fetch_ms: default_context_fetch_ms(),
            skill_ms: default_skill_ms(),
            retrieval_ms: default_retrieval_ms(),
            agent_connect_secs: default_agent_connect_secs(),
            request_deadline_secs: default_request_deadline_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Bounded capacity of the per-request event channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "pretty", "json", "compact"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// Default value functions
fn default_template_cache_ttl_ms() -> u64 {
    300_000
}
fn default_status_cache_ttl_secs() -> u64 {
    30
}
fn default_rag_threshold() -> f64 {
    0.5
}
fn default_rag_top_k() -> usize {
    5
}
fn default_graph_rag_hops() -> usize {
    1
}
fn default_graph_rag_max_nodes() -> usize {
    12
}
fn default_skill_min_confidence() -> f64 {
    0.25
}
fn default_skill_max_candidates() -> usize {
    3
}
fn default_token_profile() -> String {
    "balanced".to_string()
}
fn default_response_mode() -> String {
    "concise".to_string()
}
fn default_context_tokens() -> usize {
    1000
}
fn default_rag_summary_max_chars() -> usize {
    1400
}
fn default_general_model() -> String {
    "deepseek-v3.2".to_string()
}
fn default_fast_model() -> String {
    "google/gemini-2.0-flash-001".to_string()
}
fn default_context_fetch_ms() -> u64 {
    3_000
}
fn default_skill_ms() -> u64 {
    5_000
}
fn default_retrieval_ms() -> u64 {
    8_000
}
fn default_agent_connect_secs() -> u64 {
    15
}
fn default_request_deadline_secs() -> u64 {
    90
}
fn default_channel_capacity() -> usize {
    64
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

/// Configuration manager with environment overrides
pub struct ConfigManager {
    config: TransitConfig,
    config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the following precedence:
    /// 1. Environment variables (.env file)
    /// 2. Config file (.transit.toml)
    /// 3. Sensible defaults
    pub fn load() -> Result<Self, ConfigError> {
        info!("🔧 Loading transit concierge configuration...");

        Self::load_dotenv();

        let (config, config_path) = Self::load_config_file()?;
        let config = Self::apply_env_overrides(config, |key| std::env::var(key).ok());
        Self::validate_config(&config)?;

        info!("✅ Configuration loaded successfully");
        if let Some(ref path) = config_path {
            info!("   📄 Config file: {}", path.display());
        } else {
            info!("   📄 Config file: NONE (using defaults)");
        }
        info!("   🧭 Token profile: {}", config.token.default_profile);
        info!(
            "   🤖 Models: general={} fast={}",
            config.models.general_agent, config.models.fast_agent
        );
        info!(
            "   📚 RAG: top_k={} threshold={} hops={}",
            config.layer.rag_top_k, config.layer.rag_threshold, config.layer.graph_rag_hops
        );

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Build a manager around an explicit file, still honouring environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let config = Self::read_toml_file(path)?;
        let config = Self::apply_env_overrides(config, |key| std::env::var(key).ok());
        Self::validate_config(&config)?;
        Ok(Self {
            config,
            config_path: Some(path.to_path_buf()),
        })
    }

    /// Load .env file if it exists
    fn load_dotenv() {
        if Path::new(".env").exists() {
            if let Err(e) = dotenv::from_filename(".env") {
                warn!("Failed to load .env file: {}", e);
            } else {
                info!("📋 Loaded .env file from current directory");
            }
            return;
        }

        if let Some(home) = dirs::home_dir() {
            let home_env = home.join(".transit-concierge.env");
            if home_env.exists() {
                if let Err(e) = dotenv::from_path(&home_env) {
                    warn!("Failed to load .transit-concierge.env: {}", e);
                } else {
                    info!("📋 Loaded .transit-concierge.env from home directory");
                }
            }
        }
    }

    /// Find and load config file
    /// Search order:
    /// 1. ./.transit.toml (current directory)
    /// 2. ~/.transit/config.toml (user config)
    /// 3. Use defaults
    fn load_config_file() -> Result<(TransitConfig, Option<PathBuf>), ConfigError> {
        let local_config = Path::new(".transit.toml");
        if local_config.exists() {
            let config = Self::read_toml_file(local_config)?;
            return Ok((config, Some(local_config.to_path_buf())));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".transit").join("config.toml");
            if user_config.exists() {
                let config = Self::read_toml_file(&user_config)?;
                return Ok((config, Some(user_config)));
            }
        }

        info!("📋 No config file found, using defaults");
        Ok((TransitConfig::default(), None))
    }

    fn read_toml_file(path: &Path) -> Result<TransitConfig, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        let config: TransitConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Apply environment variable overrides read through `lookup`.
    ///
    /// Unparseable numeric values are ignored and the previous value is kept.
    pub fn apply_env_overrides<F>(mut config: TransitConfig, lookup: F) -> TransitConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parsed<T: std::str::FromStr>(raw: Option<String>) -> Option<T> {
            raw.and_then(|v| v.trim().parse().ok())
        }

        // Layer configuration
        if let Some(ttl) = parsed(lookup("TEMPLATE_CACHE_TTL_MS")) {
            config.layer.template_cache_ttl_ms = ttl;
        }
        if let Some(ttl) = parsed(lookup("STATUS_CACHE_TTL_SECS")) {
            config.layer.status_cache_ttl_secs = ttl;
        }
        if let Some(threshold) = parsed(lookup("RAG_THRESHOLD")) {
            config.layer.rag_threshold = threshold;
        }
        if let Some(top_k) = parsed(lookup("RAG_TOP_K")) {
            config.layer.rag_top_k = top_k;
        }
        if let Some(hops) = parsed(lookup("GRAPH_RAG_HOPS")) {
            config.layer.graph_rag_hops = hops;
        }
        if let Some(max_nodes) = parsed(lookup("GRAPH_RAG_MAX_NODES")) {
            config.layer.graph_rag_max_nodes = max_nodes;
        }

        // Token budget
        if let Some(profile) = lookup("TOKEN_DEFAULT_PROFILE") {
            config.token.default_profile = profile;
        }
        if let Some(mode) = lookup("TOKEN_DEFAULT_RESPONSE_MODE") {
            config.token.default_response_mode = mode;
        }
        if let Some(tokens) = parsed(lookup("TOKEN_DEFAULT_CONTEXT_TOKENS")) {
            config.token.default_context_tokens = tokens;
        }
        if let Some(chars) = parsed(lookup("TOKEN_RAG_SUMMARY_MAX_CHARS")) {
            config.token.rag_summary_max_chars = chars;
        }

        // Models
        if let Some(model) = lookup("MODEL_GENERAL_AGENT") {
            config.models.general_agent = model;
        }
        if let Some(model) = lookup("MODEL_FAST_AGENT") {
            config.models.fast_agent = model;
        }
        if let Some(model) = lookup("MODEL_STATUS_AGENT") {
            config.models.status_agent = model;
        }
        if let Some(model) = lookup("MODEL_ROUTE_AGENT") {
            config.models.route_agent = model;
        }

        // Routing
        if let Some(path) = lookup("PLACE_SPECS_PATH") {
            config.routing.place_specs_path = Some(PathBuf::from(path));
        }

        // Timeouts
        if let Some(secs) = parsed(lookup("REQUEST_DEADLINE_SECS")) {
            config.timeouts.request_deadline_secs = secs;
        }

        // Logging; directive strings like `transit_ai=debug` stay with EnvFilter
        if let Some(level) = lookup("RUST_LOG") {
            let level = level.trim().to_lowercase();
            if matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
                config.logging.level = level;
            }
        }

        config
    }

    /// Validate configuration
    pub fn validate_config(config: &TransitConfig) -> Result<(), ConfigError> {
        match config.token.default_profile.as_str() {
            "aggressive" | "balanced" | "quality" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid token profile: {}. Must be one of: aggressive, balanced, quality",
                    other
                )))
            }
        }

        match config.token.default_response_mode.as_str() {
            "concise" | "standard" | "detailed" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid response mode: {}. Must be one of: concise, standard, detailed",
                    other
                )))
            }
        }

        if !(0.0..=1.0).contains(&config.layer.rag_threshold) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid RAG threshold: {}. Must be within [0, 1]",
                config.layer.rag_threshold
            )));
        }
        if config.layer.rag_top_k == 0 {
            return Err(ConfigError::ValidationError(
                "RAG top_k must be greater than zero".to_string(),
            ));
        }
        if config.layer.graph_rag_max_nodes == 0 {
            return Err(ConfigError::ValidationError(
                "graph_rag_max_nodes must be greater than zero".to_string(),
            ));
        }

        match config.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    other
                )))
            }
        }

        match config.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: {}. Must be one of: pretty, compact, json",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &TransitConfig {
        &self.config
    }

    /// Get the path to the config file that was loaded, if any
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Create a default config file
    pub fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        let config = TransitConfig::default();
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::ReadError(e.to_string()))?;
        }

        std::fs::write(path, toml_str).map_err(|e| ConfigError::ReadError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = TransitConfig::default();
        assert_eq!(config.layer.template_cache_ttl_ms, 300_000);
        assert_eq!(config.layer.status_cache_ttl_secs, 30);
        assert_eq!(config.layer.rag_top_k, 5);
        assert_eq!(config.token.default_profile, "balanced");
        assert_eq!(config.token.rag_summary_max_chars, 1400);
        assert_eq!(config.models.fast_agent, "google/gemini-2.0-flash-001");
        assert_eq!(config.stream.channel_capacity, 64);
    }

    #[test]
    fn test_config_validation() {
        let config = TransitConfig::default();
        assert!(ConfigManager::validate_config(&config).is_ok());

        let mut bad_profile = config.clone();
        bad_profile.token.default_profile = "turbo".to_string();
        assert!(ConfigManager::validate_config(&bad_profile).is_err());

        let mut bad_threshold = config.clone();
        bad_threshold.layer.rag_threshold = 1.5;
        assert!(ConfigManager::validate_config(&bad_threshold).is_err());

        let mut bad_format = config;
        bad_format.logging.format = "xml".to_string();
        assert!(ConfigManager::validate_config(&bad_format).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("TEMPLATE_CACHE_TTL_MS", "1000"),
            ("RAG_TOP_K", "not-a-number"),
            ("GRAPH_RAG_HOPS", "2"),
            ("TOKEN_DEFAULT_PROFILE", "quality"),
            ("MODEL_FAST_AGENT", "local/slm"),
        ]
        .into_iter()
        .collect();

        let config = ConfigManager::apply_env_overrides(TransitConfig::default(), |key| {
            env.get(key).map(|v| v.to_string())
        });

        assert_eq!(config.layer.template_cache_ttl_ms, 1000);
        assert_eq!(config.layer.rag_top_k, 5);
        assert_eq!(config.layer.graph_rag_hops, 2);
        assert_eq!(config.token.default_profile, "quality");
        assert_eq!(config.models.fast_agent, "local/slm");
    }
}
