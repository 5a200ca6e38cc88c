//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: Serialization/deserialization library for converting between Rust structs and data formats
//! - **derive macros**: Automatically generate code for common traits (Debug, Clone, Serialize, Deserialize)
//! - **struct**: Custom data types that group related fields together
//! - **impl blocks**: Add methods to structs
//! - **Result<T, E>**: Error handling that forces you to handle potential failures
//!
//! ## Configuration Priority (highest to lowest):
//! 1. Environment variables (APP_SERVER_HOST, APP_SERVER_PORT, etc.)
//! 2. Configuration file (config.toml)
//! 3. Default values (defined in the Default impl)

use anyhow::Result;              // Better error handling with context
use serde::{Deserialize, Serialize};  // For converting to/from TOML, JSON, etc.
use std::env;                    // For reading environment variables

/// Main application configuration that contains all settings.
///
/// ## Rust Concepts:
/// - **#[derive(...)]**: Automatically implements common traits:
///   - `Debug`: Allows printing with {:?} for debugging
///   - `Clone`: Allows making copies of the struct
///   - `Serialize`: Can convert this struct to JSON, TOML, etc.
///   - `Deserialize`: Can create this struct from JSON, TOML, etc.
///
/// ## Why separate config structs:
/// Breaking configuration into logical groups (server, corpus, embedding,
/// matching, performance) makes it easier to understand and maintain as the
/// application grows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub corpus: CorpusConfig,
    pub embedding: EmbeddingConfig,
    pub matching: MatchingConfig,
    pub performance: PerformanceConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind the server to (e.g., "127.0.0.1", "0.0.0.0")
/// - `port`: TCP port number to listen on (1-65535, typically 8080 for development)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,  // u16 = unsigned 16-bit integer (0-65535), perfect for port numbers
}

/// Verse corpus artifact locations.
///
/// ## Fields:
/// - `embeddings_path`: Binary file of precomputed verse embedding vectors
/// - `metadata_path`: JSON file of verse records (surah, ayah, texts)
///
/// The two files are parallel arrays: row i of the embeddings file belongs
/// to entry i of the metadata file. Both are produced offline by the data
/// pipeline and only read here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusConfig {
    pub embeddings_path: String,
    pub metadata_path: String,
}

/// Sentence-embedding model configuration.
///
/// ## Fields:
/// - `model`: Which sentence-embedding model to load ("all-minilm-l6-v2", "all-minilm-l12-v2", "paraphrase-multilingual-minilm-l12-v2")
/// - `device`: Compute device preference ("auto", "cpu", "cuda", "metal")
/// - `revision`: Model repository revision to pin ("main" for latest)
///
/// The model must produce vectors of the same dimension as the corpus
/// embeddings; startup fails otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model: String,
    pub device: String,
    pub revision: String,
}

/// Verse matching thresholds and result sizing.
///
/// ## Fields:
/// - `lock_on_threshold`: Minimum cosine similarity to start a session on a verse
/// - `in_session_threshold`: Minimum cosine similarity to accept a verse once a session is active
/// - `top_k`: How many ranked candidates a match query returns
///
/// The lock-on bar is deliberately higher than the in-session bar: starting
/// a session on the wrong surah is much worse than missing one ayah inside
/// an active session. Both comparisons accept similarity exactly equal to
/// the threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub lock_on_threshold: f32,
    pub in_session_threshold: f32,
    pub top_k: usize,
}

/// Performance tuning configuration.
///
/// ## Fields:
/// - `max_concurrent_sessions`: Maximum number of recitation sessions to handle simultaneously
/// - `session_idle_timeout_seconds`: Idle time after which a session is reaped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub max_concurrent_sessions: usize,  // usize = platform-specific unsigned integer (usually 64-bit)
    pub session_idle_timeout_seconds: u64,
}

/// Provides default configuration values.
///
/// ## Why defaults matter:
/// Default values ensure the application can start even if no configuration
/// file exists. They also serve as documentation of reasonable starting values.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),  // Localhost only (safe for development)
                port: 8080,                     // Common development port
            },
            corpus: CorpusConfig {
                embeddings_path: "data/embeddings.bin".to_string(),
                metadata_path: "data/verses.json".to_string(),
            },
            embedding: EmbeddingConfig {
                model: "all-minilm-l6-v2".to_string(),  // Same model the corpus was embedded with
                device: "auto".to_string(),             // Pick the best available device
                revision: "main".to_string(),
            },
            matching: MatchingConfig {
                lock_on_threshold: 0.59,    // High bar to start a session
                in_session_threshold: 0.35, // Lower bar once the surah is known
                top_k: 1,
            },
            performance: PerformanceConfig {
                max_concurrent_sessions: 10,        // Reasonable for most development machines
                session_idle_timeout_seconds: 3600, // Reap sessions idle for an hour
            },
        }
    }
}

/// Implementation block for AppConfig - adds methods to the struct.
impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Configuration Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle special cases for HOST and PORT environment variables
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER_HOST=0.0.0.0`: Override server host
    /// - `APP_SERVER_PORT=3000`: Override server port
    /// - `HOST=0.0.0.0`: Special case for deployment platforms
    /// - `PORT=3000`: Special case for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            // 1. Start with defaults - converts our Default impl to config format
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // 2. Load from config.toml file (if it exists) - required(false) means "don't error if missing"
            .add_source(config::File::with_name("config").required(false))
            // 3. Load from environment variables with APP_ prefix
            // Example: APP_SERVER_HOST becomes server.host in the config
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // Handle special environment variables used by deployment platforms
        // These don't follow the APP_ prefix convention but are commonly used
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        // Build the final configuration and convert it back to our AppConfig struct
        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0 (port 0 is reserved and can't be used)
    /// - Corpus artifact paths are not empty
    /// - Both similarity thresholds are valid cosine values (within [-1, 1])
    /// - top_k asks for at least one candidate
    /// - Max concurrent sessions is greater than 0 (must allow at least one session)
    /// - Session idle timeout is greater than 0
    ///
    /// ## Why validate:
    /// Catching configuration errors early prevents runtime failures and
    /// provides clear error messages about what's wrong.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.corpus.embeddings_path.is_empty() {
            return Err(anyhow::anyhow!("Corpus embeddings path cannot be empty"));
        }

        if self.corpus.metadata_path.is_empty() {
            return Err(anyhow::anyhow!("Corpus metadata path cannot be empty"));
        }

        for (name, value) in [
            ("lock_on_threshold", self.matching.lock_on_threshold),
            ("in_session_threshold", self.matching.in_session_threshold),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(anyhow::anyhow!(
                    "{} must be a cosine similarity within [-1, 1], got {}",
                    name,
                    value
                ));
            }
        }

        if self.matching.top_k == 0 {
            return Err(anyhow::anyhow!("top_k must be greater than 0"));
        }

        if self.performance.max_concurrent_sessions == 0 {
            return Err(anyhow::anyhow!("Max concurrent sessions must be greater than 0"));
        }

        if self.performance.session_idle_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("Session idle timeout must be greater than 0"));
        }

        Ok(())  // All validation passed
    }

    /// Update configuration from a JSON string (used for runtime config updates).
    ///
    /// ## What this does:
    /// 1. Parse the JSON string into a generic value
    /// 2. Extract individual configuration fields if they exist
    /// 3. Update only the fields that were provided
    /// 4. Validate the updated configuration
    ///
    /// ## Partial updates:
    /// This method allows updating only some fields, not the entire
    /// configuration. For example, you can send just
    /// `{"matching": {"in_session_threshold": 0.4}}` to change one threshold.
    ///
    /// Corpus and embedding settings are fixed at startup (the artifacts and
    /// model are loaded once) and cannot be updated here. Matching updates
    /// apply to sessions created after the change.
    pub fn update_from_json(&mut self, json_str: &str) -> Result<()> {
        // Parse the JSON string into a generic value
        let partial_config: serde_json::Value = serde_json::from_str(json_str)?;

        // Update server configuration if provided
        if let Some(server) = partial_config.get("server") {
            if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
                self.server.host = host.to_string();
            }
            if let Some(port) = server.get("port").and_then(|v| v.as_u64()) {
                self.server.port = port as u16;  // Convert u64 to u16 for port number
            }
        }

        // Update matching configuration if provided
        if let Some(matching) = partial_config.get("matching") {
            if let Some(lock_on) = matching.get("lock_on_threshold").and_then(|v| v.as_f64()) {
                self.matching.lock_on_threshold = lock_on as f32;
            }
            if let Some(in_session) = matching.get("in_session_threshold").and_then(|v| v.as_f64()) {
                self.matching.in_session_threshold = in_session as f32;
            }
            if let Some(top_k) = matching.get("top_k").and_then(|v| v.as_u64()) {
                self.matching.top_k = top_k as usize;
            }
        }

        // Update performance configuration if provided
        if let Some(performance) = partial_config.get("performance") {
            if let Some(sessions) = performance.get("max_concurrent_sessions").and_then(|v| v.as_u64()) {
                self.performance.max_concurrent_sessions = sessions as usize;
            }
            if let Some(timeout) = performance.get("session_idle_timeout_seconds").and_then(|v| v.as_u64()) {
                self.performance.session_idle_timeout_seconds = timeout;
            }
        }

        // Validate the updated configuration to ensure it's still valid
        self.validate()?;
        Ok(())
    }
}

/// Tests for the configuration module.
///
/// ## Rust Concepts:
/// - **#[cfg(test)]**: Only compile this code when running tests
/// - **mod tests**: A module containing test functions
/// - **#[test]**: Marks a function as a test case
/// - **assert_eq!**: Checks that two values are equal
/// - **assert!**: Checks that a condition is true
#[cfg(test)]
mod tests {
    use super::*;  // Import everything from the parent module

    /// Test that the default configuration is valid and has expected values.
    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.matching.lock_on_threshold, 0.59);
        assert_eq!(config.matching.in_session_threshold, 0.35);
        assert_eq!(config.matching.top_k, 1);
        // Ensure the default config passes validation
        assert!(config.validate().is_ok());
    }

    /// Test that validation catches invalid configurations.
    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;  // Invalid port
        // Validation should fail for port 0
        assert!(config.validate().is_err());
    }

    /// Test that validation rejects thresholds that aren't cosine values.
    #[test]
    fn test_threshold_validation() {
        let mut config = AppConfig::default();
        config.matching.lock_on_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.matching.in_session_threshold = -1.2;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.matching.top_k = 0;
        assert!(config.validate().is_err());
    }

    /// Test that runtime configuration updates work correctly.
    #[test]
    fn test_config_update() {
        let mut config = AppConfig::default();
        let json = r#"{"matching": {"in_session_threshold": 0.4}}"#;  // Update only one threshold
        assert!(config.update_from_json(json).is_ok());
        assert_eq!(config.matching.in_session_threshold, 0.4);
        // Other fields should remain unchanged
        assert_eq!(config.matching.lock_on_threshold, 0.59);
        assert_eq!(config.server.host, "127.0.0.1");
    }

    /// Test that updates which break validation are rejected.
    #[test]
    fn test_config_update_rejects_invalid() {
        let mut config = AppConfig::default();
        let json = r#"{"matching": {"lock_on_threshold": 2.0}}"#;
        assert!(config.update_from_json(json).is_err());
    }
}
