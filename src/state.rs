//! # Application State Management
//!
//! This module manages shared state that needs to be accessed by multiple HTTP request handlers
//! simultaneously.
//!
//! ## Key Rust Concepts (IMPORTANT for beginners):
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Allows multiple parts of the program to safely share ownership of data
//! - **Why needed**: Multiple HTTP requests run simultaneously and all need access to the same state
//! - **Memory safety**: Automatically cleans up data when the last reference is dropped
//!
//! ### RwLock (Reader-Writer Lock)
//! - **Purpose**: Allows multiple readers OR one writer at a time (but not both)
//! - **Why needed**: Multiple requests can read config simultaneously, but only one can update it
//! - **Performance**: Reading is fast (no blocking), writing blocks everything else
//!
//! ### Arc<RwLock<T>> Pattern
//! - **Arc**: Multiple ownership (many HTTP handlers can hold a reference)
//! - **RwLock**: Thread-safe read/write access
//! - **T**: The actual data type being protected
//!
//! The domain collaborators (match engine, session registry, attempt sinks)
//! are immutable after startup, so they sit behind plain `Arc` without locks.

use crate::config::AppConfig;        // Our configuration types
use crate::matching::MatchEngine;
use crate::session::{InMemoryAttemptLog, ProgressLedger, SessionRegistry};
use std::collections::HashMap;       // For storing per-endpoint metrics
use std::sync::{Arc, RwLock};        // Thread-safe shared ownership and locking
use std::time::Instant;              // For tracking server uptime

/// The main application state that's shared across all HTTP request handlers.
///
/// ## Thread Safety Pattern:
/// Mutable data (config, metrics) uses Arc<RwLock<T>>:
/// - Multiple HTTP requests can read the same data simultaneously
/// - Only one request can modify data at a time
/// - No data races or memory corruption possible
///
/// The remaining fields are read-only handles constructed once at startup.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (can be updated at runtime)
    pub config: Arc<RwLock<AppConfig>>,

    /// Performance metrics (constantly being updated by requests)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// Transcript-to-candidates pipeline over the verse corpus
    pub engine: Arc<MatchEngine>,

    /// Live recitation sessions
    pub sessions: Arc<SessionRegistry>,

    /// Recent accepted attempts, newest first
    pub attempt_log: Arc<InMemoryAttemptLog>,

    /// Per-ayah progress aggregates
    pub progress: Arc<ProgressLedger>,

    /// When the server started (never changes, so no Arc<RwLock> needed)
    pub start_time: Instant,
}

/// Performance metrics collected across all HTTP requests.
///
/// ## Why these metrics matter:
/// - **request_count**: Total requests processed (for load monitoring)
/// - **error_count**: Total errors (for reliability monitoring)
/// - **active_sessions**: Current live recitation sessions (for capacity planning)
/// - **endpoint_metrics**: Per-endpoint statistics (for performance optimization)
#[derive(Debug, Default)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of errors encountered since server start
    pub error_count: u64,

    /// Current number of live recitation sessions
    pub active_sessions: u32,

    /// Detailed metrics for each API endpoint (URL path)
    /// Key: endpoint name (e.g., "GET /health")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Detailed performance metrics for a specific API endpoint.
///
/// ## Performance calculations:
/// - **Average response time**: total_duration_ms / request_count
/// - **Error rate**: error_count / request_count
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    /// Number of requests to this specific endpoint
    pub request_count: u64,

    /// Total time spent processing all requests to this endpoint (milliseconds)
    pub total_duration_ms: u64,

    /// Number of errors that occurred for this endpoint
    pub error_count: u64,
}

/// Implementation of methods for AppState.
impl AppState {
    /// Create a new AppState from the startup-constructed collaborators.
    ///
    /// ## What this does:
    /// 1. Wraps the config in Arc<RwLock<>> for thread-safe sharing
    /// 2. Creates empty metrics (also thread-safe)
    /// 3. Records the current time as the server start time
    pub fn new(
        config: AppConfig,
        engine: Arc<MatchEngine>,
        sessions: Arc<SessionRegistry>,
        attempt_log: Arc<InMemoryAttemptLog>,
        progress: Arc<ProgressLedger>,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            engine,
            sessions,
            attempt_log,
            progress,
            start_time: Instant::now(),
        }
    }

    /// Get a copy of the current configuration.
    ///
    /// ## Why clone:
    /// Cloning releases the lock immediately, so other threads aren't blocked.
    /// AppConfig is designed to be cheap to clone.
    pub fn get_config(&self) -> AppConfig {
        self.config.read().unwrap().clone()
    }

    /// Update the configuration with validation.
    ///
    /// ## Error handling:
    /// Configuration is validated before updating to ensure it's always valid.
    pub fn update_config(&self, new_config: AppConfig) -> Result<(), String> {
        match new_config.validate() {
            Ok(_) => {
                *self.config.write().unwrap() = new_config;
                Ok(())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.request_count += 1;
    }

    /// Increment the total error counter (called when any request fails).
    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// ## Parameters:
    /// - **endpoint**: The API endpoint (e.g., "GET /health", "POST /api/v1/match")
    /// - **duration_ms**: How long the request took to process (in milliseconds)
    /// - **is_error**: Whether this request resulted in an error
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap();

        // Get or create metrics for this specific endpoint
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Increment the active sessions counter (called when a recitation session is created).
    pub fn increment_active_sessions(&self) {
        let mut metrics = self.metrics.write().unwrap();
        metrics.active_sessions += 1;
    }

    /// Decrement the active sessions counter (called when a session is removed or reaped).
    ///
    /// ## Safety check:
    /// Includes a check to prevent underflow (going below zero).
    pub fn decrement_active_sessions(&self) {
        let mut metrics = self.metrics.write().unwrap();
        if metrics.active_sessions > 0 {
            metrics.active_sessions -= 1;
        }
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// ## Why a snapshot:
    /// - Takes a read lock to get consistent data
    /// - Clones the data so we don't hold the lock while sending the HTTP response
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        let metrics = self.metrics.read().unwrap();
        AppMetrics {
            request_count: metrics.request_count,
            error_count: metrics.error_count,
            active_sessions: metrics.active_sessions,
            endpoint_metrics: metrics.endpoint_metrics.clone(),
        }
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

/// Implementation of utility methods for EndpointMetric.
impl EndpointMetric {
    /// Calculate the average response time for this endpoint.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Calculate the error rate for this endpoint (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
