//! # Dhikra Backend - Main Application Entry Point
//!
//! This is the main entry point for the dhikra-backend web server, the
//! recitation-tracking service behind a Quran memorization companion. It sets
//! up an Actix-web HTTP server with the following key features:
//!
//! ## Key Rust Concepts Used:
//! - **async/await**: The entire application is asynchronous for better performance
//! - **modules**: Code is organized into separate modules (mod statements)
//! - **Result<T, E>**: Error handling using Rust's Result type
//! - **Arc & RwLock**: Thread-safe shared state management
//! - **static**: Global variables that live for the entire program duration
//!
//! ## Application Architecture:
//! - **config**: Handles application configuration (TOML files + environment variables)
//! - **corpus**: Loads the precomputed verse embeddings and serves nearest-neighbor queries
//! - **embedding**: Sentence-embedding model that turns transcripts into vectors
//! - **matching**: Transcript-to-candidates pipeline over the corpus
//! - **session**: Recitation session tracking (lock-on, verse classification, history)
//! - **state**: Manages shared application state and metrics
//! - **health**: Provides system health monitoring endpoints
//! - **middleware**: Custom request processing logic (logging, metrics)
//! - **handlers**: HTTP request handlers for API endpoints
//! - **error**: Custom error types and HTTP error responses

mod config;      // Configuration management (config.rs)
mod corpus;      // Verse corpus loading and indexing (corpus/ directory)
mod device;      // Compute device detection (device.rs)
mod embedding;   // Sentence embedding model (embedding/ directory)
mod error;       // Error handling types (error.rs)
mod handlers;    // HTTP request handlers (handlers/ directory)
mod health;      // Health check endpoints (health.rs)
mod matching;    // Transcript matching engine (matching/ directory)
mod middleware;  // Custom middleware (middleware/ directory)
mod session;     // Recitation sessions (session/ directory)
mod state;       // Application state management (state.rs)

use actix_cors::Cors;  // Cross-Origin Resource Sharing support
use actix_web::{web, App, HttpServer, middleware::Logger};  // Web framework
use anyhow::{bail, Result};  // Better error handling with context
use config::AppConfig;
use corpus::{load_corpus, VerseIndex};
use embedding::{EmbeddingModel, SentenceEmbedder, TextEmbedder};
use matching::MatchEngine;
use session::{InMemoryAttemptLog, ProgressLedger, SessionRegistry};
use state::AppState;
use std::sync::atomic::{AtomicBool, Ordering};  // Thread-safe boolean for shutdown
use std::sync::Arc;
use tracing::{error, info};  // Structured logging
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};  // Logging setup

/// Global shutdown signal that can be accessed from anywhere in the program.
/// AtomicBool is thread-safe, meaning multiple threads can safely read/write to it.
/// This is used to signal when the server should gracefully shut down.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// How many accepted attempts the rolling in-memory log keeps.
const ATTEMPT_LOG_CAPACITY: usize = 1000;

/// How often the background reaper checks for idle sessions.
const REAPER_INTERVAL_SECONDS: u64 = 60;

/// The main application entry point.
///
/// ## What this function does:
/// 1. **Loads configuration** from files and environment variables
/// 2. **Sets up logging** for debugging and monitoring
/// 3. **Loads the verse corpus** and the sentence-embedding model
/// 4. **Creates shared application state** that all requests can access
/// 5. **Configures the HTTP server** with middleware and routes
/// 6. **Handles graceful shutdown** when receiving system signals
///
/// ## Key Rust Concepts:
/// - `#[actix_web::main]`: This macro sets up the async runtime (like a JavaScript event loop)
/// - `async fn`: This function can be paused and resumed, allowing other work to happen
/// - `Result<()>`: This function returns either success (Ok(())) or an error (Err(error))
/// - `?`: The question mark operator automatically returns early if there's an error
///
/// ## Error Handling:
/// Startup is eager: if the corpus can't be loaded, the model can't be fetched,
/// or the model's output dimension doesn't match the corpus, the process exits
/// with an error instead of serving requests it can't answer.
#[actix_web::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists)
    // .ok() means "ignore errors" - it's fine if there's no .env file
    dotenv::dotenv().ok();

    // Set up structured logging (tracing) for debugging and monitoring
    init_tracing()?;

    // Load application configuration from config.toml and environment variables
    let config = AppConfig::load()?;
    // Validate that the configuration makes sense (e.g., port isn't 0)
    config.validate()?;

    info!("Starting dhikra-backend v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    // Load the precomputed verse embeddings and build the in-memory index
    let records = load_corpus(&config.corpus.embeddings_path, &config.corpus.metadata_path)?;
    let index = Arc::new(VerseIndex::new(records)?);
    info!(
        "Verse index ready: {} verses across {} surahs ({}-dimensional embeddings)",
        index.len(),
        index.surah_count(),
        index.dimension()
    );

    // Load the sentence-embedding model onto the best available device
    let model_kind: EmbeddingModel = config.embedding.model.parse()?;
    let compute_device = device::create_device_from_string(&config.embedding.device);
    let embedder = Arc::new(
        SentenceEmbedder::load(model_kind, &config.embedding.revision, compute_device).await?,
    );

    // The corpus embeddings and the live model must agree on dimensionality,
    // otherwise every cosine similarity would be computed over mismatched axes
    if embedder.dimension() != index.dimension() {
        bail!(
            "Embedding model '{}' produces {}-dimensional vectors but the corpus was built with {} dimensions",
            model_kind,
            embedder.dimension(),
            index.dimension()
        );
    }
    info!(
        "Embedder ready: {} on {}",
        embedder.kind(),
        device::DeviceManager::get_device_info(embedder.device())
    );

    // Wire up the shared collaborators every session uses
    let engine = Arc::new(MatchEngine::new(index, embedder));
    let sessions = Arc::new(SessionRegistry::new(config.performance.max_concurrent_sessions));
    let attempt_log = Arc::new(InMemoryAttemptLog::new(ATTEMPT_LOG_CAPACITY));
    let progress = Arc::new(ProgressLedger::new());

    let app_state = AppState::new(config.clone(), engine, sessions, attempt_log, progress);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    // Set up signal handlers for graceful shutdown (Ctrl+C, SIGTERM, etc.)
    setup_signal_handlers();

    // Drop sessions whose users walked away
    spawn_session_reaper(
        app_state.clone(),
        config.performance.session_idle_timeout_seconds,
    );

    info!("Starting HTTP server on {}", bind_addr);

    // Create the HTTP server with all its configuration
    let server = HttpServer::new(move || {
        // Configure CORS (Cross-Origin Resource Sharing) to allow web browsers to connect
        let cors = Cors::default()
            .allow_any_origin()    // Allow requests from any domain
            .allow_any_method()    // Allow GET, POST, PUT, DELETE, etc.
            .allow_any_header()    // Allow any HTTP headers
            .max_age(3600);        // Cache CORS settings for 1 hour

        // Create the main application with all its configuration
        App::new()
            // Share our application state with all request handlers
            .app_data(web::Data::new(app_state.clone()))
            // Add middleware in order (they execute in reverse order for responses)
            .wrap(cors)                                    // Handle CORS
            .wrap(Logger::default())                       // Log HTTP requests
            .wrap(middleware::MetricsMiddleware)           // Collect performance metrics
            .wrap(middleware::RequestLogging)              // Custom request logging
            // Define API routes under /api/v1 prefix
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config))
                    .route("/config", web::put().to(handlers::update_config))
                    .route("/match", web::post().to(handlers::match_transcript))
                    .route("/sessions", web::post().to(handlers::create_session))
                    .route("/sessions/{id}", web::get().to(handlers::get_session))
                    .route("/sessions/{id}", web::delete().to(handlers::delete_session))
                    .route("/sessions/{id}/transcript", web::post().to(handlers::process_transcript))
                    .route("/sessions/{id}/reset", web::post().to(handlers::reset_session))
                    .route("/attempts", web::get().to(handlers::recent_attempts))
                    .route("/progress", web::get().to(handlers::surah_progress))
            )
            // Also provide health check at root level for convenience
            .route("/health", web::get().to(health::health_check))
    })
    .bind(&bind_addr)?  // Bind to the configured host and port
    .run();             // Start the server (but don't block here)

    // Get a handle to control the server and spawn it in a separate task
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    // Wait for either the server to finish OR a shutdown signal
    // tokio::select! is like a "race" - whichever finishes first wins
    tokio::select! {
        // If the server task finishes (which usually means an error)
        result = server_task => {
            match result {
                Ok(server_result) => {
                    if let Err(e) = server_result {
                        error!("Server error: {}", e);
                    }
                }
                Err(e) => {
                    error!("Server task error: {}", e);
                }
            }
        }
        // If we receive a shutdown signal (Ctrl+C, SIGTERM, etc.)
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;  // Gracefully stop the server
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Initialize the tracing (logging) system for the application.
///
/// ## Environment Variables:
/// - `RUST_LOG`: Controls what gets logged (e.g., "debug", "info", "dhikra_backend=debug")
/// - If not set, defaults to "dhikra_backend=debug,actix_web=info"
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            // Try to read RUST_LOG environment variable, or use defaults
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dhikra_backend=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())  // Format logs nicely for console output
        .init();

    Ok(())
}

/// Periodically remove sessions that have been idle past the configured timeout.
///
/// ## Why a background task:
/// Sessions end when a user closes the app mid-recitation, without a DELETE.
/// The reaper keeps abandoned sessions from pinning the concurrent-session
/// limit forever.
fn spawn_session_reaper(app_state: AppState, idle_timeout_seconds: u64) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(REAPER_INTERVAL_SECONDS));
        loop {
            interval.tick().await;
            let reaped = app_state.sessions.cleanup_idle_sessions(idle_timeout_seconds);
            if reaped > 0 {
                info!("Reaped {} idle recitation session(s)", reaped);
                for _ in 0..reaped {
                    app_state.decrement_active_sessions();
                }
            }
        }
    });
}

/// Set up signal handlers for graceful shutdown.
///
/// ## What this does:
/// - Listens for SIGTERM (termination signal from system)
/// - Listens for SIGINT (interrupt signal, usually Ctrl+C)
/// - When either signal is received, sets the global shutdown flag
///
/// ## Why this matters:
/// Graceful shutdown means the server can finish processing current requests
/// before shutting down, rather than just stopping immediately.
fn setup_signal_handlers() {
    tokio::spawn(async {
        // Set up handlers for different types of shutdown signals
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler");
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
            .expect("Failed to install SIGINT handler");

        // Wait for either signal to arrive
        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        // Set the global shutdown flag so other parts of the program know to stop
        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

/// Wait for the shutdown signal to be set.
///
/// ## Why polling instead of events:
/// This is a simple polling approach. In a more complex system, you might use
/// async channels or other event-driven mechanisms.
async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
