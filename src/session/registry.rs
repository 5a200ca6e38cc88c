//! # Session Registry
//!
//! Tracks the live recitation sessions of a multi-user deployment: one
//! controller per session, concurrent-session limits, and idle cleanup.
//!
//! ## Resource Management:
//! - Enforces the maximum concurrent session limit at creation
//! - Stamps per-session activity so a background reaper can drop sessions
//!   their users walked away from
//! - Each controller sits behind an async mutex, so one transcript per
//!   session is processed at a time while different sessions proceed in
//!   parallel

use crate::session::controller::SessionController;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// One registered session.
pub struct SessionEntry {
    /// Unique identifier for this session
    pub session_id: String,

    /// When the session was created
    pub created_at: DateTime<Utc>,

    /// Last time a request touched this session
    last_activity: RwLock<DateTime<Utc>>,

    /// The session's controller; locked per transcript
    pub controller: tokio::sync::Mutex<SessionController>,
}

impl SessionEntry {
    fn new(session_id: String, controller: SessionController) -> Self {
        Self {
            session_id,
            created_at: Utc::now(),
            last_activity: RwLock::new(Utc::now()),
            controller: tokio::sync::Mutex::new(controller),
        }
    }

    /// Mark the session as just used.
    pub fn touch(&self) {
        *self.last_activity.write().unwrap() = Utc::now();
    }

    /// Seconds since the session was last used.
    pub fn idle_seconds(&self) -> i64 {
        Utc::now()
            .signed_duration_since(*self.last_activity.read().unwrap())
            .num_seconds()
    }

    #[cfg(test)]
    fn backdate(&self, seconds: i64) {
        *self.last_activity.write().unwrap() =
            Utc::now() - chrono::Duration::seconds(seconds);
    }
}

/// Manages multiple concurrent recitation sessions.
///
/// ## Thread Safety:
/// RwLock over the session map allows many readers (looking sessions up)
/// or one writer (creating/removing) at a time. Entries are Arc-shared so
/// handlers can release the map lock before touching a session.
pub struct SessionRegistry {
    /// Active sessions mapped by session ID
    sessions: RwLock<HashMap<String, std::sync::Arc<SessionEntry>>>,

    /// Maximum number of concurrent sessions allowed
    max_concurrent_sessions: usize,
}

/// Summary of registry state for health reporting.
#[derive(Debug, serde::Serialize)]
pub struct RegistrySummary {
    pub total_sessions: usize,
    pub max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_concurrent_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_concurrent_sessions,
        }
    }

    /// Register a new session.
    ///
    /// ## Parameters:
    /// - **session_id**: Optional caller-chosen ID. If None, a UUID is generated
    /// - **controller**: The freshly constructed controller for this session
    ///
    /// ## Returns:
    /// - **Ok(session_id)**: Session registered
    /// - **Err(message)**: Limit reached or the ID is already taken
    pub fn create_session(
        &self,
        session_id: Option<String>,
        controller: SessionController,
    ) -> Result<String, String> {
        let mut sessions = self.sessions.write().unwrap();

        // Check session limit
        if sessions.len() >= self.max_concurrent_sessions {
            return Err(format!(
                "Maximum concurrent sessions ({}) reached",
                self.max_concurrent_sessions
            ));
        }

        // Use provided session ID or generate new one
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        if sessions.contains_key(&session_id) {
            return Err(format!("Session ID '{}' already exists", session_id));
        }

        let entry = SessionEntry::new(session_id.clone(), controller);
        sessions.insert(session_id.clone(), std::sync::Arc::new(entry));

        tracing::info!("Created recitation session {}", session_id);
        Ok(session_id)
    }

    /// Get a session by ID.
    pub fn get(&self, session_id: &str) -> Option<std::sync::Arc<SessionEntry>> {
        let sessions = self.sessions.read().unwrap();
        sessions.get(session_id).cloned()
    }

    /// Remove a session.
    pub fn remove(&self, session_id: &str) -> bool {
        let mut sessions = self.sessions.write().unwrap();
        let removed = sessions.remove(session_id).is_some();
        if removed {
            tracing::info!("Removed recitation session {}", session_id);
        }
        removed
    }

    /// Number of live sessions.
    pub fn count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }

    /// Drop sessions idle for longer than the given age.
    ///
    /// ## Returns:
    /// How many sessions were removed.
    pub fn cleanup_idle_sessions(&self, max_idle_seconds: u64) -> usize {
        let mut sessions = self.sessions.write().unwrap();

        let to_remove: Vec<String> = sessions
            .iter()
            .filter(|(_, entry)| entry.idle_seconds() > max_idle_seconds as i64)
            .map(|(id, _)| id.clone())
            .collect();

        for session_id in &to_remove {
            sessions.remove(session_id);
            tracing::info!("Reaped idle recitation session {}", session_id);
        }

        to_remove.len()
    }

    /// Summary for health reporting.
    pub fn summary(&self) -> RegistrySummary {
        RegistrySummary {
            total_sessions: self.count(),
            max_sessions: self.max_concurrent_sessions,
        }
    }
}
