//! In-memory fakes for storage traits (testing only)
//!
//! Provides `MemoryStateStore`, `MemoryTokenStore`, and `MemoryAuditLog`
//! that satisfy the trait contracts without touching the filesystem.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::error::StateError;
use crate::storage_traits::*;
use crate::Result;

// ---------------------------------------------------------------------------
// MemoryStateStore
// ---------------------------------------------------------------------------

/// In-memory workflow state.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    session: Mutex<SessionState>,
    tasks: Mutex<Option<TaskBook>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with a session and task book.
    pub fn with_state(session: SessionState, tasks: Option<TaskBook>) -> Self {
        Self {
            session: Mutex::new(session),
            tasks: Mutex::new(tasks),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load_session(&self) -> Result<SessionState> {
        Ok(self.session.lock().unwrap().clone())
    }

    async fn save_session(&self, session: &SessionState) -> Result<()> {
        *self.session.lock().unwrap() = session.clone();
        Ok(())
    }

    async fn load_tasks(&self) -> Result<Option<TaskBook>> {
        Ok(self.tasks.lock().unwrap().clone())
    }

    async fn save_tasks(&self, tasks: &TaskBook) -> Result<()> {
        *self.tasks.lock().unwrap() = Some(tasks.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryTokenStore
// ---------------------------------------------------------------------------

/// In-memory token store backed by a `BTreeMap<TokenId, AuthToken>`.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<BTreeMap<TokenId, AuthToken>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pre-built token (lets tests control timestamps).
    pub fn insert(&self, token: AuthToken) {
        self.tokens.lock().unwrap().insert(token.id.clone(), token);
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn create(
        &self,
        session_id: &str,
        capability: &str,
        ttl: Duration,
    ) -> Result<AuthToken> {
        validate_grant(session_id, capability, ttl)?;
        let token = AuthToken::issue(session_id, capability, ttl, Utc::now());
        self.insert(token.clone());
        Ok(token)
    }

    async fn get(&self, id: &TokenId) -> Result<Option<AuthToken>> {
        Ok(self.tokens.lock().unwrap().get(id).cloned())
    }

    async fn expire(&self, id: &TokenId) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap();
        let token = tokens
            .get_mut(id)
            .ok_or_else(|| StateError::TokenNotFound(id.to_string()))?;
        let now = Utc::now();
        if token.expires_at > now {
            token.expires_at = now;
        }
        Ok(())
    }

    async fn active_for_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<AuthToken>> {
        let tokens = self.tokens.lock().unwrap();
        let mut active: Vec<AuthToken> = tokens
            .values()
            .filter(|t| t.session_id == session_id && t.is_active(now))
            .cloned()
            .collect();
        active.sort_by_key(|t| t.issued_at);
        Ok(active)
    }
}

// ---------------------------------------------------------------------------
// MemoryAuditLog
// ---------------------------------------------------------------------------

/// In-memory bypass audit log.
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Mutex<Vec<BypassRecord>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuditLog for MemoryAuditLog {
    async fn append(&self, record: &BypassRecord) -> Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<BypassRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }
}
