//! Storage trait definitions for FlowForge
//!
//! These traits define the persistence seams of the enforcement engine:
//! - `StateStore`: workflow session and task tracking files
//! - `TokenStore`: agent authorization tokens (create/get/expire)
//! - `AuditLog`: append-only record of enforcement bypasses
//!
//! All traits are async and backend-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

// ---------------------------------------------------------------------------
// StateStore — workflow tracking files
// ---------------------------------------------------------------------------

/// The active work session, as written by `start-work` tooling.
///
/// An empty default means "no session is active".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Issue number the session is working on.
    #[serde(default)]
    pub issue: Option<u64>,

    /// When the session started.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,

    /// Hand-off notes for whoever continues the work.
    #[serde(default)]
    pub next_steps: Option<String>,
}

impl SessionState {
    /// Whether a session is currently active.
    pub fn is_active(&self) -> bool {
        self.issue.is_some()
    }
}

/// One tracked block of time against a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntry {
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

/// A task in the task tracking file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    /// Whether a plan was recorded before work started.
    #[serde(default)]
    pub planned: bool,
    /// Whether the task owner approved closing the task.
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub time_entries: Vec<TimeEntry>,
}

/// Task tracking file contents, keyed by issue number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBook {
    #[serde(default)]
    pub tasks: BTreeMap<String, TaskEntry>,
}

impl TaskBook {
    /// Look up the task for an issue number.
    pub fn task(&self, issue: u64) -> Option<&TaskEntry> {
        self.tasks.get(&issue.to_string())
    }
}

/// Workflow state persistence.
///
/// Guarantees:
/// - A missing session file loads as `SessionState::default()`.
/// - A missing task file loads as `None` (the tracking feature is not set up).
/// - A malformed file is replaced with an empty default instead of failing.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the active session.
    async fn load_session(&self) -> Result<SessionState>;

    /// Persist the active session.
    async fn save_session(&self, session: &SessionState) -> Result<()>;

    /// Load the task tracking file, if present.
    async fn load_tasks(&self) -> Result<Option<TaskBook>>;

    /// Persist the task tracking file.
    async fn save_tasks(&self, tasks: &TaskBook) -> Result<()>;
}

// ---------------------------------------------------------------------------
// TokenStore — agent authorization tokens
// ---------------------------------------------------------------------------

/// Unique identifier for an authorization token
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenId(pub String);

impl TokenId {
    /// Generate a new random TokenId
    pub fn new() -> Self {
        TokenId(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A capability grant for one session, valid until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub id: TokenId,
    pub session_id: String,
    pub capability: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthToken {
    /// Build a token valid for `ttl` from `now`.
    pub fn issue(session_id: &str, capability: &str, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            id: TokenId::new(),
            session_id: session_id.to_string(),
            capability: capability.to_string(),
            issued_at: now,
            expires_at: now + ttl,
        }
    }

    /// Whether the token grants its capability at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Authorization token store.
///
/// Guarantees:
/// - `create` rejects empty identifiers and non-positive lifetimes.
/// - `expire` is idempotent and keeps the token for audit (`get` still finds it).
/// - `active_for_session` only returns tokens with `is_active(now)`.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Issue a new token for `session_id` granting `capability` for `ttl`.
    async fn create(&self, session_id: &str, capability: &str, ttl: Duration)
        -> Result<AuthToken>;

    /// Fetch a token by id.
    async fn get(&self, id: &TokenId) -> Result<Option<AuthToken>>;

    /// Expire a token immediately. Returns `StateError::TokenNotFound` if absent.
    async fn expire(&self, id: &TokenId) -> Result<()>;

    /// All tokens of a session still active at `now`, oldest first.
    async fn active_for_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<AuthToken>>;
}

pub(crate) fn validate_grant(session_id: &str, capability: &str, ttl: Duration) -> Result<()> {
    if session_id.trim().is_empty() {
        return Err(crate::StateError::InvalidIdentifier("session id".to_string()));
    }
    if capability.trim().is_empty() {
        return Err(crate::StateError::InvalidIdentifier("capability".to_string()));
    }
    if ttl <= Duration::zero() {
        return Err(crate::StateError::InvalidTtl(ttl.num_seconds()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// AuditLog — bypass events
// ---------------------------------------------------------------------------

/// One recorded use of a bypass token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BypassRecord {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    /// The bypass token found in the commit message, e.g. `[emergency]`.
    pub token: String,
    /// Lifecycle context the run was invoked for.
    pub context: String,
    pub branch: Option<String>,
    pub session_id: Option<String>,
    /// Fingerprint of the staged changeset that skipped enforcement.
    pub changeset_digest: String,
    /// First line of the commit message.
    pub message_summary: String,
}

/// Append-only bypass audit log.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append a record.
    async fn append(&self, record: &BypassRecord) -> Result<()>;

    /// All records, in append order.
    async fn list(&self) -> Result<Vec<BypassRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_activity_window() {
        let now = Utc::now();
        let token = AuthToken::issue("sess-1", "database", Duration::minutes(5), now);
        assert!(token.is_active(now));
        assert!(token.is_active(now + Duration::minutes(4)));
        assert!(!token.is_active(now + Duration::minutes(5)));
    }

    #[test]
    fn test_validate_grant_rejects_bad_input() {
        assert!(validate_grant("", "database", Duration::minutes(1)).is_err());
        assert!(validate_grant("s", " ", Duration::minutes(1)).is_err());
        assert!(validate_grant("s", "database", Duration::zero()).is_err());
        assert!(validate_grant("s", "database", Duration::seconds(1)).is_ok());
    }

    #[test]
    fn test_task_book_lookup_by_issue() {
        let mut book = TaskBook::default();
        book.tasks.insert(
            "42".to_string(),
            TaskEntry {
                title: "Login".to_string(),
                planned: true,
                ..Default::default()
            },
        );
        assert!(book.task(42).is_some_and(|t| t.planned));
        assert!(book.task(7).is_none());
    }

    #[test]
    fn test_session_defaults_parse_from_empty_object() {
        let session: SessionState = serde_json::from_str("{}").unwrap();
        assert!(!session.is_active());
        assert_eq!(session, SessionState::default());
    }
}
