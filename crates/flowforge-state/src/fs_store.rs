//! Filesystem-backed implementations of the storage traits.
//!
//! Layout under the state directory (normally `<repo>/.flowforge`):
//!
//! ```text
//! session.json        active work session
//! tasks.json          task tracking book
//! tokens.json         authorization tokens
//! audit/bypass.jsonl  one JSON object per bypass
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StateError;
use crate::storage_traits::*;
use crate::Result;

pub const SESSION_FILE: &str = "session.json";
pub const TASKS_FILE: &str = "tasks.json";
pub const TOKENS_FILE: &str = "tokens.json";
pub const AUDIT_FILE: &str = "audit/bypass.jsonl";

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Read a JSON file. Absent → `None`; malformed → replaced on disk with the
/// default value, which is returned.
async fn read_json_or_recover<T>(path: &Path) -> Result<Option<T>>
where
    T: DeserializeOwned + Serialize + Default,
{
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice::<T>(&bytes) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(
                event = "state.recovered",
                path = %path.display(),
                error = %e,
                "malformed state file replaced with empty default"
            );
            let value = T::default();
            write_json(path, &value).await?;
            Ok(Some(value))
        }
    }
}

// ---------------------------------------------------------------------------
// FsStateStore
// ---------------------------------------------------------------------------

/// Session and task files in a state directory.
#[derive(Debug, Clone)]
pub struct FsStateStore {
    dir: PathBuf,
}

impl FsStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.dir.join(TASKS_FILE)
    }
}

#[async_trait]
impl StateStore for FsStateStore {
    async fn load_session(&self) -> Result<SessionState> {
        Ok(read_json_or_recover(&self.session_path())
            .await?
            .unwrap_or_default())
    }

    async fn save_session(&self, session: &SessionState) -> Result<()> {
        write_json(&self.session_path(), session).await
    }

    async fn load_tasks(&self) -> Result<Option<TaskBook>> {
        read_json_or_recover(&self.tasks_path()).await
    }

    async fn save_tasks(&self, tasks: &TaskBook) -> Result<()> {
        write_json(&self.tasks_path(), tasks).await
    }
}

// ---------------------------------------------------------------------------
// FsTokenStore
// ---------------------------------------------------------------------------

/// Token store persisted as a JSON array.
///
/// Read-modify-write cycles are serialized through an in-process lock; git
/// already serializes the hook runs that read it.
#[derive(Debug)]
pub struct FsTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FsTokenStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(TOKENS_FILE),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Vec<AuthToken>> {
        Ok(read_json_or_recover::<Vec<AuthToken>>(&self.path)
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl TokenStore for FsTokenStore {
    async fn create(
        &self,
        session_id: &str,
        capability: &str,
        ttl: Duration,
    ) -> Result<AuthToken> {
        validate_grant(session_id, capability, ttl)?;
        let _guard = self.lock.lock().await;
        let mut tokens = self.load().await?;
        let token = AuthToken::issue(session_id, capability, ttl, Utc::now());
        tokens.push(token.clone());
        write_json(&self.path, &tokens).await?;
        debug!(token_id = %token.id, session_id, capability, "token created");
        Ok(token)
    }

    async fn get(&self, id: &TokenId) -> Result<Option<AuthToken>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().find(|t| &t.id == id))
    }

    async fn expire(&self, id: &TokenId) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut tokens = self.load().await?;
        let token = tokens
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| StateError::TokenNotFound(id.to_string()))?;
        let now = Utc::now();
        if token.expires_at > now {
            token.expires_at = now;
        }
        write_json(&self.path, &tokens).await
    }

    async fn active_for_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<AuthToken>> {
        let _guard = self.lock.lock().await;
        let mut active: Vec<AuthToken> = self
            .load()
            .await?
            .into_iter()
            .filter(|t| t.session_id == session_id && t.is_active(now))
            .collect();
        active.sort_by_key(|t| t.issued_at);
        Ok(active)
    }
}

// ---------------------------------------------------------------------------
// FsAuditLog
// ---------------------------------------------------------------------------

/// Bypass audit log stored as JSON lines.
#[derive(Debug, Clone)]
pub struct FsAuditLog {
    path: PathBuf,
}

impl FsAuditLog {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(AUDIT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditLog for FsAuditLog {
    async fn append(&self, record: &BypassRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<BypassRecord>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<BypassRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = idx + 1,
                    error = %e,
                    "skipping malformed audit line"
                ),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_files_load_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStateStore::new(dir.path());

        assert_eq!(store.load_session().await.unwrap(), SessionState::default());
        assert!(store.load_tasks().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupted_session_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStateStore::new(dir.path());
        std::fs::write(store.session_path(), "{ not json").unwrap();

        let session = store.load_session().await.unwrap();
        assert_eq!(session, SessionState::default());

        let rewritten = std::fs::read_to_string(store.session_path()).unwrap();
        let parsed: SessionState = serde_json::from_str(&rewritten).unwrap();
        assert_eq!(parsed, SessionState::default());
    }

    #[tokio::test]
    async fn test_corrupted_tasks_recover_to_empty_book() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStateStore::new(dir.path());
        std::fs::write(store.tasks_path(), "[1, 2").unwrap();

        let tasks = store.load_tasks().await.unwrap();
        assert_eq!(tasks, Some(TaskBook::default()));
    }

    #[tokio::test]
    async fn test_audit_log_skips_malformed_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = FsAuditLog::new(dir.path());
        let record = BypassRecord {
            id: "b-1".to_string(),
            recorded_at: Utc::now(),
            token: "[emergency]".to_string(),
            context: "pre-commit".to_string(),
            branch: Some("feature/1-x".to_string()),
            session_id: None,
            changeset_digest: "abc".to_string(),
            message_summary: "fix: prod down [emergency]".to_string(),
        };
        log.append(&record).await.unwrap();
        let mut raw = std::fs::read_to_string(log.path()).unwrap();
        raw.push_str("garbage\n");
        std::fs::write(log.path(), raw).unwrap();

        let records = log.list().await.unwrap();
        assert_eq!(records, vec![record]);
    }
}
