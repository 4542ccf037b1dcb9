//! Trait contract tests for StateStore, TokenStore, and AuditLog.
//!
//! Each contract runs against both the in-memory fake and the filesystem
//! implementation. Any conforming implementation must pass these.

use chrono::{Duration, Utc};
use flowforge_state::fakes::{MemoryAuditLog, MemoryStateStore, MemoryTokenStore};
use flowforge_state::storage_traits::*;
use flowforge_state::{FsAuditLog, FsStateStore, FsTokenStore, StateError};

// ===========================================================================
// TokenStore contract tests
// ===========================================================================

async fn token_create_then_get(store: &dyn TokenStore) {
    let token = store
        .create("sess-1", "database", Duration::minutes(30))
        .await
        .unwrap();
    let fetched = store.get(&token.id).await.unwrap().expect("token exists");

    assert_eq!(fetched, token);
    assert_eq!(fetched.capability, "database");
}

async fn token_expire_removes_from_active(store: &dyn TokenStore) {
    let token = store
        .create("sess-2", "devops", Duration::minutes(30))
        .await
        .unwrap();
    assert_eq!(
        store
            .active_for_session("sess-2", Utc::now())
            .await
            .unwrap()
            .len(),
        1
    );

    store.expire(&token.id).await.unwrap();
    store.expire(&token.id).await.unwrap();

    assert!(store
        .active_for_session("sess-2", Utc::now() + Duration::seconds(1))
        .await
        .unwrap()
        .is_empty());
    assert!(store.get(&token.id).await.unwrap().is_some());
}

async fn token_expire_unknown_fails(store: &dyn TokenStore) {
    let err = store.expire(&TokenId::new()).await.unwrap_err();
    assert!(matches!(err, StateError::TokenNotFound(_)));
}

async fn token_sessions_are_isolated(store: &dyn TokenStore) {
    store
        .create("sess-a", "security", Duration::minutes(5))
        .await
        .unwrap();
    store
        .create("sess-b", "database", Duration::minutes(5))
        .await
        .unwrap();

    let a = store.active_for_session("sess-a", Utc::now()).await.unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].capability, "security");
}

async fn token_rejects_zero_ttl(store: &dyn TokenStore) {
    let err = store
        .create("sess", "database", Duration::zero())
        .await
        .unwrap_err();
    assert!(matches!(err, StateError::InvalidTtl(0)));
}

async fn token_contract(store: &dyn TokenStore) {
    token_create_then_get(store).await;
    token_expire_removes_from_active(store).await;
    token_expire_unknown_fails(store).await;
    token_sessions_are_isolated(store).await;
    token_rejects_zero_ttl(store).await;
}

#[tokio::test]
async fn memory_token_store_satisfies_contract() {
    token_contract(&MemoryTokenStore::new()).await;
}

#[tokio::test]
async fn fs_token_store_satisfies_contract() {
    let dir = tempfile::tempdir().unwrap();
    token_contract(&FsTokenStore::new(dir.path())).await;
}

#[tokio::test]
async fn fs_token_store_persists_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let token = FsTokenStore::new(dir.path())
        .create("sess", "documentation", Duration::hours(1))
        .await
        .unwrap();

    let reopened = FsTokenStore::new(dir.path());
    assert_eq!(reopened.get(&token.id).await.unwrap(), Some(token));
}

// ===========================================================================
// AuditLog contract tests
// ===========================================================================

fn record(id: &str, token: &str) -> BypassRecord {
    BypassRecord {
        id: id.to_string(),
        recorded_at: Utc::now(),
        token: token.to_string(),
        context: "pre-commit".to_string(),
        branch: Some("feature/12-login".to_string()),
        session_id: Some("sess".to_string()),
        changeset_digest: "d".repeat(64),
        message_summary: "feat: add login [skip-rules]".to_string(),
    }
}

async fn audit_contract(log: &dyn AuditLog) {
    assert!(log.list().await.unwrap().is_empty());

    let first = record("1", "[skip-rules]");
    let second = record("2", "[emergency]");
    log.append(&first).await.unwrap();
    log.append(&second).await.unwrap();

    assert_eq!(log.list().await.unwrap(), vec![first, second]);
}

#[tokio::test]
async fn memory_audit_log_satisfies_contract() {
    audit_contract(&MemoryAuditLog::new()).await;
}

#[tokio::test]
async fn fs_audit_log_satisfies_contract() {
    let dir = tempfile::tempdir().unwrap();
    audit_contract(&FsAuditLog::new(dir.path())).await;
}

// ===========================================================================
// StateStore contract tests
// ===========================================================================

async fn state_contract(store: &dyn StateStore) {
    let session = SessionState {
        issue: Some(42),
        started_at: Some(Utc::now()),
        next_steps: Some("wire the login form".to_string()),
    };
    store.save_session(&session).await.unwrap();
    assert_eq!(store.load_session().await.unwrap(), session);

    let mut book = TaskBook::default();
    book.tasks.insert(
        "42".to_string(),
        TaskEntry {
            title: "Login".to_string(),
            status: "in_progress".to_string(),
            planned: true,
            approved: false,
            time_entries: vec![],
        },
    );
    store.save_tasks(&book).await.unwrap();
    assert_eq!(store.load_tasks().await.unwrap(), Some(book));
}

#[tokio::test]
async fn memory_state_store_satisfies_contract() {
    state_contract(&MemoryStateStore::new()).await;
}

#[tokio::test]
async fn fs_state_store_satisfies_contract() {
    let dir = tempfile::tempdir().unwrap();
    state_contract(&FsStateStore::new(dir.path())).await;
}
