//! FlowForge State: persistence adapters for the enforcement engine
//!
//! The engine never touches ad-hoc files directly. Everything it persists or
//! consumes between runs goes through the traits defined here:
//!
//! - `StateStore`: workflow session and task tracking files
//! - `TokenStore`: time-limited agent authorization tokens keyed by session
//! - `AuditLog`: durable record of every enforcement bypass
//!
//! Filesystem implementations live in `fs_store`; in-memory fakes for tests
//! live in `fakes`.

mod error;
pub mod fakes;
pub mod fs_store;
pub mod storage_traits;

pub use error::StateError;
pub use fs_store::{FsAuditLog, FsStateStore, FsTokenStore};
pub use storage_traits::{
    AuditLog, AuthToken, BypassRecord, SessionState, StateStore, TaskBook, TaskEntry, TimeEntry,
    TokenId, TokenStore,
};

/// Result type for flowforge-state operations
pub type Result<T> = std::result::Result<T, StateError>;
