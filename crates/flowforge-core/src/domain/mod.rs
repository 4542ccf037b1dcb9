//! Domain model for the enforcement engine.

pub mod changeset;
pub mod context;
pub mod error;
pub mod repo_state;
pub mod rule;
pub mod verdict;

pub use changeset::{classify_path, AddedLine, Changeset, FileClass, FileStatus, StagedFile};
pub use context::EnforcementContext;
pub use error::{FlowforgeError, Result};
pub use repo_state::RepoState;
pub use rule::{Finding, RuleId, RuleResult, Severity};
pub use verdict::{BypassNotice, Verdict};
