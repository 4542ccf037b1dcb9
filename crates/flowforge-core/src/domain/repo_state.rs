//! Read-only repository state handed to checkers.

use std::collections::BTreeSet;

use flowforge_state::{SessionState, TaskBook};

/// Workflow state captured before checkers run.
///
/// Loading goes through the `StateStore` / `TokenStore` adapters so checkers
/// stay pure functions of their input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepoState {
    pub session: SessionState,
    /// `None` when the task tracking file does not exist.
    pub tasks: Option<TaskBook>,
    /// Agent session the run is attributed to, if any.
    pub session_id: Option<String>,
    /// Capabilities held through active authorization tokens.
    pub granted_capabilities: BTreeSet<String>,
}

impl RepoState {
    pub fn has_capability(&self, capability: &str) -> bool {
        self.granted_capabilities.contains(capability)
    }
}
