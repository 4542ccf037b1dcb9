//! Git lifecycle events the engine can be invoked for.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::FlowforgeError;

/// Lifecycle event that selects which checkers run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnforcementContext {
    PreCommit,
    StartWork,
    EndWork,
    CloseTask,
    #[default]
    General,
}

impl EnforcementContext {
    pub const ALL: [EnforcementContext; 5] = [
        Self::PreCommit,
        Self::StartWork,
        Self::EndWork,
        Self::CloseTask,
        Self::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreCommit => "pre-commit",
            Self::StartWork => "start-work",
            Self::EndWork => "end-work",
            Self::CloseTask => "close-task",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for EnforcementContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnforcementContext {
    type Err = FlowforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s.trim())
            .ok_or_else(|| FlowforgeError::UnknownContext(s.to_string()))
    }
}
