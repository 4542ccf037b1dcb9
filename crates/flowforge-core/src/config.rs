//! Engine configuration.
//!
//! Everything the engine used to pick up from ambient shell state is passed
//! in explicitly through [`EngineConfig`]. `from_env` reads the documented
//! environment variables; CLI flags override the result.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::aggregate::AggregationPolicy;

/// Default bound on every git subprocess call.
pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(10);

/// State directory name under the repository root.
pub const STATE_DIR: &str = ".flowforge";

pub const ENV_SESSION_ID: &str = "FLOWFORGE_SESSION_ID";
pub const ENV_GIT_TIMEOUT_SECS: &str = "FLOWFORGE_GIT_TIMEOUT_SECS";
pub const ENV_FAIL_FAST: &str = "FLOWFORGE_FAIL_FAST";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub repo_root: PathBuf,
    /// Holds session, task, token and audit files.
    pub state_dir: PathBuf,
    /// Agent session the run is attributed to.
    pub session_id: Option<String>,
    pub git_timeout: Duration,
    pub policy: AggregationPolicy,
}

impl EngineConfig {
    /// Defaults rooted at `repo_root`.
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        let repo_root = repo_root.into();
        Self {
            state_dir: repo_root.join(STATE_DIR),
            repo_root,
            session_id: None,
            git_timeout: DEFAULT_GIT_TIMEOUT,
            policy: AggregationPolicy::default(),
        }
    }

    /// Defaults overlaid with `FLOWFORGE_*` environment variables.
    pub fn from_env(repo_root: impl Into<PathBuf>) -> Self {
        Self::from_lookup(repo_root, |key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(
        repo_root: impl Into<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let mut config = Self::new(repo_root);

        config.session_id = lookup(ENV_SESSION_ID)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if let Some(raw) = lookup(ENV_GIT_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.git_timeout = Duration::from_secs(secs),
                _ => warn!(
                    event = "config.invalid",
                    key = ENV_GIT_TIMEOUT_SECS,
                    value = %raw,
                    "ignoring invalid git timeout"
                ),
            }
        }

        let fail_fast = lookup(ENV_FAIL_FAST)
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        if fail_fast {
            config.policy = AggregationPolicy::FailFast;
        }

        config
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_policy(mut self, policy: AggregationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_git_timeout(mut self, timeout: Duration) -> Self {
        self.git_timeout = timeout;
        self
    }

    pub fn with_state_dir(mut self, state_dir: impl AsRef<Path>) -> Self {
        self.state_dir = state_dir.as_ref().to_path_buf();
        self
    }
}
