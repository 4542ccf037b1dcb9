//! Enforcement engine: one run per hook invocation.
//!
//! A run moves through
//! `Idle → Dispatching → Checking[i] → Aggregating → Pass | Blocked`.
//! A bypass token in the commit message short-circuits from `Idle` straight
//! to `Pass` without dispatching any checker.
//!
//! Everything checkers read is captured up front (branch, staged changeset,
//! workflow state, granted capabilities) so the checking phase is a pure
//! function of that snapshot. Running twice against the same snapshot yields
//! the same verdict.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use flowforge_state::{
    AuditLog, BypassRecord, FsAuditLog, FsStateStore, FsTokenStore, StateStore, TokenStore,
};
use tracing::{debug, warn, Instrument};

use crate::aggregate::{AggregationPolicy, Aggregator};
use crate::authorization::CapabilityTable;
use crate::bypass::{detect_bypass, summary_line};
use crate::checkers::{CheckInput, CheckerRegistry};
use crate::config::EngineConfig;
use crate::dispatch::checkers_for;
use crate::domain::{BypassNotice, Changeset, EnforcementContext, RepoState, Result, Verdict};
use crate::obs;
use crate::scm::{load_changeset, GitClient, SourceControlClient};
use crate::workspace::{FsWorkspace, Workspace};

/// Phase of a run, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    Dispatching,
    Checking(usize),
    Aggregating,
    Pass,
    Blocked,
}

impl std::fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Dispatching => f.write_str("dispatching"),
            Self::Checking(i) => write!(f, "checking[{i}]"),
            Self::Aggregating => f.write_str("aggregating"),
            Self::Pass => f.write_str("pass"),
            Self::Blocked => f.write_str("blocked"),
        }
    }
}

/// One enforcement request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    pub context: EnforcementContext,
    /// Commit message text, when invoked from a commit-msg hook.
    pub commit_message: Option<String>,
}

impl RunRequest {
    pub fn new(context: EnforcementContext) -> Self {
        Self {
            context,
            commit_message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = Some(message.into());
        self
    }
}

/// Everything a checking phase reads.
struct Snapshot {
    branch: Option<String>,
    changeset: Changeset,
    state: RepoState,
}

pub struct Engine {
    scm: Arc<dyn SourceControlClient>,
    state: Arc<dyn StateStore>,
    tokens: Arc<dyn TokenStore>,
    audit: Arc<dyn AuditLog>,
    workspace: Arc<dyn Workspace>,
    registry: CheckerRegistry,
    policy: AggregationPolicy,
    session_id: Option<String>,
}

impl Engine {
    /// Engine with the standard checkers and collect-all aggregation.
    pub fn new(
        scm: Arc<dyn SourceControlClient>,
        state: Arc<dyn StateStore>,
        tokens: Arc<dyn TokenStore>,
        audit: Arc<dyn AuditLog>,
        workspace: Arc<dyn Workspace>,
    ) -> Self {
        Self {
            scm,
            state,
            tokens,
            audit,
            workspace,
            registry: CheckerRegistry::standard(CapabilityTable::standard()),
            policy: AggregationPolicy::default(),
            session_id: None,
        }
    }

    /// Git, filesystem state and working tree rooted at `config.repo_root`.
    pub fn from_config(config: &EngineConfig) -> Self {
        let engine = Self::new(
            Arc::new(GitClient::new(&config.repo_root, config.git_timeout)),
            Arc::new(FsStateStore::new(&config.state_dir)),
            Arc::new(FsTokenStore::new(&config.state_dir)),
            Arc::new(FsAuditLog::new(&config.state_dir)),
            Arc::new(FsWorkspace::new(&config.repo_root)),
        )
        .with_policy(config.policy);
        match &config.session_id {
            Some(id) => engine.with_session_id(id.clone()),
            None => engine,
        }
    }

    pub fn with_registry(mut self, registry: CheckerRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_policy(mut self, policy: AggregationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }

    /// Execute one run.
    ///
    /// Policy violations are part of the returned [`Verdict`]; `Err` means
    /// the run itself could not complete (e.g. git failed or timed out).
    pub async fn run(&self, request: &RunRequest) -> Result<Verdict> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id, request.context.as_str());
        self.run_instrumented(&run_id, request).instrument(span).await
    }

    async fn run_instrumented(&self, run_id: &str, request: &RunRequest) -> Result<Verdict> {
        let context = request.context;
        let started = Instant::now();
        obs::emit_phase(run_id, &EnginePhase::Idle.to_string());

        if let Some(message) = request.commit_message.as_deref() {
            if let Some(token) = detect_bypass(message) {
                let verdict = self.bypass(run_id, context, token, message).await;
                obs::emit_phase(run_id, &EnginePhase::Pass.to_string());
                return Ok(verdict);
            }
        }

        obs::emit_phase(run_id, &EnginePhase::Dispatching.to_string());
        let kinds = checkers_for(context);
        let snapshot = self.snapshot().await?;
        obs::emit_run_started(run_id, context.as_str(), snapshot.changeset.len());

        let input = CheckInput {
            changeset: &snapshot.changeset,
            commit_message: request.commit_message.as_deref(),
            branch: snapshot.branch.as_deref(),
            workspace: self.workspace.as_ref(),
            state: &snapshot.state,
        };

        let mut aggregator = Aggregator::new(context, self.policy, kinds.len());
        for (i, kind) in kinds.into_iter().enumerate() {
            let Some(checker) = self.registry.get(kind) else {
                debug!(event = "checker.unregistered", checker = %kind);
                continue;
            };
            obs::emit_phase(run_id, &EnginePhase::Checking(i).to_string());
            let result = checker.check(&input);
            obs::emit_checker_finished(
                run_id,
                &result.checker,
                result.severity.as_str(),
                result.skipped,
            );
            if aggregator.push(result).is_break() {
                debug!(event = "run.halted", checker = %kind, "fail-fast stop");
                break;
            }
        }

        obs::emit_phase(run_id, &EnginePhase::Aggregating.to_string());
        let verdict = aggregator.finish();
        let terminal = if verdict.passed() {
            EnginePhase::Pass
        } else {
            EnginePhase::Blocked
        };
        obs::emit_phase(run_id, &terminal.to_string());
        obs::emit_run_finished(
            run_id,
            started.elapsed().as_millis() as u64,
            verdict.block_count,
            verdict.warn_count,
            verdict.passed(),
        );
        Ok(verdict)
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        let branch = self.scm.current_branch().await?;
        let changeset = load_changeset(self.scm.as_ref()).await?;
        let session = self.state.load_session().await?;
        let tasks = self.state.load_tasks().await?;

        let granted_capabilities = match &self.session_id {
            Some(id) => self
                .tokens
                .active_for_session(id, Utc::now())
                .await?
                .into_iter()
                .map(|t| t.capability)
                .collect(),
            None => BTreeSet::new(),
        };

        Ok(Snapshot {
            branch,
            changeset,
            state: RepoState {
                session,
                tasks,
                session_id: self.session_id.clone(),
                granted_capabilities,
            },
        })
    }

    /// Record the bypass and return a passing verdict with no results.
    ///
    /// Branch and digest are best effort: a bypass still goes through when
    /// git cannot answer.
    async fn bypass(
        &self,
        run_id: &str,
        context: EnforcementContext,
        token: &str,
        message: &str,
    ) -> Verdict {
        let branch = self.scm.current_branch().await.ok().flatten();
        let digest = match load_changeset(self.scm.as_ref()).await {
            Ok(changeset) => changeset.digest(),
            Err(e) => {
                warn!(event = "bypass.digest_unavailable", error = %e);
                "unknown".to_string()
            }
        };
        obs::emit_bypass_used(run_id, token, branch.as_deref().unwrap_or("-"), &digest);

        let record = BypassRecord {
            id: uuid::Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            token: token.to_string(),
            context: context.to_string(),
            branch,
            session_id: self.session_id.clone(),
            changeset_digest: digest,
            message_summary: summary_line(message),
        };
        let audit_id = match self.audit.append(&record).await {
            Ok(()) => Some(record.id),
            Err(e) => {
                obs::emit_audit_error(run_id, &e);
                None
            }
        };

        Verdict::bypassed(
            context,
            BypassNotice {
                token: token.to_string(),
                audit_id,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FlowforgeError, StagedFile};
    use crate::scm::fakes::FakeSourceControl;
    use crate::workspace::MemoryWorkspace;
    use flowforge_state::fakes::{MemoryAuditLog, MemoryStateStore, MemoryTokenStore};

    fn engine(scm: FakeSourceControl) -> (Engine, Arc<MemoryAuditLog>) {
        let audit = Arc::new(MemoryAuditLog::new());
        let engine = Engine::new(
            Arc::new(scm),
            Arc::new(MemoryStateStore::new()),
            Arc::new(MemoryTokenStore::new()),
            audit.clone(),
            Arc::new(MemoryWorkspace::new()),
        );
        (engine, audit)
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(EnginePhase::Checking(3).to_string(), "checking[3]");
        assert_eq!(EnginePhase::Blocked.to_string(), "blocked");
    }

    #[tokio::test]
    async fn test_general_context_runs_unconditional_checkers() {
        let (engine, _) = engine(FakeSourceControl::new(Some("feature/42-login"), vec![]));
        let verdict = engine
            .run(&RunRequest::new(EnforcementContext::General))
            .await
            .unwrap();
        let names: Vec<&str> = verdict.results.iter().map(|r| r.checker.as_str()).collect();
        assert_eq!(names, vec!["protected-branch", "issue-number"]);
        assert!(verdict.passed());
    }

    #[tokio::test]
    async fn test_git_failure_is_an_error() {
        let (engine, _) = engine(FakeSourceControl::failing("fatal: not a git repository"));
        let err = engine
            .run(&RunRequest::new(EnforcementContext::PreCommit))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowforgeError::Git(_)));
    }

    #[tokio::test]
    async fn test_bypass_survives_git_failure() {
        let (engine, audit) = engine(FakeSourceControl::failing("fatal: bad HEAD"));
        let verdict = engine
            .run(
                &RunRequest::new(EnforcementContext::PreCommit)
                    .with_message("hotfix: payments [emergency]"),
            )
            .await
            .unwrap();
        assert!(verdict.passed());
        let records = audit.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].changeset_digest, "unknown");
        assert_eq!(records[0].branch, None);
    }

    #[tokio::test]
    async fn test_fail_fast_policy_stops_engine() {
        let (engine, _) = engine(FakeSourceControl::new(
            Some("main"),
            vec![StagedFile::added("notes.md", "# Notes\n")],
        ));
        let engine = engine.with_policy(AggregationPolicy::FailFast);
        let verdict = engine
            .run(&RunRequest::new(EnforcementContext::PreCommit))
            .await
            .unwrap();
        assert_eq!(verdict.results.len(), 1);
        assert_eq!(verdict.results[0].checker, "protected-branch");
        assert!(verdict.halted_early);
    }
}
