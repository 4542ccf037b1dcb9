//! Rule checkers.
//!
//! Every checker is a pure function of a [`CheckInput`] snapshot and returns
//! exactly one [`RuleResult`]. A checker that cannot reach an answer returns
//! a skipped pass instead of blocking, unless the missing piece is itself the
//! violation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::authorization::CapabilityTable;
use crate::domain::{Changeset, Finding, RepoState, RuleId, RuleResult};
use crate::workspace::Workspace;

pub mod ai_references;
pub mod authorization;
pub mod branch;
pub mod database;
pub mod docs;
pub mod imports;
pub mod quality;
pub mod testing;
pub mod workflow;

/// Immutable input shared by all checkers of one run.
#[derive(Clone, Copy)]
pub struct CheckInput<'a> {
    pub changeset: &'a Changeset,
    pub commit_message: Option<&'a str>,
    /// Current branch; `None` when detached or unknown.
    pub branch: Option<&'a str>,
    pub workspace: &'a dyn Workspace,
    pub state: &'a RepoState,
}

/// A single policy rule.
pub trait Checker: Send + Sync {
    fn kind(&self) -> CheckerKind;

    fn check(&self, input: &CheckInput<'_>) -> RuleResult;
}

/// Identity of every checker the engine knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckerKind {
    ProtectedBranch,
    IssueNumber,
    DocPlacement,
    TestingRequirements,
    DocUpdates,
    CodeQuality,
    DbConsistency,
    DecisionDoc,
    DocOrgStandards,
    DbChangeProtocol,
    ArchitecturePatterns,
    FileSize,
    TestingReliability,
    FunctionDoc,
    ImportPaths,
    DbStandards,
    AiReferences,
    AgentAuthorization,
    Planning,
    IssueManagement,
    WorkflowCheck,
    TaskTracking,
    SessionContinuity,
    ApprovalRequired,
}

impl CheckerKind {
    pub const ALL: [CheckerKind; 24] = [
        Self::ProtectedBranch,
        Self::IssueNumber,
        Self::DocPlacement,
        Self::TestingRequirements,
        Self::DocUpdates,
        Self::CodeQuality,
        Self::DbConsistency,
        Self::DecisionDoc,
        Self::DocOrgStandards,
        Self::DbChangeProtocol,
        Self::ArchitecturePatterns,
        Self::FileSize,
        Self::TestingReliability,
        Self::FunctionDoc,
        Self::ImportPaths,
        Self::DbStandards,
        Self::AiReferences,
        Self::AgentAuthorization,
        Self::Planning,
        Self::IssueManagement,
        Self::WorkflowCheck,
        Self::TaskTracking,
        Self::SessionContinuity,
        Self::ApprovalRequired,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ProtectedBranch => "protected-branch",
            Self::IssueNumber => "issue-number",
            Self::DocPlacement => "doc-placement",
            Self::TestingRequirements => "testing-requirements",
            Self::DocUpdates => "doc-updates",
            Self::CodeQuality => "code-quality",
            Self::DbConsistency => "db-consistency",
            Self::DecisionDoc => "decision-doc",
            Self::DocOrgStandards => "doc-org-standards",
            Self::DbChangeProtocol => "db-change-protocol",
            Self::ArchitecturePatterns => "architecture-patterns",
            Self::FileSize => "file-size",
            Self::TestingReliability => "testing-reliability",
            Self::FunctionDoc => "function-doc",
            Self::ImportPaths => "import-paths",
            Self::DbStandards => "db-standards",
            Self::AiReferences => "ai-references",
            Self::AgentAuthorization => "agent-authorization",
            Self::Planning => "planning",
            Self::IssueManagement => "issue-management",
            Self::WorkflowCheck => "workflow-check",
            Self::TaskTracking => "task-tracking",
            Self::SessionContinuity => "session-continuity",
            Self::ApprovalRequired => "approval-required",
        }
    }

    /// Rule number in the rules document.
    pub fn rule(&self) -> RuleId {
        RuleId(match self {
            Self::TestingRequirements => 3,
            Self::DocUpdates => 4,
            Self::IssueNumber => 5,
            Self::TaskTracking => 6,
            Self::CodeQuality => 8,
            Self::SessionContinuity => 9,
            Self::DbConsistency => 10,
            Self::IssueManagement => 11,
            Self::ApprovalRequired => 12,
            Self::DocPlacement => 13,
            Self::DecisionDoc => 14,
            Self::DocOrgStandards => 15,
            Self::Planning => 16,
            Self::ProtectedBranch => 18,
            Self::DbChangeProtocol => 19,
            Self::WorkflowCheck => 20,
            Self::ArchitecturePatterns => 23,
            Self::FileSize => 24,
            Self::TestingReliability => 25,
            Self::FunctionDoc => 26,
            Self::ImportPaths => 28,
            Self::DbStandards => 32,
            Self::AiReferences => 33,
            Self::AgentAuthorization => 35,
        })
    }
}

impl std::fmt::Display for CheckerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lookup from checker identity to implementation.
pub struct CheckerRegistry {
    checkers: HashMap<CheckerKind, Box<dyn Checker>>,
}

impl CheckerRegistry {
    /// An empty registry; dispatch skips kinds with no implementation.
    pub fn empty() -> Self {
        Self {
            checkers: HashMap::new(),
        }
    }

    /// Every built-in checker, with `capabilities` driving agent authorization.
    pub fn standard(capabilities: CapabilityTable) -> Self {
        Self::empty()
            .with_checker(Box::new(branch::ProtectedBranch))
            .with_checker(Box::new(branch::IssueNumber))
            .with_checker(Box::new(docs::DocPlacement))
            .with_checker(Box::new(testing::TestingRequirements))
            .with_checker(Box::new(docs::DocUpdates))
            .with_checker(Box::new(quality::CodeQuality::new()))
            .with_checker(Box::new(database::DbConsistency))
            .with_checker(Box::new(docs::DecisionDoc))
            .with_checker(Box::new(docs::DocOrgStandards))
            .with_checker(Box::new(database::DbChangeProtocol))
            .with_checker(Box::new(quality::ArchitecturePatterns::new()))
            .with_checker(Box::new(quality::FileSize::default()))
            .with_checker(Box::new(testing::TestingReliability))
            .with_checker(Box::new(docs::FunctionDoc::new()))
            .with_checker(Box::new(imports::ImportPaths::new()))
            .with_checker(Box::new(database::DbStandards::new()))
            .with_checker(Box::new(ai_references::AiReferences::standard()))
            .with_checker(Box::new(authorization::AgentAuthorization::new(
                capabilities,
            )))
            .with_checker(Box::new(workflow::Planning))
            .with_checker(Box::new(workflow::IssueManagement))
            .with_checker(Box::new(workflow::WorkflowCheck))
            .with_checker(Box::new(workflow::TaskTracking))
            .with_checker(Box::new(workflow::SessionContinuity))
            .with_checker(Box::new(workflow::ApprovalRequired))
    }

    /// Register (or replace) the implementation for the checker's kind.
    pub fn with_checker(mut self, checker: Box<dyn Checker>) -> Self {
        self.checkers.insert(checker.kind(), checker);
        self
    }

    pub fn get(&self, kind: CheckerKind) -> Option<&dyn Checker> {
        self.checkers.get(&kind).map(|c| c.as_ref())
    }
}

/// Accumulates block and warn findings, then renders the single result.
#[derive(Debug, Default)]
pub(crate) struct Tally {
    blocks: Vec<Finding>,
    warns: Vec<Finding>,
}

impl Tally {
    pub(crate) fn block(&mut self, finding: Finding) {
        self.blocks.push(finding);
    }

    pub(crate) fn warn(&mut self, finding: Finding) {
        self.warns.push(finding);
    }

    /// Worst severity wins. Block findings come first, then warnings.
    pub(crate) fn finish(self, kind: CheckerKind, wording: Wording<'_>) -> RuleResult {
        let rule = kind.rule();
        let name = kind.name();
        let (result, fix) = if !self.blocks.is_empty() {
            let msg = format!(
                "Rule {rule}: {} ({} finding(s))",
                wording.block,
                self.blocks.len()
            );
            (RuleResult::block(rule, name, msg), wording.fix)
        } else if !self.warns.is_empty() {
            let msg = format!(
                "Rule {rule}: {} ({} finding(s))",
                wording.warn,
                self.warns.len()
            );
            (RuleResult::warn(rule, name, msg), wording.fix)
        } else {
            return RuleResult::pass(rule, name, format!("Rule {rule}: {}", wording.pass));
        };

        let mut findings = self.blocks;
        findings.extend(self.warns);
        result.with_fix(fix).with_findings(findings)
    }
}

/// Messages a checker reports for each outcome.
pub(crate) struct Wording<'a> {
    pub pass: &'a str,
    pub block: &'a str,
    pub warn: &'a str,
    pub fix: String,
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::workspace::MemoryWorkspace;

    /// Owned pieces of a `CheckInput` so unit tests can build one inline.
    pub struct Fixture {
        pub changeset: Changeset,
        pub commit_message: Option<String>,
        pub branch: Option<String>,
        pub workspace: MemoryWorkspace,
        pub state: RepoState,
    }

    impl Fixture {
        pub fn new(changeset: Changeset) -> Self {
            Self {
                changeset,
                commit_message: None,
                branch: Some("feature/42-login".to_string()),
                workspace: MemoryWorkspace::new(),
                state: RepoState::default(),
            }
        }

        pub fn input(&self) -> CheckInput<'_> {
            CheckInput {
                changeset: &self.changeset,
                commit_message: self.commit_message.as_deref(),
                branch: self.branch.as_deref(),
                workspace: &self.workspace,
                state: &self.state,
            }
        }
    }
}
