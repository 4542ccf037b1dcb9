//! Branch policy: protected branches, naming, and issue linkage.
//!
//! Both checkers here run in every context.

use crate::domain::{Finding, RuleResult};

use super::{CheckInput, Checker, CheckerKind};

/// Branches that never accept direct commits.
pub const PROTECTED_BRANCHES: &[&str] = &["main", "master", "develop"];

/// Issue number encoded in a `type/<issue>-<description>` branch.
pub fn issue_from_branch(branch: &str) -> Option<u64> {
    static_regex!(r"(?:^|/)(\d+)(?:-|$)")
        .captures(branch)
        .and_then(|c| c[1].parse().ok())
}

/// First `#<n>` issue reference in a commit message.
pub fn issue_from_message(message: &str) -> Option<u64> {
    static_regex!(r"#(\d+)\b")
        .captures(message)
        .and_then(|c| c[1].parse().ok())
}

fn follows_naming_convention(branch: &str) -> bool {
    static_regex!(
        r"^(feature|feat|fix|bugfix|hotfix|chore|docs|refactor|test|perf|release)/\d+-[a-z0-9][a-z0-9-]*$"
    )
    .is_match(branch)
}

/// Rule 18: no direct commits to protected branches; naming convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtectedBranch;

impl Checker for ProtectedBranch {
    fn kind(&self) -> CheckerKind {
        CheckerKind::ProtectedBranch
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let kind = self.kind();
        let Some(branch) = input.branch else {
            return RuleResult::skipped(
                kind.rule(),
                kind.name(),
                "Current branch unknown (detached HEAD); branch policy not evaluated",
            );
        };

        if PROTECTED_BRANCHES.contains(&branch) {
            return RuleResult::block(
                kind.rule(),
                kind.name(),
                format!(
                    "Rule {}: direct commits to protected branch '{}' are not allowed",
                    kind.rule(),
                    branch
                ),
            )
            .with_fix("Create a feature branch: git checkout -b feature/<issue>-<description>")
            .with_findings(vec![Finding::general(format!("branch: {branch}"))]);
        }

        if !follows_naming_convention(branch) {
            return RuleResult::warn(
                kind.rule(),
                kind.name(),
                format!(
                    "Rule {}: branch '{}' does not follow type/issue-number-description",
                    kind.rule(),
                    branch
                ),
            )
            .with_fix("Rename the branch, e.g. git branch -m feature/123-short-description");
        }

        RuleResult::pass(
            kind.rule(),
            kind.name(),
            format!("Rule {}: branch '{}' is valid", kind.rule(), branch),
        )
    }
}

/// Rule 5: work must be linked to an issue.
#[derive(Debug, Clone, Copy, Default)]
pub struct IssueNumber;

impl Checker for IssueNumber {
    fn kind(&self) -> CheckerKind {
        CheckerKind::IssueNumber
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let kind = self.kind();
        let from_branch = input.branch.and_then(issue_from_branch);
        let from_message = input.commit_message.and_then(issue_from_message);

        match from_branch.or(from_message) {
            Some(issue) => RuleResult::pass(
                kind.rule(),
                kind.name(),
                format!("Rule {}: linked to issue #{}", kind.rule(), issue),
            ),
            None => RuleResult::block(
                kind.rule(),
                kind.name(),
                format!(
                    "Rule {}: no issue number found in branch or commit message",
                    kind.rule()
                ),
            )
            .with_fix(
                "Work on a branch named type/<issue>-<description> or reference #<issue> in the commit message",
            ),
        }
    }
}
