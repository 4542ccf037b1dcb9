//! Workflow lifecycle rules for start-work, end-work and close-task.
//!
//! These read the session and task tracking state captured in
//! [`RepoState`](crate::domain::RepoState). A missing task file is only a
//! violation where the rule is about the task entry itself.

use flowforge_state::TaskEntry;

use crate::domain::{Finding, RuleResult};

use super::branch::{issue_from_branch, issue_from_message};
use super::{CheckInput, Checker, CheckerKind};

/// Issue the run is about: branch first, then commit message, then the
/// active session.
pub fn current_issue(input: &CheckInput<'_>) -> Option<u64> {
    input
        .branch
        .and_then(issue_from_branch)
        .or_else(|| input.commit_message.and_then(issue_from_message))
        .or(input.state.session.issue)
}

enum TaskLookup<'a> {
    NoIssue,
    NoTaskFile,
    Missing(u64),
    Found(u64, &'a TaskEntry),
}

fn lookup<'a>(input: &CheckInput<'a>, issue: Option<u64>) -> TaskLookup<'a> {
    let Some(issue) = issue else {
        return TaskLookup::NoIssue;
    };
    let Some(tasks) = input.state.tasks.as_ref() else {
        return TaskLookup::NoTaskFile;
    };
    match tasks.task(issue) {
        Some(task) => TaskLookup::Found(issue, task),
        None => TaskLookup::Missing(issue),
    }
}

/// Rule 16: plan before starting work.
#[derive(Debug, Clone, Copy, Default)]
pub struct Planning;

impl Checker for Planning {
    fn kind(&self) -> CheckerKind {
        CheckerKind::Planning
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let kind = self.kind();
        let (rule, name) = (kind.rule(), kind.name());
        let fix = "Record a plan for the task and set \"planned\": true in .flowforge/tasks.json";

        match lookup(input, current_issue(input)) {
            TaskLookup::NoIssue => RuleResult::skipped(
                rule,
                name,
                format!("Rule {rule}: no issue identified; planning not evaluated"),
            ),
            TaskLookup::Found(issue, task) if task.planned => RuleResult::pass(
                rule,
                name,
                format!("Rule {rule}: issue #{issue} is planned"),
            ),
            TaskLookup::Found(issue, _) | TaskLookup::Missing(issue) => RuleResult::warn(
                rule,
                name,
                format!("Rule {rule}: issue #{issue} has no recorded plan"),
            )
            .with_fix(fix),
            TaskLookup::NoTaskFile => RuleResult::warn(
                rule,
                name,
                format!("Rule {rule}: no task tracking file; work is unplanned"),
            )
            .with_fix(fix),
        }
    }
}

/// Rule 11: work starts on a tracked issue.
#[derive(Debug, Clone, Copy, Default)]
pub struct IssueManagement;

impl Checker for IssueManagement {
    fn kind(&self) -> CheckerKind {
        CheckerKind::IssueManagement
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let kind = self.kind();
        let (rule, name) = (kind.rule(), kind.name());

        match lookup(input, current_issue(input)) {
            TaskLookup::NoIssue => RuleResult::skipped(
                rule,
                name,
                format!("Rule {rule}: no issue identified; issue tracking not evaluated"),
            ),
            TaskLookup::NoTaskFile => RuleResult::skipped(
                rule,
                name,
                format!("Rule {rule}: task tracking not set up; issue tracking not evaluated"),
            ),
            TaskLookup::Missing(issue) => RuleResult::block(
                rule,
                name,
                format!("Rule {rule}: issue #{issue} is not tracked in .flowforge/tasks.json"),
            )
            .with_fix(format!(
                "Add an entry for issue #{issue} to .flowforge/tasks.json before starting work"
            )),
            TaskLookup::Found(issue, task)
                if matches!(task.status.as_str(), "completed" | "done" | "closed") =>
            {
                RuleResult::warn(
                    rule,
                    name,
                    format!(
                        "Rule {rule}: issue #{issue} is already marked '{}'",
                        task.status
                    ),
                )
                .with_fix("Reopen the task or pick up a different issue")
            }
            TaskLookup::Found(issue, _) => RuleResult::pass(
                rule,
                name,
                format!("Rule {rule}: issue #{issue} is tracked"),
            ),
        }
    }
}

/// Rule 20: one active session at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowCheck;

impl Checker for WorkflowCheck {
    fn kind(&self) -> CheckerKind {
        CheckerKind::WorkflowCheck
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let kind = self.kind();
        let (rule, name) = (kind.rule(), kind.name());
        let target = input
            .branch
            .and_then(issue_from_branch)
            .or_else(|| input.commit_message.and_then(issue_from_message));

        match (input.state.session.issue, target) {
            (Some(active), Some(target)) if active != target => RuleResult::warn(
                rule,
                name,
                format!(
                    "Rule {rule}: a session is already active for issue #{active} (starting #{target})"
                ),
            )
            .with_fix(format!(
                "Finish or pause the session for #{active} (end-work) before starting #{target}"
            ))
            .with_findings(vec![Finding::general(format!("active issue: #{active}"))]),
            (_, None) => RuleResult::skipped(
                rule,
                name,
                format!("Rule {rule}: no issue identified; session overlap not evaluated"),
            ),
            _ => RuleResult::pass(rule, name, format!("Rule {rule}: no conflicting session")),
        }
    }
}

/// Rule 6: time is tracked against the session's task.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskTracking;

impl Checker for TaskTracking {
    fn kind(&self) -> CheckerKind {
        CheckerKind::TaskTracking
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let kind = self.kind();
        let (rule, name) = (kind.rule(), kind.name());
        let session = &input.state.session;

        if !session.is_active() {
            return RuleResult::block(
                rule,
                name,
                format!("Rule {rule}: no active work session"),
            )
            .with_fix("Start a session with start-work before ending one");
        }

        match lookup(input, session.issue) {
            TaskLookup::Found(issue, task) if task.time_entries.is_empty() => RuleResult::warn(
                rule,
                name,
                format!("Rule {rule}: no time recorded for issue #{issue}"),
            )
            .with_fix("Log time entries for the session in .flowforge/tasks.json"),
            TaskLookup::Found(issue, task) => RuleResult::pass(
                rule,
                name,
                format!(
                    "Rule {rule}: {} time entr{} recorded for issue #{issue}",
                    task.time_entries.len(),
                    if task.time_entries.len() == 1 { "y" } else { "ies" }
                ),
            ),
            TaskLookup::Missing(issue) => RuleResult::block(
                rule,
                name,
                format!("Rule {rule}: session issue #{issue} has no task entry"),
            )
            .with_fix(format!("Add issue #{issue} to .flowforge/tasks.json")),
            TaskLookup::NoTaskFile | TaskLookup::NoIssue => RuleResult::block(
                rule,
                name,
                format!("Rule {rule}: task tracking file missing"),
            )
            .with_fix("Run flowforge init to create .flowforge/tasks.json"),
        }
    }
}

/// Rule 9: leave notes for the next session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionContinuity;

impl Checker for SessionContinuity {
    fn kind(&self) -> CheckerKind {
        CheckerKind::SessionContinuity
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let kind = self.kind();
        let (rule, name) = (kind.rule(), kind.name());
        let session = &input.state.session;

        if !session.is_active() {
            return RuleResult::skipped(
                rule,
                name,
                format!("Rule {rule}: no active session; continuity not evaluated"),
            );
        }
        match session.next_steps.as_deref().map(str::trim) {
            Some(steps) if !steps.is_empty() => RuleResult::pass(
                rule,
                name,
                format!("Rule {rule}: next steps recorded"),
            ),
            _ => RuleResult::warn(
                rule,
                name,
                format!("Rule {rule}: session ends without next steps"),
            )
            .with_fix("Write next_steps in .flowforge/session.json for whoever picks this up"),
        }
    }
}

/// Rule 12: tasks close only after approval.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApprovalRequired;

impl Checker for ApprovalRequired {
    fn kind(&self) -> CheckerKind {
        CheckerKind::ApprovalRequired
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let kind = self.kind();
        let (rule, name) = (kind.rule(), kind.name());

        match lookup(input, current_issue(input)) {
            TaskLookup::Found(issue, task) if task.approved => RuleResult::pass(
                rule,
                name,
                format!("Rule {rule}: issue #{issue} is approved for closing"),
            ),
            TaskLookup::Found(issue, _) | TaskLookup::Missing(issue) => RuleResult::block(
                rule,
                name,
                format!("Rule {rule}: issue #{issue} has not been approved"),
            )
            .with_fix(format!(
                "Get approval and set \"approved\": true for issue #{issue} in .flowforge/tasks.json"
            )),
            TaskLookup::NoTaskFile => RuleResult::block(
                rule,
                name,
                format!("Rule {rule}: no task tracking file; approval cannot be confirmed"),
            )
            .with_fix("Run flowforge init and record the approval in .flowforge/tasks.json"),
            TaskLookup::NoIssue => RuleResult::block(
                rule,
                name,
                format!("Rule {rule}: no issue identified; approval cannot be confirmed"),
            )
            .with_fix("Close tasks from a type/<issue>-<description> branch"),
        }
    }
}
