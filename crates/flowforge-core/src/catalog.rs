//! Rule titles for display.
//!
//! Built-in titles cover every checker. A repository can retitle rules (or
//! document rules without a checker) in `.flowforge/RULES.md` using headings
//! of the form `## Rule #24: File Size Limit`.

use std::collections::BTreeMap;

use crate::checkers::CheckerKind;
use crate::domain::RuleId;
use crate::workspace::Workspace;

/// Repository-relative path of the rules document.
pub const RULES_DOCUMENT: &str = ".flowforge/RULES.md";

fn builtin_title(kind: CheckerKind) -> &'static str {
    match kind {
        CheckerKind::TestingRequirements => "Testing Requirements",
        CheckerKind::DocUpdates => "Documentation Updates",
        CheckerKind::IssueNumber => "Issue Number Required",
        CheckerKind::TaskTracking => "Task Time Tracking",
        CheckerKind::CodeQuality => "Code Quality",
        CheckerKind::SessionContinuity => "Session Continuity",
        CheckerKind::DbConsistency => "Database Documentation Consistency",
        CheckerKind::IssueManagement => "Issue Management",
        CheckerKind::ApprovalRequired => "Approval Required Before Closing",
        CheckerKind::DocPlacement => "Documentation Placement",
        CheckerKind::DecisionDoc => "Decision Documentation",
        CheckerKind::DocOrgStandards => "Documentation Organization Standards",
        CheckerKind::Planning => "Planning Before Work",
        CheckerKind::ProtectedBranch => "Protected Branches",
        CheckerKind::DbChangeProtocol => "Database Change Protocol",
        CheckerKind::WorkflowCheck => "Single Active Workflow",
        CheckerKind::ArchitecturePatterns => "Architecture Patterns",
        CheckerKind::FileSize => "File Size Limit",
        CheckerKind::TestingReliability => "Testing Reliability",
        CheckerKind::FunctionDoc => "Function Documentation",
        CheckerKind::ImportPaths => "Import Path Validation",
        CheckerKind::DbStandards => "Database Standards",
        CheckerKind::AiReferences => "No AI Tool References",
        CheckerKind::AgentAuthorization => "Agent Authorization",
    }
}

/// One catalogue row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    pub rule: RuleId,
    pub title: String,
    /// Checker enforcing the rule; `None` for documented-only rules.
    pub checker: Option<CheckerKind>,
}

/// Rule id to title mapping.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    entries: BTreeMap<RuleId, RuleEntry>,
}

impl RuleCatalog {
    /// Titles for every built-in checker.
    pub fn builtin() -> Self {
        let entries = CheckerKind::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind.rule(),
                    RuleEntry {
                        rule: kind.rule(),
                        title: builtin_title(kind).to_string(),
                        checker: Some(kind),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// Built-in titles overridden by `RULES.md` headings, when present.
    pub fn load(workspace: &dyn Workspace) -> Self {
        let mut catalog = Self::builtin();
        if let Some(text) = workspace.read_to_string(RULES_DOCUMENT) {
            catalog.apply_document(&text);
        }
        catalog
    }

    /// Apply every `Rule #N: Title` heading in `text`.
    pub fn apply_document(&mut self, text: &str) {
        for (rule, title) in parse_headings(text) {
            self.entries
                .entry(rule)
                .and_modify(|entry| entry.title = title.clone())
                .or_insert(RuleEntry {
                    rule,
                    title,
                    checker: None,
                });
        }
    }

    pub fn title(&self, rule: RuleId) -> Option<&str> {
        self.entries.get(&rule).map(|e| e.title.as_str())
    }

    /// Entries in rule-number order.
    pub fn entries(&self) -> impl Iterator<Item = &RuleEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_headings(text: &str) -> Vec<(RuleId, String)> {
    let heading = static_regex!(r"(?i)^#{1,6}\s*Rule\s*#(\d+)\s*[:\-]\s*(.+?)\s*$");
    text.lines()
        .filter_map(|line| {
            let caps = heading.captures(line)?;
            let number = caps[1].parse().ok()?;
            Some((RuleId(number), caps[2].to_string()))
        })
        .collect()
}
