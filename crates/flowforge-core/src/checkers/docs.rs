//! Documentation rules: placement, freshness, decision records, naming and
//! function docs.

use crate::domain::{FileClass, FileStatus, Finding, RuleResult, StagedFile};

use super::{CheckInput, Checker, CheckerKind, Tally, Wording};

const DOC_ROOTS: &[&str] = &["documentation/", "docs/"];
const INTERNAL_PREFIXES: &[&str] = &[".flowforge/", ".claude/", ".github/"];
const ROOT_DOCS: &[&str] = &[
    "README.md",
    "CHANGELOG.md",
    "CONTRIBUTING.md",
    "LICENSE.md",
    "CODE_OF_CONDUCT.md",
    "SECURITY.md",
    "CLAUDE.md",
    "AGENTS.md",
];
const DECISION_DIRS: &[&str] = &["documentation/decisions/", "docs/adr/", "docs/decisions/"];
const DECISION_SECTIONS: &[&str] = &["## Status", "## Context", "## Decision", "## Consequences"];
const DEPENDENCY_MANIFESTS: &[&str] = &[
    "package.json",
    "Cargo.toml",
    "pubspec.yaml",
    "requirements.txt",
    "pyproject.toml",
    "go.mod",
];

fn is_markdown(file: &StagedFile) -> bool {
    matches!(file.extension(), Some("md") | Some("mdx"))
}

fn is_internal(path: &str) -> bool {
    INTERNAL_PREFIXES.iter().any(|p| path.starts_with(p))
}

fn is_decision_record(file: &StagedFile) -> bool {
    is_markdown(file) && DECISION_DIRS.iter().any(|d| file.path.starts_with(d))
}

/// Rule 13: new documents live under the documentation tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocPlacement;

impl Checker for DocPlacement {
    fn kind(&self) -> CheckerKind {
        CheckerKind::DocPlacement
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();

        for file in input.changeset.files() {
            if file.status != FileStatus::Added || !is_markdown(file) {
                continue;
            }
            let path = file.path.as_str();
            let placed = DOC_ROOTS.iter().any(|root| path.starts_with(root))
                || is_internal(path)
                || ROOT_DOCS.contains(&path)
                || file.file_name() == "README.md";
            if !placed {
                tally.block(Finding::at(
                    path,
                    format!("{path} is outside documentation/"),
                ));
            }
        }

        tally.finish(
            self.kind(),
            Wording {
                pass: "documentation placed correctly",
                block: "documents created outside documentation/",
                warn: "documents created outside documentation/",
                fix: "Move new documents under documentation/ (or docs/)".to_string(),
            },
        )
    }
}

/// Rule 4: code changes come with documentation changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocUpdates;

impl Checker for DocUpdates {
    fn kind(&self) -> CheckerKind {
        CheckerKind::DocUpdates
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();
        let sources: Vec<&StagedFile> = input
            .changeset
            .files()
            .iter()
            .filter(|f| f.class() == FileClass::Source)
            .collect();
        let docs_touched = input
            .changeset
            .files()
            .iter()
            .any(|f| f.class() == FileClass::Doc);

        if !sources.is_empty() && !docs_touched {
            tally.warn(Finding::general(format!(
                "{} source file(s) changed without documentation updates",
                sources.len()
            )));
        }

        tally.finish(
            self.kind(),
            Wording {
                pass: "documentation kept in step with code",
                block: "documentation missing",
                warn: "code changed without documentation",
                fix: "Update the relevant documents under documentation/ in the same commit"
                    .to_string(),
            },
        )
    }
}

/// Rule 14: decision records carry every required section; dependency
/// changes come with a decision record.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionDoc;

impl Checker for DecisionDoc {
    fn kind(&self) -> CheckerKind {
        CheckerKind::DecisionDoc
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();
        let mut has_record = false;

        for file in input.changeset.live_files() {
            if !is_decision_record(file) {
                continue;
            }
            has_record = true;
            let content = file.content.as_deref().unwrap_or("");
            let missing: Vec<&str> = DECISION_SECTIONS
                .iter()
                .copied()
                .filter(|section| {
                    !content
                        .lines()
                        .any(|l| l.trim_end().eq_ignore_ascii_case(section))
                })
                .collect();
            if !missing.is_empty() {
                tally.block(Finding::at(
                    &file.path,
                    format!("missing required sections: {}", missing.join(", ")),
                ));
            }
        }

        if !has_record {
            for file in input.changeset.live_files() {
                if DEPENDENCY_MANIFESTS.contains(&file.file_name()) {
                    tally.warn(Finding::at(
                        &file.path,
                        "dependency manifest changed without a decision record",
                    ));
                }
            }
        }

        tally.finish(
            self.kind(),
            Wording {
                pass: "decision records complete",
                block: "decision records missing required sections",
                warn: "dependency changes without a decision record",
                fix: format!(
                    "Record the decision under documentation/decisions/ with sections: {}",
                    DECISION_SECTIONS.join(", ")
                ),
            },
        )
    }
}

/// Rule 15: document naming and title conventions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocOrgStandards;

fn first_content_line(content: &str) -> Option<&str> {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty()).peekable();
    if lines.peek().map(|l| l.trim()) == Some("---") {
        lines.next();
        for line in lines.by_ref() {
            if line.trim() == "---" {
                break;
            }
        }
    }
    lines.next()
}

impl Checker for DocOrgStandards {
    fn kind(&self) -> CheckerKind {
        CheckerKind::DocOrgStandards
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();

        for file in input.changeset.live_files() {
            if !is_markdown(file) || is_internal(&file.path) {
                continue;
            }
            let name = file.file_name();
            let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
            let at_root = !file.path.contains('/');
            let kebab = static_regex!(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").is_match(stem);
            let upper = static_regex!(r"^[A-Z0-9_]+$").is_match(stem);
            if !(kebab || (upper && (at_root || name == "README.md"))) {
                tally.warn(Finding::at(
                    &file.path,
                    format!("'{name}' is not kebab-case"),
                ));
            }

            let content = file.content.as_deref().unwrap_or("");
            if !first_content_line(content).is_some_and(|l| l.starts_with("# ")) {
                tally.warn(Finding::at(&file.path, "document does not start with a '# ' title"));
            }
        }

        tally.finish(
            self.kind(),
            Wording {
                pass: "documents follow organization standards",
                block: "documents break organization standards",
                warn: "documents break organization standards",
                fix: "Use kebab-case file names and open each document with a '# Title' line"
                    .to_string(),
            },
        )
    }
}

/// Rule 26: exported functions carry a doc comment.
#[derive(Debug, Clone, Copy, Default)]
pub struct FunctionDoc;

impl FunctionDoc {
    pub fn new() -> Self {
        Self
    }
}

fn exported_function_name(line: &str) -> Option<&str> {
    let declaration = static_regex!(
        r"^\s*export\s+(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)"
    );
    let arrow = static_regex!(
        r"^\s*export\s+const\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s*)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=>"
    );
    declaration
        .captures(line)
        .or_else(|| arrow.captures(line))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Whether the statement at `idx` (0-based) is preceded by a `/** ... */` block.
fn has_doc_block(lines: &[&str], idx: usize) -> bool {
    let mut i = idx;
    while i > 0 {
        i -= 1;
        let line = lines[i].trim();
        if line.is_empty() || line.starts_with('@') {
            continue;
        }
        if !line.ends_with("*/") {
            return false;
        }
        loop {
            let current = lines[i].trim();
            if current.contains("/*") {
                return current.contains("/**");
            }
            if i == 0 {
                return false;
            }
            i -= 1;
        }
    }
    false
}

impl Checker for FunctionDoc {
    fn kind(&self) -> CheckerKind {
        CheckerKind::FunctionDoc
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();

        for file in input.changeset.live_files() {
            if file.class() != FileClass::Source
                || !matches!(
                    file.extension(),
                    Some("ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs")
                )
            {
                continue;
            }
            let Some(content) = file.content.as_deref() else {
                continue;
            };
            let lines: Vec<&str> = content.lines().collect();

            for added in &file.added_lines {
                let Some(name) = exported_function_name(&added.text) else {
                    continue;
                };
                let idx = added.line as usize - 1;
                if idx < lines.len() && !has_doc_block(&lines, idx) {
                    tally.warn(Finding::at_line(
                        &file.path,
                        added.line,
                        format!("exported function '{name}' has no doc comment"),
                    ));
                }
            }
        }

        tally.finish(
            self.kind(),
            Wording {
                pass: "exported functions documented",
                block: "undocumented exported functions",
                warn: "undocumented exported functions",
                fix: "Add a /** ... */ comment describing parameters and return value".to_string(),
            },
        )
    }
}
