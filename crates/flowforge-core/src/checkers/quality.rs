//! Code quality rules: secrets and debug leftovers, layering, file size.

use crate::domain::{FileClass, Finding, RuleResult, StagedFile};

use super::imports::import_specifiers;
use super::{CheckInput, Checker, CheckerKind, Tally, Wording};

const JS_FAMILY: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

fn is_js_family(file: &StagedFile) -> bool {
    file.extension().is_some_and(|ext| JS_FAMILY.contains(&ext))
}

/// Rule 8: no hard-coded secrets (block), no debug leftovers (warn).
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeQuality;

impl CodeQuality {
    pub fn new() -> Self {
        Self
    }
}

fn secret_kind(line: &str) -> Option<&'static str> {
    if static_regex!(r"AKIA[0-9A-Z]{16}").is_match(line) {
        return Some("AWS access key id");
    }
    if static_regex!(r"-----BEGIN (?:RSA |EC |OPENSSH |DSA )?PRIVATE KEY-----").is_match(line) {
        return Some("private key");
    }
    if static_regex!(
        r#"(?i)\b(?:password|passwd|secret|api[_-]?key|access[_-]?token|auth[_-]?token)\b["']?\s*[:=]\s*["'][^"'\s]{8,}["']"#
    )
    .is_match(line)
    {
        return Some("hard-coded credential");
    }
    None
}

impl Checker for CodeQuality {
    fn kind(&self) -> CheckerKind {
        CheckerKind::CodeQuality
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();

        for file in input.changeset.live_files() {
            let class = file.class();
            if !matches!(class, FileClass::Source | FileClass::Config | FileClass::Test) {
                continue;
            }
            let debug_scan = class == FileClass::Source && is_js_family(file);

            for added in &file.added_lines {
                if let Some(kind) = secret_kind(&added.text) {
                    tally.block(Finding::at_line(
                        &file.path,
                        added.line,
                        format!("{kind} committed in source"),
                    ));
                    continue;
                }
                if debug_scan {
                    if added.text.contains("console.log(") {
                        tally.warn(Finding::at_line(&file.path, added.line, "console.log left in code"));
                    } else if static_regex!(r"^\s*debugger\s*;?\s*$").is_match(&added.text) {
                        tally.warn(Finding::at_line(&file.path, added.line, "debugger statement"));
                    }
                }
            }
        }

        tally.finish(
            self.kind(),
            Wording {
                pass: "no secrets or debug leftovers in added code",
                block: "secrets found in staged changes",
                warn: "debug leftovers in staged changes",
                fix: "Move secrets to environment variables or a secret manager and remove debug statements"
                    .to_string(),
            },
        )
    }
}

const UI_SEGMENTS: &[&str] = &["components", "pages", "ui", "screens", "views"];
const DATA_SEGMENTS: &[&str] = &["db", "database", "repositories", "repository"];

fn is_ui_file(path: &str) -> bool {
    path.split('/').any(|segment| UI_SEGMENTS.contains(&segment))
}

fn is_data_layer_import(spec: &str) -> bool {
    let segments: Vec<&str> = spec.split('/').collect();
    segments.iter().any(|s| DATA_SEGMENTS.contains(s))
        || segments.windows(2).any(|w| w[0] == "models" && w[1] == "schema")
}

/// Rule 23: UI code must not reach into the data layer directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchitecturePatterns;

impl ArchitecturePatterns {
    pub fn new() -> Self {
        Self
    }
}

impl Checker for ArchitecturePatterns {
    fn kind(&self) -> CheckerKind {
        CheckerKind::ArchitecturePatterns
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();

        for file in input.changeset.live_files() {
            if file.class() != FileClass::Source || !is_js_family(file) || !is_ui_file(&file.path) {
                continue;
            }
            let Some(content) = file.content.as_deref() else {
                continue;
            };
            for (line, spec) in import_specifiers(content) {
                if is_data_layer_import(&spec) {
                    tally.warn(Finding::at_line(
                        &file.path,
                        line,
                        format!("UI module imports data layer '{spec}'"),
                    ));
                }
            }
        }

        tally.finish(
            self.kind(),
            Wording {
                pass: "layering respected",
                block: "layering violations",
                warn: "UI modules import the data layer directly",
                fix: "Route data access through a service or hook instead of importing the data layer from UI code"
                    .to_string(),
            },
        )
    }
}

const LOCK_FILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "poetry.lock",
    "Gemfile.lock",
    "composer.lock",
    "pubspec.lock",
];

/// Rule 24: file size ceiling for non-test files.
///
/// More than `block_over` lines blocks; more than `warn_over` warns.
#[derive(Debug, Clone, Copy)]
pub struct FileSize {
    pub block_over: usize,
    pub warn_over: usize,
}

impl Default for FileSize {
    fn default() -> Self {
        Self {
            block_over: 700,
            warn_over: 600,
        }
    }
}

impl Checker for FileSize {
    fn kind(&self) -> CheckerKind {
        CheckerKind::FileSize
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();
        let mut oversized = Vec::new();

        for file in input.changeset.live_files() {
            if file.class() == FileClass::Test || LOCK_FILES.contains(&file.file_name()) {
                continue;
            }
            let Some(lines) = file.line_count() else {
                continue;
            };
            if lines > self.block_over {
                oversized.push(file.file_name().to_string());
                tally.block(Finding::at(
                    &file.path,
                    format!("{} has {} lines (limit {})", file.path, lines, self.block_over),
                ));
            } else if lines > self.warn_over {
                tally.warn(Finding::at(
                    &file.path,
                    format!(
                        "{} has {} lines (approaching limit {})",
                        file.path, lines, self.block_over
                    ),
                ));
            }
        }

        let block = format!("files exceed the {}-line limit", self.block_over);
        let warn = format!("files approach the {}-line limit", self.block_over);
        let fix = if oversized.is_empty() {
            format!(
                "Plan a split before files grow past {} lines",
                self.block_over
            )
        } else {
            format!(
                "Split {} into smaller modules of at most {} lines each",
                oversized.join(", "),
                self.block_over
            )
        };
        tally.finish(
            self.kind(),
            Wording {
                pass: "all staged files within size limits",
                block: &block,
                warn: &warn,
                fix,
            },
        )
    }
}
