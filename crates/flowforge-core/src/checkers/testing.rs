//! Test coverage and test reliability rules.

use crate::domain::{FileClass, FileStatus, Finding, RuleResult, StagedFile};

use super::{CheckInput, Checker, CheckerKind, Tally, Wording};

const TESTED_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "dart"];

/// Sibling paths that count as tests for `file`.
fn test_candidates(file: &StagedFile) -> Vec<String> {
    let dir = file.dir();
    let name = file.file_name();
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return Vec::new();
    };
    let join = |leaf: String| {
        if dir.is_empty() {
            leaf
        } else {
            format!("{dir}/{leaf}")
        }
    };

    let mut candidates = vec![
        join(format!("{stem}.test.{ext}")),
        join(format!("{stem}.spec.{ext}")),
        join(format!("__tests__/{stem}.test.{ext}")),
    ];
    if ext == "py" {
        candidates.push(join(format!("test_{stem}.py")));
    }
    if ext == "dart" {
        candidates.push(join(format!("{stem}_test.dart")));
    }
    candidates
}

/// Rule 3: new source files arrive with tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestingRequirements;

impl Checker for TestingRequirements {
    fn kind(&self) -> CheckerKind {
        CheckerKind::TestingRequirements
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();

        for file in input.changeset.files() {
            if file.status != FileStatus::Added
                || file.class() != FileClass::Source
                || !file
                    .extension()
                    .is_some_and(|ext| TESTED_EXTENSIONS.contains(&ext))
                || file.file_name().ends_with(".d.ts")
            {
                continue;
            }

            let covered = test_candidates(file).iter().any(|candidate| {
                match input.changeset.get(candidate) {
                    Some(staged) => !staged.is_deleted(),
                    None => input.workspace.is_file(candidate),
                }
            });
            if !covered {
                tally.warn(Finding::at(
                    &file.path,
                    format!("no test found for {}", file.path),
                ));
            }
        }

        tally.finish(
            self.kind(),
            Wording {
                pass: "new source files have tests",
                block: "new source files without tests",
                warn: "new source files without tests",
                fix: "Add a sibling <name>.test.<ext> (or __tests__/<name>.test.<ext>) covering the new code"
                    .to_string(),
            },
        )
    }
}

/// Rule 25: no focused tests (block) and no silently skipped tests (warn).
#[derive(Debug, Clone, Copy, Default)]
pub struct TestingReliability;

impl Checker for TestingReliability {
    fn kind(&self) -> CheckerKind {
        CheckerKind::TestingReliability
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();
        let focused = static_regex!(r"\.only\(|\bfit\(|\bfdescribe\(");
        let skipped = static_regex!(r"\.skip\(|\bxit\(|\bxdescribe\(");

        for file in input.changeset.live_files() {
            if file.class() != FileClass::Test {
                continue;
            }
            for added in &file.added_lines {
                if let Some(m) = focused.find(&added.text) {
                    tally.block(Finding::at_line(
                        &file.path,
                        added.line,
                        format!("focused test '{}' disables the rest of the suite", m.as_str()),
                    ));
                } else if let Some(m) = skipped.find(&added.text) {
                    tally.warn(Finding::at_line(
                        &file.path,
                        added.line,
                        format!("skipped test '{}'", m.as_str()),
                    ));
                }
            }
        }

        tally.finish(
            self.kind(),
            Wording {
                pass: "no focused or skipped tests",
                block: "focused tests committed",
                warn: "skipped tests committed",
                fix: "Remove .only/fit/fdescribe and re-enable or delete skipped tests".to_string(),
            },
        )
    }
}
