//! Rule 28: relative imports must resolve to a file or directory.

use crate::domain::{FileClass, Finding, RuleResult};
use crate::workspace::join_relative;

use super::{CheckInput, Checker, CheckerKind, Tally, Wording};

/// Suffixes tried, in order, after the bare path.
pub const CANDIDATE_SUFFIXES: &[&str] = &[".ts", ".js", ".tsx", ".jsx", "/index.ts", "/index.js"];

const IMPORTING_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs"];

/// Module specifiers referenced by import/export/require statements, with
/// their 1-based line numbers.
pub fn import_specifiers(content: &str) -> Vec<(u32, String)> {
    let patterns = [
        static_regex!(r#"\bfrom\s+['"]([^'"]+)['"]"#),
        static_regex!(r#"^\s*import\s+['"]([^'"]+)['"]"#),
        static_regex!(r#"\brequire\(\s*['"]([^'"]+)['"]\s*\)"#),
        static_regex!(r#"\bimport\(\s*['"]([^'"]+)['"]\s*\)"#),
    ];

    let mut found = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("//") || trimmed.starts_with('*') || trimmed.starts_with("/*") {
            continue;
        }
        for re in patterns {
            for caps in re.captures_iter(line) {
                found.push((idx as u32 + 1, caps[1].to_string()));
            }
        }
    }
    found
}

fn is_relative(spec: &str) -> bool {
    spec.starts_with("./") || spec.starts_with("../")
}

/// Resolution outcome for one relative specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    /// Every path that was checked, each exactly once, in check order.
    Unresolved { checked: Vec<String> },
    EscapesRoot,
}

/// Resolve `spec` as imported from a file in `from_dir`.
pub fn resolve_import(input: &CheckInput<'_>, from_dir: &str, spec: &str) -> Resolution {
    let Some(base) = join_relative(from_dir, spec) else {
        return Resolution::EscapesRoot;
    };

    let exists = |path: &str| -> bool {
        match input.changeset.get(path) {
            Some(staged) => !staged.is_deleted(),
            None => input.workspace.is_file(path),
        }
    };
    let dir_exists = |path: &str| -> bool {
        let prefix = format!("{path}/");
        input.workspace.is_dir(path)
            || input
                .changeset
                .live_files()
                .any(|f| f.path.starts_with(&prefix))
    };

    let mut checked = Vec::with_capacity(CANDIDATE_SUFFIXES.len() + 1);
    checked.push(base.clone());
    if exists(&base) || dir_exists(&base) {
        return Resolution::Resolved(base);
    }

    for suffix in CANDIDATE_SUFFIXES {
        let candidate = format!("{base}{suffix}");
        if exists(&candidate) {
            return Resolution::Resolved(candidate);
        }
        checked.push(candidate);
    }
    Resolution::Unresolved { checked }
}

/// Rule 28: every relative import in a staged module must resolve.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportPaths;

impl ImportPaths {
    pub fn new() -> Self {
        Self
    }
}

impl Checker for ImportPaths {
    fn kind(&self) -> CheckerKind {
        CheckerKind::ImportPaths
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let mut tally = Tally::default();

        for file in input.changeset.live_files() {
            if !matches!(file.class(), FileClass::Source | FileClass::Test)
                || !file
                    .extension()
                    .is_some_and(|ext| IMPORTING_EXTENSIONS.contains(&ext))
            {
                continue;
            }
            let Some(content) = file.content.as_deref() else {
                continue;
            };

            for (line, spec) in import_specifiers(content) {
                if !is_relative(&spec) {
                    continue;
                }
                match resolve_import(input, file.dir(), &spec) {
                    Resolution::Resolved(_) => {}
                    Resolution::EscapesRoot => tally.block(Finding::at_line(
                        &file.path,
                        line,
                        format!("import '{spec}' resolves outside the repository"),
                    )),
                    Resolution::Unresolved { checked } => {
                        let mut detail = format!("import '{spec}' does not resolve; checked:");
                        for path in &checked {
                            detail.push_str("\n  - ");
                            detail.push_str(path);
                        }
                        tally.block(Finding::at_line(&file.path, line, detail));
                    }
                }
            }
        }

        tally.finish(
            self.kind(),
            Wording {
                pass: "all relative imports resolve",
                block: "unresolved relative imports",
                warn: "unresolved relative imports",
                fix: "Fix the import path or stage the missing module".to_string(),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::test_support::Fixture;
    use crate::domain::{Changeset, Severity, StagedFile};
    use crate::workspace::MemoryWorkspace;

    #[test]
    fn test_import_specifiers_cover_statement_forms() {
        let src = "\
import { a } from './a';
import './side-effect';
export * from \"../shared/b\";
const c = require('./c');
const d = await import('./d');
// import { x } from './commented';
import React from 'react';
";
        let specs: Vec<String> = import_specifiers(src).into_iter().map(|(_, s)| s).collect();
        assert_eq!(
            specs,
            vec!["./a", "./side-effect", "../shared/b", "./c", "./d", "react"]
        );
    }

    #[test]
    fn test_resolves_through_suffixes_and_directories() {
        let mut fx = Fixture::new(Changeset::new(vec![StagedFile::added(
            "src/service/order.ts",
            "import { a } from './helpers';\nimport { b } from '../lib';\nimport { c } from './fresh';\n",
        )]));
        fx.workspace = MemoryWorkspace::new()
            .with_file("src/service/helpers/index.ts", "")
            .with_file("src/lib/index.js", "");
        let mut changeset = fx.changeset.files().to_vec();
        changeset.push(StagedFile::added("src/service/fresh.tsx", ""));
        fx.changeset = Changeset::new(changeset);

        assert_eq!(ImportPaths.check(&fx.input()).severity, Severity::Pass);
    }

    #[test]
    fn test_existing_directory_resolves() {
        let mut fx = Fixture::new(Changeset::new(vec![StagedFile::added(
            "src/app.ts",
            "import assets from './assets/';\n",
        )]));
        fx.workspace = MemoryWorkspace::new().with_dir("src/assets/");
        assert_eq!(ImportPaths.check(&fx.input()).severity, Severity::Pass);
    }

    #[test]
    fn test_deleted_target_does_not_resolve() {
        let mut fx = Fixture::new(Changeset::new(vec![
            StagedFile::added("src/a.ts", "import { b } from './b';\n"),
            StagedFile::deleted("src/b.ts"),
        ]));
        fx.workspace = MemoryWorkspace::new().with_file("src/b.ts", "");
        assert!(ImportPaths.check(&fx.input()).is_block());
    }

    #[test]
    fn test_escaping_import_blocks() {
        let fx = Fixture::new(Changeset::new(vec![StagedFile::added(
            "a.ts",
            "import x from '../../outside';\n",
        )]));
        let result = ImportPaths.check(&fx.input());
        assert!(result.is_block());
        assert!(result.findings[0].detail.contains("outside the repository"));
    }
}
