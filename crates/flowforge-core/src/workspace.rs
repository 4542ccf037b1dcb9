//! Read-only view of the working tree.
//!
//! Checkers that need more than the staged changeset (import resolution,
//! sibling test lookup, the rules document) read through [`Workspace`], so
//! tests can run them against an in-memory tree.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Read-only file access relative to the repository root.
///
/// Paths are repository-relative with `/` separators.
pub trait Workspace: Send + Sync {
    fn read_to_string(&self, path: &str) -> Option<String>;
    fn is_file(&self, path: &str) -> bool;
    fn is_dir(&self, path: &str) -> bool;
}

/// Working tree on disk.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
}

impl FsWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

impl Workspace for FsWorkspace {
    fn read_to_string(&self, path: &str) -> Option<String> {
        std::fs::read_to_string(self.resolve(path)).ok()
    }

    fn is_file(&self, path: &str) -> bool {
        self.resolve(path).is_file()
    }

    fn is_dir(&self, path: &str) -> bool {
        self.resolve(path).is_dir()
    }
}

/// In-memory tree for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkspace {
    files: BTreeMap<String, String>,
    dirs: BTreeSet<String>,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, registering all of its parent directories.
    pub fn with_file(mut self, path: &str, content: &str) -> Self {
        let mut dir = path;
        while let Some((parent, _)) = dir.rsplit_once('/') {
            self.dirs.insert(parent.to_string());
            dir = parent;
        }
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        self.dirs.insert(path.trim_end_matches('/').to_string());
        self
    }
}

impl Workspace for MemoryWorkspace {
    fn read_to_string(&self, path: &str) -> Option<String> {
        self.files.get(path).cloned()
    }

    fn is_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn is_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }
}

/// Lexically join `spec` onto `base_dir`, resolving `.` and `..`.
///
/// Returns `None` when the result would escape the repository root.
pub fn join_relative(base_dir: &str, spec: &str) -> Option<String> {
    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in spec.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_relative_resolves_dots() {
        assert_eq!(
            join_relative("src/service", "./helpers").as_deref(),
            Some("src/service/helpers")
        );
        assert_eq!(
            join_relative("src/service", "../utils/date").as_deref(),
            Some("src/utils/date")
        );
        assert_eq!(join_relative("", "./a").as_deref(), Some("a"));
        assert_eq!(join_relative("src", "../../etc"), None);
    }

    #[test]
    fn test_memory_workspace_registers_parents() {
        let ws = MemoryWorkspace::new().with_file("src/a/b.ts", "x");
        assert!(ws.is_file("src/a/b.ts"));
        assert!(ws.is_dir("src/a"));
        assert!(ws.is_dir("src"));
        assert!(!ws.is_dir("src/a/b.ts"));
        assert_eq!(ws.read_to_string("src/a/b.ts").as_deref(), Some("x"));
    }

    #[test]
    fn test_fs_workspace_reads_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/lib")).unwrap();
        std::fs::write(dir.path().join("src/lib/index.ts"), "export {}").unwrap();

        let ws = FsWorkspace::new(dir.path());
        assert!(ws.is_dir("src/lib"));
        assert!(ws.is_file("src/lib/index.ts"));
        assert!(!ws.is_file("src/lib/missing.ts"));
        assert_eq!(
            ws.read_to_string("src/lib/index.ts").as_deref(),
            Some("export {}")
        );
    }
}
