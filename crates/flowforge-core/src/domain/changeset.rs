//! Staged changeset snapshot.
//!
//! A [`Changeset`] is captured once per run from version control and handed
//! to every checker by shared reference. Nothing mutates it after capture.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Staging status of one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
}

impl FileStatus {
    /// Map a `git diff --name-status` code (`A`, `M`, `D`, `R100`, ...).
    pub fn from_git_code(code: &str) -> Option<Self> {
        match code.chars().next()? {
            'A' | 'C' => Some(Self::Added),
            'M' | 'T' => Some(Self::Modified),
            'D' => Some(Self::Deleted),
            'R' => Some(Self::Renamed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
            Self::Renamed => "renamed",
        }
    }
}

/// Coarse classification used by checkers that treat file kinds differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileClass {
    Test,
    Doc,
    Source,
    Config,
    Other,
}

const DOC_EXTENSIONS: &[&str] = &["md", "mdx", "rst", "txt", "adoc"];
const SOURCE_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "rs", "go", "java", "kt", "swift", "dart", "rb",
    "php", "c", "h", "cpp", "hpp", "cs", "sh", "bash", "sql",
];
const CONFIG_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "toml", "ini", "cfg", "conf", "xml"];

/// Whether a file name matches the test-file pattern (`*.test.*` / `*.spec.*`).
pub fn is_test_file(path: &str) -> bool {
    let name = file_name(path);
    name.contains(".test.") || name.contains(".spec.")
}

/// Classify a repository-relative path.
pub fn classify_path(path: &str) -> FileClass {
    if is_test_file(path) {
        return FileClass::Test;
    }
    let name = file_name(path);
    if name.starts_with(".env") {
        return FileClass::Config;
    }
    match extension(path) {
        Some(ext) if DOC_EXTENSIONS.contains(&ext) => FileClass::Doc,
        Some(ext) if SOURCE_EXTENSIONS.contains(&ext) => FileClass::Source,
        Some(ext) if CONFIG_EXTENSIONS.contains(&ext) => FileClass::Config,
        _ => FileClass::Other,
    }
}

pub(crate) fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

pub(crate) fn extension(path: &str) -> Option<&str> {
    let name = file_name(path);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext)
}

pub(crate) fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// A line introduced by the staged diff, with its 1-based line number in the
/// staged version of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedLine {
    pub line: u32,
    pub text: String,
}

/// One staged path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
    /// Repository-relative path with `/` separators.
    pub path: String,
    pub status: FileStatus,
    /// Staged blob content; `None` when deleted or not valid UTF-8.
    pub content: Option<String>,
    /// Lines added by the staged diff.
    pub added_lines: Vec<AddedLine>,
}

impl StagedFile {
    /// A newly added file: every line counts as added.
    pub fn added(path: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let added_lines = content
            .lines()
            .enumerate()
            .map(|(i, text)| AddedLine {
                line: i as u32 + 1,
                text: text.to_string(),
            })
            .collect();
        Self {
            path: path.into(),
            status: FileStatus::Added,
            content: Some(content),
            added_lines,
        }
    }

    /// A modified file with the lines its diff introduced.
    pub fn modified(
        path: impl Into<String>,
        content: impl Into<String>,
        added_lines: Vec<AddedLine>,
    ) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Modified,
            content: Some(content.into()),
            added_lines,
        }
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: FileStatus::Deleted,
            content: None,
            added_lines: Vec::new(),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.status == FileStatus::Deleted
    }

    pub fn file_name(&self) -> &str {
        file_name(&self.path)
    }

    pub fn extension(&self) -> Option<&str> {
        extension(&self.path)
    }

    pub fn dir(&self) -> &str {
        parent_dir(&self.path)
    }

    pub fn class(&self) -> FileClass {
        classify_path(&self.path)
    }

    /// Number of lines in the staged content.
    pub fn line_count(&self) -> Option<usize> {
        self.content.as_deref().map(|c| c.lines().count())
    }
}

/// Immutable snapshot of the staged files for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    files: Vec<StagedFile>,
}

impl Changeset {
    pub fn new(files: Vec<StagedFile>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[StagedFile] {
        &self.files
    }

    /// Staged files that still exist after the commit.
    pub fn live_files(&self) -> impl Iterator<Item = &StagedFile> {
        self.files.iter().filter(|f| !f.is_deleted())
    }

    pub fn get(&self, path: &str) -> Option<&StagedFile> {
        self.files.iter().find(|f| f.path == path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// SHA-256 fingerprint over (status, path, content) in staging order.
    ///
    /// Identical staged sets always produce identical digests.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for file in &self.files {
            hasher.update(file.status.as_str().as_bytes());
            hasher.update(b"\0");
            hasher.update(file.path.as_bytes());
            hasher.update(b"\0");
            hasher.update(file.content.as_deref().unwrap_or("").as_bytes());
            hasher.update(b"\0");
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_git_codes() {
        assert_eq!(FileStatus::from_git_code("A"), Some(FileStatus::Added));
        assert_eq!(FileStatus::from_git_code("M"), Some(FileStatus::Modified));
        assert_eq!(FileStatus::from_git_code("D"), Some(FileStatus::Deleted));
        assert_eq!(FileStatus::from_git_code("R087"), Some(FileStatus::Renamed));
        assert_eq!(FileStatus::from_git_code("X"), None);
        assert_eq!(FileStatus::from_git_code(""), None);
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify_path("src/login.test.ts"), FileClass::Test);
        assert_eq!(classify_path("src/api/order.spec.js"), FileClass::Test);
        assert_eq!(classify_path("documentation/guide.md"), FileClass::Doc);
        assert_eq!(classify_path("src/service/order.ts"), FileClass::Source);
        assert_eq!(classify_path("package.json"), FileClass::Config);
        assert_eq!(classify_path(".env.local"), FileClass::Config);
        assert_eq!(classify_path("assets/logo.png"), FileClass::Other);
        assert_eq!(classify_path("Makefile"), FileClass::Other);
    }

    #[test]
    fn test_dotfile_has_no_extension() {
        assert_eq!(extension(".gitignore"), None);
        assert_eq!(extension("a/b/c.tsx"), Some("tsx"));
        assert_eq!(parent_dir("a/b/c.tsx"), "a/b");
        assert_eq!(parent_dir("c.tsx"), "");
    }

    #[test]
    fn test_added_file_marks_every_line() {
        let file = StagedFile::added("a.ts", "one\ntwo\nthree\n");
        assert_eq!(file.added_lines.len(), 3);
        assert_eq!(file.added_lines[2].line, 3);
        assert_eq!(file.line_count(), Some(3));
    }

    #[test]
    fn test_digest_is_stable_and_content_sensitive() {
        let a = Changeset::new(vec![StagedFile::added("a.ts", "x")]);
        let b = Changeset::new(vec![StagedFile::added("a.ts", "x")]);
        let c = Changeset::new(vec![StagedFile::added("a.ts", "y")]);
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), c.digest());
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn test_live_files_skip_deletions() {
        let cs = Changeset::new(vec![
            StagedFile::added("a.ts", "x"),
            StagedFile::deleted("b.ts"),
        ]);
        let live: Vec<_> = cs.live_files().map(|f| f.path.as_str()).collect();
        assert_eq!(live, vec!["a.ts"]);
    }
}
