//! Source control adapter.
//!
//! The engine reads version control only through [`SourceControlClient`].
//! [`GitClient`] shells out to `git` with every call bounded by a timeout;
//! [`fakes::FakeSourceControl`] serves a fixed snapshot for tests.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::diff::parse_added_lines;
use crate::domain::{Changeset, FileStatus, FlowforgeError, Result, StagedFile};

/// One line of `git diff --cached --name-status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEntry {
    pub status: FileStatus,
    pub path: String,
    /// Origin of a rename or copy.
    pub source: Option<String>,
}

impl StagedEntry {
    pub fn new(status: FileStatus, path: impl Into<String>) -> Self {
        Self {
            status,
            path: path.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Read-only view of the repository's staging area.
#[async_trait]
pub trait SourceControlClient: Send + Sync {
    /// Current branch name; `None` when HEAD is detached.
    async fn current_branch(&self) -> Result<Option<String>>;

    /// Staged paths with their status, in git's order.
    async fn staged_files(&self) -> Result<Vec<StagedEntry>>;

    /// Staged blob content; `None` for binary content.
    async fn staged_content(&self, path: &str) -> Result<Option<String>>;

    /// Zero-context unified diff of the staged change to `path`.
    ///
    /// `source` is the pre-rename path; both sides must be in the pathspec
    /// for git to pair them, otherwise the whole file shows as added.
    async fn staged_diff(&self, path: &str, source: Option<&str>) -> Result<String>;
}

/// Capture the staged changeset through `client`.
pub async fn load_changeset(client: &dyn SourceControlClient) -> Result<Changeset> {
    let mut files = Vec::new();
    for entry in client.staged_files().await? {
        let StagedEntry {
            status,
            path,
            source,
        } = entry;
        let file = match status {
            FileStatus::Deleted => StagedFile::deleted(path),
            FileStatus::Added => match client.staged_content(&path).await? {
                Some(content) => StagedFile::added(path, content),
                None => StagedFile {
                    path,
                    status,
                    content: None,
                    added_lines: Vec::new(),
                },
            },
            FileStatus::Modified | FileStatus::Renamed => {
                let content = client.staged_content(&path).await?;
                let added_lines = if content.is_some() {
                    parse_added_lines(&client.staged_diff(&path, source.as_deref()).await?)
                } else {
                    Vec::new()
                };
                StagedFile {
                    path,
                    status,
                    content,
                    added_lines,
                }
            }
        };
        files.push(file);
    }
    Ok(Changeset::new(files))
}

/// Parse `git diff --name-status -z` output.
///
/// Renames and copies carry two paths: source, then destination.
pub fn parse_name_status(raw: &str) -> Result<Vec<StagedEntry>> {
    let mut tokens = raw.split('\0').filter(|t| !t.is_empty());
    let mut entries = Vec::new();
    while let Some(code) = tokens.next() {
        let status = FileStatus::from_git_code(code)
            .ok_or_else(|| FlowforgeError::Git(format!("unexpected status code '{code}'")))?;
        let two_paths = code.starts_with('R') || code.starts_with('C');
        let first = tokens
            .next()
            .ok_or_else(|| FlowforgeError::Git(format!("missing path after '{code}'")))?;
        let entry = if two_paths {
            let dest = tokens
                .next()
                .ok_or_else(|| FlowforgeError::Git(format!("missing destination after '{code}'")))?;
            StagedEntry::new(status, dest).with_source(first)
        } else {
            StagedEntry::new(status, first)
        };
        entries.push(entry);
    }
    Ok(entries)
}

/// `git` subprocess client for one repository.
#[derive(Debug, Clone)]
pub struct GitClient {
    repo_dir: PathBuf,
    timeout: Duration,
}

impl GitClient {
    pub fn new(repo_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            timeout,
        }
    }

    /// Locate the work tree root containing `dir`.
    pub async fn discover(dir: &Path, timeout: Duration) -> Result<Self> {
        let candidate = Self::new(dir, timeout);
        let output = candidate.run(&["rev-parse", "--show-toplevel"]).await?;
        if !output.status.success() {
            return Err(FlowforgeError::Git(format!(
                "{} is not inside a git work tree",
                dir.display()
            )));
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self::new(root, timeout))
    }

    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        let command = format!("git {}", args.join(" "));
        debug!(event = "git.exec", command = %command);

        let child = Command::new("git")
            .args(args)
            .current_dir(&self.repo_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FlowforgeError::Git(format!("failed to run git: {e}")))?;

        tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| FlowforgeError::Timeout {
                command: command.clone(),
                timeout: self.timeout,
            })?
            .map_err(|e| FlowforgeError::Git(format!("{command} failed: {e}")))
    }

    async fn run_checked(&self, args: &[&str]) -> Result<Vec<u8>> {
        let output = self.run(args).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FlowforgeError::Git(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl SourceControlClient for GitClient {
    async fn current_branch(&self) -> Result<Option<String>> {
        let output = self.run(&["symbolic-ref", "--quiet", "--short", "HEAD"]).await?;
        if !output.status.success() {
            return Ok(None);
        }
        let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!branch.is_empty()).then_some(branch))
    }

    async fn staged_files(&self) -> Result<Vec<StagedEntry>> {
        let raw = self
            .run_checked(&["diff", "--cached", "--name-status", "-z", "-M"])
            .await?;
        parse_name_status(&String::from_utf8_lossy(&raw))
    }

    async fn staged_content(&self, path: &str) -> Result<Option<String>> {
        let spec = format!(":{path}");
        let raw = self.run_checked(&["show", &spec]).await?;
        if raw.contains(&0) {
            return Ok(None);
        }
        Ok(String::from_utf8(raw).ok())
    }

    async fn staged_diff(&self, path: &str, source: Option<&str>) -> Result<String> {
        let mut args = vec!["diff", "--cached", "--unified=0", "--no-color", "-M", "--"];
        args.extend(source);
        args.push(path);
        let raw = self.run_checked(&args).await?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

pub mod fakes {
    //! In-memory source control for tests.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Serves a fixed branch and staged file list.
    #[derive(Debug, Default)]
    pub struct FakeSourceControl {
        branch: Option<String>,
        files: Vec<StagedFile>,
        fail_with: Option<String>,
        calls: AtomicUsize,
    }

    impl FakeSourceControl {
        pub fn new(branch: Option<&str>, files: Vec<StagedFile>) -> Self {
            Self {
                branch: branch.map(str::to_string),
                files,
                fail_with: None,
                calls: AtomicUsize::new(0),
            }
        }

        /// Every call fails with a git error.
        pub fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Self::default()
            }
        }

        /// Number of trait calls served.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn enter(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.fail_with {
                Some(message) => Err(FlowforgeError::Git(message.clone())),
                None => Ok(()),
            }
        }

        fn file(&self, path: &str) -> Option<&StagedFile> {
            self.files.iter().find(|f| f.path == path)
        }
    }

    #[async_trait]
    impl SourceControlClient for FakeSourceControl {
        async fn current_branch(&self) -> Result<Option<String>> {
            self.enter()?;
            Ok(self.branch.clone())
        }

        async fn staged_files(&self) -> Result<Vec<StagedEntry>> {
            self.enter()?;
            Ok(self
                .files
                .iter()
                .map(|f| StagedEntry::new(f.status, f.path.clone()))
                .collect())
        }

        async fn staged_content(&self, path: &str) -> Result<Option<String>> {
            self.enter()?;
            Ok(self.file(path).and_then(|f| f.content.clone()))
        }

        async fn staged_diff(&self, path: &str, _source: Option<&str>) -> Result<String> {
            self.enter()?;
            let mut diff = String::new();
            if let Some(file) = self.file(path) {
                for added in &file.added_lines {
                    diff.push_str(&format!("@@ -0,0 +{} @@\n+{}\n", added.line, added.text));
                }
            }
            Ok(diff)
        }
    }
}
