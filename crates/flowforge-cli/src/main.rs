//! FlowForge CLI - commit-time workflow rule enforcement
//!
//! The `flowforge` command runs the checkers for a git lifecycle event and
//! manages the state they read.
//!
//! ## Commands
//!
//! - `check`: run the checkers for a context and report the verdict
//! - `rules`: list rule ids and titles
//! - `init`: scaffold the `.flowforge/` state directory
//! - `install-hook`: install the `commit-msg` git hook
//! - `authorize`: grant, list or revoke agent capability tokens
//! - `audit`: show recorded enforcement bypasses

use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use flowforge_core::config::{DEFAULT_GIT_TIMEOUT, STATE_DIR};
use flowforge_core::report::{color_enabled, render};
use flowforge_core::{
    checkers_for, render_jsonl, AggregationPolicy, EnforcementContext, Engine, EngineConfig,
    FsWorkspace, GitClient, OutputFormat, RuleCatalog, RunRequest,
};
use flowforge_state::fs_store::{SESSION_FILE, TASKS_FILE};
use flowforge_state::{
    AuditLog, FsAuditLog, FsTokenStore, SessionState, TaskBook, TokenId, TokenStore,
};
use serde::Serialize;
use tracing::{debug, info, Level};

/// First line of every hook this tool writes.
const HOOK_MARKER: &str = "# installed by flowforge install-hook";

const ENFORCEMENT_FILE: &str = "enforcement.json";

#[derive(Parser)]
#[command(name = "flowforge")]
#[command(author = "FlowForge Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Commit-time workflow rule enforcement", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Repository to operate on (default: current directory)
    #[arg(short = 'C', long, global = true)]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the checkers for a lifecycle context
    ///
    /// Exits 0 when the commit is allowed and 1 when it is blocked or the
    /// run could not complete.
    Check(CheckArgs),

    /// List rule ids and titles
    Rules,

    /// Scaffold the .flowforge state directory
    Init,

    /// Install the commit-msg git hook
    InstallHook {
        /// Replace a hook that was not written by flowforge
        #[arg(long)]
        force: bool,
    },

    /// Manage agent authorization tokens
    Authorize {
        #[command(subcommand)]
        action: AuthorizeAction,
    },

    /// Show recorded enforcement bypasses
    Audit {
        /// Only show the most recent N records
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[derive(Args)]
struct CheckArgs {
    /// Lifecycle context: pre-commit, start-work, end-work, close-task or general
    #[arg(default_value = "general")]
    context: EnforcementContext,

    /// Read the commit message from a file, as passed to a commit-msg hook
    #[arg(long, conflicts_with = "message")]
    message_file: Option<PathBuf>,

    /// Commit message text
    #[arg(short, long)]
    message: Option<String>,

    /// Output format: text or jsonl
    #[arg(long, default_value = "text")]
    format: OutputFormat,

    /// Also write a JSON lines report to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Stop at the first blocking result
    #[arg(long)]
    fail_fast: bool,

    /// Agent session the run is attributed to
    #[arg(long)]
    session: Option<String>,

    /// Timeout for each git call, in seconds
    #[arg(long)]
    git_timeout: Option<u64>,
}

#[derive(Subcommand)]
enum AuthorizeAction {
    /// Grant a capability to an agent session
    Grant {
        /// Capability name, e.g. database, devops, security
        capability: String,

        /// Agent session id
        #[arg(long)]
        session: String,

        /// Token lifetime in minutes
        #[arg(long, default_value = "60")]
        ttl_minutes: u32,
    },
    /// List active tokens of a session
    List {
        /// Agent session id
        #[arg(long)]
        session: String,
    },
    /// Expire a token immediately
    Revoke {
        /// Token id, as printed by `grant`
        token: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Hooks run on every commit; stay quiet unless asked.
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    flowforge_core::init_tracing(cli.json, level);

    let start = match cli.repo {
        Some(path) => path,
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };

    match cli.command {
        Commands::Check(args) => cmd_check(&start, args).await,
        Commands::Rules => {
            let root = resolve_root(&start).await;
            cmd_rules(&root);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init => {
            let root = resolve_root(&start).await;
            cmd_init(&root).map(|()| ExitCode::SUCCESS)
        }
        Commands::InstallHook { force } => {
            let root = discover_root(&start, DEFAULT_GIT_TIMEOUT).await?;
            cmd_install_hook(&root, force)
                .await
                .map(|()| ExitCode::SUCCESS)
        }
        Commands::Authorize { action } => {
            let root = resolve_root(&start).await;
            cmd_authorize(&root, action)
                .await
                .map(|()| ExitCode::SUCCESS)
        }
        Commands::Audit { limit } => {
            let root = resolve_root(&start).await;
            cmd_audit(&root, limit).await.map(|()| ExitCode::SUCCESS)
        }
    }
}

/// Top level of the git repository containing `start`.
async fn discover_root(start: &Path, timeout: Duration) -> Result<PathBuf> {
    let git = GitClient::discover(start, timeout)
        .await
        .with_context(|| format!("{} is not inside a git repository", start.display()))?;
    Ok(git.repo_dir().to_path_buf())
}

/// Repository root when there is one, `start` otherwise.
async fn resolve_root(start: &Path) -> PathBuf {
    match discover_root(start, DEFAULT_GIT_TIMEOUT).await {
        Ok(root) => root,
        Err(e) => {
            debug!(error = %e, "using {} as the project root", start.display());
            start.to_path_buf()
        }
    }
}

/// Run enforcement for one context and print the verdict.
async fn cmd_check(start: &Path, args: CheckArgs) -> Result<ExitCode> {
    let timeout = args.git_timeout.map(Duration::from_secs);
    let root = discover_root(start, timeout.unwrap_or(DEFAULT_GIT_TIMEOUT)).await?;

    let mut config = EngineConfig::from_env(&root);
    if let Some(timeout) = timeout {
        config = config.with_git_timeout(timeout);
    }
    if let Some(session) = args.session {
        config = config.with_session_id(session);
    }
    if args.fail_fast {
        config = config.with_policy(AggregationPolicy::FailFast);
    }

    let message = match (&args.message_file, args.message) {
        (Some(path), _) => Some(read_commit_message(path)?),
        (None, message) => message,
    };
    let mut request = RunRequest::new(args.context);
    if let Some(message) = message {
        request = request.with_message(message);
    }

    let engine = Engine::from_config(&config);
    debug!(
        repo = %root.display(),
        context = %args.context,
        policy = engine.policy().as_str(),
        "starting check"
    );
    let verdict = engine
        .run(&request)
        .await
        .with_context(|| format!("{} run could not complete", args.context))?;

    let color = args.format == OutputFormat::Text
        && std::io::stdout().is_terminal()
        && color_enabled();
    print!("{}", render(&verdict, args.format, color)?);

    if let Some(path) = &args.report {
        std::fs::write(path, render_jsonl(&verdict)?)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(event = "report.written", path = %path.display());
    }

    Ok(ExitCode::from(u8::try_from(verdict.exit_code()).unwrap_or(1)))
}

/// Read a commit message file, dropping git's comment lines and anything
/// below the scissors line of `commit --verbose`.
fn read_commit_message(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read commit message from {}", path.display()))?;
    Ok(strip_comments(&raw))
}

fn strip_comments(raw: &str) -> String {
    raw.lines()
        .take_while(|line| !(line.starts_with('#') && line.contains(">8")))
        .filter(|line| !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}

/// List rule ids and titles
fn cmd_rules(root: &Path) {
    let catalog = RuleCatalog::load(&FsWorkspace::new(root));
    for entry in catalog.entries() {
        let checker = entry.checker.map(|k| k.name()).unwrap_or("-");
        println!("{:>4}  {:<22} {}", entry.rule.to_string(), checker, entry.title);
    }
}

/// Scaffolded `enforcement.json`: which checkers each context dispatches.
#[derive(Serialize)]
struct EnforcementFile {
    version: u32,
    contexts: BTreeMap<&'static str, Vec<&'static str>>,
}

impl EnforcementFile {
    fn current() -> Self {
        let contexts = EnforcementContext::ALL
            .into_iter()
            .map(|ctx| {
                let names = checkers_for(ctx).into_iter().map(|k| k.name()).collect();
                (ctx.as_str(), names)
            })
            .collect();
        Self {
            version: 1,
            contexts,
        }
    }
}

/// Scaffold the state directory without touching existing files
fn cmd_init(root: &Path) -> Result<()> {
    let dir = root.join(STATE_DIR);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let files = [
        (
            ENFORCEMENT_FILE,
            serde_json::to_string_pretty(&EnforcementFile::current())?,
        ),
        (
            SESSION_FILE,
            serde_json::to_string_pretty(&SessionState::default())?,
        ),
        (TASKS_FILE, serde_json::to_string_pretty(&TaskBook::default())?),
    ];

    for (name, contents) in files {
        let path = dir.join(name);
        if write_if_absent(&path, &contents)? {
            println!("created {STATE_DIR}/{name}");
        } else {
            println!("exists  {STATE_DIR}/{name}");
        }
    }
    info!(event = "init.done", dir = %dir.display());
    Ok(())
}

/// Returns whether the file was written.
fn write_if_absent(path: &Path, contents: &str) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    std::fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

fn hook_script() -> String {
    format!("#!/bin/sh\n{HOOK_MARKER}\nexec flowforge check pre-commit --message-file \"$1\"\n")
}

/// Install the commit-msg hook
async fn cmd_install_hook(root: &Path, force: bool) -> Result<()> {
    let hooks_dir = git_hooks_dir(root).await?;
    std::fs::create_dir_all(&hooks_dir)
        .with_context(|| format!("Failed to create {}", hooks_dir.display()))?;
    let hook = hooks_dir.join("commit-msg");

    if let Ok(existing) = std::fs::read_to_string(&hook) {
        if !existing.contains(HOOK_MARKER) && !force {
            bail!(
                "{} already exists and was not installed by flowforge (use --force to replace it)",
                hook.display()
            );
        }
    }

    std::fs::write(&hook, hook_script())
        .with_context(|| format!("Failed to write {}", hook.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("Failed to make {} executable", hook.display()))?;
    }

    println!("Installed commit-msg hook at {}", hook.display());
    Ok(())
}

/// Hooks directory, honouring worktrees and `core.hooksPath`.
async fn git_hooks_dir(root: &Path) -> Result<PathBuf> {
    let output = tokio::time::timeout(
        DEFAULT_GIT_TIMEOUT,
        tokio::process::Command::new("git")
            .args(["rev-parse", "--git-path", "hooks"])
            .current_dir(root)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .context("git rev-parse timed out")?
    .context("Failed to run git")?;

    if !output.status.success() {
        bail!(
            "git rev-parse --git-path hooks failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(root.join(String::from_utf8_lossy(&output.stdout).trim()))
}

/// Grant, list or revoke capability tokens
async fn cmd_authorize(root: &Path, action: AuthorizeAction) -> Result<()> {
    let store = FsTokenStore::new(root.join(STATE_DIR));

    match action {
        AuthorizeAction::Grant {
            capability,
            session,
            ttl_minutes,
        } => {
            let ttl = chrono::Duration::minutes(i64::from(ttl_minutes));
            let token = store
                .create(&session, &capability, ttl)
                .await
                .context("Failed to grant capability")?;
            info!(
                event = "token.granted",
                token_id = %token.id,
                session_id = %token.session_id,
                capability = %token.capability,
            );
            println!(
                "Granted '{}' to session {} until {}",
                token.capability,
                token.session_id,
                token.expires_at.to_rfc3339()
            );
            println!("token: {}", token.id);
        }
        AuthorizeAction::List { session } => {
            let tokens = store
                .active_for_session(&session, chrono::Utc::now())
                .await
                .context("Failed to read tokens")?;
            if tokens.is_empty() {
                println!("No active tokens for session {session}");
                return Ok(());
            }
            for token in tokens {
                println!(
                    "{}  {:<14} expires {}",
                    token.id,
                    token.capability,
                    token.expires_at.to_rfc3339()
                );
            }
        }
        AuthorizeAction::Revoke { token } => {
            store
                .expire(&TokenId(token.clone()))
                .await
                .with_context(|| format!("Failed to revoke token {token}"))?;
            info!(event = "token.revoked", token_id = %token);
            println!("Revoked token {token}");
        }
    }
    Ok(())
}

/// Show recorded bypasses, oldest first
async fn cmd_audit(root: &Path, limit: Option<usize>) -> Result<()> {
    let log = FsAuditLog::new(root.join(STATE_DIR));
    let records = log.list().await.context("Failed to read the audit log")?;

    if records.is_empty() {
        println!("No bypasses recorded.");
        return Ok(());
    }

    let skip = limit.map_or(0, |n| records.len().saturating_sub(n));
    for record in records.iter().skip(skip) {
        println!(
            "{}  {:<20} {:<12} {:<24} {}",
            record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            record.token,
            record.context,
            record.branch.as_deref().unwrap_or("-"),
            record.message_summary
        );
    }
    Ok(())
}
