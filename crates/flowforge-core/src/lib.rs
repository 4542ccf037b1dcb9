//! FlowForge Core Library
//!
//! Commit-time workflow rule enforcement: checkers, the context dispatcher,
//! verdict aggregation, the bypass layer and the engine that drives a run.

macro_rules! static_regex {
    ($re:literal) => {{
        static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
        RE.get_or_init(|| regex::Regex::new($re).expect("static pattern compiles"))
    }};
}

pub mod aggregate;
pub mod authorization;
pub mod bypass;
pub mod catalog;
pub mod checkers;
pub mod config;
pub mod diff;
pub mod dispatch;
pub mod domain;
pub mod engine;
pub mod obs;
pub mod report;
pub mod scm;
pub mod telemetry;
pub mod workspace;

pub use aggregate::{aggregate, AggregationPolicy, Aggregator};
pub use authorization::{CapabilityRule, CapabilityTable};
pub use bypass::{detect_bypass, BYPASS_TOKENS};
pub use catalog::RuleCatalog;
pub use checkers::{CheckInput, Checker, CheckerKind, CheckerRegistry};
pub use config::EngineConfig;
pub use dispatch::checkers_for;
pub use domain::{
    AddedLine, BypassNotice, Changeset, EnforcementContext, FileClass, FileStatus, Finding,
    FlowforgeError, RepoState, Result, RuleId, RuleResult, Severity, StagedFile, Verdict,
};
pub use engine::{Engine, RunRequest};
pub use report::{render_jsonl, render_text, OutputFormat};
pub use scm::{GitClient, SourceControlClient, StagedEntry};
pub use telemetry::init_tracing;
pub use workspace::{FsWorkspace, MemoryWorkspace, Workspace};
