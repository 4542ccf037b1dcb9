//! Verdict rendering: colored text for people, JSON lines for tools.

use std::fmt::Write as _;
use std::str::FromStr;

use serde::Serialize;

use crate::domain::{
    BypassNotice, EnforcementContext, FlowforgeError, Result, RuleResult, Severity, Verdict,
};

/// Report format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Jsonl,
}

impl FromStr for OutputFormat {
    type Err = FlowforgeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(Self::Text),
            "jsonl" | "json" => Ok(Self::Jsonl),
            other => Err(FlowforgeError::UnknownFormat(other.to_string())),
        }
    }
}

/// Whether ANSI colors should be used, honouring `NO_COLOR` and dumb terminals.
pub fn color_enabled() -> bool {
    color_enabled_with_env(
        std::env::var("NO_COLOR").ok().as_deref(),
        std::env::var("TERM").ok().as_deref(),
    )
}

/// Like [`color_enabled`] with explicit environment values.
pub fn color_enabled_with_env(no_color: Option<&str>, term: Option<&str>) -> bool {
    if no_color.is_some_and(|v| !v.is_empty()) {
        return false;
    }
    term != Some("dumb")
}

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

struct Paint {
    enabled: bool,
}

impl Paint {
    fn wrap(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

fn tag(result: &RuleResult) -> (&'static str, &'static str) {
    match (result.severity, result.skipped) {
        (_, true) => ("[SKIP ]", DIM),
        (Severity::Block, _) => ("[BLOCK]", RED),
        (Severity::Warn, _) => ("[WARN ]", YELLOW),
        (Severity::Pass, _) => ("[PASS ]", GREEN),
    }
}

/// The single warning line reported for a bypassed run.
pub fn bypass_line(notice: &BypassNotice) -> String {
    match &notice.audit_id {
        Some(id) => format!(
            "WARNING: rule enforcement bypassed by {} (audit record {})",
            notice.token, id
        ),
        None => format!(
            "WARNING: rule enforcement bypassed by {} (audit record could not be written)",
            notice.token
        ),
    }
}

/// Human-readable report, one block per result in discovery order.
pub fn render_text(verdict: &Verdict, color: bool) -> String {
    let paint = Paint { enabled: color };
    let mut out = String::new();

    if let Some(notice) = &verdict.bypass {
        let _ = writeln!(out, "{}", paint.wrap(YELLOW, &bypass_line(notice)));
        return out;
    }

    for result in &verdict.results {
        let (label, code) = tag(result);
        let _ = writeln!(
            out,
            "{} {} {}",
            paint.wrap(code, label),
            result.message,
            paint.wrap(DIM, &format!("[{}]", result.checker))
        );
        for finding in &result.findings {
            let location = match (&finding.path, finding.line) {
                (Some(path), Some(line)) => format!("{path}:{line}: "),
                (Some(path), None) => format!("{path}: "),
                _ => String::new(),
            };
            let mut lines = finding.detail.lines();
            let first = lines.next().unwrap_or("");
            let _ = writeln!(out, "    - {location}{first}");
            for rest in lines {
                let _ = writeln!(out, "      {rest}");
            }
        }
        if let Some(fix) = &result.fix {
            let _ = writeln!(out, "    fix: {fix}");
        }
    }

    let passed = verdict.results.len() - verdict.block_count - verdict.warn_count;
    let mut summary = format!(
        "{}: {} blocked, {} warning(s), {} passed",
        verdict.context, verdict.block_count, verdict.warn_count, passed
    );
    let skipped = verdict.skipped_count();
    if skipped > 0 {
        let _ = write!(summary, " ({skipped} skipped)");
    }
    if verdict.halted_early {
        summary.push_str(", stopped at first block");
    }
    let _ = writeln!(out, "{}", paint.wrap(BOLD, &summary));

    let outcome = if verdict.passed() {
        paint.wrap(GREEN, "Commit allowed.")
    } else {
        paint.wrap(RED, "Commit blocked.")
    };
    let _ = writeln!(out, "{outcome}");
    out
}

#[derive(Serialize)]
struct ResultLine<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    context: EnforcementContext,
    #[serde(flatten)]
    result: &'a RuleResult,
}

#[derive(Serialize)]
struct SummaryLine<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    context: EnforcementContext,
    passed: bool,
    exit_code: i32,
    results: usize,
    block_count: usize,
    warn_count: usize,
    skipped_count: usize,
    halted_early: bool,
    bypass: Option<&'a BypassNotice>,
}

/// JSON lines: one object per result, then one summary object.
pub fn render_jsonl(verdict: &Verdict) -> Result<String> {
    let mut out = String::new();
    for result in &verdict.results {
        let line = ResultLine {
            kind: "result",
            context: verdict.context,
            result,
        };
        out.push_str(&serde_json::to_string(&line)?);
        out.push('\n');
    }

    let summary = SummaryLine {
        kind: "summary",
        context: verdict.context,
        passed: verdict.passed(),
        exit_code: verdict.exit_code(),
        results: verdict.results.len(),
        block_count: verdict.block_count,
        warn_count: verdict.warn_count,
        skipped_count: verdict.skipped_count(),
        halted_early: verdict.halted_early,
        bypass: verdict.bypass.as_ref(),
    };
    out.push_str(&serde_json::to_string(&summary)?);
    out.push('\n');
    Ok(out)
}

/// Render in `format`.
pub fn render(verdict: &Verdict, format: OutputFormat, color: bool) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(verdict, color)),
        OutputFormat::Jsonl => render_jsonl(verdict),
    }
}
