//! Structured observability hooks for enforcement run lifecycle events.
//!
//! This module provides:
//! - A run-scoped tracing span, attached to the run future with `Instrument`
//! - Emission functions for run start, per-checker results, run finish and bypasses
//!
//! Lifecycle events, bypasses included, are emitted at `info!`; the report
//! already tells the user about a bypass. Only a failure to write the audit
//! log is a `warn!`.

use tracing::{debug, info, warn};

/// Span tagged with the run id and context.
///
/// Attach it with `Instrument::instrument` rather than entering it, so the
/// run future stays `Send` across git calls.
pub fn run_span(run_id: &str, context: &str) -> tracing::Span {
    tracing::info_span!("flowforge.run", run_id = %run_id, context = %context)
}

/// Emit event: run started for a context.
pub fn emit_run_started(run_id: &str, context: &str, staged_files: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        context = %context,
        staged_files = staged_files,
    );
}

/// Emit event: engine phase transition.
pub fn emit_phase(run_id: &str, phase: &str) {
    debug!(event = "run.phase", run_id = %run_id, phase = %phase);
}

/// Emit event: one checker produced its result.
pub fn emit_checker_finished(run_id: &str, checker: &str, severity: &str, skipped: bool) {
    info!(
        event = "checker.finished",
        run_id = %run_id,
        checker = %checker,
        severity = %severity,
        skipped = skipped,
    );
}

/// Emit event: run finished with counts and outcome.
pub fn emit_run_finished(
    run_id: &str,
    duration_ms: u64,
    block_count: usize,
    warn_count: usize,
    passed: bool,
) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        block_count = block_count,
        warn_count = warn_count,
        passed = passed,
    );
}

/// Emit event: enforcement bypassed via commit message token.
pub fn emit_bypass_used(run_id: &str, token: &str, branch: &str, digest: &str) {
    info!(
        event = "bypass.used",
        run_id = %run_id,
        token = %token,
        branch = %branch,
        changeset_digest = %digest,
    );
}

/// Emit event: the bypass could not be persisted to the audit log.
pub fn emit_audit_error(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "bypass.audit_error", run_id = %run_id, error = %error);
}
