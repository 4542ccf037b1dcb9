//! Bypass tokens.
//!
//! A commit message carrying one of [`BYPASS_TOKENS`] skips every checker.
//! The run still reports the bypass loudly and records it in the audit log.

/// Tokens that disable enforcement for one commit. Matched exactly,
/// case-sensitively, anywhere in the message.
pub const BYPASS_TOKENS: &[&str] = &["[skip-rules]", "[emergency]", "[bypass-flowforge]"];

/// First bypass token present in `message`, in [`BYPASS_TOKENS`] order.
pub fn detect_bypass(message: &str) -> Option<&'static str> {
    BYPASS_TOKENS
        .iter()
        .copied()
        .find(|token| message.contains(token))
}

/// The first line of a commit message, trimmed, for audit records.
pub fn summary_line(message: &str) -> String {
    message
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .unwrap_or("")
        .to_string()
}
