//! Rule results produced by checkers.

use serde::{Deserialize, Serialize};

/// Numeric rule identifier, as used in the rules document (`Rule #24`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u16);

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome severity. Ordered so that `max` picks the worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Pass,
    Warn,
    Block,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Warn => "warn",
            Self::Block => "block",
        }
    }
}

/// A located observation backing a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub path: Option<String>,
    pub line: Option<u32>,
    pub detail: String,
}

impl Finding {
    pub fn at(path: &str, detail: impl Into<String>) -> Self {
        Self {
            path: Some(path.to_string()),
            line: None,
            detail: detail.into(),
        }
    }

    pub fn at_line(path: &str, line: u32, detail: impl Into<String>) -> Self {
        Self {
            path: Some(path.to_string()),
            line: Some(line),
            detail: detail.into(),
        }
    }

    pub fn general(detail: impl Into<String>) -> Self {
        Self {
            path: None,
            line: None,
            detail: detail.into(),
        }
    }
}

/// Outcome of one checker invocation. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleResult {
    pub rule: RuleId,
    /// Checker name, e.g. `file-size`.
    pub checker: String,
    pub severity: Severity,
    pub message: String,
    /// Suggested remediation.
    pub fix: Option<String>,
    pub findings: Vec<Finding>,
    /// The checker could not determine an answer and degraded to pass.
    pub skipped: bool,
}

impl RuleResult {
    fn new(rule: RuleId, checker: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            rule,
            checker: checker.to_string(),
            severity,
            message: message.into(),
            fix: None,
            findings: Vec::new(),
            skipped: false,
        }
    }

    pub fn pass(rule: RuleId, checker: &str, message: impl Into<String>) -> Self {
        Self::new(rule, checker, Severity::Pass, message)
    }

    pub fn warn(rule: RuleId, checker: &str, message: impl Into<String>) -> Self {
        Self::new(rule, checker, Severity::Warn, message)
    }

    pub fn block(rule: RuleId, checker: &str, message: impl Into<String>) -> Self {
        Self::new(rule, checker, Severity::Block, message)
    }

    /// Degraded outcome: the checker could not evaluate and lets the commit through.
    pub fn skipped(rule: RuleId, checker: &str, reason: impl Into<String>) -> Self {
        let mut result = Self::new(rule, checker, Severity::Pass, reason);
        result.skipped = true;
        result
    }

    pub fn with_fix(mut self, fix: impl Into<String>) -> Self {
        self.fix = Some(fix.into());
        self
    }

    pub fn with_findings(mut self, findings: Vec<Finding>) -> Self {
        self.findings = findings;
        self
    }

    pub fn is_block(&self) -> bool {
        self.severity == Severity::Block
    }

    pub fn is_warn(&self) -> bool {
        self.severity == Severity::Warn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Block > Severity::Warn);
        assert!(Severity::Warn > Severity::Pass);
        assert_eq!(
            [Severity::Warn, Severity::Block, Severity::Pass]
                .into_iter()
                .max(),
            Some(Severity::Block)
        );
    }

    #[test]
    fn test_skipped_result_is_a_pass() {
        let r = RuleResult::skipped(RuleId(18), "protected-branch", "detached HEAD");
        assert_eq!(r.severity, Severity::Pass);
        assert!(r.skipped);
        assert!(!r.is_block());
    }

    #[test]
    fn test_rule_id_display() {
        assert_eq!(RuleId(24).to_string(), "#24");
        assert_eq!(serde_json::to_string(&RuleId(24)).unwrap(), "24");
    }
}
