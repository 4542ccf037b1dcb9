//! Aggregate outcome of one enforcement run.

use serde::{Deserialize, Serialize};

use super::context::EnforcementContext;
use super::rule::{RuleResult, Severity};

/// A bypass that short-circuited the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BypassNotice {
    pub token: String,
    /// Id of the persisted audit record, when persisting succeeded.
    pub audit_id: Option<String>,
}

/// Aggregate of all results for a run.
///
/// # Invariants
///
/// `block_count` and `warn_count` always equal the number of `results` with
/// the corresponding severity. `results` keep discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub context: EnforcementContext,
    pub results: Vec<RuleResult>,
    pub block_count: usize,
    pub warn_count: usize,
    /// Fail-fast stopped the run before every checker executed.
    pub halted_early: bool,
    pub bypass: Option<BypassNotice>,
}

impl Verdict {
    pub(crate) fn from_results(
        context: EnforcementContext,
        results: Vec<RuleResult>,
        halted_early: bool,
    ) -> Self {
        let block_count = results
            .iter()
            .filter(|r| r.severity == Severity::Block)
            .count();
        let warn_count = results
            .iter()
            .filter(|r| r.severity == Severity::Warn)
            .count();
        Self {
            context,
            results,
            block_count,
            warn_count,
            halted_early,
            bypass: None,
        }
    }

    /// A verdict for a bypassed run: pass, no results.
    pub fn bypassed(context: EnforcementContext, notice: BypassNotice) -> Self {
        Self {
            context,
            results: Vec::new(),
            block_count: 0,
            warn_count: 0,
            halted_early: false,
            bypass: Some(notice),
        }
    }

    /// Pass iff no block-severity result exists.
    pub fn passed(&self) -> bool {
        self.block_count == 0
    }

    /// Process exit code: `0` allowed, `1` blocked.
    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }

    pub fn skipped_count(&self) -> usize {
        self.results.iter().filter(|r| r.skipped).count()
    }
}
