//! Verdict aggregation.
//!
//! Folds the ordered checker results of one run into a [`Verdict`]. Results
//! keep discovery order; counts are derived from them, never tracked
//! separately.

use std::ops::ControlFlow;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{EnforcementContext, FlowforgeError, RuleResult, Verdict};

/// What to do after the first blocking result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AggregationPolicy {
    /// Run every dispatched checker and report all violations at once.
    #[default]
    CollectAll,
    /// Stop at the first block.
    FailFast,
}

impl AggregationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollectAll => "collect-all",
            Self::FailFast => "fail-fast",
        }
    }
}

impl FromStr for AggregationPolicy {
    type Err = FlowforgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "collect-all" => Ok(Self::CollectAll),
            "fail-fast" => Ok(Self::FailFast),
            other => Err(FlowforgeError::UnknownPolicy(other.to_string())),
        }
    }
}

/// Incremental aggregator driven by the engine, one result per checker.
#[derive(Debug)]
pub struct Aggregator {
    context: EnforcementContext,
    policy: AggregationPolicy,
    expected: usize,
    results: Vec<RuleResult>,
    halted: bool,
}

impl Aggregator {
    /// `expected` is the number of checkers dispatched for the run.
    pub fn new(context: EnforcementContext, policy: AggregationPolicy, expected: usize) -> Self {
        Self {
            context,
            policy,
            expected,
            results: Vec::with_capacity(expected),
            halted: false,
        }
    }

    /// Record one result. `Break` means the policy wants the run stopped.
    pub fn push(&mut self, result: RuleResult) -> ControlFlow<()> {
        let block = result.is_block();
        self.results.push(result);
        if block && self.policy == AggregationPolicy::FailFast {
            self.halted = true;
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    pub fn finish(self) -> Verdict {
        let halted_early = self.halted && self.results.len() < self.expected;
        Verdict::from_results(self.context, self.results, halted_early)
    }
}

/// Aggregate an already-computed result list under `policy`.
pub fn aggregate(
    context: EnforcementContext,
    policy: AggregationPolicy,
    results: Vec<RuleResult>,
) -> Verdict {
    let mut aggregator = Aggregator::new(context, policy, results.len());
    for result in results {
        if aggregator.push(result).is_break() {
            break;
        }
    }
    aggregator.finish()
}
