//! Context dispatcher: which checkers run for which lifecycle event.

use crate::checkers::CheckerKind;
use crate::domain::EnforcementContext;

/// Run in every context, before anything else.
const UNCONDITIONAL: &[CheckerKind] = &[CheckerKind::ProtectedBranch, CheckerKind::IssueNumber];

const PRE_COMMIT: &[CheckerKind] = &[
    CheckerKind::DocPlacement,
    CheckerKind::TestingRequirements,
    CheckerKind::DocUpdates,
    CheckerKind::CodeQuality,
    CheckerKind::DbConsistency,
    CheckerKind::DecisionDoc,
    CheckerKind::DocOrgStandards,
    CheckerKind::DbChangeProtocol,
    CheckerKind::ArchitecturePatterns,
    CheckerKind::FileSize,
    CheckerKind::TestingReliability,
    CheckerKind::FunctionDoc,
    CheckerKind::ImportPaths,
    CheckerKind::DbStandards,
    CheckerKind::AiReferences,
    CheckerKind::AgentAuthorization,
];

const START_WORK: &[CheckerKind] = &[
    CheckerKind::Planning,
    CheckerKind::IssueManagement,
    CheckerKind::WorkflowCheck,
];

const END_WORK: &[CheckerKind] = &[CheckerKind::TaskTracking, CheckerKind::SessionContinuity];

const CLOSE_TASK: &[CheckerKind] = &[CheckerKind::ApprovalRequired];

/// Ordered checkers for `context`.
pub fn checkers_for(context: EnforcementContext) -> Vec<CheckerKind> {
    let specific: &[CheckerKind] = match context {
        EnforcementContext::PreCommit => PRE_COMMIT,
        EnforcementContext::StartWork => START_WORK,
        EnforcementContext::EndWork => END_WORK,
        EnforcementContext::CloseTask => CLOSE_TASK,
        EnforcementContext::General => &[],
    };
    UNCONDITIONAL.iter().chain(specific).copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_unconditional_checkers_lead_every_context() {
        for context in EnforcementContext::ALL {
            let kinds = checkers_for(context);
            assert_eq!(&kinds[..2], UNCONDITIONAL, "context {context}");
        }
    }

    #[test]
    fn test_general_runs_only_unconditional() {
        assert_eq!(checkers_for(EnforcementContext::General), UNCONDITIONAL);
    }

    #[test]
    fn test_pre_commit_order() {
        let kinds = checkers_for(EnforcementContext::PreCommit);
        assert_eq!(kinds.len(), 18);
        assert_eq!(kinds[2], CheckerKind::DocPlacement);
        assert_eq!(kinds.last(), Some(&CheckerKind::AgentAuthorization));
    }

    #[test]
    fn test_every_checker_is_reachable_once() {
        let mut seen = HashSet::new();
        for context in EnforcementContext::ALL {
            for kind in checkers_for(context) {
                if !UNCONDITIONAL.contains(&kind) {
                    assert!(seen.insert(kind), "{kind} dispatched twice");
                }
            }
        }
        assert_eq!(seen.len() + UNCONDITIONAL.len(), CheckerKind::ALL.len());
    }
}
