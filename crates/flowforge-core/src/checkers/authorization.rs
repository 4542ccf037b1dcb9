//! Rule 35: protected areas require an authorized agent session.

use std::collections::BTreeSet;

use crate::authorization::CapabilityTable;
use crate::domain::{Finding, RuleResult};

use super::{CheckInput, Checker, CheckerKind, Tally, Wording};

pub struct AgentAuthorization {
    capabilities: CapabilityTable,
}

impl AgentAuthorization {
    pub fn new(capabilities: CapabilityTable) -> Self {
        Self { capabilities }
    }
}

impl Checker for AgentAuthorization {
    fn kind(&self) -> CheckerKind {
        CheckerKind::AgentAuthorization
    }

    fn check(&self, input: &CheckInput<'_>) -> RuleResult {
        let kind = self.kind();
        let Some(session_id) = input.state.session_id.as_deref() else {
            return RuleResult::skipped(
                kind.rule(),
                kind.name(),
                format!(
                    "Rule {}: no agent session id; authorization not evaluated",
                    kind.rule()
                ),
            );
        };

        let mut tally = Tally::default();
        let mut missing = BTreeSet::new();
        for file in input.changeset.files() {
            let Some(required) = self.capabilities.required_capability(&file.path) else {
                continue;
            };
            if !input.state.has_capability(required) {
                missing.insert(required.to_string());
                tally.block(Finding::at(
                    &file.path,
                    format!("requires '{required}' authorization"),
                ));
            }
        }

        let fix = missing
            .iter()
            .map(|cap| format!("flowforge authorize grant {cap} --session {session_id}"))
            .collect::<Vec<_>>()
            .join("; ");
        tally.finish(
            kind,
            Wording {
                pass: "agent session authorized for staged paths",
                block: "agent session lacks authorization for staged paths",
                warn: "agent session lacks authorization for staged paths",
                fix: format!("Ask a reviewer to run: {fix}"),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkers::test_support::Fixture;
    use crate::domain::{Changeset, Severity, StagedFile};

    fn fixture() -> Fixture {
        Fixture::new(Changeset::new(vec![
            StagedFile::added("migrations/007_refunds.sql", "SELECT 1;\n"),
            StagedFile::modified("src/service/order.ts", "x\n", vec![]),
        ]))
    }

    #[test]
    fn test_without_session_id_is_skipped() {
        let fx = fixture();
        let result = AgentAuthorization::new(CapabilityTable::standard()).check(&fx.input());
        assert!(result.skipped);
    }

    #[test]
    fn test_missing_capability_blocks() {
        let mut fx = fixture();
        fx.state.session_id = Some("agent-7".to_string());
        let result = AgentAuthorization::new(CapabilityTable::standard()).check(&fx.input());
        assert!(result.is_block());
        assert_eq!(result.findings.len(), 1);
        assert!(result
            .fix
            .unwrap()
            .contains("flowforge authorize grant database --session agent-7"));
    }

    #[test]
    fn test_granted_capability_passes() {
        let mut fx = fixture();
        fx.state.session_id = Some("agent-7".to_string());
        fx.state.granted_capabilities.insert("database".to_string());
        let result = AgentAuthorization::new(CapabilityTable::standard()).check(&fx.input());
        assert_eq!(result.severity, Severity::Pass);
    }
}
