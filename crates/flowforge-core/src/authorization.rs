//! Declarative capability table for agent authorization.
//!
//! Paths are matched against an ordered list of `(glob, capability)` rules.
//! The first matching rule decides which capability a session must hold to
//! commit the path; a path matching no rule needs none.

use globset::{GlobBuilder, GlobMatcher};
use serde::{Deserialize, Serialize};

use crate::domain::{FlowforgeError, Result};

/// One `(pattern, capability)` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRule {
    pub pattern: String,
    pub capability: String,
}

impl CapabilityRule {
    pub fn new(pattern: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            capability: capability.into(),
        }
    }
}

/// Ordered capability rules, evaluated first-match-wins.
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    rules: Vec<(CapabilityRule, GlobMatcher)>,
}

const STANDARD_RULES: &[(&str, &str)] = &[
    ("**/migrations/**", "database"),
    ("**/*.sql", "database"),
    (".github/**", "devops"),
    ("**/Dockerfile", "devops"),
    ("**/*.tf", "devops"),
    ("**/auth/**", "security"),
    ("**/security/**", "security"),
    ("documentation/**", "documentation"),
];

impl CapabilityTable {
    /// Compile `rules`, keeping their order.
    pub fn new(rules: Vec<CapabilityRule>) -> Result<Self> {
        let compiled = rules
            .into_iter()
            .map(|rule| {
                let matcher = GlobBuilder::new(&rule.pattern)
                    .literal_separator(true)
                    .build()
                    .map_err(|e| FlowforgeError::InvalidPattern {
                        pattern: rule.pattern.clone(),
                        reason: e.to_string(),
                    })?
                    .compile_matcher();
                Ok((rule, matcher))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules: compiled })
    }

    /// The built-in reviewer table.
    pub fn standard() -> Self {
        let rules = STANDARD_RULES
            .iter()
            .filter_map(|(pattern, capability)| {
                let matcher = GlobBuilder::new(pattern)
                    .literal_separator(true)
                    .build()
                    .ok()?
                    .compile_matcher();
                Some((CapabilityRule::new(*pattern, *capability), matcher))
            })
            .collect();
        Self { rules }
    }

    /// Capability required to commit `path`, from the first matching rule.
    pub fn required_capability(&self, path: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|(_, matcher)| matcher.is_match(path))
            .map(|(rule, _)| rule.capability.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_compiles_every_rule() {
        assert_eq!(CapabilityTable::standard().len(), STANDARD_RULES.len());
    }

    #[test]
    fn test_standard_mapping() {
        let table = CapabilityTable::standard();
        assert_eq!(
            table.required_capability("db/migrations/001_init.sql"),
            Some("database")
        );
        assert_eq!(table.required_capability("scripts/seed.sql"), Some("database"));
        assert_eq!(
            table.required_capability(".github/workflows/ci.yml"),
            Some("devops")
        );
        assert_eq!(table.required_capability("Dockerfile"), Some("devops"));
        assert_eq!(table.required_capability("infra/main.tf"), Some("devops"));
        assert_eq!(
            table.required_capability("src/auth/session.ts"),
            Some("security")
        );
        assert_eq!(
            table.required_capability("documentation/api/orders.md"),
            Some("documentation")
        );
        assert_eq!(table.required_capability("src/service/order.ts"), None);
    }

    #[test]
    fn test_first_match_wins() {
        let table = CapabilityTable::new(vec![
            CapabilityRule::new("src/auth/legacy/**", "legacy"),
            CapabilityRule::new("src/auth/**", "security"),
        ])
        .unwrap();
        assert_eq!(
            table.required_capability("src/auth/legacy/login.ts"),
            Some("legacy")
        );
        assert_eq!(
            table.required_capability("src/auth/login.ts"),
            Some("security")
        );
    }

    #[test]
    fn test_star_does_not_cross_directories() {
        let table = CapabilityTable::new(vec![CapabilityRule::new("*.tf", "devops")]).unwrap();
        assert_eq!(table.required_capability("main.tf"), Some("devops"));
        assert_eq!(table.required_capability("infra/main.tf"), None);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = CapabilityTable::new(vec![CapabilityRule::new("src/[", "x")]).unwrap_err();
        assert!(matches!(err, FlowforgeError::InvalidPattern { .. }));
    }
}
